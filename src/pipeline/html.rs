//! Page emission
//!
//! Renders one HTML document per entry. The chunk reference list is ordered
//! so dependencies load first: shared chunks (ascending priority, then name),
//! the group's vendor chunk, and the entry's own chunk last. Artifact paths
//! come from the finalized manifest snapshot; this stage never recomputes
//! hashes.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::Config;
use crate::entry::{Entry, EntryId};
use crate::error::BuildError;
use crate::pipeline::chunk::{Chunk, ChunkKind};
use crate::pipeline::emit::{maybe_gzip, write_atomic, Manifest};

/// HTML renderer for page entries
pub struct PageEmitter {
    config: Arc<Config>,
}

impl PageEmitter {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Emit one entry's HTML page. Any failure here is scoped to this entry;
    /// sibling pages continue to build.
    pub fn emit_page(
        &self,
        entry: &Entry,
        entry_id: EntryId,
        chunks: &[Chunk],
        manifest: &Manifest,
    ) -> Result<()> {
        if !entry.template.is_file() {
            return Err(BuildError::TemplateNotFound {
                entry: entry.name.clone(),
                path: entry.template.clone(),
            }
            .into());
        }

        let template = fs::read_to_string(&entry.template)
            .with_context(|| format!("Failed to read template: {}", entry.template.display()))?;

        let refs = chunk_refs(entry, entry_id, chunks);
        debug!(
            "Page {} references chunks: {:?}",
            entry.name,
            refs.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );

        let html = self.render(&template, &refs, manifest);

        let dest = self.config.output_dir().join(&entry.html_output);
        write_atomic(&dest, html.as_bytes())
            .with_context(|| format!("Failed to write page: {}", dest.display()))?;

        maybe_gzip(&self.config, &dest, html.as_bytes(), "html");

        Ok(())
    }

    /// Substitute manifest-resolved artifact references into the template
    fn render(&self, template: &str, refs: &[&Chunk], manifest: &Manifest) -> String {
        let mut links = String::new();
        let mut scripts = String::new();

        for chunk in refs {
            if let Some(css) = manifest.css(&chunk.name) {
                links.push_str(&format!(
                    "  <link rel=\"stylesheet\" href=\"{}\">\n",
                    self.public_path(css)
                ));
            }
            if let Some(js) = manifest.js(&chunk.name) {
                scripts.push_str(&format!(
                    "  <script src=\"{}\"></script>\n",
                    self.public_path(js)
                ));
            }
        }

        inject(template, &links, &scripts)
    }

    fn public_path(&self, rel: &str) -> String {
        let prefix = &self.config.output.public_url;
        if prefix.ends_with('/') {
            format!("{}{}", prefix, rel)
        } else {
            format!("{}/{}", prefix, rel)
        }
    }
}

/// Compute an entry's ordered chunk reference list: shared chunks by
/// ascending priority then name, then the group vendor chunk, then the
/// entry's own chunk last
pub fn chunk_refs<'a>(entry: &Entry, entry_id: EntryId, chunks: &'a [Chunk]) -> Vec<&'a Chunk> {
    let mut shared: Vec<&Chunk> = chunks
        .iter()
        .filter(|c| c.kind == ChunkKind::Shared && c.entries.contains(&entry_id))
        .collect();
    shared.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(&b.name)));

    let mut vendor: Vec<&Chunk> = chunks
        .iter()
        .filter(|c| c.kind == ChunkKind::Vendor && c.entries.contains(&entry_id))
        .collect();
    vendor.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.name.cmp(&b.name)));

    let own = chunks
        .iter()
        .filter(|c| c.kind == ChunkKind::Entry && c.name == entry.name);

    shared.into_iter().chain(vendor).chain(own).collect()
}

/// Insert link tags before `</head>` and script tags before `</body>`,
/// appending when the markers are absent
fn inject(template: &str, links: &str, scripts: &str) -> String {
    let mut html = template.to_string();

    if !links.is_empty() {
        if let Some(pos) = html.find("</head>") {
            html.insert_str(pos, links);
        } else {
            html.insert_str(0, links);
        }
    }

    if !scripts.is_empty() {
        if let Some(pos) = html.find("</body>") {
            html.insert_str(pos, scripts);
        } else {
            html.push_str(scripts);
        }
    }

    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    use crate::pipeline::emit::Artifact;

    fn entry_at(root: &std::path::Path) -> Entry {
        Entry {
            name: "index/home".to_string(),
            group: "index".to_string(),
            source: root.join("home.js"),
            template: root.join("home.html"),
            html_output: "index/home.html".to_string(),
        }
    }

    fn chunk(name: &str, kind: ChunkKind, priority: i32, entries: &[EntryId]) -> Chunk {
        Chunk {
            name: name.to_string(),
            kind,
            priority,
            module_ids: vec![],
            entries: entries.iter().copied().collect::<BTreeSet<_>>(),
        }
    }

    fn artifact(chunk: &str, rel: &str) -> Artifact {
        Artifact {
            chunk: chunk.to_string(),
            rel: rel.to_string(),
            path: PathBuf::from(rel),
            size: 0,
            hash: "deadbeef".to_string(),
        }
    }

    fn test_chunks() -> Vec<Chunk> {
        vec![
            chunk("index/home", ChunkKind::Entry, 0, &[0]),
            chunk("common/env", ChunkKind::Shared, 8, &[0, 1]),
            chunk("index/common", ChunkKind::Shared, 5, &[0, 1]),
            chunk("index/vendor", ChunkKind::Vendor, 10, &[0, 1]),
            chunk("phone/vendor", ChunkKind::Vendor, 10, &[2]),
        ]
    }

    #[test]
    fn test_chunk_refs_ordering() {
        let tmp = tempfile::tempdir().unwrap();
        let entry = entry_at(tmp.path());
        let chunks = test_chunks();

        let refs = chunk_refs(&entry, 0, &chunks);
        let names: Vec<&str> = refs.iter().map(|c| c.name.as_str()).collect();
        // shared ascending priority, vendor, own entry chunk last
        assert_eq!(
            names,
            vec!["index/common", "common/env", "index/vendor", "index/home"]
        );
    }

    #[test]
    fn test_refs_exclude_foreign_chunks() {
        let tmp = tempfile::tempdir().unwrap();
        let entry = entry_at(tmp.path());
        let chunks = test_chunks();

        let refs = chunk_refs(&entry, 0, &chunks);
        assert!(!refs.iter().any(|c| c.name == "phone/vendor"));
    }

    #[test]
    fn test_emit_page_injects_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let entry = entry_at(tmp.path());
        std::fs::write(
            &entry.template,
            "<html><head><title>t</title></head><body><div id=\"app\"></div></body></html>",
        )
        .unwrap();

        let chunks = test_chunks();
        let manifest = Manifest::from_artifacts(&[
            artifact("index/home", "js/index/home.aaaa1111.js"),
            artifact("index/home", "css/index/home.aaaa1111.css"),
            artifact("common/env", "js/common/env.bbbb2222.js"),
            artifact("index/common", "js/index/common.cccc3333.js"),
            artifact("index/vendor", "js/index/vendor.dddd4444.js"),
        ]);

        let config = Arc::new(Config::default_config(tmp.path().to_path_buf()));
        let emitter = PageEmitter::new(config.clone());
        emitter.emit_page(&entry, 0, &chunks, &manifest).unwrap();

        let html = std::fs::read_to_string(config.output_dir().join("index/home.html")).unwrap();

        let common = html.find("js/index/common.cccc3333.js").unwrap();
        let env = html.find("js/common/env.bbbb2222.js").unwrap();
        let vendor = html.find("js/index/vendor.dddd4444.js").unwrap();
        let own = html.find("js/index/home.aaaa1111.js").unwrap();
        assert!(common < env && env < vendor && vendor < own);

        // stylesheet in head, scripts in body
        let head_end = html.find("</head>").unwrap();
        let css = html.find("css/index/home.aaaa1111.css").unwrap();
        assert!(css < head_end);
        assert!(own > head_end);
    }

    #[test]
    fn test_large_page_gets_gzip_sibling() {
        let tmp = tempfile::tempdir().unwrap();
        let entry = entry_at(tmp.path());
        let body = "<p>repetitive filler line</p>\n".repeat(2000);
        std::fs::write(
            &entry.template,
            format!("<html><head></head><body>{}</body></html>", body),
        )
        .unwrap();

        let mut config = Config::default_config(tmp.path().to_path_buf());
        config.build.gzip.enabled = true;
        config.build.gzip.threshold = 1024;
        let emitter = PageEmitter::new(Arc::new(config.clone()));
        emitter
            .emit_page(&entry, 0, &test_chunks(), &Manifest::default())
            .unwrap();

        let page = config.output_dir().join("index/home.html");
        assert!(page.is_file());
        assert!(PathBuf::from(format!("{}.gz", page.display())).is_file());
    }

    #[test]
    fn test_missing_template_is_per_entry_error() {
        let tmp = tempfile::tempdir().unwrap();
        let entry = entry_at(tmp.path());
        // no template written

        let config = Arc::new(Config::default_config(tmp.path().to_path_buf()));
        let emitter = PageEmitter::new(config);
        let err = emitter
            .emit_page(&entry, 0, &test_chunks(), &Manifest::default())
            .unwrap_err();

        let build_err = err.downcast_ref::<BuildError>().unwrap();
        assert!(matches!(build_err, BuildError::TemplateNotFound { .. }));
        assert!(!build_err.is_fatal());
    }

    #[test]
    fn test_inject_without_markers_appends() {
        let html = inject("<div></div>", "", "  <script src=\"/a.js\"></script>\n");
        assert!(html.ends_with("</script>\n"));
        assert!(html.starts_with("<div>"));
    }
}
