//! Page entry discovery
//!
//! Walks the conventional page tree `<pages_root>/<group>/pages/<name>/` and
//! produces one immutable [`Entry`] per page. The group is taken from the
//! directory structure and carried explicitly on the entry; nothing downstream
//! infers it from name prefixes.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::Config;

/// Index of an entry in the discovered, name-sorted entry list
pub type EntryId = usize;

/// A single page: root source module plus its HTML template
#[derive(Debug, Clone)]
pub struct Entry {
    /// Logical name, `<group>/<name>`
    pub name: String,

    /// Entry group, e.g. "index" (desktop) or "phone" (mobile)
    pub group: String,

    /// Absolute path of the page's root source module
    pub source: PathBuf,

    /// Absolute path of the page's HTML template. Existence is only checked
    /// at page-emission time; a missing template fails that page alone.
    pub template: PathBuf,

    /// Output HTML path relative to the output root
    pub html_output: String,
}

/// Source extensions accepted for a page's root module, tried in order
const SOURCE_EXTENSIONS: &[&str] = &["js", "mjs", "vue"];

/// Discover all page entries under the configured pages root.
///
/// The returned list is sorted by logical name so every later stage sees the
/// same deterministic ordering; indices into it are [`EntryId`]s.
pub fn discover(config: &Config) -> Result<Vec<Entry>> {
    let pages_root = config.pages_root_path();
    let mut entries = Vec::new();

    for group_dir in read_dirs(&pages_root)? {
        let group = dir_name(&group_dir);
        let pages_dir = group_dir.join("pages");
        if !pages_dir.is_dir() {
            debug!("Group '{}' has no pages/ directory, skipping", group);
            continue;
        }

        for page_dir in read_dirs(&pages_dir)? {
            let name = dir_name(&page_dir);

            let Some(source) = find_source(&page_dir, &name) else {
                debug!(
                    "Page directory {} has no {}.{{js,mjs,vue}} source, skipping",
                    page_dir.display(),
                    name
                );
                continue;
            };

            let logical = format!("{}/{}", group, name);
            entries.push(Entry {
                template: page_dir.join(format!("{}.html", name)),
                html_output: format!("{}.html", logical),
                name: logical,
                group: group.clone(),
                source,
            });
        }
    }

    if entries.is_empty() {
        anyhow::bail!(
            "no page entries found under {} (expected <group>/pages/<name>/<name>.js)",
            pages_root.display()
        );
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("Discovered {} page entries", entries.len());

    Ok(entries)
}

fn read_dirs(dir: &PathBuf) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &PathBuf) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn find_source(page_dir: &PathBuf, name: &str) -> Option<PathBuf> {
    SOURCE_EXTENSIONS
        .iter()
        .map(|ext| page_dir.join(format!("{}.{}", name, ext)))
        .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scaffold(root: &std::path::Path, pages: &[(&str, &str)]) {
        for (group, name) in pages {
            let dir = root
                .join("src/modules")
                .join(group)
                .join("pages")
                .join(name);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(format!("{}.js", name)), "export default 1;\n").unwrap();
        }
    }

    #[test]
    fn test_discover_sorted_with_groups() {
        let tmp = tempfile::tempdir().unwrap();
        scaffold(
            tmp.path(),
            &[("phone", "home"), ("index", "video"), ("index", "home")],
        );

        let config = Config::default_config(tmp.path().to_path_buf());
        let entries = discover(&config).unwrap();

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["index/home", "index/video", "phone/home"]);
        assert_eq!(entries[0].group, "index");
        assert_eq!(entries[2].group, "phone");
        assert_eq!(entries[0].html_output, "index/home.html");
        assert!(entries[0].source.ends_with("home.js"));
        assert!(entries[0].template.ends_with("home.html"));
    }

    #[test]
    fn test_discover_skips_page_without_source() {
        let tmp = tempfile::tempdir().unwrap();
        scaffold(tmp.path(), &[("index", "home")]);
        // A page directory with only a template and no root module
        let empty = tmp.path().join("src/modules/index/pages/broken");
        fs::create_dir_all(&empty).unwrap();
        fs::write(empty.join("broken.html"), "<html></html>").unwrap();

        let config = Config::default_config(tmp.path().to_path_buf());
        let entries = discover(&config).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "index/home");
    }

    #[test]
    fn test_discover_empty_tree_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("src/modules")).unwrap();

        let config = Config::default_config(tmp.path().to_path_buf());
        assert!(discover(&config).is_err());
    }
}
