//! Content hashing and artifact emission
//!
//! Serializes each chunk's members in their finalized order, derives the
//! artifact filename from a digest of the serialized bytes, and writes the
//! file atomically (temp file + rename) so a cancelled build never leaves a
//! partial artifact under its final name. Per-chunk work is independent and
//! runs on parallel blocking workers.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::Config;
use crate::pipeline::chunk::{Chunk, ChunkKind};
use crate::pipeline::graph::{ModuleGraph, ModuleType};
use crate::utils;

/// A chunk's serialized output on disk
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Owning chunk name
    pub chunk: String,

    /// Path relative to the output root, e.g. `js/index/vendor.1a2b3c4d.js`
    pub rel: String,

    /// Absolute output path
    pub path: PathBuf,

    /// Serialized size in bytes
    pub size: usize,

    /// Content hash embedded in the filename
    pub hash: String,
}

/// Per-chunk artifact paths
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkAssets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub js: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
}

/// Immutable mapping from chunk name to current artifact paths.
///
/// Built once after all chunks are emitted and passed by reference to the
/// page emitter; it is never mutated afterwards.
#[derive(Debug, Default, Serialize)]
pub struct Manifest {
    chunks: BTreeMap<String, ChunkAssets>,
}

impl Manifest {
    /// Build the manifest snapshot from emitted artifacts
    pub fn from_artifacts(artifacts: &[Artifact]) -> Self {
        let mut chunks: BTreeMap<String, ChunkAssets> = BTreeMap::new();
        for artifact in artifacts {
            let assets = chunks.entry(artifact.chunk.clone()).or_default();
            if artifact.rel.ends_with(".js") {
                assets.js = Some(artifact.rel.clone());
            } else if artifact.rel.ends_with(".css") {
                assets.css = Some(artifact.rel.clone());
            }
        }
        Self { chunks }
    }

    /// Script artifact path for a chunk
    pub fn js(&self, chunk: &str) -> Option<&str> {
        self.chunks.get(chunk).and_then(|a| a.js.as_deref())
    }

    /// Stylesheet artifact path for a chunk
    pub fn css(&self, chunk: &str) -> Option<&str> {
        self.chunks.get(chunk).and_then(|a| a.css.as_deref())
    }

    /// Write the manifest as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json)
            .with_context(|| format!("Failed to write manifest: {}", path.display()))
    }
}

/// Write bytes to a temporary file in the destination directory, then rename
/// onto the final path. The rename is atomic on the same filesystem, so no
/// partially-written file is ever visible under its final name.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| anyhow::anyhow!("output path has no parent: {}", dest.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    tmp.write_all(bytes)?;
    tmp.persist(dest)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to finalize artifact: {}", dest.display()))?;
    Ok(())
}

/// Chunk serializer and artifact writer
pub struct Emitter {
    config: Arc<Config>,
}

impl Emitter {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Emit all chunks in parallel and return the artifacts plus the final
    /// manifest snapshot, sorted by chunk name for deterministic reporting
    pub async fn emit_all(
        &self,
        graph: Arc<ModuleGraph>,
        chunks: &[Chunk],
        entry_roots: &BTreeMap<String, String>,
    ) -> Result<(Vec<Artifact>, Manifest)> {
        let mut set = JoinSet::new();

        for chunk in chunks {
            let config = Arc::clone(&self.config);
            let graph = Arc::clone(&graph);
            let chunk = chunk.clone();
            let entry_root = entry_roots.get(&chunk.name).cloned();

            set.spawn_blocking(move || emit_chunk(&config, &graph, &chunk, entry_root));
        }

        let mut artifacts = Vec::new();
        while let Some(joined) = set.join_next().await {
            let chunk_artifacts = joined.context("chunk emission task panicked")??;
            artifacts.extend(chunk_artifacts);
        }

        artifacts.sort_by(|a, b| a.rel.cmp(&b.rel));
        let manifest = Manifest::from_artifacts(&artifacts);

        if self.config.output.manifest {
            manifest.write_json(&self.config.output_dir().join("manifest.json"))?;
        }

        Ok((artifacts, manifest))
    }
}

/// Serialize and write one chunk's artifacts (script and, when the chunk has
/// style members, stylesheet)
pub fn emit_chunk(
    config: &Config,
    graph: &ModuleGraph,
    chunk: &Chunk,
    entry_root: Option<String>,
) -> Result<Vec<Artifact>> {
    let out = config.output_dir();
    let mut artifacts = Vec::new();

    let script = serialize_scripts(config, graph, chunk, entry_root.as_deref());
    if let Some(code) = script {
        artifacts.push(write_artifact(config, graph, &out, chunk, "js", code.into_bytes())?);
    }

    let style = serialize_styles(config, graph, chunk);
    if let Some(css) = style {
        artifacts.push(write_artifact(config, graph, &out, chunk, "css", css.into_bytes())?);
    }

    Ok(artifacts)
}

/// Concatenate the chunk's script-side members into a self-registering bundle
fn serialize_scripts(
    config: &Config,
    graph: &ModuleGraph,
    chunk: &Chunk,
    entry_root: Option<&str>,
) -> Option<String> {
    let members: Vec<_> = chunk
        .module_ids
        .iter()
        .map(|&id| graph.module(id))
        .filter(|m| m.module_type != ModuleType::Style)
        .collect();

    if members.is_empty() {
        return None;
    }

    let mut code = String::from(RUNTIME_HEADER);

    for module in members {
        let id = utils::module_id(&module.path, &config.root);
        let body = match module.module_type {
            ModuleType::Json => format!("module.exports = {};", module.source),
            _ => module.source.clone(),
        };
        code.push_str(&format!(
            "\n// Module: {}\n__pagepack_modules__[\"{}\"] = function(module, exports, require) {{\n{}\n}};\n",
            id, id, body
        ));
    }

    if chunk.kind == ChunkKind::Entry {
        if let Some(root_id) = entry_root {
            code.push_str(&format!(
                "\n// Execute entry point\n__pagepack_require__(\"{}\");\n",
                root_id
            ));
        }
    }

    Some(code)
}

/// Concatenate the chunk's style members in member order
fn serialize_styles(config: &Config, graph: &ModuleGraph, chunk: &Chunk) -> Option<String> {
    let members: Vec<_> = chunk
        .module_ids
        .iter()
        .map(|&id| graph.module(id))
        .filter(|m| m.module_type == ModuleType::Style)
        .collect();

    if members.is_empty() {
        return None;
    }

    let mut css = String::new();
    for module in members {
        css.push_str(&format!(
            "/* {} */\n{}\n",
            utils::module_id(&module.path, &config.root),
            module.source
        ));
    }
    Some(css)
}

/// Registered once per page; idempotent so any chunk can carry it and chunks
/// can load in any relative order before the entry chunk executes
const RUNTIME_HEADER: &str = r#"// pagepack runtime
(function() {
  var g = typeof window !== 'undefined' ? window : globalThis;
  g.__pagepack_modules__ = g.__pagepack_modules__ || {};
  g.__pagepack_cache__ = g.__pagepack_cache__ || {};
  g.__pagepack_require__ = g.__pagepack_require__ || function(moduleId) {
    if (g.__pagepack_cache__[moduleId]) {
      return g.__pagepack_cache__[moduleId].exports;
    }
    var module = { exports: {} };
    g.__pagepack_cache__[moduleId] = module;
    var moduleFn = g.__pagepack_modules__[moduleId];
    if (moduleFn) {
      moduleFn(module, module.exports, g.__pagepack_require__);
    }
    return module.exports;
  };
})();
var __pagepack_modules__ = (typeof window !== 'undefined' ? window : globalThis).__pagepack_modules__;
var __pagepack_require__ = (typeof window !== 'undefined' ? window : globalThis).__pagepack_require__;
"#;

/// Hash the serialized bytes, write the artifact atomically, and emit the
/// optional sourcemap and gzip siblings.
///
/// The hash covers the serialized chunk content; the sourcemap pointer
/// comment appended afterwards references the hashed name and does not feed
/// back into it.
fn write_artifact(
    config: &Config,
    graph: &ModuleGraph,
    out: &Path,
    chunk: &Chunk,
    ext: &str,
    mut bytes: Vec<u8>,
) -> Result<Artifact> {
    let hash = utils::hash_content(&bytes);
    let rel = if config.output.hash {
        format!("{}/{}.{}.{}", ext, chunk.name, hash, ext)
    } else {
        format!("{}/{}.{}", ext, chunk.name, ext)
    };
    let dest = out.join(&rel);

    if ext == "js" && config.build.sourcemap {
        let map_rel = format!("{}.map", rel);
        let map = sourcemap_json(config, graph, &rel, chunk)?;
        write_atomic(&out.join(&map_rel), &map)?;

        let basename = map_rel.rsplit('/').next().unwrap_or(&map_rel);
        bytes.extend_from_slice(format!("//# sourceMappingURL={}\n", basename).as_bytes());
    }

    write_atomic(&dest, &bytes)?;
    debug!("Emitted {} ({})", rel, utils::format_size(bytes.len()));

    maybe_gzip(config, &dest, &bytes, ext);

    Ok(Artifact {
        chunk: chunk.name.clone(),
        rel,
        path: dest,
        size: bytes.len(),
        hash,
    })
}

/// Minimal v3 sourcemap: sources and their content, no mappings. Enough for
/// tooling to display original module sources per chunk.
fn sourcemap_json(config: &Config, graph: &ModuleGraph, rel: &str, chunk: &Chunk) -> Result<Vec<u8>> {
    let file = rel.rsplit('/').next().unwrap_or(rel).to_string();
    let sources: Vec<String> = chunk
        .module_ids
        .iter()
        .map(|&id| utils::module_id(&graph.module(id).path, &config.root))
        .collect();
    let contents: Vec<&str> = chunk
        .module_ids
        .iter()
        .map(|&id| graph.module(id).source.as_str())
        .collect();
    let map = serde_json::json!({
        "version": 3,
        "file": file,
        "sources": sources,
        "sourcesContent": contents,
        "names": [],
        "mappings": "",
    });
    Ok(serde_json::to_vec(&map)?)
}

/// Emit a .gz sibling when the output clears the size threshold and the
/// compression ratio is worth it. Shared with the page emitter, whose HTML
/// output is precompressed under the same gates.
pub(crate) fn maybe_gzip(config: &Config, dest: &Path, bytes: &[u8], ext: &str) {
    let gzip = &config.build.gzip;
    if !gzip.enabled
        || !gzip.extensions.iter().any(|e| e == ext)
        || (bytes.len() as u64) < gzip.threshold
    {
        return;
    }

    let result = (|| -> Result<Option<Vec<u8>>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes)?;
        let compressed = encoder.finish()?;
        let ratio = compressed.len() as f64 / bytes.len() as f64;
        Ok((ratio <= gzip.min_ratio).then_some(compressed))
    })();

    match result {
        Ok(Some(compressed)) => {
            let gz_path = PathBuf::from(format!("{}.gz", dest.display()));
            if let Err(e) = write_atomic(&gz_path, &compressed) {
                warn!("Failed to write {}: {:#}", gz_path.display(), e);
            }
        }
        Ok(None) => {
            debug!("Skipping gzip for {} (ratio above minimum)", dest.display());
        }
        Err(e) => {
            warn!("Gzip compression failed for {}: {:#}", dest.display(), e);
        }
    }
}
