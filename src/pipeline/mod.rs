//! Build pipeline orchestration
//!
//! Stages form a small task DAG: graph building must finish before
//! partitioning, which must finish before artifact emission, which must
//! finish before page emission (the page emitter needs the full manifest
//! snapshot). Per-entry traversals and per-chunk emissions run on parallel
//! blocking workers; the static asset copier runs alongside the whole graph
//! pipeline since the two share nothing but the output directory.

pub mod chunk;
pub mod emit;
pub mod graph;
pub mod html;

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::assets::{AssetCopier, AssetStats};
use crate::config::Config;
use crate::entry::{self, Entry};
use crate::resolver::Resolver;
use crate::utils;

pub use chunk::{Chunk, ChunkKind, ChunkRule};
pub use emit::{Artifact, Emitter, Manifest};
pub use graph::{Module, ModuleGraph, ModuleId, ModuleType};
pub use html::PageEmitter;

/// Result of a build run
#[derive(Debug)]
pub struct BuildReport {
    /// Entries whose pages were emitted
    pub pages_ok: Vec<String>,

    /// Entries that failed page emission, with the reason
    pub pages_failed: Vec<(String, String)>,

    /// All emitted artifacts, sorted by path
    pub artifacts: Vec<Artifact>,

    /// Static asset stage counters
    pub assets: AssetStats,

    /// Number of modules in the graph
    pub module_count: usize,

    /// Number of chunks produced
    pub chunk_count: usize,
}

impl BuildReport {
    /// Whether any entry failed; drives the process exit status
    pub fn has_failures(&self) -> bool {
        !self.pages_failed.is_empty()
    }
}

/// The build pipeline
pub struct Pipeline {
    /// Project configuration
    config: Arc<Config>,
}

impl Pipeline {
    /// Create a new pipeline instance.
    ///
    /// The project root is canonicalized up front so root-relative module
    /// identifiers agree with the canonicalized paths the traversal produces,
    /// even when the root is reached through a symlink.
    pub fn new(mut config: Config) -> Self {
        if let Ok(canonical) = fs::canonicalize(&config.root) {
            config.root = canonical;
        }
        Self {
            config: Arc::new(config),
        }
    }

    /// Run the full build
    pub async fn build(&self) -> Result<BuildReport> {
        let start = Instant::now();

        let entries = Arc::new(entry::discover(&self.config)?);

        // Kick off the asset copier first; it is independent of the graph
        // stages and only shares the output directory with them
        let copier = AssetCopier::new(Arc::clone(&self.config));
        let assets_task = tokio::task::spawn_blocking(move || copier.run());

        let stages_result = self.run_graph_stages(&entries).await;

        // Even when a graph stage fails, let the in-flight asset copy finish
        // before returning so no half-scheduled work is abandoned mid-write
        let assets = assets_task.await.context("asset copier task panicked")?;

        let (graph, chunks, artifacts, manifest) = stages_result?;
        let assets = assets?;

        info!("Rendering pages...");
        let page_emitter = PageEmitter::new(Arc::clone(&self.config));
        let mut pages_ok = Vec::new();
        let mut pages_failed = Vec::new();
        for (id, entry) in entries.iter().enumerate() {
            match page_emitter.emit_page(entry, id, &chunks, &manifest) {
                Ok(()) => pages_ok.push(entry.name.clone()),
                Err(e) => {
                    warn!("Page '{}' failed: {:#}", entry.name, e);
                    pages_failed.push((entry.name.clone(), format!("{:#}", e)));
                }
            }
        }

        if self.config.build.analyze {
            self.write_analysis(&graph, &chunks)?;
        }

        debug!("Build completed in {}", utils::format_duration(start.elapsed()));

        Ok(BuildReport {
            pages_ok,
            pages_failed,
            artifacts,
            assets,
            module_count: graph.len(),
            chunk_count: chunks.len(),
        })
    }

    /// Graph -> partition -> emit, in strict order
    async fn run_graph_stages(
        &self,
        entries: &Arc<Vec<Entry>>,
    ) -> Result<(Arc<ModuleGraph>, Vec<Chunk>, Vec<Artifact>, Manifest)> {
        info!("Building module graph...");
        let resolver = Resolver::new(Arc::clone(&self.config));

        // Per-entry traversals are independent; results are merged
        // single-threaded afterwards instead of locking a shared graph
        let mut set = JoinSet::new();
        for (id, entry) in entries.iter().enumerate() {
            let resolver = resolver.clone();
            let source = entry.source.clone();
            set.spawn_blocking(move || {
                graph::traverse_entry(&resolver, &source).map(|modules| (id, modules))
            });
        }

        let mut traversals = Vec::with_capacity(entries.len());
        while let Some(joined) = set.join_next().await {
            traversals.push(joined.context("entry traversal task panicked")??);
        }

        let graph = Arc::new(ModuleGraph::merge(traversals));
        info!("Module graph: {} modules", graph.len());

        info!("Partitioning chunks...");
        let rules = ChunkRule::compile(&self.config, entries)?;
        let chunks = chunk::partition(&graph, entries, &rules, &self.config.root)?;
        debug!(
            "Chunks: {:?}",
            chunks.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );

        info!("Emitting artifacts...");
        let entry_roots = self.entry_root_ids(entries, &graph)?;
        let emitter = Emitter::new(Arc::clone(&self.config));
        let (artifacts, manifest) = emitter
            .emit_all(Arc::clone(&graph), &chunks, &entry_roots)
            .await?;

        Ok((graph, chunks, artifacts, manifest))
    }

    /// Map each entry chunk name to its root module's runtime identifier
    fn entry_root_ids(
        &self,
        entries: &[Entry],
        graph: &ModuleGraph,
    ) -> Result<BTreeMap<String, String>> {
        let mut roots = BTreeMap::new();
        for entry in entries {
            let canonical = fs::canonicalize(&entry.source).with_context(|| {
                format!("Failed to resolve entry source: {}", entry.source.display())
            })?;
            if graph.get_module_id(&canonical).is_some() {
                roots.insert(
                    entry.name.clone(),
                    utils::module_id(&canonical, &self.config.root),
                );
            }
        }
        Ok(roots)
    }

    /// Write report.json with the per-chunk size breakdown
    fn write_analysis(&self, graph: &ModuleGraph, chunks: &[Chunk]) -> Result<()> {
        let report: Vec<serde_json::Value> = chunks
            .iter()
            .map(|c| {
                serde_json::json!({
                    "name": c.name,
                    "modules": c.module_ids.iter().map(|&id| {
                        let module = graph.module(id);
                        serde_json::json!({
                            "path": utils::module_id(&module.path, &self.config.root),
                            "size": module.size,
                        })
                    }).collect::<Vec<_>>(),
                    "size": c.total_size(graph),
                })
            })
            .collect();

        let path = self.config.output_dir().join("report.json");
        emit::write_atomic(&path, &serde_json::to_vec_pretty(&report)?)
            .context("Failed to write analysis report")?;
        info!("Analysis report written to {}", path.display());
        Ok(())
    }
}
