//! Module graph data structures and per-entry traversal
//!
//! Each entry is traversed independently (depth-first, visited-set guarded so
//! cyclic imports terminate) into a local discovery list; the lists are merged
//! single-threaded into one shared graph. Module IDs are assigned in
//! first-discovery order during the merge, which makes member ordering, and
//! therefore content hashes, reproducible across identical inputs.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::entry::EntryId;
use crate::resolver::Resolver;

/// Unique identifier for a module
pub type ModuleId = usize;

/// Types of modules the pipeline can carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleType {
    /// Script sources; contribute to the chunk's .js artifact
    Script,
    /// Stylesheets; contribute to the chunk's .css artifact
    Style,
    Json,
    Unknown,
}

impl ModuleType {
    /// Determine module type from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" | "vue" => ModuleType::Script,
            "css" | "scss" | "sass" | "less" => ModuleType::Style,
            "json" => ModuleType::Json,
            _ => ModuleType::Unknown,
        }
    }

    /// Detect module type from path
    pub fn detect(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(ModuleType::from_extension)
            .unwrap_or(ModuleType::Unknown)
    }

    /// Whether this module can carry import edges
    pub fn is_script(&self) -> bool {
        matches!(self, ModuleType::Script)
    }
}

/// A module in the dependency graph
#[derive(Debug, Clone)]
pub struct Module {
    /// Resolved absolute path
    pub path: PathBuf,

    /// Raw source
    pub source: String,

    /// Module type
    pub module_type: ModuleType,

    /// Raw size in bytes
    pub size: usize,

    /// Entries that reach this module; accumulated during the merge and the
    /// only mutation a module sees after creation
    pub reached_by: BTreeSet<EntryId>,
}

/// A module as discovered by one entry's traversal, before merging
#[derive(Debug)]
pub struct DiscoveredModule {
    pub path: PathBuf,
    pub source: String,
    pub module_type: ModuleType,
    /// Resolved dependency paths, in import order
    pub deps: Vec<PathBuf>,
}

/// Traverse one entry's import graph depth-first.
///
/// Returns modules in first-visit (preorder) order. Cyclic imports are
/// permitted; the visited set guards against infinite recursion.
pub fn traverse_entry(resolver: &Resolver, entry_source: &Path) -> Result<Vec<DiscoveredModule>> {
    let root = fs::canonicalize(entry_source).with_context(|| {
        format!("Failed to resolve entry source: {}", entry_source.display())
    })?;

    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut discovered = Vec::new();
    let mut stack = vec![root];

    while let Some(path) = stack.pop() {
        if !visited.insert(path.clone()) {
            continue;
        }

        let source = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read module: {}", path.display()))?;
        let module_type = ModuleType::detect(&path);

        let specifiers = resolver.extract_dependencies(&source, &module_type);
        let mut deps = Vec::with_capacity(specifiers.len());
        for specifier in &specifiers {
            deps.push(resolver.resolve(specifier, &path)?);
        }

        // Reverse push so the first import is visited first
        for dep in deps.iter().rev() {
            if !visited.contains(dep) {
                stack.push(dep.clone());
            }
        }

        discovered.push(DiscoveredModule {
            path,
            source,
            module_type,
            deps,
        });
    }

    Ok(discovered)
}

/// The merged module dependency graph
#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// Modules indexed by ID; IDs are assigned in first-discovery order
    modules: Vec<Module>,

    /// Map from path to module ID
    path_to_id: HashMap<PathBuf, ModuleId>,

    /// Dependency edges, per module, in import order
    edges: Vec<Vec<ModuleId>>,
}

impl ModuleGraph {
    /// Create a new empty module graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge per-entry traversal results into one graph.
    ///
    /// Traversals are merged in ascending entry ID (entries are name-sorted
    /// at discovery), so the resulting module IDs are deterministic.
    pub fn merge(traversals: Vec<(EntryId, Vec<DiscoveredModule>)>) -> Self {
        let mut sorted = traversals;
        sorted.sort_by_key(|(entry, _)| *entry);

        let mut graph = Self::new();
        for (entry, modules) in sorted {
            // First pass: register modules and reachability
            for discovered in &modules {
                let id = graph.add_module(discovered);
                graph.modules[id].reached_by.insert(entry);
            }
            // Second pass: edges; every dep path was registered above
            for discovered in &modules {
                let from = graph.path_to_id[&discovered.path];
                for dep in &discovered.deps {
                    let to = graph.path_to_id[dep];
                    graph.add_dependency(from, to);
                }
            }
        }
        graph
    }

    fn add_module(&mut self, discovered: &DiscoveredModule) -> ModuleId {
        if let Some(&id) = self.path_to_id.get(&discovered.path) {
            return id;
        }

        let id = self.modules.len();
        self.path_to_id.insert(discovered.path.clone(), id);
        self.modules.push(Module {
            path: discovered.path.clone(),
            source: discovered.source.clone(),
            module_type: discovered.module_type.clone(),
            size: discovered.source.len(),
            reached_by: BTreeSet::new(),
        });
        self.edges.push(Vec::new());
        id
    }

    fn add_dependency(&mut self, from: ModuleId, to: ModuleId) {
        let deps = &mut self.edges[from];
        if !deps.contains(&to) {
            deps.push(to);
        }
    }

    /// Get module ID from path
    pub fn get_module_id(&self, path: &Path) -> Option<ModuleId> {
        self.path_to_id.get(path).copied()
    }

    /// Get a module by ID
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id]
    }

    /// All module IDs in first-discovery order
    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> {
        0..self.modules.len()
    }

    /// Direct dependencies of a module, in import order
    pub fn dependencies(&self, id: ModuleId) -> &[ModuleId] {
        &self.edges[id]
    }

    /// Total number of modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if graph is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
