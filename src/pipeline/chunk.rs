//! Rule-based chunk partitioning
//!
//! Every module in the graph is assigned to exactly one chunk. An ordered
//! list of rules is evaluated functionally per module, highest priority
//! first; the first matching rule wins. Modules no rule claims fall into
//! their single reaching entry's chunk, and a multi-entry module without a
//! matching shared rule is a hard error rather than silent duplication.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use regex::Regex;
use tracing::debug;

use crate::config::{ChunkRuleConfig, Config, RuleKind};
use crate::entry::{Entry, EntryId};
use crate::error::BuildError;
use crate::pipeline::graph::{Module, ModuleGraph, ModuleId};
use crate::utils;

/// Type of chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// One entry's own chunk, loaded last on its page
    Entry,
    /// Modules shared across entries
    Shared,
    /// Third-party dependency chunk, split per entry group
    Vendor,
}

/// A compiled partition rule
#[derive(Debug)]
pub struct ChunkRule {
    /// Target chunk name
    pub name: String,

    /// Predicate over the module's root-relative path
    pub test: Regex,

    /// Minimum number of entries that must reach the module
    pub min_entries: usize,

    /// Entry groups this rule applies to; `None` means all groups
    pub groups: Option<Vec<String>>,

    /// Rule precedence, highest evaluated first
    pub priority: i32,

    /// Kind of chunk this rule produces
    pub kind: ChunkKind,
}

impl ChunkRule {
    /// Compile the configured rule set. Falls back to
    /// [`ChunkRule::defaults_for`] when no rules are configured.
    pub fn compile(config: &Config, entries: &[Entry]) -> Result<Vec<ChunkRule>> {
        if config.chunks.is_empty() {
            return Ok(Self::defaults_for(config, entries));
        }

        config
            .chunks
            .iter()
            .map(|rule| Self::from_config(rule))
            .collect()
    }

    fn from_config(rule: &ChunkRuleConfig) -> Result<ChunkRule> {
        let test = Regex::new(&rule.test)
            .map_err(|e| anyhow::anyhow!("invalid chunk rule test '{}': {}", rule.test, e))?;
        Ok(ChunkRule {
            name: rule.name.clone(),
            test,
            min_entries: rule.min_entries,
            groups: rule.groups.clone(),
            priority: rule.priority,
            kind: match rule.kind {
                RuleKind::Shared => ChunkKind::Shared,
                RuleKind::Vendor => ChunkKind::Vendor,
            },
        })
    }

    /// Default rule set: a vendor chunk per entry group over the vendor
    /// directories, a common chunk per group over that group's module tree
    /// (two-entry minimum), and a shared environment chunk over
    /// `src/(api|config|router)/`.
    pub fn defaults_for(config: &Config, entries: &[Entry]) -> Vec<ChunkRule> {
        let mut groups: Vec<&str> = entries.iter().map(|e| e.group.as_str()).collect();
        groups.sort_unstable();
        groups.dedup();

        let vendor_pattern = format!(
            "(^|/)({})/",
            config
                .resolve
                .vendor_dirs
                .iter()
                .map(|d| regex::escape(d))
                .collect::<Vec<_>>()
                .join("|")
        );

        let mut rules = Vec::new();
        for group in &groups {
            rules.push(ChunkRule {
                name: format!("{}/vendor", group),
                test: Regex::new(&vendor_pattern).expect("vendor pattern is valid"),
                min_entries: 1,
                groups: Some(vec![group.to_string()]),
                priority: 10,
                kind: ChunkKind::Vendor,
            });
            rules.push(ChunkRule {
                name: format!("{}/common", group),
                test: Regex::new(&format!(
                    "^{}/{}/",
                    regex::escape(&config.pages_root),
                    regex::escape(group)
                ))
                .expect("common pattern is valid"),
                min_entries: 2,
                groups: Some(vec![group.to_string()]),
                priority: 5,
                kind: ChunkKind::Shared,
            });
        }
        rules.push(ChunkRule {
            name: "common/env".to_string(),
            test: Regex::new("^src/(api|config|router)/").expect("env pattern is valid"),
            min_entries: 1,
            groups: None,
            priority: 8,
            kind: ChunkKind::Shared,
        });
        rules
    }

    /// Pure predicate: does this rule claim the given module?
    fn matches(&self, rel_path: &str, module: &Module, entries: &[Entry]) -> bool {
        if !self.test.is_match(rel_path) {
            return false;
        }
        if module.reached_by.len() < self.min_entries {
            return false;
        }
        if let Some(groups) = &self.groups {
            // Every reaching entry must belong to one of the rule's groups
            return module
                .reached_by
                .iter()
                .all(|&id| groups.iter().any(|g| entries[id].group == *g));
        }
        true
    }
}

/// A named output unit: an ordered group of modules emitted as one artifact
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk name (used for the output filename)
    pub name: String,

    /// Type of chunk
    pub kind: ChunkKind,

    /// Priority of the winning rule; drives page reference ordering
    pub priority: i32,

    /// Member modules, ascending ModuleId (first-discovery order)
    pub module_ids: Vec<ModuleId>,

    /// Union of the members' reaching entries
    pub entries: BTreeSet<EntryId>,
}

impl Chunk {
    /// Number of modules in chunk
    pub fn len(&self) -> usize {
        self.module_ids.len()
    }

    /// Check if chunk is empty
    pub fn is_empty(&self) -> bool {
        self.module_ids.is_empty()
    }

    /// Total raw size of member modules
    pub fn total_size(&self, graph: &ModuleGraph) -> usize {
        self.module_ids.iter().map(|&id| graph.module(id).size).sum()
    }
}

/// Assign every module in the graph to exactly one chunk.
///
/// Rules are evaluated in descending priority (ties broken by configured
/// order). Modules are visited in ascending ID so chunk membership order is
/// stable and hashes reproduce.
///
/// Entry root modules are exempt from rule matching: each one always lands
/// in its own entry chunk, so every page keeps a chunk that executes it even
/// under a catch-all rule.
pub fn partition(
    graph: &ModuleGraph,
    entries: &[Entry],
    rules: &[ChunkRule],
    root: &Path,
) -> Result<Vec<Chunk>> {
    let mut order: Vec<usize> = (0..rules.len()).collect();
    order.sort_by(|&a, &b| rules[b].priority.cmp(&rules[a].priority).then(a.cmp(&b)));

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    let mut push = |chunks: &mut Vec<Chunk>,
                    by_name: &mut HashMap<String, usize>,
                    name: &str,
                    kind: ChunkKind,
                    priority: i32,
                    module: ModuleId,
                    reached_by: &BTreeSet<EntryId>| {
        let idx = *by_name.entry(name.to_string()).or_insert_with(|| {
            chunks.push(Chunk {
                name: name.to_string(),
                kind,
                priority,
                module_ids: Vec::new(),
                entries: BTreeSet::new(),
            });
            chunks.len() - 1
        });
        chunks[idx].module_ids.push(module);
        chunks[idx].entries.extend(reached_by.iter().copied());
    };

    let mut entry_roots: HashMap<PathBuf, EntryId> = HashMap::new();
    for (id, entry) in entries.iter().enumerate() {
        let source = fs::canonicalize(&entry.source).unwrap_or_else(|_| entry.source.clone());
        entry_roots.entry(source).or_insert(id);
    }

    for id in graph.module_ids() {
        let module = graph.module(id);
        let rel_path = utils::module_id(&module.path, root);

        if let Some(&owner) = entry_roots.get(&module.path) {
            let entry = &entries[owner];
            debug!("{} -> entry chunk '{}' (root)", rel_path, entry.name);
            push(
                &mut chunks,
                &mut by_name,
                &entry.name,
                ChunkKind::Entry,
                0,
                id,
                &module.reached_by,
            );
            continue;
        }

        let winner = order
            .iter()
            .map(|&i| &rules[i])
            .find(|rule| rule.matches(&rel_path, module, entries));

        if let Some(rule) = winner {
            debug!("{} -> chunk '{}' (rule)", rel_path, rule.name);
            push(
                &mut chunks,
                &mut by_name,
                &rule.name,
                rule.kind,
                rule.priority,
                id,
                &module.reached_by,
            );
        } else if module.reached_by.len() == 1 {
            let entry = &entries[*module.reached_by.iter().next().expect("len checked")];
            debug!("{} -> entry chunk '{}'", rel_path, entry.name);
            push(
                &mut chunks,
                &mut by_name,
                &entry.name,
                ChunkKind::Entry,
                0,
                id,
                &module.reached_by,
            );
        } else {
            return Err(BuildError::AmbiguousChunk {
                module: module.path.clone(),
                candidates: module
                    .reached_by
                    .iter()
                    .map(|&e| entries[e].name.clone())
                    .collect(),
            }
            .into());
        }
    }

    Ok(chunks)
}
