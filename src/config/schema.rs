//! Configuration schema definitions

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Project metadata configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Project version
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Subdirectory for copied static assets
    #[serde(default = "default_assets_subdir")]
    pub assets_subdir: String,

    /// Public URL prefix for assets
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Hash artifacts for cache busting
    #[serde(default = "default_true")]
    pub hash: bool,

    /// Write manifest.json alongside the artifacts
    #[serde(default = "default_true")]
    pub manifest: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            assets_subdir: default_assets_subdir(),
            public_url: default_public_url(),
            hash: true,
            manifest: true,
        }
    }
}

fn default_output_dir() -> String {
    "dist".to_string()
}

fn default_assets_subdir() -> String {
    "static".to_string()
}

fn default_public_url() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

/// Import resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Alias roots, e.g. "@" -> "src"
    #[serde(default = "default_alias")]
    pub alias: HashMap<String, String>,

    /// Implicit extensions tried when a specifier has none
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directories searched for bare (third-party) specifiers
    #[serde(default = "default_vendor_dirs")]
    pub vendor_dirs: Vec<String>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            alias: default_alias(),
            extensions: default_extensions(),
            vendor_dirs: default_vendor_dirs(),
        }
    }
}

fn default_alias() -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert("@".to_string(), "src".to_string());
    map
}

fn default_extensions() -> Vec<String> {
    ["js", "mjs", "json", "css", "scss", "vue"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_vendor_dirs() -> Vec<String> {
    vec!["node_modules".to_string()]
}

/// Build-time feature configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Emit a .map file next to each script artifact
    #[serde(default)]
    pub sourcemap: bool,

    /// Write report.json with per-chunk size breakdown
    #[serde(default)]
    pub analyze: bool,

    /// Gzip precompression of emitted artifacts
    #[serde(default)]
    pub gzip: GzipConfig,

    /// Image recompression for copied static assets
    #[serde(default)]
    pub images: ImageConfig,
}

/// Gzip precompression settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GzipConfig {
    /// Whether to emit .gz siblings
    #[serde(default)]
    pub enabled: bool,

    /// Minimum artifact size in bytes worth compressing
    #[serde(default = "default_gzip_threshold")]
    pub threshold: u64,

    /// Only keep the .gz file if compressed/original <= this ratio
    #[serde(default = "default_gzip_min_ratio")]
    pub min_ratio: f64,

    /// Artifact extensions eligible for compression
    #[serde(default = "default_gzip_extensions")]
    pub extensions: Vec<String>,
}

impl Default for GzipConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: default_gzip_threshold(),
            min_ratio: default_gzip_min_ratio(),
            extensions: default_gzip_extensions(),
        }
    }
}

fn default_gzip_threshold() -> u64 {
    10240
}

fn default_gzip_min_ratio() -> f64 {
    0.8
}

fn default_gzip_extensions() -> Vec<String> {
    ["js", "css", "html"].iter().map(|s| s.to_string()).collect()
}

/// Image recompression settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Whether to recompress recognized image formats
    #[serde(default)]
    pub enabled: bool,

    /// Lossy quality parameter (jpeg), 1-100
    #[serde(default = "default_image_quality")]
    pub quality: u8,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            quality: default_image_quality(),
        }
    }
}

fn default_image_quality() -> u8 {
    80
}

/// A static copy directive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticCopy {
    /// Source directory (relative to the project root)
    pub from: String,

    /// Destination subdirectory under the output root; empty means the
    /// configured assets subdirectory
    #[serde(default)]
    pub to: Option<String>,

    /// Glob patterns excluded from the copy
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Kind of chunk a partition rule produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Modules shared across entries
    Shared,
    /// Third-party dependency modules, split per entry group
    Vendor,
}

/// A chunk partition rule
///
/// Rules are evaluated in descending priority; the first matching rule wins.
/// Group scoping is declared explicitly rather than inferred from chunk-name
/// prefixes, so renaming a page directory cannot silently change vendor
/// assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRuleConfig {
    /// Target chunk name
    pub name: String,

    /// Regex matched against the module's root-relative path
    pub test: String,

    /// Minimum number of entries that must reach the module
    #[serde(default = "default_min_entries")]
    pub min_entries: usize,

    /// Entry groups this rule applies to; unset means all groups
    #[serde(default)]
    pub groups: Option<Vec<String>>,

    /// Rule precedence, highest evaluated first
    #[serde(default)]
    pub priority: i32,

    /// Kind of chunk the rule produces
    pub kind: RuleKind,
}

fn default_min_entries() -> usize {
    1
}
