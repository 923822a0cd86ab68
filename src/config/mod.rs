//! Configuration handling for pagepack
//!
//! Parses and manages pagepack.toml configuration files.

mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use schema::*;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project metadata
    pub project: ProjectConfig,

    /// Directory holding the page tree (`<group>/pages/<name>/`)
    #[serde(default = "default_pages_root")]
    pub pages_root: String,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Import resolution configuration
    #[serde(default)]
    pub resolve: ResolveConfig,

    /// Build feature toggles (sourcemap, gzip, images, analyze)
    #[serde(default)]
    pub build: BuildConfig,

    /// Static copy specifications
    #[serde(default, rename = "static")]
    pub statics: Vec<StaticCopy>,

    /// Chunk partition rules; when empty, defaults mirroring the classic
    /// per-group vendor/common split are generated at partition time
    #[serde(default)]
    pub chunks: Vec<ChunkRuleConfig>,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

fn default_pages_root() -> String {
    "src/modules".to_string()
}

impl Config {
    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let canonical_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| "Failed to parse pagepack.toml")?;

        // Set root directory to the directory containing the config file
        config.root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        config.validate()?;

        Ok(config)
    }

    /// Create a default configuration rooted at the given directory
    pub fn default_config(root: PathBuf) -> Self {
        Self {
            project: ProjectConfig {
                name: "my-site".to_string(),
                version: "0.1.0".to_string(),
            },
            pages_root: default_pages_root(),
            output: OutputConfig::default(),
            resolve: ResolveConfig::default(),
            build: BuildConfig::default(),
            statics: Vec::new(),
            chunks: Vec::new(),
            root,
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        let pages = self.pages_root_path();
        if !pages.is_dir() {
            anyhow::bail!(
                "pages_root does not exist or is not a directory: {}",
                pages.display()
            );
        }

        if self.build.images.quality == 0 || self.build.images.quality > 100 {
            anyhow::bail!(
                "build.images.quality must be in 1..=100, got {}",
                self.build.images.quality
            );
        }

        Ok(())
    }

    /// Get the absolute output directory path
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.output.dir)
    }

    /// Get the absolute pages root path
    pub fn pages_root_path(&self) -> PathBuf {
        self.root.join(&self.pages_root)
    }
}
