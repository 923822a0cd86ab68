//! Module resolution
//!
//! Extracts import specifiers from source and resolves them to absolute file
//! paths following alias, relative, and vendor-directory rules.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::Config;
use crate::error::BuildError;
use crate::pipeline::ModuleType;

/// Regex patterns for extracting imports
static IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:import|export)\s+(?:(?:\{[^}]*\}|\*\s+as\s+\w+|\w+)\s+from\s+)?["']([^"']+)["']|require\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap()
});

static DYNAMIC_IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap()
});

/// Module resolver
#[derive(Clone)]
pub struct Resolver {
    /// Project configuration
    config: Arc<Config>,
}

impl Resolver {
    /// Create a new resolver
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Extract import/require dependencies from source code
    pub fn extract_dependencies(
        &self,
        source: &str,
        module_type: &ModuleType,
    ) -> Vec<String> {
        // Only script modules carry import edges; style and JSON modules are
        // leaves of the graph
        if !module_type.is_script() {
            return Vec::new();
        }

        let mut dependencies = Vec::new();

        // Static imports / exports / require calls
        for cap in IMPORT_REGEX.captures_iter(source) {
            if let Some(specifier) = cap.get(1).or_else(|| cap.get(2)) {
                let spec = specifier.as_str().to_string();
                if !dependencies.contains(&spec) {
                    dependencies.push(spec);
                }
            }
        }

        // Dynamic imports
        for cap in DYNAMIC_IMPORT_REGEX.captures_iter(source) {
            if let Some(specifier) = cap.get(1) {
                let spec = specifier.as_str().to_string();
                if !dependencies.contains(&spec) {
                    dependencies.push(spec);
                }
            }
        }

        debug!("Found {} dependencies", dependencies.len());

        dependencies
    }

    /// Resolve an import specifier to an absolute file path.
    ///
    /// A specifier that cannot be mapped to an existing file is a fatal
    /// [`BuildError::UnresolvedImport`]: the build aborts rather than
    /// silently skipping the edge.
    pub fn resolve(&self, specifier: &str, from: &Path) -> Result<PathBuf> {
        debug!("Resolving '{}' from '{}'", specifier, from.display());

        let resolved = if let Some(aliased) = self.expand_alias(specifier) {
            self.try_paths(&aliased)
        } else if specifier.starts_with('.') {
            let base_dir = from.parent().unwrap_or(Path::new("."));
            self.try_paths(&base_dir.join(specifier))
        } else if specifier.starts_with('/') {
            self.try_paths(&PathBuf::from(specifier))
        } else {
            self.resolve_vendor(specifier)?
        };

        match resolved {
            Some(path) => {
                let canonical = fs::canonicalize(&path).with_context(|| {
                    format!("Failed to canonicalize resolved path: {}", path.display())
                })?;
                debug!("Resolved to: {}", canonical.display());
                Ok(canonical)
            }
            None => Err(BuildError::UnresolvedImport {
                specifier: specifier.to_string(),
                importer: from.to_path_buf(),
            }
            .into()),
        }
    }

    /// Expand an alias root, e.g. "@/router" -> "<root>/src/router".
    /// The longest matching alias key wins.
    fn expand_alias(&self, specifier: &str) -> Option<PathBuf> {
        let mut best: Option<(&String, &String)> = None;
        for (key, target) in &self.config.resolve.alias {
            if specifier == key.as_str() || specifier.starts_with(&format!("{}/", key)) {
                if best.map_or(true, |(k, _)| key.len() > k.len()) {
                    best = Some((key, target));
                }
            }
        }

        let (key, target) = best?;
        let rest = specifier[key.len()..].trim_start_matches('/');
        let base = self.config.root.join(target);
        Some(if rest.is_empty() { base } else { base.join(rest) })
    }

    /// Try a candidate path as-is, with implicit extensions, and as a
    /// directory with an index file
    fn try_paths(&self, target: &Path) -> Option<PathBuf> {
        if target.is_file() {
            return Some(target.to_path_buf());
        }

        let target_str = target.to_string_lossy();
        for ext in &self.config.resolve.extensions {
            let with_ext = PathBuf::from(format!("{}.{}", target_str, ext));
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }

        if target.is_dir() {
            for ext in &self.config.resolve.extensions {
                let index = target.join(format!("index.{}", ext));
                if index.is_file() {
                    return Some(index);
                }
            }
        }

        None
    }

    /// Resolve a bare specifier against the configured vendor directories
    fn resolve_vendor(&self, specifier: &str) -> Result<Option<PathBuf>> {
        for vendor_dir in &self.config.resolve.vendor_dirs {
            let vendor = self.config.root.join(vendor_dir);
            if !vendor.is_dir() {
                continue;
            }
            if let Some(resolved) = self.resolve_in_vendor(&vendor, specifier)? {
                return Ok(Some(resolved));
            }
        }
        Ok(None)
    }

    /// Resolve a package specifier within one vendor directory
    fn resolve_in_vendor(&self, vendor: &Path, specifier: &str) -> Result<Option<PathBuf>> {
        // Split specifier into package name and subpath
        let (package_name, subpath) = if specifier.starts_with('@') {
            // Scoped package: @scope/name or @scope/name/subpath
            let parts: Vec<&str> = specifier.splitn(3, '/').collect();
            if parts.len() < 2 {
                return Ok(None);
            }
            let name = format!("{}/{}", parts[0], parts[1]);
            let sub = if parts.len() > 2 {
                Some(parts[2..].join("/"))
            } else {
                None
            };
            (name, sub)
        } else {
            let parts: Vec<&str> = specifier.splitn(2, '/').collect();
            (parts[0].to_string(), parts.get(1).map(|s| s.to_string()))
        };

        let package_dir = vendor.join(&package_name);
        if !package_dir.is_dir() {
            return Ok(None);
        }

        // Subpath imports resolve directly inside the package
        if let Some(sub) = subpath {
            return Ok(self.try_paths(&package_dir.join(sub)));
        }

        // Otherwise honor the package's declared entry point
        let package_json = package_dir.join("package.json");
        if package_json.is_file() {
            let content = fs::read_to_string(&package_json)
                .context("Failed to read package.json")?;
            let pkg: serde_json::Value = serde_json::from_str(&content)
                .context("Failed to parse package.json")?;

            // Prefer the ESM entry, fall back to main
            for field in ["module", "main"] {
                if let Some(entry) = pkg.get(field).and_then(|v| v.as_str()) {
                    if let Some(resolved) = self.try_paths(&package_dir.join(entry)) {
                        return Ok(Some(resolved));
                    }
                }
            }
        }

        Ok(self.try_paths(&package_dir.join("index")))
    }
}
