//! Build error taxonomy
//!
//! Structural errors (graph, partitioning) abort the whole run; page-level
//! errors are collected per entry so one broken page does not block the rest.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the build pipeline
#[derive(Debug, Error)]
pub enum BuildError {
    /// An import specifier could not be mapped to an existing file.
    /// Fatal: a broken graph cannot be partitioned safely.
    #[error("cannot resolve import '{specifier}' from {}", importer.display())]
    UnresolvedImport {
        specifier: String,
        importer: PathBuf,
    },

    /// A module is reached by multiple entries but no chunk rule claims it.
    /// Fatal: silently duplicating the module into every entry chunk would
    /// bloat the output.
    #[error(
        "module {} is reached by entries [{}] but no chunk rule claims it",
        module.display(),
        candidates.join(", ")
    )]
    AmbiguousChunk {
        module: PathBuf,
        candidates: Vec<String>,
    },

    /// An entry's HTML template is missing. Per-entry: sibling pages still
    /// build, the failure is reported in the final summary.
    #[error("template for page '{entry}' not found at {}", path.display())]
    TemplateNotFound { entry: String, path: PathBuf },
}

impl BuildError {
    /// Whether this error must abort the whole build
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BuildError::TemplateNotFound { .. })
    }
}
