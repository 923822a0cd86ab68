//! pagepack - multi-page static-asset build pipeline
//!
//! Discovers page entries from a conventional source tree, builds one shared
//! module graph, splits it into cacheable chunks under rule-based precedence,
//! emits content-hashed artifacts, and renders one HTML document per page.
//!
//! # Features
//! - Rule-based chunk partitioning (shared, per-group vendor, entry chunks)
//! - Deterministic content hashing for cache busting
//! - Atomic artifact writes, gzip precompression
//! - Static asset copying with optional image recompression

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod assets;
mod cli;
mod config;
mod entry;
mod error;
mod pipeline;
mod resolver;
mod utils;

pub use cli::Cli;
pub use config::Config;
pub use pipeline::Pipeline;

/// Initialize the logging/tracing system
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("pagepack=debug"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("pagepack=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    cli.execute().await
}
