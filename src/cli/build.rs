//! Build command implementation

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::config::Config;
use crate::pipeline::{BuildReport, Pipeline};
use crate::utils;

/// Build all pages for production
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Output directory (overrides the configured one)
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Write report.json with the per-chunk size breakdown
    #[arg(long)]
    pub analyze: bool,

    /// Emit .gz siblings for large artifacts
    #[arg(long)]
    pub gzip: bool,
}

impl BuildCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        let start = Instant::now();

        info!("Loading configuration from {}", config_path);
        let mut config = Config::load(config_path)?;
        self.apply_overrides(&mut config);

        eprintln!("{} Building pages...", "→".blue());

        let pipeline = Pipeline::new(config);
        let report = pipeline.build().await?;

        print_summary(&report, start.elapsed());

        if report.has_failures() {
            anyhow::bail!("{} page(s) failed to build", report.pages_failed.len());
        }
        Ok(())
    }

    /// CLI toggles overlay the configuration file
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(outdir) = &self.outdir {
            config.output.dir = outdir.display().to_string();
        }
        if self.analyze {
            config.build.analyze = true;
        }
        if self.gzip {
            config.build.gzip.enabled = true;
        }
    }
}

fn print_summary(report: &BuildReport, duration: std::time::Duration) {
    eprintln!(
        "\n{} Built {} page(s), {} artifact(s) from {} modules in {}\n",
        "✓".green().bold(),
        report.pages_ok.len(),
        report.artifacts.len(),
        report.module_count,
        utils::format_duration(duration)
    );

    for artifact in &report.artifacts {
        eprintln!(
            "  {} {} {}",
            "•".dimmed(),
            artifact.rel.cyan(),
            utils::format_size(artifact.size).dimmed()
        );
    }

    if report.assets.copied + report.assets.optimized > 0 {
        eprintln!(
            "  {} {} static asset(s) copied, {} optimized",
            "•".dimmed(),
            report.assets.copied,
            report.assets.optimized
        );
    }

    for page in &report.pages_ok {
        eprintln!("  {} {}", "✓".green(), page);
    }
    for (page, reason) in &report.pages_failed {
        eprintln!("  {} {} {}", "✗".red().bold(), page, reason.dimmed());
    }

    eprintln!();
}
