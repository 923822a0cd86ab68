//! Static asset copying and optimization
//!
//! Copies configured source trees into the output root, filtering with
//! exclude globs. Recognized image formats can be recompressed through the
//! image codec; a failed recompression degrades to copying the original
//! unmodified and is reported as a warning, never a build failure.
//!
//! The copier shares no data with the graph pipeline and runs concurrently
//! with it; the two only meet in the output directory, on disjoint paths.

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::{Config, StaticCopy};
use crate::pipeline::emit::write_atomic;

/// Outcome counters for the asset stage
#[derive(Debug, Default, Clone, Copy)]
pub struct AssetStats {
    /// Files copied verbatim
    pub copied: usize,

    /// Images successfully recompressed
    pub optimized: usize,

    /// Non-fatal failures that fell back to a raw copy
    pub warnings: usize,
}

/// Image extensions eligible for recompression
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Static asset copier
pub struct AssetCopier {
    config: Arc<Config>,
}

impl AssetCopier {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Copy all configured static trees into the output root
    pub fn run(&self) -> Result<AssetStats> {
        let mut stats = AssetStats::default();

        for spec in &self.config.statics {
            self.copy_tree(spec, &mut stats)?;
        }

        debug!(
            "Static assets: {} copied, {} optimized, {} warnings",
            stats.copied, stats.optimized, stats.warnings
        );
        Ok(stats)
    }

    fn copy_tree(&self, spec: &StaticCopy, stats: &mut AssetStats) -> Result<()> {
        let src = self.config.root.join(&spec.from);
        if !src.is_dir() {
            warn!("Static source does not exist, skipping: {}", src.display());
            stats.warnings += 1;
            return Ok(());
        }

        let excludes = build_globset(&spec.exclude)?;
        let dest_base = match &spec.to {
            Some(to) if !to.is_empty() => self.config.output_dir().join(to),
            _ => self
                .config
                .output_dir()
                .join(&self.config.output.assets_subdir),
        };

        for dir_entry in WalkDir::new(&src).into_iter().filter_map(|e| e.ok()) {
            if !dir_entry.file_type().is_file() {
                continue;
            }
            let path = dir_entry.path();
            let rel = path
                .strip_prefix(&src)
                .expect("walked path is under source root");

            if excludes.is_match(rel) {
                debug!("Excluded from copy: {}", rel.display());
                continue;
            }

            let dest = dest_base.join(rel);

            if self.config.build.images.enabled && is_image(path) {
                match self.recompress_image(path, &dest) {
                    Ok(true) => stats.optimized += 1,
                    Ok(false) => stats.copied += 1,
                    Err(e) => {
                        warn!(
                            "Failed to recompress {}, copying original: {:#}",
                            rel.display(),
                            e
                        );
                        copy_atomic(path, &dest).with_context(|| {
                            format!("Failed to copy asset: {}", rel.display())
                        })?;
                        stats.warnings += 1;
                    }
                }
            } else {
                copy_atomic(path, &dest)
                    .with_context(|| format!("Failed to copy asset: {}", rel.display()))?;
                stats.copied += 1;
            }
        }

        Ok(())
    }

    /// Re-encode an image at the configured quality. Returns true when the
    /// re-encoded form was written, false when the original was kept because
    /// re-encoding did not shrink it.
    fn recompress_image(&self, src: &Path, dest: &Path) -> Result<bool> {
        let original = fs::read(src)?;
        let img = image::load_from_memory(&original).context("decode failed")?;

        let ext = src
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        let mut encoded = Vec::new();
        let mut cursor = Cursor::new(&mut encoded);
        match ext.as_str() {
            "jpg" | "jpeg" => {
                // Jpeg cannot carry an alpha channel
                let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
                rgb.write_to(
                    &mut cursor,
                    image::ImageOutputFormat::Jpeg(self.config.build.images.quality),
                )
                .context("jpeg encode failed")?;
            }
            "png" => {
                img.write_to(&mut cursor, image::ImageOutputFormat::Png)
                    .context("png encode failed")?;
            }
            _ => anyhow::bail!("unrecognized image extension: {}", ext),
        }

        if encoded.len() < original.len() {
            write_atomic(dest, &encoded)?;
            Ok(true)
        } else {
            write_atomic(dest, &original)?;
            Ok(false)
        }
    }
}

/// Copy through the temp-file-plus-rename path, so a cancelled build never
/// leaves a truncated asset under its final name
fn copy_atomic(src: &Path, dest: &Path) -> Result<()> {
    let bytes = fs::read(src)?;
    write_atomic(dest, &bytes)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern)
                .with_context(|| format!("Invalid exclude pattern: {}", pattern))?,
        );
    }
    builder.build().context("Failed to compile exclude patterns")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config_with_static(root: &Path, exclude: &[&str]) -> Arc<Config> {
        let mut config = Config::default_config(root.to_path_buf());
        config.statics.push(StaticCopy {
            from: "static".to_string(),
            to: None,
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
        });
        Arc::new(config)
    }

    #[test]
    fn test_copy_with_exclude_filter() {
        let tmp = tempfile::tempdir().unwrap();
        let static_dir = tmp.path().join("static");
        fs::create_dir_all(static_dir.join("imgs")).unwrap();
        fs::write(static_dir.join("robots.txt"), "User-agent: *\n").unwrap();
        fs::write(static_dir.join(".htpasswd"), "secret\n").unwrap();
        fs::write(static_dir.join("imgs/skip.txt"), "skip\n").unwrap();

        let config = config_with_static(tmp.path(), &[".*", "imgs/*.*"]);
        let stats = AssetCopier::new(config.clone()).run().unwrap();

        let out = config.output_dir().join("static");
        assert!(out.join("robots.txt").is_file());
        assert!(!out.join(".htpasswd").exists());
        assert!(!out.join("imgs/skip.txt").exists());
        assert_eq!(stats.copied, 1);
    }

    #[test]
    fn test_copy_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let static_dir = tmp.path().join("static");
        fs::create_dir_all(&static_dir).unwrap();
        fs::write(static_dir.join("a.txt"), "a").unwrap();
        fs::write(static_dir.join("b.txt"), "b").unwrap();

        let config = config_with_static(tmp.path(), &[]);
        AssetCopier::new(config.clone()).run().unwrap();

        let mut names: Vec<String> = fs::read_dir(config.output_dir().join("static"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_corrupt_image_falls_back_to_raw_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let static_dir = tmp.path().join("static");
        fs::create_dir_all(&static_dir).unwrap();
        fs::write(static_dir.join("broken.jpg"), b"not actually a jpeg").unwrap();

        let mut config = Config::default_config(tmp.path().to_path_buf());
        config.build.images.enabled = true;
        config.statics.push(StaticCopy {
            from: "static".to_string(),
            to: None,
            exclude: vec![],
        });
        let config = Arc::new(config);

        let stats = AssetCopier::new(config.clone()).run().unwrap();

        let dest = config.output_dir().join("static/broken.jpg");
        assert_eq!(fs::read(&dest).unwrap(), b"not actually a jpeg");
        assert_eq!(stats.warnings, 1);
        assert_eq!(stats.optimized, 0);
    }

    #[test]
    fn test_missing_source_is_warning_not_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_with_static(tmp.path(), &[]);

        let stats = AssetCopier::new(config).run().unwrap();
        assert_eq!(stats.warnings, 1);
        assert_eq!(stats.copied, 0);
    }

    #[test]
    fn test_custom_destination_subdir() {
        let tmp = tempfile::tempdir().unwrap();
        let static_dir = tmp.path().join("static");
        fs::create_dir_all(&static_dir).unwrap();
        fs::write(static_dir.join("a.txt"), "a").unwrap();

        let mut config = Config::default_config(tmp.path().to_path_buf());
        config.statics.push(StaticCopy {
            from: "static".to_string(),
            to: Some("public".to_string()),
            exclude: vec![],
        });
        let config = Arc::new(config);

        AssetCopier::new(config.clone()).run().unwrap();
        assert!(config.output_dir().join("public/a.txt").is_file());
        assert!(!PathBuf::from(config.output_dir().join("static/a.txt")).exists());
    }
}
