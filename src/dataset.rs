//! Discovery of landmark/image pairs on disk.

use anyhow::{Context, Result};
use faceprep_vision::{AlignError, FaceItem, LandmarkSet};
use log::warn;
use std::path::{Path, PathBuf};

use crate::config::PathsConfig;

#[derive(Debug, Default)]
pub struct Discovery {
    pub items: Vec<FaceItem>,
    /// Faces whose landmark file or source image could not be used.
    pub skipped: Vec<(String, AlignError)>,
}

/// Strips `<suffix>.txt` from a landmark file name, returning the image stem.
pub fn landmark_stem<'a>(file_name: &'a str, suffix: &str) -> Option<&'a str> {
    file_name
        .strip_suffix(".txt")
        .and_then(|s| s.strip_suffix(suffix))
        .filter(|s| !s.is_empty())
}

pub fn landmark_path(paths: &PathsConfig, stem: &str) -> PathBuf {
    paths
        .landmark_dir
        .join(format!("{stem}{}.txt", paths.landmark_suffix))
}

pub fn output_path(paths: &PathsConfig, stem: &str) -> PathBuf {
    paths
        .output_dir
        .join(format!("{stem}{}.png", paths.output_suffix))
}

/// First existing `<image_dir>/<stem>.<ext>` over the configured extensions.
pub fn find_image(paths: &PathsConfig, stem: &str) -> Option<PathBuf> {
    paths
        .image_extensions
        .iter()
        .flat_map(|ext| [ext.to_lowercase(), ext.to_uppercase()])
        .map(|ext| paths.image_dir.join(format!("{stem}.{ext}")))
        .find(|p| p.is_file())
}

/// Pairs every landmark file with its source image, sorted by name.
pub fn discover(paths: &PathsConfig) -> Result<Discovery> {
    let mut names: Vec<String> = std::fs::read_dir(&paths.landmark_dir)
        .with_context(|| format!("listing {}", paths.landmark_dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| landmark_stem(name, &paths.landmark_suffix).is_some())
        .collect();
    names.sort();

    let mut found = Discovery::default();
    for name in names {
        let Some(stem) = landmark_stem(&name, &paths.landmark_suffix) else {
            continue;
        };
        let lm_path = paths.landmark_dir.join(&name);
        match load_item(paths, stem, &lm_path) {
            Ok(item) => found.items.push(item),
            Err(e) => {
                warn!("{}: skipped: {}", stem, e);
                found.skipped.push((stem.to_string(), e));
            }
        }
    }
    Ok(found)
}

fn load_item(paths: &PathsConfig, stem: &str, lm_path: &Path) -> faceprep_vision::Result<FaceItem> {
    let landmarks = LandmarkSet::load(lm_path)?;
    let image_path = find_image(paths, stem).ok_or_else(|| {
        AlignError::missing(
            paths.image_dir.join(stem),
            format!("no image with extension {:?}", paths.image_extensions),
        )
    })?;
    Ok(FaceItem {
        name: stem.to_string(),
        image_path,
        landmarks,
    })
}
