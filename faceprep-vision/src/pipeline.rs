use std::path::{Path, PathBuf};

use image::RgbImage;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::aperture::ApertureMask;
use crate::canonical::{CanonicalTemplate, RescaledTemplate};
use crate::composite::Compositor;
use crate::error::{AlignError, Result};
use crate::landmarks::LandmarkSet;
use crate::normalize::{normalize, ReferencePair};
use crate::procrustes::SimilarityTransform;
use crate::warp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    #[default]
    Rgb,
    Grayscale,
}

/// Decodes `path` into 8-bit RGB, converting to luminance first for grayscale.
pub fn load_image(path: &Path, color: ColorMode) -> Result<RgbImage> {
    let img = image::open(path).map_err(|e| AlignError::missing(path, e))?;
    Ok(match color {
        ColorMode::Rgb => img.to_rgb8(),
        ColorMode::Grayscale => img.grayscale().to_rgb8(),
    })
}

/// One face of the population: its source image and picked landmarks.
#[derive(Debug, Clone)]
pub struct FaceItem {
    pub name: String,
    pub image_path: PathBuf,
    pub landmarks: LandmarkSet,
}

/// A per-image failure that did not abort the batch.
#[derive(Debug)]
pub struct Failure {
    pub name: String,
    pub error: AlignError,
}

/// Result of phase 1: the canonical template and the faces that contributed to it.
#[derive(Debug)]
pub struct Population {
    pub template: CanonicalTemplate,
    pub members: Vec<FaceItem>,
    pub skipped: Vec<Failure>,
}

impl Population {
    /// Normalizes every face and averages them. Faces with degenerate reference
    /// geometry are skipped; a landmark count mismatch aborts.
    pub fn build(mut items: Vec<FaceItem>, reference: ReferencePair) -> Result<Self> {
        items.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(first) = items.first() {
            let expected = first.landmarks.len();
            if let Some(bad) = items.iter().find(|i| i.landmarks.len() != expected) {
                return Err(AlignError::StructuralMismatch {
                    expected,
                    found: bad.landmarks.len(),
                    source_name: bad.name.clone(),
                });
            }
        }

        let mut members = Vec::with_capacity(items.len());
        let mut normalized = Vec::with_capacity(items.len());
        let mut skipped = Vec::new();
        for item in items {
            match normalize(&item.landmarks, reference) {
                Ok(n) => {
                    normalized.push(n);
                    members.push(item);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("{}: skipped from population: {}", item.name, e);
                    skipped.push(Failure {
                        name: item.name,
                        error: e,
                    });
                }
            }
        }

        let template = CanonicalTemplate::build(
            members
                .iter()
                .map(|m| m.name.as_str())
                .zip(normalized.iter()),
            reference,
        )?;
        info!(
            "canonical template built from {} faces ({} skipped)",
            members.len(),
            skipped.len()
        );
        Ok(Self {
            template,
            members,
            skipped,
        })
    }

    /// Uses an existing template instead of averaging `items`. Every face must
    /// match the template's landmark count.
    pub fn with_template(mut items: Vec<FaceItem>, template: CanonicalTemplate) -> Result<Self> {
        items.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(bad) = items.iter().find(|i| i.landmarks.len() != template.len()) {
            return Err(AlignError::StructuralMismatch {
                expected: template.len(),
                found: bad.landmarks.len(),
                source_name: bad.name.clone(),
            });
        }
        info!("reusing canonical template for {} faces", items.len());
        Ok(Self {
            template,
            members: items,
            skipped: Vec::new(),
        })
    }
}

/// An aligned face ready to be written.
#[derive(Debug, Clone)]
pub struct AlignedFace {
    pub transform: SimilarityTransform,
    pub image: RgbImage,
}

/// Phase 2 state shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct Aligner {
    template: RescaledTemplate,
    mask: Option<ApertureMask>,
    compositor: Option<Compositor>,
    color: ColorMode,
}

impl Aligner {
    pub fn new(template: RescaledTemplate) -> Self {
        Self {
            template,
            mask: None,
            compositor: None,
            color: ColorMode::Rgb,
        }
    }

    pub fn with_mask(mut self, mask: ApertureMask) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_compositor(mut self, compositor: Compositor) -> Self {
        self.compositor = Some(compositor);
        self
    }

    pub fn with_color(mut self, color: ColorMode) -> Self {
        self.color = color;
        self
    }

    pub fn template(&self) -> &RescaledTemplate {
        &self.template
    }

    pub fn color(&self) -> ColorMode {
        self.color
    }

    /// Solver, warper, aperture and compositor for one image.
    pub fn align(&self, img: &RgbImage, landmarks: &LandmarkSet) -> Result<AlignedFace> {
        let transform = SimilarityTransform::fit(landmarks, &self.template)?;
        let (w, h) = self.template.size();
        let mut aligned = warp::warp_image(img, &transform, w, h)?;
        if let Some(mask) = &self.mask {
            mask.apply(&mut aligned)?;
        }
        let image = match &self.compositor {
            Some(c) => c.composite(&aligned)?,
            None => aligned,
        };
        Ok(AlignedFace { transform, image })
    }

    fn process<F>(&self, item: &FaceItem, sink: &F) -> Result<PathBuf>
    where
        F: Fn(&FaceItem, &AlignedFace) -> Result<PathBuf>,
    {
        let img = load_image(&item.image_path, self.color)?;
        let face = self.align(&img, &item.landmarks)?;
        debug!(
            "{}: scale={:.4} angle={:.2}deg",
            item.name,
            face.transform.scale(),
            face.transform.angle().to_degrees()
        );
        sink(item, &face)
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<(String, PathBuf)>,
    pub failed: Vec<Failure>,
}

impl BatchReport {
    /// Failures writing output, as opposed to per-image input problems.
    pub fn write_failures(&self) -> impl Iterator<Item = &Failure> {
        self.failed
            .iter()
            .filter(|f| matches!(f.error, AlignError::Io(_) | AlignError::Image(_)))
    }
}

/// Aligns every item on the current rayon pool. Each item succeeds or fails on
/// its own; `sink` persists the result and returns where it was written.
pub fn run_batch<F>(aligner: &Aligner, items: &[FaceItem], sink: F) -> BatchReport
where
    F: Fn(&FaceItem, &AlignedFace) -> Result<PathBuf> + Sync,
{
    let results: Vec<(String, Result<PathBuf>)> = items
        .par_iter()
        .map(|item| (item.name.clone(), aligner.process(item, &sink)))
        .collect();

    let mut report = BatchReport::default();
    for (name, result) in results {
        match result {
            Ok(path) => {
                info!("{}: aligned -> {}", name, path.display());
                report.written.push((name, path));
            }
            Err(error) => {
                warn!("{}: {}", name, error);
                report.failed.push(Failure { name, error });
            }
        }
    }
    info!(
        "batch finished: {} aligned, {} failed",
        report.written.len(),
        report.failed.len()
    );
    report
}
