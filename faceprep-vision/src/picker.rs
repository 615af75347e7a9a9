use std::path::{Path, PathBuf};

use crate::error::{AlignError, Result};
use crate::landmarks::{LandmarkSet, Point2D};

/// In-progress landmark picking for a single image. Owned by whoever drives
/// the interaction; nothing carries over to the next image.
#[derive(Debug, Clone)]
pub struct LandmarkSession {
    image: PathBuf,
    expected: Option<usize>,
    points: Vec<Point2D>,
}

impl LandmarkSession {
    pub fn new(image: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            expected: None,
            points: Vec::new(),
        }
    }

    /// Requires exactly `count` points on commit.
    pub fn with_expected(mut self, count: usize) -> Self {
        self.expected = Some(count);
        self
    }

    pub fn image(&self) -> &Path {
        &self.image
    }

    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    pub fn add(&mut self, x: f64, y: f64) {
        self.points.push(Point2D::new(x, y));
    }

    pub fn undo(&mut self) -> Option<Point2D> {
        self.points.pop()
    }

    pub fn reset(&mut self) {
        self.points.clear();
    }

    /// Finishes the session. Returns `None` when nothing was picked.
    pub fn commit(self) -> Result<Option<LandmarkSet>> {
        if self.points.is_empty() {
            return Ok(None);
        }
        if let Some(expected) = self.expected {
            if expected != self.points.len() {
                return Err(AlignError::StructuralMismatch {
                    expected,
                    found: self.points.len(),
                    source_name: self.image.display().to_string(),
                });
            }
        }
        Ok(Some(LandmarkSet::new(self.points)))
    }
}
