use nalgebra::Rotation2;

use crate::error::{AlignError, Result};
use crate::landmarks::{LandmarkSet, Point2D};

/// Minimum reference-pair distance accepted as non-degenerate.
pub const MIN_REFERENCE_DISTANCE: f64 = 1e-6;

/// Indices of the two landmarks (conventionally the pupils) that fix rotation and scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferencePair {
    pub left: usize,
    pub right: usize,
}

impl ReferencePair {
    pub fn new(left: usize, right: usize) -> Self {
        Self { left, right }
    }

    /// Distance between the pair in `set`.
    pub fn distance(&self, set: &LandmarkSet) -> Result<f64> {
        let (l, r) = set.reference_pair(self.left, self.right)?;
        Ok((r - l).norm())
    }

    pub fn midpoint(&self, set: &LandmarkSet) -> Result<Point2D> {
        let (l, r) = set.reference_pair(self.left, self.right)?;
        Ok(nalgebra::center(&l, &r))
    }
}

impl Default for ReferencePair {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

/// A landmark set with centroid at the origin, the reference vector pointing
/// along +x and a reference distance of exactly 1.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLandmarkSet(LandmarkSet);

impl NormalizedLandmarkSet {
    pub fn as_set(&self) -> &LandmarkSet {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Maps `set` into the translation/rotation/scale invariant frame defined by `reference`.
pub fn normalize(set: &LandmarkSet, reference: ReferencePair) -> Result<NormalizedLandmarkSet> {
    let (left, right) = set.reference_pair(reference.left, reference.right)?;

    // Centering does not change the reference vector.
    let centroid = set.centroid();
    let eye = right - left;
    let dist = eye.norm();
    if dist < MIN_REFERENCE_DISTANCE {
        return Err(AlignError::degenerate(format!(
            "reference pair {}/{} distance {dist:e} below {MIN_REFERENCE_DISTANCE:e}",
            reference.left, reference.right
        )));
    }

    let unrotate = Rotation2::new(-eye.y.atan2(eye.x));
    Ok(NormalizedLandmarkSet(set.map(|p| {
        Point2D::from(unrotate * (*p - centroid) / dist)
    })))
}
