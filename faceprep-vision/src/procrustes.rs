//! Least-squares similarity fit (orthogonal Procrustes with scale).

use nalgebra::{Matrix2, Matrix2x3, Rotation2, Vector2};

use crate::canonical::RescaledTemplate;
use crate::error::{AlignError, Result};
use crate::landmarks::{LandmarkSet, Point2D};

const MIN_SPREAD: f64 = 1e-12;

/// `p -> scale * rotation * p + translation`, with `rotation` a proper rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTransform {
    scale: f64,
    rotation: Matrix2<f64>,
    translation: Vector2<f64>,
}

impl SimilarityTransform {
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            rotation: Matrix2::identity(),
            translation: Vector2::zeros(),
        }
    }

    pub fn new(angle: f64, scale: f64, translation: Vector2<f64>) -> Self {
        Self {
            scale,
            rotation: *Rotation2::new(angle).matrix(),
            translation,
        }
    }

    /// Fits the transform mapping `source` onto `template`.
    pub fn fit(source: &LandmarkSet, template: &RescaledTemplate) -> Result<Self> {
        estimate(source, template.points())
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn rotation(&self) -> &Matrix2<f64> {
        &self.rotation
    }

    /// Rotation angle in radians, in `(-pi, pi]`.
    pub fn angle(&self) -> f64 {
        self.rotation[(1, 0)].atan2(self.rotation[(0, 0)])
    }

    pub fn translation(&self) -> &Vector2<f64> {
        &self.translation
    }

    /// The 2x3 affine matrix `[s*R | t]`.
    pub fn matrix(&self) -> Matrix2x3<f64> {
        let sr = self.rotation * self.scale;
        Matrix2x3::new(
            sr[(0, 0)],
            sr[(0, 1)],
            self.translation.x,
            sr[(1, 0)],
            sr[(1, 1)],
            self.translation.y,
        )
    }

    pub fn apply(&self, p: &Point2D) -> Point2D {
        Point2D::from(self.rotation * p.coords * self.scale + self.translation)
    }

    pub fn apply_set(&self, set: &LandmarkSet) -> LandmarkSet {
        set.map(|p| self.apply(p))
    }

    /// Maps an output point back into source coordinates.
    pub fn invert(&self, p: &Point2D) -> Point2D {
        Point2D::from(self.rotation.transpose() * (p.coords - self.translation) / self.scale)
    }

    /// Root-mean-square distance between the transformed `source` and `target`.
    pub fn rms_error(&self, source: &LandmarkSet, target: &LandmarkSet) -> f64 {
        let n = source.len().min(target.len());
        if n == 0 {
            return 0.0;
        }
        let sum: f64 = source
            .points()
            .iter()
            .zip(target.points())
            .map(|(s, t)| (self.apply(s) - *t).norm_squared())
            .sum();
        (sum / n as f64).sqrt()
    }
}

/// Solves for the similarity transform minimizing the squared distance between
/// transformed `source` points and `target` points.
///
/// A reflection is never returned: if the unconstrained optimum is improper the
/// axis of the smallest singular value is flipped, accepting a larger residual.
pub fn estimate(source: &LandmarkSet, target: &LandmarkSet) -> Result<SimilarityTransform> {
    if source.len() != target.len() {
        return Err(AlignError::StructuralMismatch {
            expected: target.len(),
            found: source.len(),
            source_name: "source landmarks".to_string(),
        });
    }

    let src_mean = source.centroid();
    let dst_mean = target.centroid();

    let mut h = Matrix2::zeros();
    let mut spread = 0.0;
    for (s, d) in source.points().iter().zip(target.points()) {
        let sc = *s - src_mean;
        let dc = *d - dst_mean;
        h += sc * dc.transpose();
        spread += sc.norm_squared();
    }
    if spread < MIN_SPREAD {
        return Err(AlignError::degenerate(format!(
            "source landmarks have no spread ({spread:e})"
        )));
    }

    let svd = h.svd(true, true);
    let (u, mut v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(AlignError::degenerate("SVD did not converge")),
    };

    let mut rotation = v_t.transpose() * u.transpose();
    if rotation.determinant() < 0.0 {
        // Singular values are sorted in descending order, so the last row of
        // V^T belongs to the smallest one.
        v_t.row_mut(1).neg_mut();
        rotation = v_t.transpose() * u.transpose();
    }

    let scale = (rotation * h).trace() / spread;
    if scale < MIN_SPREAD {
        return Err(AlignError::degenerate(format!(
            "target landmarks have no spread (scale {scale:e})"
        )));
    }
    let translation = dst_mean.coords - rotation * src_mean.coords * scale;

    let transform = SimilarityTransform {
        scale,
        rotation,
        translation,
    };
    log::debug!(
        "similarity fit: scale={:.5} angle={:.3}deg t=({:.2}, {:.2}) rms={:.4}",
        scale,
        transform.angle().to_degrees(),
        translation.x,
        translation.y,
        transform.rms_error(source, target)
    );
    Ok(transform)
}
