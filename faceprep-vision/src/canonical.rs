//! Population-level landmark templates.
//!
//! [`CanonicalTemplate::build`] averages normalized landmark sets into a
//! shape-only template; [`CanonicalTemplate::rescale`] places that shape on a
//! concrete output canvas.

use nalgebra::Vector2;

use crate::error::{AlignError, Result};
use crate::landmarks::{LandmarkSet, Point2D};
use crate::normalize::{NormalizedLandmarkSet, ReferencePair};

/// Mean of a population's normalized landmark sets.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTemplate {
    points: LandmarkSet,
    reference: ReferencePair,
}

/// Canonical template mapped into output-canvas pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct RescaledTemplate {
    points: LandmarkSet,
    width: u32,
    height: u32,
}

/// Placement of the canonical template on the output canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasGeometry {
    pub width: u32,
    pub height: u32,
    /// Desired reference-pair distance in pixels.
    pub eye_distance: f64,
    /// Fraction of canvas height where the reference-pair midpoint lands.
    pub eye_y_ratio: f64,
}

impl Default for CanvasGeometry {
    fn default() -> Self {
        Self {
            width: 562,
            height: 762,
            eye_distance: 120.0,
            eye_y_ratio: 0.5,
        }
    }
}

impl CanonicalTemplate {
    /// Coordinate-wise mean of `sets`; the names identify the offending entry
    /// on a count mismatch.
    pub fn build<'a, I>(sets: I, reference: ReferencePair) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a NormalizedLandmarkSet)>,
    {
        // Running mean: identical inputs reproduce themselves bit for bit.
        let mut mean: Vec<Vector2<f64>> = Vec::new();
        let mut count = 0usize;
        for (name, set) in sets {
            if count == 0 {
                mean = vec![Vector2::zeros(); set.len()];
            } else if set.len() != mean.len() {
                return Err(AlignError::StructuralMismatch {
                    expected: mean.len(),
                    found: set.len(),
                    source_name: name.to_string(),
                });
            }
            count += 1;
            let k = count as f64;
            for (acc, p) in mean.iter_mut().zip(set.as_set().points()) {
                *acc += (p.coords - *acc) / k;
            }
        }
        if count == 0 {
            return Err(AlignError::EmptyPopulation);
        }
        let points = LandmarkSet::new(mean.into_iter().map(Point2D::from).collect());
        // Validates the reference indices against the template length.
        points.reference_pair(reference.left, reference.right)?;
        log::debug!("canonical template from {count} landmark sets: {:?}", points.to_xy());
        Ok(Self { points, reference })
    }

    /// Rebuilds a template from stored points, e.g. one persisted by an earlier run.
    pub fn from_points(points: LandmarkSet, reference: ReferencePair) -> Result<Self> {
        points.reference_pair(reference.left, reference.right)?;
        Ok(Self { points, reference })
    }

    pub fn points(&self) -> &LandmarkSet {
        &self.points
    }

    pub fn reference(&self) -> ReferencePair {
        self.reference
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Scales the template so the reference pair is `eye_distance` apart and
    /// moves its midpoint to `(width / 2, height * eye_y_ratio)`.
    pub fn rescale(&self, geometry: &CanvasGeometry) -> Result<RescaledTemplate> {
        let current = self.reference.distance(&self.points)?;
        if current < crate::normalize::MIN_REFERENCE_DISTANCE {
            return Err(AlignError::degenerate(format!(
                "canonical reference distance {current:e}"
            )));
        }
        let scale = geometry.eye_distance / current;
        let scaled = self.points.map(|p| *p * scale);

        let mid = self.reference.midpoint(&scaled)?;
        let target = Point2D::new(
            geometry.width as f64 / 2.0,
            geometry.height as f64 * geometry.eye_y_ratio,
        );
        let shift = target - mid;
        Ok(RescaledTemplate {
            points: scaled.map(|p| *p + shift),
            width: geometry.width,
            height: geometry.height,
        })
    }
}

impl RescaledTemplate {
    pub fn points(&self) -> &LandmarkSet {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn normalized(coords: &[[f64; 2]]) -> NormalizedLandmarkSet {
        normalize(&LandmarkSet::from_xy(coords), ReferencePair::default()).unwrap()
    }

    const FACE: [[f64; 2]; 6] = [
        [100.0, 100.0],
        [160.0, 100.0],
        [130.0, 140.0],
        [108.0, 170.0],
        [130.0, 174.0],
        [152.0, 170.0],
    ];

    #[test]
    fn test_mean_of_copies_is_identity() {
        let one = normalized(&FACE);
        for n in 1..=5 {
            let copies = vec![one.clone(); n];
            let t = CanonicalTemplate::build(
                copies.iter().map(|s| ("face", s)),
                ReferencePair::default(),
            )
            .unwrap();
            assert_eq!(t.points(), one.as_set());
        }
    }

    #[test]
    fn test_mean_is_coordinatewise() {
        let a = normalized(&[[0.0, 0.0], [1.0, 0.0], [0.5, 1.0]]);
        let b = normalized(&[[0.0, 0.0], [1.0, 0.0], [0.5, 2.0]]);
        let t = CanonicalTemplate::build([("a", &a), ("b", &b)], ReferencePair::default()).unwrap();
        for i in 0..3 {
            let expected = (a.as_set().points()[i].coords + b.as_set().points()[i].coords) / 2.0;
            assert!((t.points().points()[i].coords - expected).norm() < 1e-12);
        }
    }

    #[test]
    fn test_count_mismatch_is_structural() {
        let a = normalized(&FACE);
        let b = normalized(&FACE[..5]);
        let err = CanonicalTemplate::build([("a", &a), ("b", &b)], ReferencePair::default())
            .unwrap_err();
        match err {
            AlignError::StructuralMismatch {
                expected,
                found,
                source_name,
            } => {
                assert_eq!((expected, found), (6, 5));
                assert_eq!(source_name, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_population() {
        let none: Vec<(&str, &NormalizedLandmarkSet)> = Vec::new();
        assert!(matches!(
            CanonicalTemplate::build(none, ReferencePair::default()),
            Err(AlignError::EmptyPopulation)
        ));
    }

    #[test]
    fn test_rescale_places_reference_pair() {
        let one = normalized(&FACE);
        let t = CanonicalTemplate::build([("face", &one)], ReferencePair::default()).unwrap();
        let geometry = CanvasGeometry::default();
        let r = t.rescale(&geometry).unwrap();
        let (l, rr) = r.points().reference_pair(0, 1).unwrap();
        assert!(((rr - l).norm() - 120.0).abs() < 1e-9);
        let mid = nalgebra::center(&l, &rr);
        assert!((mid.x - 281.0).abs() < 1e-9);
        assert!((mid.y - 381.0).abs() < 1e-9);
        assert_eq!(r.size(), (562, 762));
    }
}
