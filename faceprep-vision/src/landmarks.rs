use std::fmt::Write as _;
use std::path::Path;

use nalgebra::{Point2, Vector2};

use crate::error::{AlignError, Result};

pub type Point2D = Point2<f64>;

/// Ordered landmark points of one face. Index `i` denotes the same anatomical
/// feature across a population (e.g. 0 = left pupil, 1 = right pupil, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point2D>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    pub fn from_xy(coords: &[[f64; 2]]) -> Self {
        Self::new(coords.iter().map(|&[x, y]| Point2D::new(x, y)).collect())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    pub fn to_xy(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(|p| [p.x, p.y]).collect()
    }

    pub fn centroid(&self) -> Point2D {
        let n = self.points.len().max(1) as f64;
        let sum = self
            .points
            .iter()
            .fold(Vector2::zeros(), |acc, p| acc + p.coords);
        Point2D::from(sum / n)
    }

    /// Returns the points at `left` and `right`, failing if either index is out of range.
    pub fn reference_pair(&self, left: usize, right: usize) -> Result<(Point2D, Point2D)> {
        for index in [left, right] {
            if index >= self.points.len() {
                return Err(AlignError::ReferenceIndex {
                    index,
                    len: self.points.len(),
                });
            }
        }
        Ok((self.points[left], self.points[right]))
    }

    pub fn map(&self, f: impl Fn(&Point2D) -> Point2D) -> Self {
        Self::new(self.points.iter().map(f).collect())
    }

    /// Parses the text encoding: one `x y` pair per line. Blank lines and `#`
    /// comments are skipped. `path` is only used for error reporting.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut points = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let malformed = |reason: String| AlignError::MalformedLandmarks {
                path: path.to_path_buf(),
                line: i + 1,
                reason,
            };
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 2 {
                return Err(malformed(format!("expected 2 values, got {}", fields.len())));
            }
            let mut xy = [0.0f64; 2];
            for (slot, field) in xy.iter_mut().zip(&fields) {
                let v: f64 = field
                    .parse()
                    .map_err(|_| malformed(format!("not a number: {field:?}")))?;
                if !v.is_finite() {
                    return Err(malformed(format!("non-finite value: {field}")));
                }
                *slot = v;
            }
            points.push(Point2D::new(xy[0], xy[1]));
        }
        Ok(Self::new(points))
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for p in &self.points {
            // Writing to a String cannot fail.
            let _ = writeln!(out, "{} {}", p.x, p.y);
        }
        out
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| AlignError::missing(path, e))?;
        Self::parse(&text, path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_text())?;
        Ok(())
    }
}
