//! Soft "egg" aperture: wider at the top, narrower at the bottom, with a
//! Gaussian falloff outside the boundary.

use image::{Rgb, RgbImage};
use ndarray::Array2;

use crate::error::{AlignError, Result};
use crate::warp::to_u8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApertureParams {
    /// Relative change of the horizontal radius per unit of normalized height.
    pub shape_strength: f64,
    /// Gaussian standard deviation of the falloff, in normalized distance units.
    pub feather: f64,
    /// Inset of the ellipse from the canvas edge, in pixels.
    pub margin: f64,
    /// Gray level blended in where the mask is zero.
    pub background: u8,
}

impl Default for ApertureParams {
    fn default() -> Self {
        Self {
            shape_strength: 0.1,
            feather: 0.01,
            margin: 10.0,
            background: 127,
        }
    }
}

/// Elliptical distance field of the aperture for one canvas size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApertureShape {
    cx: f64,
    cy: f64,
    rx_base: f64,
    ry: f64,
    shape_strength: f64,
}

impl ApertureShape {
    pub fn new(width: u32, height: u32, params: &ApertureParams) -> Result<Self> {
        let rx_base = (width as f64 - params.margin) / 2.0;
        let ry = (height as f64 - params.margin) / 2.0;
        if rx_base <= 0.0 || ry <= 0.0 {
            return Err(AlignError::degenerate(format!(
                "aperture margin {} leaves no area on {width}x{height}",
                params.margin
            )));
        }
        Ok(Self {
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            rx_base,
            ry,
            shape_strength: params.shape_strength,
        })
    }

    /// Horizontal radius at row `y`, clamped to `[0.5, 1.5]` of the base radius.
    pub fn rx_at(&self, y: f64) -> f64 {
        let y_norm = (y - self.cy) / self.ry;
        let rx = self.rx_base * (1.0 - self.shape_strength * y_norm);
        rx.clamp(self.rx_base * 0.5, self.rx_base * 1.5)
    }

    /// Normalized distance from the centre; 1 on the aperture boundary.
    pub fn distance(&self, x: f64, y: f64) -> f64 {
        let dx = (x - self.cx) / self.rx_at(y);
        let dy = (y - self.cy) / self.ry;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Per-pixel blend weights in `[0, 1]`, indexed `[y, x]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApertureMask {
    weights: Array2<f32>,
    background: u8,
}

impl ApertureMask {
    pub fn new(width: u32, height: u32, params: &ApertureParams) -> Result<Self> {
        if params.feather.is_nan() || params.feather < 0.0 {
            return Err(AlignError::degenerate(format!(
                "aperture feather must be non-negative, got {}",
                params.feather
            )));
        }
        let shape = ApertureShape::new(width, height, params)?;
        let sigma = params.feather;
        let weights = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            let dist = shape.distance(x as f64, y as f64);
            if dist <= 1.0 {
                1.0
            } else if sigma == 0.0 {
                0.0
            } else {
                let edge = dist - 1.0;
                (-(edge * edge) / (2.0 * sigma * sigma)).exp() as f32
            }
        });
        Ok(Self {
            weights,
            background: params.background,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        let (h, w) = self.weights.dim();
        (w as u32, h as u32)
    }

    pub fn weight(&self, x: u32, y: u32) -> f32 {
        self.weights[[y as usize, x as usize]]
    }

    pub fn weights(&self) -> &Array2<f32> {
        &self.weights
    }

    pub fn background(&self) -> u8 {
        self.background
    }

    /// `img * mask + background * (1 - mask)`, in place.
    pub fn apply(&self, img: &mut RgbImage) -> Result<()> {
        if img.dimensions() != self.size() {
            let (w, h) = self.size();
            return Err(AlignError::degenerate(format!(
                "mask is {w}x{h} but image is {}x{}",
                img.width(),
                img.height()
            )));
        }
        let bg = self.background as f64;
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let m = self.weight(x, y) as f64;
            let Rgb(c) = *pixel;
            *pixel = Rgb(c.map(|v| to_u8(v as f64 * m + bg * (1.0 - m))));
        }
        Ok(())
    }
}
