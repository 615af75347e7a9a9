use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::error::{AlignError, Result};
use crate::warp::to_u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeFilter {
    /// Pixel-area averaging; falls back to triangle when enlarging.
    #[default]
    Area,
    Triangle,
    Lanczos3,
}

/// Resizes the aligned face to its presentation size and pastes it onto a
/// flat canvas, centred horizontally with its top edge at `top_ratio` of the
/// canvas height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compositor {
    pub presentation: (u32, u32),
    pub canvas: (u32, u32),
    pub top_ratio: f64,
    pub background: u8,
    pub filter: ResizeFilter,
}

impl Default for Compositor {
    fn default() -> Self {
        Self {
            presentation: (369, 512),
            canvas: (512, 512),
            top_ratio: 0.0,
            background: 127,
            filter: ResizeFilter::Area,
        }
    }
}

impl Compositor {
    /// Top-left corner of the presentation region on the canvas.
    pub fn offset(&self) -> Result<(u32, u32)> {
        let (pw, ph) = self.presentation;
        let (cw, ch) = self.canvas;
        if pw == 0 || ph == 0 || pw > cw || ph > ch {
            return Err(AlignError::degenerate(format!(
                "presentation {pw}x{ph} does not fit canvas {cw}x{ch}"
            )));
        }
        let x = (cw - pw) / 2;
        // Keep the region on the canvas when the anchor pushes it past the bottom.
        let y = ((ch as f64 * self.top_ratio) as u32).min(ch - ph);
        Ok((x, y))
    }

    pub fn composite(&self, img: &RgbImage) -> Result<RgbImage> {
        let (x, y) = self.offset()?;
        let (pw, ph) = self.presentation;
        let resized = resize(img, pw, ph, self.filter);
        let bg = self.background;
        let mut canvas = RgbImage::from_pixel(self.canvas.0, self.canvas.1, Rgb([bg, bg, bg]));
        imageops::replace(&mut canvas, &resized, x as i64, y as i64);
        Ok(canvas)
    }
}

pub fn resize(img: &RgbImage, width: u32, height: u32, filter: ResizeFilter) -> RgbImage {
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    match filter {
        ResizeFilter::Area if width <= img.width() && height <= img.height() => {
            resize_area(img, width, height)
        }
        ResizeFilter::Area | ResizeFilter::Triangle => {
            imageops::resize(img, width, height, FilterType::Triangle)
        }
        ResizeFilter::Lanczos3 => imageops::resize(img, width, height, FilterType::Lanczos3),
    }
}

/// Source pixel indices and coverage weights for each output index along one axis.
fn area_weights(src: u32, dst: u32) -> Vec<Vec<(u32, f64)>> {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|o| {
            let start = o as f64 * scale;
            let end = ((o + 1) as f64 * scale).min(src as f64);
            let first = start.floor() as u32;
            let last = (end.ceil() as u32).min(src);
            (first..last)
                .filter_map(|i| {
                    let cover = end.min(i as f64 + 1.0) - start.max(i as f64);
                    (cover > 1e-12).then_some((i, cover / scale))
                })
                .collect()
        })
        .collect()
}

/// Downsamples by averaging every source pixel weighted by the fraction of
/// its area that falls inside the output pixel.
pub fn resize_area(img: &RgbImage, width: u32, height: u32) -> RgbImage {
    let xw = area_weights(img.width(), width);
    let yw = area_weights(img.height(), height);
    RgbImage::from_fn(width, height, |x, y| {
        let mut acc = [0.0f64; 3];
        for &(sy, wy) in &yw[y as usize] {
            for &(sx, wx) in &xw[x as usize] {
                let p = img.get_pixel(sx, sy);
                let w = wx * wy;
                for c in 0..3 {
                    acc[c] += p[c] as f64 * w;
                }
            }
        }
        Rgb(acc.map(to_u8))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_halving_averages_blocks() {
        let img = RgbImage::from_fn(4, 2, |x, _| {
            if x % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([200, 100, 50])
            }
        });
        let out = resize_area(&img, 2, 1);
        assert_eq!(out.dimensions(), (2, 1));
        assert!(out.pixels().all(|p| *p == Rgb([100, 50, 25])));
    }

    #[test]
    fn test_area_weights_fractional() {
        let w = area_weights(3, 2);
        let total: f64 = w[0].iter().map(|&(_, c)| c).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert_eq!(w[0].len(), 2);
        assert_eq!(w[1].len(), 2);
    }

    #[test]
    fn test_composite_places_region() {
        let compositor = Compositor {
            presentation: (4, 6),
            canvas: (10, 20),
            top_ratio: 0.25,
            background: 127,
            filter: ResizeFilter::Area,
        };
        let img = RgbImage::from_pixel(8, 12, Rgb([10, 20, 30]));
        let out = compositor.composite(&img).unwrap();
        assert_eq!(out.dimensions(), (10, 20));
        assert_eq!(compositor.offset().unwrap(), (3, 5));
        for (x, y, p) in out.enumerate_pixels() {
            let inside = (3..7).contains(&x) && (5..11).contains(&y);
            let expected = if inside { Rgb([10, 20, 30]) } else { Rgb([127, 127, 127]) };
            assert_eq!(*p, expected, "({x}, {y})");
        }
    }

    #[test]
    fn test_anchor_clamped_to_canvas() {
        let compositor = Compositor {
            presentation: (275, 330),
            canvas: (512, 512),
            top_ratio: 0.75,
            ..Compositor::default()
        };
        assert_eq!(compositor.offset().unwrap(), (118, 182));
    }

    #[test]
    fn test_oversized_presentation_rejected() {
        let compositor = Compositor {
            presentation: (600, 100),
            ..Compositor::default()
        };
        assert!(compositor.composite(&RgbImage::new(10, 10)).is_err());
    }
}
