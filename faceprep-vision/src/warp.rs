use image::{Rgb, RgbImage};

use crate::error::{AlignError, Result};
use crate::landmarks::Point2D;
use crate::procrustes::SimilarityTransform;

/// Reflects `i` into `0..len` without repeating the edge sample
/// (`... 2 1 | 0 1 2 ... n-1 | n-2 n-3 ...`).
#[inline]
pub fn reflect_101(i: i64, len: u32) -> u32 {
    let n = len as i64;
    if n <= 1 {
        return 0;
    }
    let period = 2 * n - 2;
    let m = i.rem_euclid(period);
    (if m >= n { period - m } else { m }) as u32
}

/// Samples `img` at a real-valued position with bilinear interpolation,
/// reflecting coordinates that fall outside the image.
pub fn sample_bilinear(img: &RgbImage, x: f64, y: f64) -> [f64; 3] {
    let (w, h) = img.dimensions();
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let xs = [reflect_101(x0, w), reflect_101(x0 + 1, w)];
    let ys = [reflect_101(y0, h), reflect_101(y0 + 1, h)];
    let wx = [1.0 - fx, fx];
    let wy = [1.0 - fy, fy];

    let mut out = [0.0f64; 3];
    for (j, &sy) in ys.iter().enumerate() {
        for (i, &sx) in xs.iter().enumerate() {
            let weight = wx[i] * wy[j];
            if weight == 0.0 {
                continue;
            }
            let p = img.get_pixel(sx, sy);
            for c in 0..3 {
                out[c] += p[c] as f64 * weight;
            }
        }
    }
    out
}

#[inline]
pub(crate) fn to_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Warps `src` by `transform` into a `width` x `height` image.
///
/// Every output pixel is mapped back through the inverse transform, so the
/// output has no holes.
pub fn warp_image(
    src: &RgbImage,
    transform: &SimilarityTransform,
    width: u32,
    height: u32,
) -> Result<RgbImage> {
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return Err(AlignError::degenerate("source image is empty"));
    }
    let mut output = RgbImage::new(width, height);
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let s = transform.invert(&Point2D::new(x as f64, y as f64));
        let v = sample_bilinear(src, s.x, s.y);
        *pixel = Rgb([to_u8(v[0]), to_u8(v[1]), to_u8(v[2])]);
    }
    Ok(output)
}
