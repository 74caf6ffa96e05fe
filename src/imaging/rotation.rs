//! Arbitrary-angle rotation for the `image`-based codec.
//!
//! Right angles are handled by the `image` crate directly (lossless pixel
//! moves). Everything else goes through [`rotate_rgba`]: the canvas grows to
//! the rotated bounding box, each destination pixel is mapped back into the
//! source and bilinearly sampled, and anything falling outside the source
//! takes the background color.

use image::{Rgba, RgbaImage};

/// Tolerance when deciding whether an angle is a right angle.
const ANGLE_EPSILON: f64 = 1e-9;

/// An angle reduced to the rotations the codec distinguishes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Turn {
    None,
    Quarter,
    Half,
    ThreeQuarter,
    Free(f64),
}

impl Turn {
    /// Normalize any finite clockwise angle into `[0, 360)` and classify it.
    pub fn from_degrees(degrees: f64) -> Self {
        let normalized = degrees.rem_euclid(360.0);
        let near = |target: f64| (normalized - target).abs() < ANGLE_EPSILON;
        if near(0.0) || near(360.0) {
            Turn::None
        } else if near(90.0) {
            Turn::Quarter
        } else if near(180.0) {
            Turn::Half
        } else if near(270.0) {
            Turn::ThreeQuarter
        } else {
            Turn::Free(normalized)
        }
    }
}

/// Bounding box of a `width`×`height` image rotated by `degrees`.
pub fn rotated_extent(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (w, h) = (width as f64, height as f64);
    let out_w = w * cos.abs() + h * sin.abs();
    let out_h = w * sin.abs() + h * cos.abs();
    (snap(out_w), snap(out_h))
}

/// Round up to whole pixels, ignoring floating-point noise.
fn snap(value: f64) -> u32 {
    let rounded = value.round();
    let pixels = if (value - rounded).abs() < 1e-6 {
        rounded
    } else {
        value.ceil()
    };
    pixels.clamp(1.0, u32::MAX as f64) as u32
}

/// Rotate clockwise by `degrees` onto an expanded canvas.
pub fn rotate_rgba(src: &RgbaImage, degrees: f64, background: Rgba<u8>) -> RgbaImage {
    let (src_w, src_h) = src.dimensions();
    let (dst_w, dst_h) = rotated_extent(src_w, src_h, degrees);
    let (sin, cos) = degrees.to_radians().sin_cos();

    let (src_cx, src_cy) = (src_w as f64 / 2.0, src_h as f64 / 2.0);
    let (dst_cx, dst_cy) = (dst_w as f64 / 2.0, dst_h as f64 / 2.0);

    RgbaImage::from_fn(dst_w, dst_h, |x, y| {
        // Pixel centers, relative to the canvas center
        let dx = x as f64 + 0.5 - dst_cx;
        let dy = y as f64 + 0.5 - dst_cy;
        // Inverse rotation (y points down, so clockwise uses +sin here)
        let sx = dx * cos + dy * sin + src_cx - 0.5;
        let sy = -dx * sin + dy * cos + src_cy - 0.5;
        sample_bilinear(src, sx, sy, background)
    })
}

fn sample_bilinear(src: &RgbaImage, x: f64, y: f64, background: Rgba<u8>) -> Rgba<u8> {
    let (w, h) = (src.width() as i64, src.height() as i64);
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    if x0 < -1 || y0 < -1 || x0 >= w || y0 >= h {
        return background;
    }

    let fetch = |px: i64, py: i64| -> [f64; 4] {
        let p = if px < 0 || py < 0 || px >= w || py >= h {
            background
        } else {
            *src.get_pixel(px as u32, py as u32)
        };
        p.0.map(f64::from)
    };

    let tl = fetch(x0, y0);
    let tr = fetch(x0 + 1, y0);
    let bl = fetch(x0, y0 + 1);
    let br = fetch(x0 + 1, y0 + 1);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = tl[c] + (tr[c] - tl[c]) * fx;
        let bottom = bl[c] + (br[c] - bl[c]) * fx;
        out[c] = (top + (bottom - top) * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_classifies_right_angles() {
        assert_eq!(Turn::from_degrees(0.0), Turn::None);
        assert_eq!(Turn::from_degrees(360.0), Turn::None);
        assert_eq!(Turn::from_degrees(90.0), Turn::Quarter);
        assert_eq!(Turn::from_degrees(-90.0), Turn::ThreeQuarter);
        assert_eq!(Turn::from_degrees(540.0), Turn::Half);
        assert_eq!(Turn::from_degrees(45.0), Turn::Free(45.0));
        assert_eq!(Turn::from_degrees(-45.0), Turn::Free(315.0));
    }

    #[test]
    fn extent_of_right_angles_is_exact() {
        assert_eq!(rotated_extent(100, 50, 0.0), (100, 50));
        assert_eq!(rotated_extent(100, 50, 90.0), (50, 100));
        assert_eq!(rotated_extent(100, 50, 180.0), (100, 50));
    }

    #[test]
    fn extent_of_45_degrees_grows() {
        // 100 * (cos 45 + sin 45) = 141.42 → 142
        assert_eq!(rotated_extent(100, 100, 45.0), (142, 142));
    }

    #[test]
    fn free_rotation_fills_corners_with_background() {
        let src = RgbaImage::from_pixel(40, 40, Rgba([200, 10, 10, 255]));
        let background = Rgba([0, 0, 255, 255]);
        let out = rotate_rgba(&src, 30.0, background);

        assert_eq!(out.dimensions(), rotated_extent(40, 40, 30.0));
        assert_eq!(*out.get_pixel(0, 0), background);
        let (cx, cy) = (out.width() / 2, out.height() / 2);
        assert_eq!(*out.get_pixel(cx, cy), Rgba([200, 10, 10, 255]));
    }

    #[test]
    fn free_rotation_moves_content_clockwise() {
        // Mark the top-left quadrant; after ~90° clockwise it lands top-right
        let src = RgbaImage::from_fn(40, 40, |x, y| {
            if x < 20 && y < 20 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let out = rotate_rgba(&src, 89.0, Rgba([0, 0, 0, 255]));
        let (w, _) = out.dimensions();
        assert_eq!(out.get_pixel(w - 10, 10).0[0], 255);
        assert_eq!(out.get_pixel(10, 10).0[0], 0);
    }
}
