//! Pure dimension math for resize and thumbnail jobs.
//!
//! All functions here are pure and testable without any I/O or images. The
//! job executor turns the returned [`ScalePlan`] into codec calls.
//!
//! ## Policies
//!
//! ```text
//! Contain   1000x500 → width 300          → scale 300x150
//! Stretch   1000x500 → 300x300            → scale 300x300 (aspect not kept)
//! Fill      1000x500 → 300x300            → scale 600x300, crop 300x300 @ (150,0)
//! ```
//!
//! A target side of `0` means "unspecified". Fill with one side missing
//! assumes a square box; Contain derives the missing side from the image's
//! aspect ratio. With no target at all, both policies leave the image alone.

use super::params::FitPolicy;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("image has no area ({width}x{height})")]
    InvalidImage { width: u32, height: u32 },
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when neither side was given.
    pub fn is_unspecified(self) -> bool {
        self.width == 0 && self.height == 0
    }
}

/// Window cut out of a scaled image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// What the codec has to do to reach the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalePlan {
    /// Scale to these dimensions first. `None` means no scale call.
    pub scale: Option<Dimensions>,
    /// Then crop this window out of the scaled image.
    pub crop: Option<CropBox>,
    /// Dimensions of the image once the plan has run.
    pub output: Dimensions,
}

impl ScalePlan {
    fn keep(image: Dimensions) -> Self {
        Self {
            scale: None,
            crop: None,
            output: image,
        }
    }
}

/// Compute the scale (and optional crop) that maps `image` onto `target`.
///
/// # Examples
/// ```
/// use thumbwork::imaging::{Dimensions, FitPolicy, resolve};
///
/// // 2:1 landscape filled into a square: fit height, crop the sides
/// let plan = resolve(Dimensions::new(1000, 500), Dimensions::new(300, 300), FitPolicy::Fill).unwrap();
/// assert_eq!(plan.scale, Some(Dimensions::new(600, 300)));
/// assert_eq!(plan.output, Dimensions::new(300, 300));
///
/// // Only a width: the height follows the aspect ratio
/// let plan = resolve(Dimensions::new(400, 800), Dimensions::new(200, 0), FitPolicy::Contain).unwrap();
/// assert_eq!(plan.output, Dimensions::new(200, 400));
/// ```
pub fn resolve(
    image: Dimensions,
    target: Dimensions,
    policy: FitPolicy,
) -> Result<ScalePlan, GeometryError> {
    if image.width == 0 || image.height == 0 {
        return Err(GeometryError::InvalidImage {
            width: image.width,
            height: image.height,
        });
    }

    let aspect = image.width as f64 / image.height as f64;

    let plan = match policy {
        FitPolicy::Fill if !target.is_unspecified() => fill(aspect, target),
        // Fill without any target degrades to the no-op below
        _ => contain(image, aspect, target),
    };
    Ok(plan)
}

fn fill(aspect: f64, target: Dimensions) -> ScalePlan {
    // A single side means a square box
    let (box_w, box_h) = match (target.width, target.height) {
        (0, h) => (h, h),
        (w, 0) => (w, w),
        (w, h) => (w, h),
    };
    let canvas_aspect = box_w as f64 / box_h as f64;

    let (new_w, new_h) = if aspect < canvas_aspect {
        // Image is relatively taller: match width, overflow height
        let w = box_w as f64;
        (w, w / aspect)
    } else {
        // Image is relatively wider (or equal): match height, overflow width
        let h = box_h as f64;
        (h * aspect, h)
    };

    let scale = Dimensions::new(to_pixels(new_w).max(box_w), to_pixels(new_h).max(box_h));
    let crop = CropBox {
        x: centered_offset(new_w, box_w, scale.width),
        y: centered_offset(new_h, box_h, scale.height),
        width: box_w,
        height: box_h,
    };

    ScalePlan {
        scale: Some(scale),
        crop: Some(crop),
        output: Dimensions::new(box_w, box_h),
    }
}

fn contain(image: Dimensions, aspect: f64, target: Dimensions) -> ScalePlan {
    let (w, h) = match (target.width, target.height) {
        (0, 0) => return ScalePlan::keep(image),
        (0, h) => (to_pixels(h as f64 * aspect), h),
        (w, 0) => (w, to_pixels(w as f64 / aspect)),
        (w, h) => (w, h),
    };
    let size = Dimensions::new(w, h);
    ScalePlan {
        scale: Some(size),
        crop: None,
        output: size,
    }
}

/// Round a floating-point side to whole pixels, never below one.
fn to_pixels(value: f64) -> u32 {
    value.round().clamp(1.0, u32::MAX as f64) as u32
}

/// Offset that centers `window` inside `scaled`, truncated toward zero and
/// kept inside the integer image.
fn centered_offset(scaled: f64, window: u32, scaled_px: u32) -> u32 {
    let offset = ((scaled - window as f64) / 2.0).trunc().max(0.0) as u32;
    offset.min(scaled_px - window)
}
