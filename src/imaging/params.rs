//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how* to do it. They are shared by
//! the [`geometry`](super::geometry) resolver, the [`codec`](super::codec)
//! boundary and the job layer above it.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (0–100, 0 = let the codec decide).
//! - [`FitPolicy`]: How target dimensions are honored (contain, fill, stretch).
//! - [`TransformMode`]: Which of the three job kinds a request runs.
//! - [`Background`]: RGBA fill used where a rotation exposes empty canvas.

use std::fmt;

/// Quality setting for lossy image encoding.
///
/// `0` means "not specified": the codec keeps its own default. Values above
/// 100 are clamped on construction; range checking of untrusted input happens
/// earlier, at request validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.min(100))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// The quality to hand to an encoder, if the caller asked for one.
    pub fn requested(self) -> Option<u8> {
        (self.0 > 0).then_some(self.0)
    }
}

/// Scaling policy applied by [`resolve`](super::geometry::resolve).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitPolicy {
    /// Preserve aspect ratio; derive the missing side from the given one.
    #[default]
    Contain,
    /// Scale to cover the target box, then center-crop to it ("autocrop").
    Fill,
    /// Scale to exactly the given width and height.
    Stretch,
}

impl FitPolicy {
    /// Pick the policy implied by the request flags.
    ///
    /// `autocrop` always wins. Otherwise two explicit sides mean an exact
    /// resize, and anything less derives the missing side.
    pub fn select(autocrop: bool, width: u32, height: u32) -> Self {
        if autocrop {
            FitPolicy::Fill
        } else if width > 0 && height > 0 {
            FitPolicy::Stretch
        } else {
            FitPolicy::Contain
        }
    }
}

/// The three job kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    Resize,
    Thumbnail,
    Rotate,
}

impl TransformMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TransformMode::Resize => "resize",
            TransformMode::Thumbnail => "thumbnail",
            TransformMode::Rotate => "rotate",
        }
    }
}

impl fmt::Display for TransformMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RGBA fill color for canvas exposed by a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Background(pub [u8; 4]);

impl Background {
    pub const BLACK: Background = Background([0, 0, 0, 255]);

    /// Parse `#RRGGBB` or `#RRGGBBAA`.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        if !hex.is_ascii() || !(hex.len() == 6 || hex.len() == 8) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
        Some(Background([channel(0)?, channel(2)?, channel(4)?, alpha]))
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::BLACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 0);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_zero_is_not_requested() {
        assert_eq!(Quality::default().requested(), None);
        assert_eq!(Quality::new(80).requested(), Some(80));
    }

    #[test]
    fn autocrop_selects_fill() {
        assert_eq!(FitPolicy::select(true, 0, 0), FitPolicy::Fill);
        assert_eq!(FitPolicy::select(true, 100, 0), FitPolicy::Fill);
        assert_eq!(FitPolicy::select(true, 100, 50), FitPolicy::Fill);
    }

    #[test]
    fn both_sides_select_stretch() {
        assert_eq!(FitPolicy::select(false, 100, 50), FitPolicy::Stretch);
        assert_eq!(FitPolicy::select(false, 100, 0), FitPolicy::Contain);
        assert_eq!(FitPolicy::select(false, 0, 0), FitPolicy::Contain);
    }

    #[test]
    fn background_parses_rgb_and_rgba() {
        assert_eq!(
            Background::parse_hex("#ff8000"),
            Some(Background([255, 128, 0, 255]))
        );
        assert_eq!(
            Background::parse_hex("#00000000"),
            Some(Background([0, 0, 0, 0]))
        );
    }

    #[test]
    fn background_rejects_malformed() {
        assert_eq!(Background::parse_hex("ff8000"), None);
        assert_eq!(Background::parse_hex("#ff80"), None);
        assert_eq!(Background::parse_hex("#gg0000"), None);
        assert_eq!(Background::parse_hex("#ééé"), None);
    }
}
