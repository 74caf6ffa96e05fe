//! Pure Rust codec built on the `image` crate.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image::ImageReader` with format sniffing |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Thumbnail | `DynamicImage::thumbnail_exact` (fast box-style sampling) |
//! | Crop | `DynamicImage::crop_imm` |
//! | Rotate (right angles) | `rotate90` / `rotate180` / `rotate270` |
//! | Rotate (free angle) | [`rotation::rotate_rgba`](super::rotation::rotate_rgba) |
//! | Encode → JPEG / AVIF | `JpegEncoder` / `AvifEncoder` with quality |
//! | Encode → other | `DynamicImage::write_to` |

use super::codec::{CodecError, CodecSession, ImageCodec};
use super::geometry::{CropBox, Dimensions};
use super::params::{Background, Quality};
use super::rotation::{Turn, rotate_rgba};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Rgba};
use std::io::Cursor;
use std::path::Path;
use std::sync::LazyLock;

/// JPEG quality when the request leaves it at 0 (the encoder's own default).
const DEFAULT_JPEG_QUALITY: u8 = 75;
/// AVIF quality when the request leaves it at 0.
const DEFAULT_AVIF_QUALITY: u8 = 80;
/// rav1e speed preset; 6 keeps encode times reasonable for one-off jobs.
const AVIF_SPEED: u8 = 6;

/// Format names accepted by [`CodecSession::set_format`].
const FORMAT_NAMES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
    ("avif", ImageFormat::Avif),
];

/// Process-wide codec tables, built once before the first job runs.
#[derive(Debug)]
pub struct CodecRuntime {
    input_formats: Vec<ImageFormat>,
    output_names: Vec<&'static str>,
}

impl CodecRuntime {
    /// Names usable as an output format.
    pub fn output_formats(&self) -> &[&'static str] {
        &self.output_names
    }

    /// Formats whose decoders are compiled in.
    pub fn input_formats(&self) -> &[ImageFormat] {
        &self.input_formats
    }

    fn lookup_output(&self, name: &str) -> Option<ImageFormat> {
        let name = name.to_ascii_lowercase();
        FORMAT_NAMES
            .iter()
            .find(|(n, _)| *n == name && self.output_names.contains(n))
            .map(|(_, format)| *format)
    }
}

static CODEC_RUNTIME: LazyLock<CodecRuntime> = LazyLock::new(|| {
    let mut input_formats: Vec<ImageFormat> = Vec::new();
    for (_, format) in FORMAT_NAMES {
        // The "avif" feature only brings the encoder, whatever reading_enabled() says
        if *format != ImageFormat::Avif
            && format.reading_enabled()
            && !input_formats.contains(format)
        {
            input_formats.push(*format);
        }
    }
    let output_names = FORMAT_NAMES
        .iter()
        .filter(|(_, format)| format.writing_enabled())
        .map(|(name, _)| *name)
        .collect();

    let runtime = CodecRuntime {
        input_formats,
        output_names,
    };
    tracing::debug!(
        inputs = runtime.input_formats.len(),
        outputs = ?runtime.output_names,
        "codec runtime initialized"
    );
    runtime
});

/// Initialize the codec runtime. Idempotent; later calls return the same tables.
pub fn init() -> &'static CodecRuntime {
    &CODEC_RUNTIME
}

/// Codec backed by the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for RustCodec {
    type Session = RustSession;

    fn session(&self) -> RustSession {
        RustSession {
            runtime: init(),
            image: None,
            format: None,
            quality: Quality::default(),
        }
    }
}

/// One decoded image plus its pending output settings.
pub struct RustSession {
    runtime: &'static CodecRuntime,
    image: Option<DynamicImage>,
    /// Output format: the sniffed input format until `set_format` overrides it.
    format: Option<ImageFormat>,
    quality: Quality,
}

impl RustSession {
    fn image(&self) -> Result<&DynamicImage, CodecError> {
        self.image.as_ref().ok_or(CodecError::NoImage)
    }

    fn replace(&mut self, f: impl FnOnce(&DynamicImage) -> DynamicImage) -> Result<(), CodecError> {
        let next = f(self.image()?);
        self.image = Some(next);
        Ok(())
    }

    fn decode<R: std::io::BufRead + std::io::Seek>(
        &mut self,
        reader: ImageReader<R>,
    ) -> Result<(), CodecError> {
        let format = reader.format();
        if let Some(format) = format
            && !self.runtime.input_formats.contains(&format)
        {
            return Err(CodecError::UnsupportedFormat(format!("{format:?}")));
        }
        let image = reader
            .decode()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        self.image = Some(image);
        self.format = format;
        Ok(())
    }
}

impl CodecSession for RustSession {
    fn read_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        self.decode(reader)
    }

    fn read_path(&mut self, path: &Path) -> Result<(), CodecError> {
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        self.decode(reader).map_err(|e| match e {
            CodecError::Decode(msg) => {
                CodecError::Decode(format!("Failed to decode {}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    fn dimensions(&self) -> Result<Dimensions, CodecError> {
        let image = self.image()?;
        Ok(Dimensions::new(image.width(), image.height()))
    }

    fn resize(&mut self, size: Dimensions) -> Result<(), CodecError> {
        self.replace(|img| img.resize_exact(size.width, size.height, FilterType::Lanczos3))
    }

    fn thumbnail(&mut self, size: Dimensions) -> Result<(), CodecError> {
        self.replace(|img| img.thumbnail_exact(size.width, size.height))
    }

    fn crop(&mut self, window: CropBox) -> Result<(), CodecError> {
        let image = self.image()?;
        let fits = window.x as u64 + window.width as u64 <= image.width() as u64
            && window.y as u64 + window.height as u64 <= image.height() as u64;
        if !fits {
            return Err(CodecError::ProcessingFailed(format!(
                "crop {}x{}+{}+{} exceeds {}x{}",
                window.width,
                window.height,
                window.x,
                window.y,
                image.width(),
                image.height()
            )));
        }
        self.replace(|img| img.crop_imm(window.x, window.y, window.width, window.height))
    }

    fn rotate(&mut self, degrees: f64, background: Background) -> Result<(), CodecError> {
        if !degrees.is_finite() {
            return Err(CodecError::ProcessingFailed(format!(
                "cannot rotate by {degrees}"
            )));
        }
        match Turn::from_degrees(degrees) {
            Turn::None => Ok(()),
            Turn::Quarter => self.replace(DynamicImage::rotate90),
            Turn::Half => self.replace(DynamicImage::rotate180),
            Turn::ThreeQuarter => self.replace(DynamicImage::rotate270),
            Turn::Free(angle) => self.replace(|img| {
                DynamicImage::ImageRgba8(rotate_rgba(&img.to_rgba8(), angle, Rgba(background.0)))
            }),
        }
    }

    fn set_format(&mut self, format: &str) -> Result<(), CodecError> {
        let format = self
            .runtime
            .lookup_output(format)
            .ok_or_else(|| CodecError::UnsupportedFormat(format.to_string()))?;
        self.format = Some(format);
        Ok(())
    }

    fn set_quality(&mut self, quality: Quality) -> Result<bool, CodecError> {
        self.quality = quality;
        Ok(matches!(
            self.format,
            Some(ImageFormat::Jpeg | ImageFormat::Avif)
        ))
    }

    fn encode(&mut self) -> Result<Vec<u8>, CodecError> {
        let image = self.image()?;
        let format = self
            .format
            .ok_or_else(|| CodecError::UnsupportedFormat("unknown output format".into()))?;

        let mut out = Cursor::new(Vec::new());
        let written = match format {
            ImageFormat::Jpeg => {
                let quality = self.quality.requested().unwrap_or(DEFAULT_JPEG_QUALITY);
                let encoder = JpegEncoder::new_with_quality(&mut out, quality);
                // JPEG has no alpha channel
                DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)
            }
            ImageFormat::Avif => {
                let quality = self.quality.requested().unwrap_or(DEFAULT_AVIF_QUALITY);
                let encoder = AvifEncoder::new_with_speed_quality(&mut out, AVIF_SPEED, quality);
                image.write_with_encoder(encoder)
            }
            other => image.write_to(&mut out, other),
        };
        written.map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(out.into_inner())
    }
}
