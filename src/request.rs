//! Job options and the validated request built from them.
//!
//! Option structs are the boundary shape: signed numbers and optional fields,
//! deserializable from JSON or filled in from CLI flags. Validation turns
//! them into a [`TransformRequest`], which only holds values the executor can
//! use as-is. Validation failures never reach a worker.
//!
//! ```text
//! ResizeOptions    ─┐
//! ThumbnailOptions ─┼─ into_request() ─→ TransformRequest ─→ Processor::submit
//! RotateOptions    ─┘        │
//!                            └─ Err(ValidationError)  (sync, nothing dispatched)
//! ```

use crate::error::ValidationError;
use crate::imaging::{Dimensions, FitPolicy, Quality, TransformMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the input image comes from. Exactly one variant is ever set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    /// Encoded image bytes, owned by the request for the job's lifetime.
    Bytes(Vec<u8>),
    /// A file to read on the worker.
    Path(PathBuf),
}

impl ImageSource {
    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            ImageSource::Bytes(bytes) if bytes.is_empty() => Err(ValidationError::EmptyBuffer),
            ImageSource::Path(path) if path.as_os_str().is_empty() => {
                Err(ValidationError::EmptyPath)
            }
            _ => Ok(()),
        }
    }

    /// File path, if this source is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ImageSource::Path(path) => Some(path),
            ImageSource::Bytes(_) => None,
        }
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

/// Options for a resize job.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeOptions {
    pub input: Option<ImageSource>,
    /// Target width; 0 derives it from the height.
    pub width: i64,
    /// Target height; 0 derives it from the width.
    pub height: i64,
    /// 1–100, or 0 for the codec default.
    pub quality: i64,
    /// Output format name; keeps the input format when absent or empty.
    pub format: Option<String>,
    /// Scale to cover the box and center-crop instead of fitting inside it.
    pub autocrop: bool,
}

/// Options for a thumbnail job. Same geometry as resize; the output keeps
/// the input format.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailOptions {
    pub input: Option<ImageSource>,
    pub width: i64,
    pub height: i64,
    pub quality: i64,
    pub autocrop: bool,
}

/// Options for a rotate job.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RotateOptions {
    pub input: Option<ImageSource>,
    /// Clockwise angle; 0 leaves the pixels untouched.
    pub degrees: f64,
}

/// A validated, self-contained description of one job.
///
/// Move-only: the request owns its input bytes or path and its format
/// string, and is handed whole to the worker that runs it.
#[derive(Debug, PartialEq)]
pub struct TransformRequest {
    pub(crate) source: ImageSource,
    pub(crate) mode: TransformMode,
    pub(crate) target: Dimensions,
    pub(crate) fit: FitPolicy,
    pub(crate) quality: Quality,
    pub(crate) format: Option<String>,
    pub(crate) degrees: f64,
}

impl TransformRequest {
    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn target(&self) -> Dimensions {
        self.target
    }

    pub fn fit(&self) -> FitPolicy {
        self.fit
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn degrees(&self) -> f64 {
        self.degrees
    }
}

impl ResizeOptions {
    pub fn new(input: impl Into<ImageSource>) -> Self {
        Self {
            input: Some(input.into()),
            ..Self::default()
        }
    }

    pub fn into_request(self) -> Result<TransformRequest, ValidationError> {
        let source = checked_source(self.input)?;
        let target = checked_dimensions(self.width, self.height)?;
        let quality = checked_quality(self.quality)?;
        Ok(TransformRequest {
            source,
            mode: TransformMode::Resize,
            target,
            fit: FitPolicy::select(self.autocrop, target.width, target.height),
            quality,
            format: self.format.filter(|f| !f.is_empty()),
            degrees: 0.0,
        })
    }
}

impl ThumbnailOptions {
    pub fn new(input: impl Into<ImageSource>) -> Self {
        Self {
            input: Some(input.into()),
            ..Self::default()
        }
    }

    pub fn into_request(self) -> Result<TransformRequest, ValidationError> {
        let source = checked_source(self.input)?;
        let target = checked_dimensions(self.width, self.height)?;
        let quality = checked_quality(self.quality)?;
        Ok(TransformRequest {
            source,
            mode: TransformMode::Thumbnail,
            target,
            fit: FitPolicy::select(self.autocrop, target.width, target.height),
            quality,
            format: None,
            degrees: 0.0,
        })
    }
}

impl RotateOptions {
    pub fn new(input: impl Into<ImageSource>, degrees: f64) -> Self {
        Self {
            input: Some(input.into()),
            degrees,
        }
    }

    pub fn into_request(self) -> Result<TransformRequest, ValidationError> {
        let source = checked_source(self.input)?;
        if !self.degrees.is_finite() {
            return Err(ValidationError::InvalidDegrees);
        }
        Ok(TransformRequest {
            source,
            mode: TransformMode::Rotate,
            target: Dimensions::default(),
            fit: FitPolicy::Contain,
            quality: Quality::default(),
            format: None,
            degrees: self.degrees,
        })
    }
}

fn checked_source(input: Option<ImageSource>) -> Result<ImageSource, ValidationError> {
    let source = input.ok_or(ValidationError::MissingInput)?;
    source.validate()?;
    Ok(source)
}

fn checked_dimensions(width: i64, height: i64) -> Result<Dimensions, ValidationError> {
    let width = u32::try_from(width).map_err(|_| ValidationError::InvalidDimensions)?;
    let height = u32::try_from(height).map_err(|_| ValidationError::InvalidDimensions)?;
    Ok(Dimensions::new(width, height))
}

fn checked_quality(quality: i64) -> Result<Quality, ValidationError> {
    match u8::try_from(quality) {
        Ok(q) if q <= 100 => Ok(Quality::new(q)),
        _ => Err(ValidationError::InvalidQuality),
    }
}
