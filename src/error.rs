//! Errors visible to callers of the job API.
//!
//! Two families, matching the two places a request can fail:
//!
//! - [`ValidationError`] is returned synchronously by the submit methods.
//!   The job is never dispatched.
//! - [`TransformError`] arrives through the completion sink. It only carries
//!   an [`ErrorKind`]; codec diagnostics and file paths stay in the logs.

use std::fmt;
use thiserror::Error;

/// Bad argument shape or range, detected before dispatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Input is required")]
    MissingInput,
    #[error("Imagefile path is empty")]
    EmptyPath,
    #[error("Input buffer is empty")]
    EmptyBuffer,
    #[error("Invalid width/height arguments")]
    InvalidDimensions,
    #[error("Invalid quality parameter")]
    InvalidQuality,
    #[error("Invalid rotation degrees")]
    InvalidDegrees,
}

/// Classification of an asynchronous failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Source missing or unreadable.
    Input,
    /// Codec could not decode the source.
    Read,
    /// A rotate, scale, crop or format primitive failed.
    Transform,
    /// Encoding failed or produced no bytes.
    Encode,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Input => "input",
            ErrorKind::Read => "read",
            ErrorKind::Transform => "transform",
            ErrorKind::Encode => "encode",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque failure delivered to the completion sink.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Image processing failed ({kind})")]
pub struct TransformError {
    kind: ErrorKind,
}

impl TransformError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}
