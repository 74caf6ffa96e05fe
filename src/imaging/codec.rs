//! Codec boundary: the pixel work every job delegates.
//!
//! The [`ImageCodec`] trait is a factory. Each job opens its own
//! [`CodecSession`], loads one image into it, applies the planned operations
//! and encodes the result. Sessions are never shared between jobs, so the
//! trait needs no locking and a session does not have to be `Send`.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_codec::RustCodec), built on the `image` crate.
//! Tests use the recording `MockCodec` from this module's test helpers.

use super::geometry::{CropBox, Dimensions};
use super::params::{Background, Quality};
use std::path::Path;
use thiserror::Error;

/// Codec failures. The text is diagnostic only: it is logged, never shown
/// to the caller of a job.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("No image loaded")]
    NoImage,
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Factory for per-job codec sessions.
pub trait ImageCodec: Send + Sync {
    type Session: CodecSession;

    /// Open a fresh session. Called once per job, on the worker thread.
    fn session(&self) -> Self::Session;
}

/// One image being worked on.
///
/// Operations mutate the loaded image in place; [`encode`](Self::encode)
/// serializes whatever state the image has reached.
pub trait CodecSession {
    /// Decode an image from an in-memory blob.
    fn read_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError>;

    /// Decode an image from disk.
    fn read_path(&mut self, path: &Path) -> Result<(), CodecError>;

    /// Current dimensions of the loaded image.
    fn dimensions(&self) -> Result<Dimensions, CodecError>;

    /// High-quality resample to exactly `size`.
    fn resize(&mut self, size: Dimensions) -> Result<(), CodecError>;

    /// Fast resample to exactly `size`, tuned for small previews.
    fn thumbnail(&mut self, size: Dimensions) -> Result<(), CodecError>;

    /// Cut `window` out of the image.
    fn crop(&mut self, window: CropBox) -> Result<(), CodecError>;

    /// Rotate clockwise by `degrees`, filling exposed canvas with `background`.
    fn rotate(&mut self, degrees: f64, background: Background) -> Result<(), CodecError>;

    /// Choose the output format by name (`"png"`, `"jpg"`, ...).
    fn set_format(&mut self, format: &str) -> Result<(), CodecError>;

    /// Set lossy compression quality for the encoder.
    ///
    /// Returns whether the selected output format uses it. Call after
    /// [`set_format`](Self::set_format).
    fn set_quality(&mut self, quality: Quality) -> Result<bool, CodecError>;

    /// Encode the image in the selected (or original) format.
    fn encode(&mut self) -> Result<Vec<u8>, CodecError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Mock codec that records operations without touching pixels.
    ///
    /// All sessions share one operation log so tests can assert on the exact
    /// call sequence a job produced. Uses Mutex (not RefCell) so the codec is
    /// Sync and works from rayon workers.
    #[derive(Default)]
    pub struct MockCodec {
        /// Dimensions reported after a successful read.
        pub image: Dimensions,
        /// Step that fails with a codec error.
        pub fail_on: Option<MockStep>,
        /// Step that panics.
        pub panic_on: Option<MockStep>,
        /// Make `encode` succeed with an empty buffer.
        pub empty_encode: bool,
        pub operations: Arc<Mutex<Vec<RecordedOp>>>,
        pub live_sessions: Arc<AtomicUsize>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MockStep {
        Read,
        Scale,
        Crop,
        Rotate,
        Format,
        Encode,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        ReadBytes(usize),
        ReadPath(String),
        Resize { width: u32, height: u32 },
        Thumbnail { width: u32, height: u32 },
        Crop(CropBox),
        Rotate(f64),
        SetFormat(String),
        SetQuality(u8),
        Encode,
    }

    impl MockCodec {
        pub fn with_image(width: u32, height: u32) -> Self {
            Self {
                image: Dimensions::new(width, height),
                ..Self::default()
            }
        }

        pub fn failing_on(mut self, step: MockStep) -> Self {
            self.fail_on = Some(step);
            self
        }

        pub fn panicking_on(mut self, step: MockStep) -> Self {
            self.panic_on = Some(step);
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn live_sessions(&self) -> usize {
            self.live_sessions.load(Ordering::SeqCst)
        }
    }

    impl ImageCodec for MockCodec {
        type Session = MockSession;

        fn session(&self) -> MockSession {
            self.live_sessions.fetch_add(1, Ordering::SeqCst);
            MockSession {
                image: self.image,
                fail_on: self.fail_on,
                panic_on: self.panic_on,
                empty_encode: self.empty_encode,
                current: None,
                format: None,
                operations: Arc::clone(&self.operations),
                live_sessions: Arc::clone(&self.live_sessions),
            }
        }
    }

    pub struct MockSession {
        image: Dimensions,
        fail_on: Option<MockStep>,
        panic_on: Option<MockStep>,
        empty_encode: bool,
        current: Option<Dimensions>,
        format: Option<String>,
        operations: Arc<Mutex<Vec<RecordedOp>>>,
        live_sessions: Arc<AtomicUsize>,
    }

    impl MockSession {
        fn record(&self, op: RecordedOp) {
            self.operations.lock().unwrap().push(op);
        }

        fn step(&self, step: MockStep) -> Result<(), CodecError> {
            if self.panic_on == Some(step) {
                panic!("mock codec panicked during {step:?}");
            }
            if self.fail_on == Some(step) {
                return Err(CodecError::ProcessingFailed(format!(
                    "mock failure during {step:?} in /secret/internal/path"
                )));
            }
            Ok(())
        }

        fn loaded(&self) -> Result<Dimensions, CodecError> {
            self.current.ok_or(CodecError::NoImage)
        }
    }

    impl Drop for MockSession {
        fn drop(&mut self) {
            self.live_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl CodecSession for MockSession {
        fn read_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
            self.record(RecordedOp::ReadBytes(bytes.len()));
            self.step(MockStep::Read)?;
            self.current = Some(self.image);
            Ok(())
        }

        fn read_path(&mut self, path: &Path) -> Result<(), CodecError> {
            self.record(RecordedOp::ReadPath(path.to_string_lossy().to_string()));
            if !path.starts_with("/mock") {
                return Err(CodecError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} not found", path.display()),
                )));
            }
            self.step(MockStep::Read)?;
            self.current = Some(self.image);
            Ok(())
        }

        fn dimensions(&self) -> Result<Dimensions, CodecError> {
            self.loaded()
        }

        fn resize(&mut self, size: Dimensions) -> Result<(), CodecError> {
            self.record(RecordedOp::Resize {
                width: size.width,
                height: size.height,
            });
            self.step(MockStep::Scale)?;
            self.current = Some(size);
            Ok(())
        }

        fn thumbnail(&mut self, size: Dimensions) -> Result<(), CodecError> {
            self.record(RecordedOp::Thumbnail {
                width: size.width,
                height: size.height,
            });
            self.step(MockStep::Scale)?;
            self.current = Some(size);
            Ok(())
        }

        fn crop(&mut self, window: CropBox) -> Result<(), CodecError> {
            self.record(RecordedOp::Crop(window));
            self.step(MockStep::Crop)?;
            self.current = Some(Dimensions::new(window.width, window.height));
            Ok(())
        }

        fn rotate(&mut self, degrees: f64, _background: Background) -> Result<(), CodecError> {
            self.record(RecordedOp::Rotate(degrees));
            self.step(MockStep::Rotate)?;
            let dims = self.loaded()?;
            let quarter_turns = (degrees / 90.0).round() as i64;
            if quarter_turns.rem_euclid(2) == 1 {
                self.current = Some(Dimensions::new(dims.height, dims.width));
            }
            Ok(())
        }

        fn set_format(&mut self, format: &str) -> Result<(), CodecError> {
            self.record(RecordedOp::SetFormat(format.to_string()));
            self.step(MockStep::Format)?;
            self.format = Some(format.to_string());
            Ok(())
        }

        /// Mock inputs are JPEG; only JPEG and AVIF output take a quality.
        fn set_quality(&mut self, quality: Quality) -> Result<bool, CodecError> {
            self.record(RecordedOp::SetQuality(quality.value()));
            Ok(matches!(
                self.format.as_deref(),
                None | Some("jpg" | "jpeg" | "avif")
            ))
        }

        fn encode(&mut self) -> Result<Vec<u8>, CodecError> {
            self.record(RecordedOp::Encode);
            self.step(MockStep::Encode)?;
            let dims = self.loaded()?;
            if self.empty_encode {
                return Ok(Vec::new());
            }
            Ok(format!("MOCK {}x{}", dims.width, dims.height).into_bytes())
        }
    }

    #[test]
    fn mock_records_read_and_encode() {
        let codec = MockCodec::with_image(800, 600);
        let mut session = codec.session();

        session.read_bytes(&[1, 2, 3]).unwrap();
        assert_eq!(session.dimensions().unwrap(), Dimensions::new(800, 600));
        assert_eq!(session.encode().unwrap(), b"MOCK 800x600");

        assert_eq!(
            codec.get_operations(),
            vec![RecordedOp::ReadBytes(3), RecordedOp::Encode]
        );
    }

    #[test]
    fn mock_path_outside_mock_root_is_missing() {
        let codec = MockCodec::with_image(10, 10);
        let mut session = codec.session();
        let err = session.read_path(Path::new("/nonexistent/a.jpg")).unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
    }

    #[test]
    fn mock_counts_live_sessions() {
        let codec = MockCodec::with_image(10, 10);
        let a = codec.session();
        let b = codec.session();
        assert_eq!(codec.live_sessions(), 2);
        drop(a);
        drop(b);
        assert_eq!(codec.live_sessions(), 0);
    }

    #[test]
    fn mock_quality_only_counts_for_lossy_output() {
        let codec = MockCodec::with_image(10, 10);
        let mut session = codec.session();
        session.read_bytes(&[0]).unwrap();
        assert!(session.set_quality(Quality::new(50)).unwrap());
        session.set_format("png").unwrap();
        assert!(!session.set_quality(Quality::new(50)).unwrap());
    }

    #[test]
    fn mock_rotate_swaps_on_odd_quarter_turns() {
        let codec = MockCodec::with_image(300, 100);
        let mut session = codec.session();
        session.read_bytes(&[0]).unwrap();
        session.rotate(90.0, Background::BLACK).unwrap();
        assert_eq!(session.dimensions().unwrap(), Dimensions::new(100, 300));
        session.rotate(180.0, Background::BLACK).unwrap();
        assert_eq!(session.dimensions().unwrap(), Dimensions::new(100, 300));
    }
}
