//! Running one request to a terminal state.
//!
//! A [`JobExecutor`] owns a fresh codec session and walks the request through
//! a fixed sequence of states:
//!
//! ```text
//! resize, thumbnail:  Created → Reading → Resolving → Transforming → Encoding → Completed
//! rotate:             Created → Reading → Rotating ───────────────→ Encoding → Completed
//! ```
//!
//! Any stage may end in `Failed(kind)` instead. The first failure ends the
//! job; later stages never run and nothing is retried.

use crate::error::ErrorKind;
use crate::imaging::{Background, CodecError, CodecSession, ImageCodec, TransformMode, resolve};
use crate::request::{ImageSource, TransformRequest};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Identifier assigned to a job at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Reading,
    Rotating,
    Resolving,
    Transforming,
    Encoding,
    Completed,
    Failed(ErrorKind),
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed(_))
    }
}

/// Successful job output, before it is shaped for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Quality handed to the encoder; 0 when none was applied.
    pub quality: u8,
}

/// Why a job failed. `detail` is for logs only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub detail: String,
}

impl JobFailure {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Map a codec error to a failure of the given kind.
fn failed(kind: ErrorKind) -> impl FnOnce(CodecError) -> JobFailure {
    move |err| JobFailure::new(kind, err.to_string())
}

/// Drives a single request through a codec session.
pub struct JobExecutor<S> {
    id: JobId,
    session: S,
    background: Background,
    state: JobState,
    history: Vec<JobState>,
}

impl<S: CodecSession> JobExecutor<S> {
    pub fn new(id: JobId, session: S, background: Background) -> Self {
        Self {
            id,
            session,
            background,
            state: JobState::Created,
            history: vec![JobState::Created],
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    /// Run the request. Leaves the executor in `Completed` or `Failed`.
    pub fn run(&mut self, request: &TransformRequest) -> Result<TransformResult, JobFailure> {
        debug_assert_eq!(self.state, JobState::Created, "executor reused");
        let outcome = self.pipeline(request);
        match &outcome {
            Ok(result) => {
                self.enter(JobState::Completed);
                tracing::debug!(
                    job = %self.id,
                    width = result.width,
                    height = result.height,
                    bytes = result.bytes.len(),
                    "job completed"
                );
            }
            Err(failure) => {
                self.enter(JobState::Failed(failure.kind));
                tracing::debug!(job = %self.id, kind = %failure.kind, "job failed");
            }
        }
        outcome
    }

    fn enter(&mut self, next: JobState) {
        tracing::trace!(job = %self.id, from = ?self.state, to = ?next, "job state");
        self.state = next;
        self.history.push(next);
    }

    fn pipeline(&mut self, request: &TransformRequest) -> Result<TransformResult, JobFailure> {
        self.enter(JobState::Reading);
        self.read(&request.source)?;

        let mut quality = 0;
        match request.mode {
            TransformMode::Rotate => {
                self.enter(JobState::Rotating);
                self.session
                    .rotate(request.degrees, self.background)
                    .map_err(failed(ErrorKind::Transform))?;
            }
            TransformMode::Resize | TransformMode::Thumbnail => {
                self.scale(request)?;
                if let Some(format) = &request.format {
                    self.session
                        .set_format(format)
                        .map_err(failed(ErrorKind::Transform))?;
                }
                if let Some(q) = request.quality.requested() {
                    let applied = self
                        .session
                        .set_quality(request.quality)
                        .map_err(failed(ErrorKind::Transform))?;
                    // Lossless formats ignore it; report nothing applied
                    if applied {
                        quality = q;
                    }
                }
            }
        }

        self.enter(JobState::Encoding);
        // Rotation may swap or grow the sides; always report what the codec holds
        let output = self
            .session
            .dimensions()
            .map_err(failed(ErrorKind::Encode))?;
        let bytes = self.session.encode().map_err(failed(ErrorKind::Encode))?;
        if bytes.is_empty() {
            return Err(JobFailure::new(
                ErrorKind::Encode,
                "codec returned an empty buffer",
            ));
        }

        Ok(TransformResult {
            bytes,
            width: output.width,
            height: output.height,
            quality,
        })
    }

    fn read(&mut self, source: &ImageSource) -> Result<(), JobFailure> {
        let read = match source {
            ImageSource::Bytes(bytes) => self.session.read_bytes(bytes),
            ImageSource::Path(path) => self.session.read_path(path),
        };
        read.map_err(|err| match err {
            // The file itself could not be opened
            CodecError::Io(_) => JobFailure::new(ErrorKind::Input, err.to_string()),
            _ => JobFailure::new(ErrorKind::Read, err.to_string()),
        })
    }

    fn scale(&mut self, request: &TransformRequest) -> Result<(), JobFailure> {
        let image = self
            .session
            .dimensions()
            .map_err(failed(ErrorKind::Read))?;

        self.enter(JobState::Resolving);
        let plan = resolve(image, request.target, request.fit)
            .map_err(|e| JobFailure::new(ErrorKind::Read, e.to_string()))?;

        self.enter(JobState::Transforming);
        if let Some(size) = plan.scale {
            let scaled = if request.mode == TransformMode::Thumbnail {
                self.session.thumbnail(size)
            } else {
                self.session.resize(size)
            };
            scaled.map_err(failed(ErrorKind::Transform))?;
        }
        if let Some(window) = plan.crop {
            self.session
                .crop(window)
                .map_err(failed(ErrorKind::Transform))?;
        }
        Ok(())
    }
}

/// Run `request` on a fresh session from `codec`.
///
/// A panic inside the codec is caught and reported as a transform failure, so
/// every dispatched job still ends with exactly one outcome.
pub fn execute<C: ImageCodec>(
    id: JobId,
    codec: &C,
    request: &TransformRequest,
    background: Background,
) -> Result<TransformResult, JobFailure> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        let mut executor = JobExecutor::new(id, codec.session(), background);
        executor.run(request)
    }))
    .unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::error!(job = %id, panic = %message, "codec panicked");
        Err(JobFailure::new(ErrorKind::Transform, message))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
