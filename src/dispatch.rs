//! Worker pool and completion delivery.
//!
//! [`Processor`] is the public face of the crate. It validates options,
//! hands each request to a worker on its own `rayon` pool and delivers the
//! outcome back on the thread that owns the processor:
//!
//! ```text
//! issuing thread                         worker pool
//! ──────────────                         ───────────
//! resize(opts, sink)
//!   ├─ validate ── Err → returned now
//!   └─ spawn(Job) ─────────────────────→ execute(request) on a fresh session
//!                                          │
//! poll() / wait()  ←── channel ────────── Completion { job, outcome }
//!   └─ sink(outcome), then drop request
//! ```
//!
//! Every dispatched job produces exactly one call of its sink, whatever the
//! terminal state. Sinks only ever run inside [`Processor::poll`] or
//! [`Processor::wait`], never on a worker.

use crate::config::{ConfigError, ProcessorConfig, effective_threads};
use crate::error::{TransformError, ValidationError};
use crate::imaging::{self, Background, ImageCodec, RustCodec, TransformMode};
use crate::job::{self, JobFailure, JobId, TransformResult};
use crate::request::{ResizeOptions, RotateOptions, ThumbnailOptions, TransformRequest};
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

/// Metadata reported alongside the encoded bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransformInfo {
    pub width: u32,
    pub height: u32,
    /// Quality the encoder was given. Resize only reports an explicit value;
    /// rotate never reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
}

/// A finished job, as handed to the completion sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub bytes: Vec<u8>,
    pub info: TransformInfo,
}

impl TransformOutput {
    fn from_result(mode: TransformMode, result: TransformResult) -> Self {
        let quality = match mode {
            TransformMode::Resize => (result.quality > 0).then_some(result.quality),
            TransformMode::Thumbnail => Some(result.quality),
            TransformMode::Rotate => None,
        };
        Self {
            info: TransformInfo {
                width: result.width,
                height: result.height,
                quality,
            },
            bytes: result.bytes,
        }
    }
}

/// What a completion sink receives.
pub type JobOutcome = Result<TransformOutput, TransformError>;

type Sink = Box<dyn FnOnce(JobOutcome) + Send + 'static>;

/// A sink that forwards the outcome into a channel, for callers that would
/// rather block on a receiver than pass a closure.
pub fn oneshot() -> (
    impl FnOnce(JobOutcome) + Send + 'static,
    Receiver<JobOutcome>,
) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let sink = move |outcome: JobOutcome| {
        // A dropped receiver means nobody is listening any more
        let _ = tx.send(outcome);
    };
    (sink, rx)
}

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Everything a job owns. Moves to the worker at dispatch and comes back
/// inside its [`Completion`].
struct Job {
    id: JobId,
    request: TransformRequest,
    sink: Sink,
}

struct Completion {
    job: Job,
    outcome: Result<TransformResult, JobFailure>,
}

/// Runs transform jobs on a private worker pool.
///
/// Dropping the processor waits for jobs still in flight and delivers
/// their outcomes first. If the owning thread is already panicking, the
/// drop does not wait: outcomes still pending are discarded and their sinks
/// are dropped without being called.
pub struct Processor<C: ImageCodec + 'static = RustCodec> {
    codec: Arc<C>,
    pool: rayon::ThreadPool,
    background: Background,
    next_id: u64,
    in_flight: usize,
    completed_tx: Sender<Completion>,
    completed_rx: Receiver<Completion>,
}

impl Processor<RustCodec> {
    /// Processor backed by the `image` crate codec.
    pub fn new(config: &ProcessorConfig) -> Result<Self, ProcessorError> {
        Self::with_codec(RustCodec::new(), config)
    }
}

impl<C: ImageCodec + 'static> Processor<C> {
    pub fn with_codec(codec: C, config: &ProcessorConfig) -> Result<Self, ProcessorError> {
        config.validate()?;
        // Codec tables are built before any job can reach a worker
        imaging::init();

        let threads = effective_threads(&config.workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("thumbwork-{i}"))
            .build()?;
        tracing::debug!(threads, "worker pool started");

        let (completed_tx, completed_rx) = crossbeam_channel::unbounded();
        Ok(Self {
            codec: Arc::new(codec),
            pool,
            background: config.background(),
            next_id: 0,
            in_flight: 0,
            completed_tx,
            completed_rx,
        })
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Jobs dispatched whose outcome has not been delivered yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn resize(
        &mut self,
        options: ResizeOptions,
        sink: impl FnOnce(JobOutcome) + Send + 'static,
    ) -> Result<JobId, ValidationError> {
        let request = options.into_request()?;
        Ok(self.submit(request, sink))
    }

    pub fn thumbnail(
        &mut self,
        options: ThumbnailOptions,
        sink: impl FnOnce(JobOutcome) + Send + 'static,
    ) -> Result<JobId, ValidationError> {
        let request = options.into_request()?;
        Ok(self.submit(request, sink))
    }

    pub fn rotate(
        &mut self,
        options: RotateOptions,
        sink: impl FnOnce(JobOutcome) + Send + 'static,
    ) -> Result<JobId, ValidationError> {
        let request = options.into_request()?;
        Ok(self.submit(request, sink))
    }

    /// Dispatch an already validated request. Never blocks.
    pub fn submit(
        &mut self,
        request: TransformRequest,
        sink: impl FnOnce(JobOutcome) + Send + 'static,
    ) -> JobId {
        self.next_id += 1;
        let id = JobId(self.next_id);
        tracing::debug!(job = %id, mode = %request.mode(), "job dispatched");

        let job = Job {
            id,
            request,
            sink: Box::new(sink),
        };
        let codec = Arc::clone(&self.codec);
        let background = self.background;
        let completed = self.completed_tx.clone();
        self.in_flight += 1;

        self.pool.spawn(move || {
            let outcome = job::execute(job.id, codec.as_ref(), &job.request, background);
            // Fails only after a drop during unwinding; the sink goes with it
            let _ = completed.send(Completion { job, outcome });
        });
        id
    }

    /// Deliver every outcome that is ready, without blocking.
    ///
    /// Returns the number of sinks called.
    pub fn poll(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(completion) = self.completed_rx.try_recv() {
            self.deliver(completion);
            delivered += 1;
        }
        delivered
    }

    /// Block until every dispatched job has been delivered.
    pub fn wait(&mut self) {
        while self.in_flight > 0 {
            match self.completed_rx.recv() {
                Ok(completion) => self.deliver(completion),
                Err(_) => break,
            }
        }
    }

    fn deliver(&mut self, completion: Completion) {
        self.in_flight -= 1;
        let Completion { job, outcome } = completion;
        let Job { id, request, sink } = job;

        let outcome = match outcome {
            Ok(result) => Ok(TransformOutput::from_result(request.mode(), result)),
            Err(failure) => {
                tracing::warn!(
                    job = %id,
                    kind = %failure.kind,
                    detail = %failure.detail,
                    "image processing failed"
                );
                Err(TransformError::new(failure.kind))
            }
        };
        drop(request);

        // Bookkeeping is done; a panicking sink goes straight to our caller
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || sink(outcome))) {
            tracing::error!(job = %id, "completion sink panicked");
            panic::resume_unwind(payload);
        }
    }
}

impl<C: ImageCodec + 'static> Drop for Processor<C> {
    fn drop(&mut self) {
        // Sinks are caller code; never run them while unwinding
        if !std::thread::panicking() {
            self.wait();
        }
    }
}
