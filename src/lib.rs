//! # thumbwork
//!
//! Offload image resize, thumbnail and rotate jobs to a worker pool and get
//! each result back exactly once, on the thread that asked for it.
//!
//! # Architecture
//!
//! ```text
//! ResizeOptions / ThumbnailOptions / RotateOptions
//!        │ validate (sync)
//!        ▼
//! TransformRequest ──→ Processor ──spawn──→ worker: JobExecutor
//!                          ▲                   │ read → resolve → scale/crop → encode
//!                          └──── channel ──────┘
//!                      poll() / wait(): sink(Result<TransformOutput, TransformError>)
//! ```
//!
//! - Validation errors come back from the submit call; nothing is dispatched.
//! - Each job opens its own codec session on a worker and runs to exactly one
//!   terminal state.
//! - The outcome is delivered on the issuing thread, after which everything
//!   the request owned is dropped.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`request`] | Option structs, validation, the immutable [`TransformRequest`] |
//! | [`imaging`] | Geometry resolver, codec traits, the `image`-backed codec |
//! | [`job`] | Per-job state machine run on a worker |
//! | [`dispatch`] | [`Processor`]: worker pool, completion delivery |
//! | [`error`] | Validation errors and the opaque [`TransformError`] |
//! | [`config`] | `thumbwork.toml` loading and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Example
//!
//! ```no_run
//! use thumbwork::{Processor, ProcessorConfig, ResizeOptions, oneshot};
//! use std::path::PathBuf;
//!
//! let mut processor = Processor::new(&ProcessorConfig::default()).unwrap();
//! let (sink, done) = oneshot();
//! processor
//!     .resize(
//!         ResizeOptions {
//!             width: 300,
//!             height: 300,
//!             autocrop: true,
//!             ..ResizeOptions::new(PathBuf::from("dawn.jpg"))
//!         },
//!         sink,
//!     )
//!     .unwrap();
//! processor.wait();
//! let output = done.recv().unwrap().unwrap();
//! assert_eq!((output.info.width, output.info.height), (300, 300));
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod imaging;
pub mod job;
pub mod output;
pub mod request;

pub use config::ProcessorConfig;
pub use dispatch::{JobOutcome, Processor, ProcessorError, TransformInfo, TransformOutput, oneshot};
pub use error::{ErrorKind, TransformError, ValidationError};
pub use job::JobId;
pub use request::{ImageSource, ResizeOptions, RotateOptions, ThumbnailOptions, TransformRequest};
