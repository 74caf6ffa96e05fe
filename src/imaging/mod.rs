//! Image processing: geometry and the codec boundary.
//!
//! | Piece | Where |
//! |---|---|
//! | **Dimension math** | [`geometry::resolve`], pure and codec-free |
//! | **Operation parameters** | [`params`]: quality, fit policy, mode, background |
//! | **Codec boundary** | [`ImageCodec`] / [`CodecSession`] traits |
//! | **Codec** | [`RustCodec`] on the `image` crate |
//! | **Free-angle rotation** | [`rotation`], used by [`RustCodec`] |
//!
//! The job layer only talks to the traits; nothing above this module knows
//! which codec is in use.

pub mod codec;
pub mod geometry;
mod params;
pub mod rotation;
pub mod rust_codec;

pub use codec::{CodecError, CodecSession, ImageCodec};
pub use geometry::{CropBox, Dimensions, GeometryError, ScalePlan, resolve};
pub use params::{Background, FitPolicy, Quality, TransformMode};
pub use rust_codec::{CodecRuntime, RustCodec, init};
