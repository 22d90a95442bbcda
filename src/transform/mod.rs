//! Per-block transformation of the input stream.
//!
//! - [`TransformStrategy`] - The pluggable per-block processor seam
//! - [`Md5SegmentStrategy`] - Shipped strategy: one MD5 digest per sample segment
//! - [`SegmentDigest`] - 16-byte digest of one segment
//! - [`TransformEngine`] - Drives blocks from the input queue through a strategy

mod digest;
mod engine;
mod md5;

use bytes::BytesMut;

use crate::error::SignatureError;

pub use digest::SegmentDigest;
pub use engine::TransformEngine;
pub use md5::Md5SegmentStrategy;

/// A pluggable per-block processor driven by the [`TransformEngine`].
///
/// `transform` consumes each incoming block in stream order; `dump` is called
/// exactly once at end-of-stream to flush whatever the strategy has
/// accumulated.
pub trait TransformStrategy {
    /// Consumes one block of the input stream, taking ownership of its
    /// storage.
    ///
    /// # Errors
    ///
    /// Propagates any failure of the strategy's downstream output.
    fn transform(&mut self, block: BytesMut) -> Result<(), SignatureError>;

    /// Flushes any partially accumulated state at end-of-stream.
    ///
    /// A no-op if nothing has been accumulated since the last emit.
    ///
    /// # Errors
    ///
    /// Propagates any failure of the strategy's downstream output.
    fn dump(&mut self) -> Result<(), SignatureError>;
}
