//! filesig
//!
//! Segmented MD5 file signatures for Rust.
//!
//! `filesig` streams a file's bytes through a three-stage pipeline and writes
//! one 16-byte MD5 digest per fixed-size sample segment to a result file:
//!
//! ```text
//! source file -> ReadStream -> input queue -> TransformEngine
//!                  -> Md5SegmentStrategy -> output queue -> WriteStream -> result file
//! ```
//!
//! A background reader and a background writer overlap disk I/O with hashing
//! on the calling thread; two byte-size-bounded queues keep memory use
//! capped, and a shared block pool recycles read buffers instead of
//! reallocating them. Any stage that fails injects its error into the nearest
//! queue, which unwinds the whole pipeline, joins both background threads,
//! and removes the partially written result file.
//!
//! The crate intentionally:
//! - does NOT parse command-line options (callers construct [`SignatureSettings`])
//! - does NOT checkpoint or resume partial signatures
//! - does NOT hash segments in parallel
//!
//! # Example
//!
//! ```no_run
//! use filesig::{SignatureSettings, generate_signature};
//!
//! fn main() -> Result<(), filesig::SignatureError> {
//!     let settings = SignatureSettings::new("data.bin", "data.sig")
//!         .with_sample_size(1024 * 1024);
//!     settings.validate()?;
//!     generate_signature(&settings)
//! }
//! ```
//!
//! # Output format
//!
//! The result file is a flat concatenation of 16-byte digest blocks in file
//! order, with no header and no segment metadata. The final segment may be
//! shorter than the configured sample size and still yields a full-size
//! digest. An empty source yields an empty result file.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod pipeline;
mod pool;
mod queue;
mod stream;
mod transform;

//
// Public surface (intentionally tiny)
//

pub use config::{
    DEFAULT_IO_BLOCK_SIZE, DEFAULT_MAX_BUFFER_SIZE, DEFAULT_SAMPLE_SIZE, SignatureSettings,
};
pub use error::SignatureError;
pub use pipeline::generate_signature;
pub use pool::{MemBlockPool, MemPool, SharedPool};
pub use queue::{BoundedQueue, SharedQueue, StreamQueue};
pub use stream::{ReadStream, WriteStream};
pub use transform::{Md5SegmentStrategy, SegmentDigest, TransformEngine, TransformStrategy};
