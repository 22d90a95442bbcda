//! Background file streams at the two ends of the pipeline.
//!
//! - [`ReadStream`] - Reads the source file in fixed-size blocks into a queue
//! - [`WriteStream`] - Drains a queue of blocks into the result file

mod read;
mod write;

pub use read::ReadStream;
pub use write::WriteStream;
