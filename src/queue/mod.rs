//! Bounded FIFO queues connecting the pipeline stages.
//!
//! A stream queue carries owned byte blocks from a producer stage to a
//! consumer stage and doubles as the channel for end-of-stream and error
//! signaling: a producer that fails pushes its error into the queue, and the
//! stored error is re-delivered to both sides from then on.
//!
//! - [`StreamQueue`] - The push/pop/signal capability, as a trait so tests can
//!   substitute a fake queue for the streams
//! - [`BoundedQueue`] - Byte-size-bounded implementation with blocking
//!   producers and consumers

mod bounded;

use std::sync::Arc;

use bytes::BytesMut;

use crate::error::SignatureError;

pub use bounded::BoundedQueue;
pub(crate) use bounded::WAIT_TIMEOUT;

/// A thread-safe, byte-size-bounded FIFO of blocks with end-of-stream and
/// error signaling.
///
/// Ordering is FIFO per queue. Once end-of-stream is set no further blocks
/// are accepted, but blocks already queued remain poppable. Once an error is
/// recorded, end-of-stream is implied; every later `push` fails with the
/// stored error immediately and every `pop` delivers it once the queue has
/// drained.
pub trait StreamQueue: Send + Sync {
    /// Appends a block, blocking while the queue's byte budget is exhausted.
    ///
    /// When `is_end_of_stream` is true the end-of-stream flag is set together
    /// with the append, closing the queue to further pushes.
    ///
    /// # Errors
    ///
    /// Fails without blocking if an error was already recorded, if
    /// end-of-stream is already set, or if the block alone exceeds the queue's
    /// byte budget.
    fn push(&self, block: BytesMut, is_end_of_stream: bool) -> Result<(), SignatureError>;

    /// Records an error and closes the queue's input.
    ///
    /// Must be the last push-family call made by a producer. The first
    /// recorded error wins; later calls only re-assert end-of-stream.
    fn push_error(&self, code: i32, message: String);

    /// Idempotently sets end-of-stream without recording an error, waking any
    /// waiting producer and consumer.
    fn stop_incomes(&self);

    /// Returns true iff end-of-stream is set and no blocks remain queued.
    ///
    /// Once true this never reverts to false.
    fn is_input_stopped(&self) -> bool;

    /// Removes and returns the oldest block.
    ///
    /// Blocks while the queue is empty and input is still open. Returns
    /// `Ok(None)` once end-of-stream is set and the queue has drained.
    ///
    /// # Errors
    ///
    /// Delivers the stored error once the queue has drained after a
    /// `push_error`.
    fn pop(&self) -> Result<Option<BytesMut>, SignatureError>;
}

/// A shared handle to a stream queue.
pub type SharedQueue = Arc<dyn StreamQueue>;
