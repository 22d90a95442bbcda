//! Pipeline driver: input queue → strategy → output queue.

use tracing::{debug, error, info};

use crate::error::SignatureError;
use crate::queue::SharedQueue;
use crate::transform::TransformStrategy;

/// Drives the pipeline to completion on the calling thread.
///
/// Pops blocks from the input queue and feeds them to the strategy until the
/// input queue is drained and closed, then flushes the strategy and closes
/// the output queue. The engine is a pure orchestrator: on any error it stops
/// the input queue's intake, forwards the error into the output queue, and
/// returns it to the caller without retrying.
pub struct TransformEngine<S> {
    input: SharedQueue,
    output: SharedQueue,
    strategy: S,
    total_bytes: u64,
}

impl<S: TransformStrategy> TransformEngine<S> {
    /// Creates an engine over the two queues with an injected strategy.
    pub fn new(input: SharedQueue, output: SharedQueue, strategy: S) -> Self {
        Self {
            input,
            output,
            strategy,
            total_bytes: 0,
        }
    }

    /// Returns the number of input bytes transformed so far.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Returns the injected strategy.
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Runs the transformation until the input stream ends or fails.
    ///
    /// # Errors
    ///
    /// Returns the first error surfacing from the input queue or the
    /// strategy, after propagating it into the output queue.
    pub fn run(&mut self) -> Result<(), SignatureError> {
        match self.drive() {
            Ok(()) => {
                info!(total_bytes = self.total_bytes, "transformation finished");
                Ok(())
            }
            Err(err) => {
                error!(%err, total_bytes = self.total_bytes, "transformation stopped by error");
                self.input.stop_incomes();
                self.output.push_error(err.os_code(), err.to_string());
                Err(err)
            }
        }
    }

    fn drive(&mut self) -> Result<(), SignatureError> {
        while !self.input.is_input_stopped() {
            match self.input.pop()? {
                Some(block) => {
                    self.total_bytes += block.len() as u64;
                    self.strategy.transform(block)?;
                }
                // The queue was momentarily empty but not yet terminal;
                // re-check the loop condition.
                None => {
                    debug!("no block available, re-checking input state");
                    continue;
                }
            }
        }
        // End-of-stream can be flagged by a stored error after our last data
        // pop; a final pop surfaces it instead of dumping a truncated result.
        self.input.pop()?;
        self.strategy.dump()?;
        self.output.stop_incomes();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::MemBlockPool;
    use crate::queue::{BoundedQueue, StreamQueue};
    use crate::transform::{Md5SegmentStrategy, SegmentDigest};
    use bytes::BytesMut;
    use std::sync::Arc;

    struct Rig {
        input: Arc<BoundedQueue>,
        output: Arc<BoundedQueue>,
        engine: TransformEngine<Md5SegmentStrategy>,
    }

    fn rig(sample_size: usize) -> Rig {
        let input = Arc::new(BoundedQueue::new(1024, "input"));
        let output = Arc::new(BoundedQueue::new(1024, "output"));
        let pool = Arc::new(MemBlockPool::new(4));
        let strategy = Md5SegmentStrategy::new(output.clone(), pool, sample_size);
        let engine = TransformEngine::new(input.clone(), output.clone(), strategy);
        Rig {
            input,
            output,
            engine,
        }
    }

    fn drain(out: &BoundedQueue) -> Vec<SegmentDigest> {
        let mut digests = Vec::new();
        while let Some(block) = out.pop().unwrap() {
            digests.push(SegmentDigest::from_slice(&block).unwrap());
        }
        digests
    }

    #[test]
    fn test_drains_input_and_closes_output() {
        let mut rig = rig(4);
        rig.input.push(BytesMut::from(&b"abcdef"[..]), false).unwrap();
        rig.input.push(BytesMut::from(&b"gh"[..]), true).unwrap();

        rig.engine.run().unwrap();
        assert_eq!(rig.engine.total_bytes(), 8);
        assert_eq!(rig.engine.strategy().segments_emitted(), 2);

        let digests = drain(&rig.output);
        assert_eq!(
            digests,
            vec![SegmentDigest::of(b"abcd"), SegmentDigest::of(b"efgh")]
        );
        assert!(rig.output.is_input_stopped());
    }

    #[test]
    fn test_empty_input_emits_nothing() {
        let mut rig = rig(4);
        rig.input.stop_incomes();

        rig.engine.run().unwrap();
        assert_eq!(rig.engine.total_bytes(), 0);
        assert!(drain(&rig.output).is_empty());
        assert!(rig.output.is_input_stopped());
    }

    #[test]
    fn test_input_error_propagates_to_output() {
        let mut rig = rig(4);
        rig.input.push(BytesMut::from(&b"abcd"[..]), false).unwrap();
        rig.input.push_error(5, "device failed".into());

        let err = rig.engine.run().unwrap_err();
        assert_eq!(err.os_code(), 5);

        // The digest emitted before the failure drains first, then the
        // forwarded error reaches the writer side.
        assert!(rig.output.pop().unwrap().is_some());
        let err = rig.output.pop().unwrap_err();
        assert_eq!(err.os_code(), 5);
        assert!(err.to_string().contains("device failed"));
    }

    #[test]
    fn test_error_after_last_block_skips_partial_dump() {
        let mut rig = rig(8);
        rig.input.push(BytesMut::from(&b"abcd"[..]), false).unwrap();
        rig.input.push_error(5, "device failed".into());

        let err = rig.engine.run().unwrap_err();
        assert_eq!(err.os_code(), 5);

        // The half-filled segment accumulated before the failure is not
        // flushed as a digest; the writer side only sees the error.
        assert_eq!(rig.engine.strategy().segments_emitted(), 0);
        let err = rig.output.pop().unwrap_err();
        assert_eq!(err.os_code(), 5);
    }

    #[test]
    fn test_closed_output_stops_input_intake() {
        let mut rig = rig(1);
        rig.output.stop_incomes();
        rig.input.push(BytesMut::from(&b"ab"[..]), true).unwrap();

        assert!(rig.engine.run().is_err());
        assert!(rig.input.is_input_stopped());
    }
}
