//! MD5 segment-digest strategy.

use bytes::BytesMut;
use md5::{Digest, Md5};
use tracing::{debug, info};

use crate::error::SignatureError;
use crate::pool::SharedPool;
use crate::queue::SharedQueue;
use crate::transform::{SegmentDigest, TransformStrategy};

/// The shipped transformation strategy: accumulates bytes into a rolling MD5
/// context and pushes one [`SegmentDigest`]-sized block into the output queue
/// every `sample_size` bytes.
///
/// One incoming block may complete zero, one, or several segments. After a
/// block's bytes are consumed its storage goes back to the memory pool, so
/// the block the reader allocated cycles straight back to the reader.
pub struct Md5SegmentStrategy {
    out: SharedQueue,
    pool: SharedPool,
    sample_size: usize,
    context: Md5,
    /// Bytes fed to `context` since the last emit. Always below `sample_size`
    /// outside `transform`.
    accumulated: usize,
    segments_emitted: u64,
}

impl Md5SegmentStrategy {
    /// Creates a strategy emitting one digest per `sample_size` bytes into
    /// `out`, recycling consumed blocks through `pool`.
    pub fn new(out: SharedQueue, pool: SharedPool, sample_size: usize) -> Self {
        Self {
            out,
            pool,
            sample_size,
            context: Md5::new(),
            accumulated: 0,
            segments_emitted: 0,
        }
    }

    /// Returns the number of segment digests emitted so far.
    pub fn segments_emitted(&self) -> u64 {
        self.segments_emitted
    }

    /// Finalizes the current segment, pushes its digest, and starts a fresh
    /// context.
    fn emit(&mut self) -> Result<(), SignatureError> {
        let digest: [u8; SegmentDigest::SIZE] = self.context.finalize_reset().into();
        self.accumulated = 0;
        self.segments_emitted += 1;
        debug!(
            segment = self.segments_emitted,
            digest = %SegmentDigest::new(digest),
            "segment digest emitted"
        );
        self.out.push(BytesMut::from(&digest[..]), false)
    }
}

impl TransformStrategy for Md5SegmentStrategy {
    fn transform(&mut self, block: BytesMut) -> Result<(), SignatureError> {
        let mut rest: &[u8] = &block;
        while !rest.is_empty() {
            let wanted = self.sample_size - self.accumulated;
            if rest.len() < wanted {
                self.context.update(rest);
                self.accumulated += rest.len();
                break;
            }
            let (head, tail) = rest.split_at(wanted);
            self.context.update(head);
            rest = tail;
            self.emit()?;
        }
        self.pool.release(block);
        Ok(())
    }

    fn dump(&mut self) -> Result<(), SignatureError> {
        if self.accumulated == 0 {
            return Ok(());
        }
        info!(
            accumulated = self.accumulated,
            sample_size = self.sample_size,
            "dumping final short segment"
        );
        self.emit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::MemBlockPool;
    use crate::queue::{BoundedQueue, StreamQueue};
    use std::sync::Arc;

    fn strategy(sample_size: usize) -> (Md5SegmentStrategy, Arc<BoundedQueue>, Arc<MemBlockPool>) {
        let out = Arc::new(BoundedQueue::new(1024, "output"));
        let pool = Arc::new(MemBlockPool::new(4));
        let strategy = Md5SegmentStrategy::new(out.clone(), pool.clone(), sample_size);
        (strategy, out, pool)
    }

    fn drain(out: &BoundedQueue) -> Vec<SegmentDigest> {
        out.stop_incomes();
        let mut digests = Vec::new();
        while let Some(block) = out.pop().unwrap() {
            digests.push(SegmentDigest::from_slice(&block).expect("16-byte digest block"));
        }
        digests
    }

    #[test]
    fn test_one_block_multiple_segments() {
        let (mut strategy, out, _pool) = strategy(4);
        // 10 bytes with a 4-byte segment: two full segments, 2 bytes pending.
        let data = b"abcdefghij";
        strategy.transform(BytesMut::from(&data[..])).unwrap();
        assert_eq!(strategy.segments_emitted(), 2);

        strategy.dump().unwrap();
        assert_eq!(strategy.segments_emitted(), 3);

        let digests = drain(&out);
        assert_eq!(digests[0], SegmentDigest::of(b"abcd"));
        assert_eq!(digests[1], SegmentDigest::of(b"efgh"));
        assert_eq!(digests[2], SegmentDigest::of(b"ij"));
    }

    #[test]
    fn test_segment_spanning_blocks() {
        let (mut strategy, out, _pool) = strategy(8);
        strategy.transform(BytesMut::from(&b"abc"[..])).unwrap();
        strategy.transform(BytesMut::from(&b"defgh"[..])).unwrap();
        assert_eq!(strategy.segments_emitted(), 1);
        strategy.dump().unwrap();

        let digests = drain(&out);
        assert_eq!(digests, vec![SegmentDigest::of(b"abcdefgh")]);
    }

    #[test]
    fn test_block_exactly_one_segment() {
        let (mut strategy, out, _pool) = strategy(4);
        strategy.transform(BytesMut::from(&b"wxyz"[..])).unwrap();
        assert_eq!(strategy.segments_emitted(), 1);

        // Nothing pending, so dump is a no-op.
        strategy.dump().unwrap();
        strategy.dump().unwrap();
        assert_eq!(strategy.segments_emitted(), 1);

        let digests = drain(&out);
        assert_eq!(digests, vec![SegmentDigest::of(b"wxyz")]);
    }

    #[test]
    fn test_dump_without_input_is_noop() {
        let (mut strategy, out, _pool) = strategy(4);
        strategy.dump().unwrap();
        assert_eq!(strategy.segments_emitted(), 0);
        assert!(drain(&out).is_empty());
    }

    #[test]
    fn test_consumed_block_returned_to_pool() {
        let (mut strategy, _out, pool) = strategy(4);
        assert_eq!(pool.spare_count(), 0);
        strategy.transform(BytesMut::from(&b"abcd"[..])).unwrap();
        assert_eq!(pool.spare_count(), 1);
    }

    #[test]
    fn test_closed_output_queue_propagates_error() {
        let (mut strategy, out, _pool) = strategy(2);
        out.stop_incomes();
        assert!(strategy.transform(BytesMut::from(&b"abcd"[..])).is_err());
    }
}
