//! Spare-block pool shared between the read stream and the strategy.
//!
//! The reader checks blocks out of the pool for every disk read; the hashing
//! strategy returns them once their bytes are consumed. Recycling capacity
//! this way keeps the hot read path free of repeated allocation.
//!
//! - [`MemPool`] - The acquire/release capability
//! - [`MemBlockPool`] - Mutex-guarded implementation with a bounded spare count

use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use tracing::debug;

/// A recycler of fixed-capacity byte blocks.
///
/// `acquire` never blocks and never fails: the pool hands out a spare block
/// (resized to the requested length) or allocates a new one. `release` keeps
/// the block only while the pool holds fewer than its configured maximum;
/// extra blocks are dropped.
pub trait MemPool: Send + Sync {
    /// Returns a block of exactly `size` bytes, zero-filled when grown.
    fn acquire(&self, size: usize) -> BytesMut;

    /// Returns a block's storage to the pool, or drops it if the pool is full.
    fn release(&self, block: BytesMut);
}

/// A shared handle to a block pool.
pub type SharedPool = Arc<dyn MemPool>;

/// A bounded pool of spare [`BytesMut`] blocks behind a single mutex.
///
/// The pool caches allocated capacity, not content: a recycled block is
/// resized to the requested length on checkout, so callers always see a block
/// of exactly the size they asked for.
///
/// # Example
///
/// ```
/// use filesig::MemBlockPool;
/// use filesig::MemPool;
///
/// let pool = MemBlockPool::new(4);
/// let block = pool.acquire(1024);
/// assert_eq!(block.len(), 1024);
/// pool.release(block);
/// ```
#[derive(Debug)]
pub struct MemBlockPool {
    max_items: usize,
    blocks: Mutex<Vec<BytesMut>>,
}

impl MemBlockPool {
    /// Creates a pool that keeps at most `max_items` spare blocks.
    pub fn new(max_items: usize) -> Self {
        Self {
            max_items,
            blocks: Mutex::new(Vec::new()),
        }
    }

    /// Returns the number of spare blocks currently held.
    pub fn spare_count(&self) -> usize {
        self.lock().len()
    }

    // A poisoned mutex still yields usable data; a panic elsewhere must not
    // wedge the pipeline's teardown.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<BytesMut>> {
        self.blocks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MemPool for MemBlockPool {
    fn acquire(&self, size: usize) -> BytesMut {
        let spare = self.lock().pop();
        match spare {
            Some(mut block) => {
                if block.len() != size {
                    debug!(from = block.len(), to = size, "resizing pooled block");
                    block.resize(size, 0);
                }
                block
            }
            None => {
                debug!(size, max_items = self.max_items, "pool empty, allocating");
                BytesMut::zeroed(size)
            }
        }
    }

    fn release(&self, block: BytesMut) {
        let mut blocks = self.lock();
        if blocks.len() < self.max_items {
            blocks.push(block);
        } else {
            debug!("pool full, dropping returned block");
        }
    }
}
