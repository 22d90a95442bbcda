//! Byte-size-bounded blocking queue implementation.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use bytes::BytesMut;
use tracing::{debug, warn};

use crate::error::SignatureError;
use crate::queue::StreamQueue;

/// Upper bound on one condition-variable wait. A timeout is not a failure:
/// it produces a diagnostic log and the wait is retried with re-evaluated
/// predicates.
pub(crate) const WAIT_TIMEOUT: Duration = Duration::from_secs(15);

/// The error stored in a queue, re-delivered to both of its ends.
#[derive(Debug, Clone)]
struct Fault {
    code: i32,
    message: String,
}

impl Fault {
    fn to_error(&self) -> SignatureError {
        SignatureError::Io {
            code: self.code,
            message: self.message.clone(),
        }
    }
}

/// Queue contents and derived state, all mutated under one mutex.
#[derive(Debug, Default)]
struct Inner {
    blocks: VecDeque<BytesMut>,
    bytes: usize,
    fault: Option<Fault>,
}

/// A byte-size-bounded FIFO of blocks, the synchronization backbone of the
/// pipeline.
///
/// Producers block in [`StreamQueue::push`] while appending a block would
/// exceed the configured byte budget; consumers block in [`StreamQueue::pop`]
/// while the queue is empty and input is still open. End-of-stream and failure
/// state are mirrored in atomics so both can be observed without the lock as a
/// fast-path short-circuit; every decision is re-validated under the lock
/// before acting.
///
/// # Example
///
/// ```
/// use bytes::BytesMut;
/// use filesig::{BoundedQueue, StreamQueue};
///
/// let queue = BoundedQueue::new(1024, "input");
/// queue.push(BytesMut::from(&b"abc"[..]), false)?;
/// queue.stop_incomes();
///
/// assert_eq!(queue.pop()?.as_deref(), Some(&b"abc"[..]));
/// assert_eq!(queue.pop()?, None);
/// assert!(queue.is_input_stopped());
/// # Ok::<(), filesig::SignatureError>(())
/// ```
#[derive(Debug)]
pub struct BoundedQueue {
    /// Queue name recorded in log events.
    name: &'static str,
    /// Maximum cumulative size of queued blocks, in bytes.
    max_bytes: usize,
    inner: Mutex<Inner>,
    /// Mirrors of locked state for lock-free fast paths. Both are only ever
    /// written while `inner` is held.
    eof: AtomicBool,
    failed: AtomicBool,
    queued_bytes: AtomicUsize,
    /// Signaled on push and on stop; wakes waiting poppers.
    items: Condvar,
    /// Signaled on pop and on stop; wakes waiting pushers.
    space: Condvar,
}

impl BoundedQueue {
    /// Creates a queue holding at most `max_bytes` of queued block data.
    ///
    /// `name` identifies the queue in log events.
    pub fn new(max_bytes: usize, name: &'static str) -> Self {
        Self {
            name,
            max_bytes,
            inner: Mutex::new(Inner::default()),
            eof: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            queued_bytes: AtomicUsize::new(0),
            items: Condvar::new(),
            space: Condvar::new(),
        }
    }

    /// Returns the cumulative size of the queued blocks, in bytes.
    pub fn queued_bytes(&self) -> usize {
        self.queued_bytes.load(Ordering::Acquire)
    }

    /// Returns the queue's byte budget.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    // A poisoned mutex still yields usable data; a panic elsewhere must not
    // wedge the pipeline's teardown.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StreamQueue for BoundedQueue {
    fn push(&self, block: BytesMut, is_end_of_stream: bool) -> Result<(), SignatureError> {
        if block.is_empty() {
            if is_end_of_stream {
                self.stop_incomes();
            } else {
                warn!(queue = self.name, "empty block pushed, ignoring");
            }
            return Ok(());
        }

        let size = block.len();
        if size > self.max_bytes {
            return Err(SignatureError::BlockTooLarge {
                actual: size,
                max: self.max_bytes,
            });
        }

        // Fast path: a closed queue refuses the push without waiting for the
        // lock. Re-checked under the lock below.
        if self.failed.load(Ordering::Acquire) {
            let inner = self.lock();
            if let Some(fault) = &inner.fault {
                return Err(fault.to_error());
            }
        }
        if self.eof.load(Ordering::Acquire) {
            return Err(SignatureError::StreamClosed);
        }

        let mut inner = self.lock();
        let mut attempts = 0u32;
        loop {
            if let Some(fault) = &inner.fault {
                return Err(fault.to_error());
            }
            if self.eof.load(Ordering::Acquire) {
                return Err(SignatureError::StreamClosed);
            }

            if inner.bytes + size <= self.max_bytes {
                inner.blocks.push_back(block);
                inner.bytes += size;
                self.queued_bytes.store(inner.bytes, Ordering::Release);
                if is_end_of_stream {
                    self.eof.store(true, Ordering::Release);
                }
                let queued = inner.bytes;
                drop(inner);
                debug!(
                    queue = self.name,
                    size,
                    queued,
                    eos = is_end_of_stream,
                    "block queued"
                );
                self.items.notify_one();
                return Ok(());
            }

            let (guard, timeout) = self
                .space
                .wait_timeout_while(inner, WAIT_TIMEOUT, |q| {
                    q.fault.is_none()
                        && !self.eof.load(Ordering::Acquire)
                        && q.bytes + size > self.max_bytes
                })
                .unwrap_or_else(|e| e.into_inner());
            inner = guard;
            if timeout.timed_out() {
                attempts += 1;
                warn!(
                    queue = self.name,
                    size,
                    queued = inner.bytes,
                    attempts,
                    "queue full, still waiting for space"
                );
            }
        }
    }

    fn push_error(&self, code: i32, message: String) {
        warn!(queue = self.name, code, %message, "error recorded in queue");
        {
            let mut inner = self.lock();
            if inner.fault.is_none() {
                inner.fault = Some(Fault { code, message });
                self.failed.store(true, Ordering::Release);
            }
            self.eof.store(true, Ordering::Release);
        }
        self.items.notify_all();
        self.space.notify_all();
    }

    fn stop_incomes(&self) {
        let already = {
            // eof only transitions while the lock is held, so waiters cannot
            // miss the flag between their predicate check and their wait.
            let _inner = self.lock();
            self.eof.swap(true, Ordering::AcqRel)
        };
        if !already {
            debug!(queue = self.name, "input stopped");
            self.items.notify_all();
            self.space.notify_all();
        }
    }

    fn is_input_stopped(&self) -> bool {
        self.eof.load(Ordering::Acquire) && self.queued_bytes.load(Ordering::Acquire) == 0
    }

    fn pop(&self) -> Result<Option<BytesMut>, SignatureError> {
        let mut inner = self.lock();
        loop {
            if let Some(block) = inner.blocks.pop_front() {
                inner.bytes -= block.len();
                self.queued_bytes.store(inner.bytes, Ordering::Release);
                let queued = inner.bytes;
                drop(inner);
                debug!(queue = self.name, size = block.len(), queued, "block popped");
                self.space.notify_one();
                return Ok(Some(block));
            }

            if self.eof.load(Ordering::Acquire) {
                if let Some(fault) = &inner.fault {
                    debug!(
                        queue = self.name,
                        code = fault.code,
                        "delivering stored error on pop"
                    );
                    return Err(fault.to_error());
                }
                return Ok(None);
            }

            let (guard, timeout) = self
                .items
                .wait_timeout_while(inner, WAIT_TIMEOUT, |q| {
                    q.blocks.is_empty() && !self.eof.load(Ordering::Acquire)
                })
                .unwrap_or_else(|e| e.into_inner());
            inner = guard;
            if timeout.timed_out() {
                warn!(queue = self.name, "queue empty, still waiting for a block");
            }
        }
    }
}
