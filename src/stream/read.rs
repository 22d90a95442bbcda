//! Background reader feeding the input queue.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use tracing::{debug, error, info};

use crate::error::SignatureError;
use crate::pool::{MemPool, SharedPool};
use crate::queue::{SharedQueue, StreamQueue};

/// A background task that sequentially reads a source in fixed-size blocks
/// and pushes them into a queue.
///
/// Read buffers are checked out of the shared block pool, filled from the
/// source, and handed to the queue with their ownership; the final (possibly
/// short) block is pushed flagged as end-of-stream. A read failure is pushed
/// into the queue as an error, interrupted reads are retried in place.
///
/// Dropping the stream stops it: the queue's input is closed and the
/// background thread is joined.
pub struct ReadStream {
    queue: SharedQueue,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReadStream {
    /// Opens `path` for binary read and starts the background read loop.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Io`] naming the path and the OS error code
    /// if the file cannot be opened.
    pub fn open(
        path: &Path,
        queue: SharedQueue,
        pool: SharedPool,
        block_size: usize,
    ) -> Result<Self, SignatureError> {
        let file = File::open(path).map_err(|e| {
            let err = SignatureError::open(path, &e);
            error!(%err, "read stream failed to open source");
            err
        })?;
        info!(path = %path.display(), block_size, "read stream opened");
        Ok(Self::from_reader(
            file,
            path.display().to_string(),
            queue,
            pool,
            block_size,
        ))
    }

    /// Starts the background read loop over an arbitrary reader.
    ///
    /// `label` names the source in log events and error messages. Used by
    /// tests to drive the pipeline from in-memory and failure-injecting
    /// readers.
    pub fn from_reader<R: Read + Send + 'static>(
        reader: R,
        label: impl Into<String>,
        queue: SharedQueue,
        pool: SharedPool,
        block_size: usize,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let queue = Arc::clone(&queue);
            let pool = Arc::clone(&pool);
            let stop = Arc::clone(&stop);
            let label = label.into();
            std::thread::spawn(move || {
                read_loop(reader, &label, &*queue, &*pool, block_size, &stop);
            })
        };
        Self {
            queue,
            stop,
            handle: Some(handle),
        }
    }

    /// Stops the background read and joins its thread. Idempotent; also run
    /// on drop.
    ///
    /// Closes the queue's input so a reader blocked on a full queue observes
    /// the stop instead of stalling.
    pub fn stop(&mut self) {
        if !self.stop.swap(true, Ordering::AcqRel) {
            self.queue.stop_incomes();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("read stream thread panicked");
            }
        }
    }
}

impl Drop for ReadStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_loop<R: Read>(
    mut reader: R,
    label: &str,
    queue: &dyn StreamQueue,
    pool: &dyn MemPool,
    block_size: usize,
    stop: &AtomicBool,
) {
    let mut total_read = 0u64;
    while !stop.load(Ordering::Acquire) {
        let mut block = pool.acquire(block_size);
        let filled = match fill_block(&mut reader, &mut block) {
            Ok(n) => n,
            Err(e) => {
                let err = SignatureError::io(format_args!("failed to read {label}"), &e);
                error!(%err, total_read, "read stream failed");
                queue.push_error(err.os_code(), err.to_string());
                return;
            }
        };
        let at_eof = filled < block_size;
        block.truncate(filled);
        total_read += filled as u64;

        if at_eof {
            if filled > 0 {
                if let Err(err) = queue.push(block, true) {
                    debug!(%err, "input queue refused final block");
                    return;
                }
            } else {
                pool.release(block);
                queue.stop_incomes();
            }
            info!(total_read, "source read to the end");
            return;
        }

        if let Err(err) = queue.push(block, false) {
            debug!(%err, total_read, "input queue refused block, stopping read loop");
            return;
        }
    }
    debug!(total_read, "read loop stopped by request");
}

/// Fills `block` from the reader, retrying interrupted reads in place.
///
/// Returns the number of bytes filled; fewer than `block.len()` means the
/// reader reached its end.
fn fill_block<R: Read>(reader: &mut R, block: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < block.len() {
        match reader.read(&mut block[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::MemBlockPool;
    use crate::queue::{BoundedQueue, StreamQueue};
    use std::io::Cursor;

    fn pipeline(max_bytes: usize) -> (Arc<BoundedQueue>, Arc<MemBlockPool>) {
        (
            Arc::new(BoundedQueue::new(max_bytes, "input")),
            Arc::new(MemBlockPool::new(4)),
        )
    }

    /// A reader that yields some data and then a raw OS error.
    struct FailingReader {
        data: Cursor<Vec<u8>>,
        code: i32,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(std::io::Error::from_raw_os_error(self.code)),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_reads_source_in_blocks() {
        let (queue, pool) = pipeline(1024);
        let data: Vec<u8> = (0..100).map(|i| i as u8).collect();
        let mut stream = ReadStream::from_reader(
            Cursor::new(data.clone()),
            "memory",
            queue.clone(),
            pool,
            32,
        );

        let mut collected = Vec::new();
        loop {
            match queue.pop().unwrap() {
                Some(block) => {
                    assert!(block.len() <= 32);
                    collected.extend_from_slice(&block);
                }
                None => break,
            }
        }
        assert_eq!(collected, data);
        assert!(queue.is_input_stopped());
        stream.stop();
    }

    #[test]
    fn test_source_multiple_of_block_size() {
        let (queue, pool) = pipeline(1024);
        let data = vec![0xCD; 64];
        let _stream =
            ReadStream::from_reader(Cursor::new(data.clone()), "memory", queue.clone(), pool, 32);

        let mut collected = Vec::new();
        while let Some(block) = queue.pop().unwrap() {
            collected.extend_from_slice(&block);
        }
        assert_eq!(collected, data);
    }

    #[test]
    fn test_empty_source_stops_queue_without_blocks() {
        let (queue, pool) = pipeline(1024);
        let _stream =
            ReadStream::from_reader(Cursor::new(Vec::new()), "memory", queue.clone(), pool, 32);

        assert_eq!(queue.pop().unwrap(), None);
        assert!(queue.is_input_stopped());
    }

    #[test]
    fn test_read_error_pushed_into_queue() {
        let (queue, pool) = pipeline(1024);
        let reader = FailingReader {
            data: Cursor::new(vec![0xAB; 10]),
            code: 5,
        };
        let _stream = ReadStream::from_reader(reader, "flaky-device", queue.clone(), pool, 32);

        // The short block read before the failure never reaches the queue:
        // the fill of one I/O block fails as a whole.
        let err = queue.pop().unwrap_err();
        assert_eq!(err.os_code(), 5);
        assert!(err.to_string().contains("flaky-device"));
    }

    #[test]
    fn test_open_missing_file_names_path() {
        let (queue, pool) = pipeline(1024);
        let err = match ReadStream::open(Path::new("/no/such/filesig-source"), queue, pool, 32) {
            Ok(_) => panic!("open must fail"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("/no/such/filesig-source"));
        assert_ne!(err.os_code(), 0);
    }

    #[test]
    fn test_stop_unblocks_full_queue() {
        // Queue admits a single block; the reader will block pushing the second.
        let (queue, pool) = pipeline(32);
        let data = vec![0u8; 32 * 8];
        let mut stream = ReadStream::from_reader(Cursor::new(data), "memory", queue, pool, 32);
        std::thread::sleep(std::time::Duration::from_millis(50));
        stream.stop();
    }
}
