//! Background writer draining the output queue into the result file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, error, info, warn};

use crate::error::SignatureError;
use crate::queue::{SharedQueue, StreamQueue, WAIT_TIMEOUT};

/// A background task that pops blocks from a queue and sequentially writes
/// them to a file, flushing once per accumulated I/O block.
///
/// A write or flush failure is pushed back into the queue as an error, so the
/// producing side observes it on its next push. [`WriteStream::wait_close`]
/// blocks until the background loop has finished and raises any recorded
/// error.
///
/// Teardown contract: if the stream was never cleanly closed, dropping it
/// cancels the loop, closes the queue's input, joins the thread, and removes
/// the partially written file. Partial output is never left behind to be
/// mistaken for a complete signature.
pub struct WriteStream {
    path: PathBuf,
    queue: SharedQueue,
    stop: Arc<AtomicBool>,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    closed: bool,
}

/// State the background loop reports back through.
#[derive(Debug, Default)]
struct LoopState {
    done: bool,
    fault: Option<SignatureError>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<LoopState>,
    finished: Condvar,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WriteStream {
    /// Opens `path` for binary write and starts the background write loop.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Io`] naming the path and the OS error code
    /// if the file cannot be created.
    pub fn create(
        path: &Path,
        queue: SharedQueue,
        block_size: usize,
    ) -> Result<Self, SignatureError> {
        let file = File::create(path).map_err(|e| {
            let err = SignatureError::io(
                format_args!("can't open file for write {}", path.display()),
                &e,
            );
            error!(%err, "write stream failed to open result");
            err
        })?;
        info!(path = %path.display(), block_size, "write stream opened");

        let stop = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(Shared::default());
        let handle = {
            let queue = Arc::clone(&queue);
            let stop = Arc::clone(&stop);
            let shared = Arc::clone(&shared);
            let label = path.display().to_string();
            std::thread::spawn(move || {
                let result = write_loop(file, &label, &*queue, block_size, &stop);
                let mut state = shared.lock();
                state.done = true;
                state.fault = result.err();
                drop(state);
                shared.finished.notify_all();
            })
        };

        Ok(Self {
            path: path.to_path_buf(),
            queue,
            stop,
            shared,
            handle: Some(handle),
            closed: false,
        })
    }

    /// Blocks until the background loop has finished, then raises any error
    /// it recorded.
    ///
    /// On success the stream counts as cleanly closed and the result file is
    /// kept on drop.
    ///
    /// # Errors
    ///
    /// Returns the error the background loop stopped on, if any.
    pub fn wait_close(&mut self) -> Result<(), SignatureError> {
        let mut state = self.shared.lock();
        while !state.done {
            let (guard, timeout) = self
                .shared
                .finished
                .wait_timeout_while(state, WAIT_TIMEOUT, |s| !s.done)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
            if timeout.timed_out() {
                warn!(path = %self.path.display(), "still waiting for write stream to finish");
            }
        }
        match &state.fault {
            Some(err) => Err(err.clone()),
            None => {
                drop(state);
                self.closed = true;
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        error!("write stream thread panicked");
                    }
                }
                Ok(())
            }
        }
    }

    /// Stops the background loop promptly by flagging a stop and injecting an
    /// error into the queue.
    ///
    /// Used for explicit cancellation; also the safety net run on drop when
    /// the stream was never cleanly closed.
    pub fn cancel(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.queue
            .push_error(0, "write stream cancelled".to_string());
    }
}

impl Drop for WriteStream {
    fn drop(&mut self) {
        if !self.closed {
            self.cancel();
        }
        self.queue.stop_incomes();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("write stream thread panicked");
            }
        }
        if !self.closed {
            warn!(path = %self.path.display(), "removing incomplete result file");
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "could not remove result file");
            }
        }
    }
}

fn write_loop(
    file: File,
    label: &str,
    queue: &dyn StreamQueue,
    block_size: usize,
    stop: &AtomicBool,
) -> Result<(), SignatureError> {
    let mut file = BufWriter::new(file);
    let mut total_written = 0u64;
    let mut not_flushed = 0usize;

    loop {
        if stop.load(Ordering::Acquire) {
            debug!(total_written, "write loop stopped by request");
            return Err(SignatureError::Io {
                code: 0,
                message: "write stream cancelled".to_string(),
            });
        }
        if queue.is_input_stopped() {
            break;
        }

        let block = match queue.pop() {
            Ok(Some(block)) => block,
            // Momentarily empty but not yet terminal; re-check and pop again.
            Ok(None) => continue,
            Err(err) => {
                error!(%err, total_written, "output queue delivered an error");
                return Err(err);
            }
        };

        if let Err(e) = file.write_all(&block) {
            let err = SignatureError::io(format_args!("failed to write {label}"), &e);
            error!(%err, total_written, "write stream failed");
            queue.push_error(err.os_code(), err.to_string());
            return Err(err);
        }
        total_written += block.len() as u64;
        not_flushed += block.len();

        if not_flushed >= block_size {
            flush(&mut file, label, queue, total_written)?;
            not_flushed = 0;
        }
    }

    // The queue can drain and stop between the error being stored and our
    // check above; a final pop surfaces any such error instead of finishing
    // clean.
    if let Err(err) = queue.pop() {
        error!(%err, total_written, "output queue stopped with a stored error");
        return Err(err);
    }

    flush(&mut file, label, queue, total_written)?;
    info!(total_written, "write stream finished");
    Ok(())
}

fn flush(
    file: &mut BufWriter<File>,
    label: &str,
    queue: &dyn StreamQueue,
    total_written: u64,
) -> Result<(), SignatureError> {
    file.flush().map_err(|e| {
        let err = SignatureError::io(format_args!("failed to flush {label}"), &e);
        error!(%err, total_written, "flush failed");
        queue.push_error(err.os_code(), err.to_string());
        err
    })
}
