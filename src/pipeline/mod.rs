//! Top-level driver assembling and running the whole pipeline.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::SignatureSettings;
use crate::error::SignatureError;
use crate::pool::MemBlockPool;
use crate::queue::BoundedQueue;
use crate::stream::{ReadStream, WriteStream};
use crate::transform::{Md5SegmentStrategy, TransformEngine};

/// Computes the segmented signature of `settings.source()` and writes it to
/// `settings.result()`.
///
/// Three units of execution cooperate: a background reader filling the input
/// queue, the calling thread hashing segments, and a background writer
/// draining the output queue. On every exit path both background streams are
/// stopped and joined before this function returns, and on failure the
/// partially written result file is removed.
///
/// # Errors
///
/// Returns [`SignatureError::InvalidConfig`] before any I/O if the settings
/// are invalid, or the first [`SignatureError::Io`] surfacing from any
/// pipeline stage. After an error the result file does not exist.
///
/// # Example
///
/// ```no_run
/// use filesig::{SignatureSettings, generate_signature};
///
/// let settings = SignatureSettings::new("data.bin", "data.sig");
/// generate_signature(&settings)?;
/// # Ok::<(), filesig::SignatureError>(())
/// ```
pub fn generate_signature(settings: &SignatureSettings) -> Result<(), SignatureError> {
    settings.validate()?;
    info!(
        source = %settings.source().display(),
        result = %settings.result().display(),
        sample_size = settings.sample_size(),
        io_block_size = settings.io_block_size(),
        max_buffer_size = settings.max_buffer_size(),
        "starting signature generation"
    );

    // Sized so the reader never waits on the pool while a full queue of
    // blocks plus one in-flight block circulate.
    let pool = Arc::new(MemBlockPool::new(
        settings.max_buffer_size() / settings.io_block_size() + 1,
    ));
    let input = Arc::new(BoundedQueue::new(settings.max_buffer_size(), "input"));
    let output = Arc::new(BoundedQueue::new(settings.max_buffer_size(), "output"));

    let mut reader = ReadStream::open(
        settings.source(),
        input.clone(),
        pool.clone(),
        settings.io_block_size(),
    )?;
    let mut writer = WriteStream::create(settings.result(), output.clone(), settings.io_block_size())?;

    let strategy = Md5SegmentStrategy::new(output.clone(), pool, settings.sample_size());
    let mut engine = TransformEngine::new(input, output, strategy);

    let run = engine.run().and_then(|()| writer.wait_close());
    match run {
        Ok(()) => {
            info!(
                total_bytes = engine.total_bytes(),
                segments = engine.strategy().segments_emitted(),
                "signature generation finished"
            );
            Ok(())
        }
        Err(err) => {
            error!(%err, "signature generation failed, unwinding pipeline");
            // Dropping the streams joins their threads; the writer's drop
            // removes the partial result file.
            reader.stop();
            writer.cancel();
            Err(err)
        }
    }
}
