//! Configuration for a signature run.
//!
//! - [`SignatureSettings`] - Paths and size parameters, validated before any I/O

use std::path::{Path, PathBuf};

use crate::error::SignatureError;

/// One mebibyte.
pub const MIB: usize = 1024 * 1024;

/// Default sample segment size (1 MiB): one digest is emitted per segment.
pub const DEFAULT_SAMPLE_SIZE: usize = MIB;

/// Default I/O block size (1 MiB): unit of one disk read or write.
pub const DEFAULT_IO_BLOCK_SIZE: usize = MIB;

/// Default per-queue memory ceiling (3 MiB).
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 3 * MIB;

/// Immutable per-run configuration for signature generation.
///
/// Collects the source and result paths together with the three sizes that
/// shape the pipeline: the sample segment size (one digest per segment), the
/// I/O block size (unit of disk reads/writes and queue items), and the
/// maximum number of bytes either queue may hold.
///
/// # Example
///
/// ```
/// use filesig::SignatureSettings;
///
/// let settings = SignatureSettings::new("data.bin", "data.sig")
///     .with_sample_size(64 * 1024)
///     .with_io_block_size(32 * 1024)
///     .with_max_buffer_size(128 * 1024);
///
/// settings.validate()?;
/// # Ok::<(), filesig::SignatureError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSettings {
    /// File to read and hash.
    source: PathBuf,

    /// File the signature is written to.
    result: PathBuf,

    /// Segment size in bytes over which one digest is computed.
    sample_size: usize,

    /// Unit of one disk read or write, and of one queue item.
    io_block_size: usize,

    /// Memory ceiling per queue, in bytes.
    max_buffer_size: usize,
}

impl SignatureSettings {
    /// Creates settings for the given source and result paths with default sizes.
    pub fn new(source: impl Into<PathBuf>, result: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            result: result.into(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            io_block_size: DEFAULT_IO_BLOCK_SIZE,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }

    /// Sets the sample segment size in bytes.
    ///
    /// Note: this does not validate the configuration. Use
    /// [`SignatureSettings::validate`] before starting a run.
    pub fn with_sample_size(mut self, size: usize) -> Self {
        self.sample_size = size;
        self
    }

    /// Sets the I/O block size in bytes.
    ///
    /// Note: this does not validate the configuration. Use
    /// [`SignatureSettings::validate`] before starting a run.
    pub fn with_io_block_size(mut self, size: usize) -> Self {
        self.io_block_size = size;
        self
    }

    /// Sets the per-queue memory ceiling in bytes.
    ///
    /// Note: this does not validate the configuration. Use
    /// [`SignatureSettings::validate`] before starting a run.
    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    /// Returns the source file path.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Returns the result file path.
    pub fn result(&self) -> &Path {
        &self.result
    }

    /// Returns the sample segment size in bytes.
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Returns the I/O block size in bytes.
    pub fn io_block_size(&self) -> usize {
        self.io_block_size
    }

    /// Returns the per-queue memory ceiling in bytes.
    pub fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::InvalidConfig`] if:
    /// - either path is empty
    /// - any size is zero
    /// - `max_buffer_size < 2 * io_block_size` (with less than two blocks of
    ///   queue budget the reader and the consumer cannot overlap, and a block
    ///   push can starve the pipeline)
    pub fn validate(&self) -> Result<(), SignatureError> {
        if self.source.as_os_str().is_empty() {
            return Err(SignatureError::InvalidConfig {
                message: "the source file path must not be empty",
            });
        }
        if self.result.as_os_str().is_empty() {
            return Err(SignatureError::InvalidConfig {
                message: "the result file path must not be empty",
            });
        }
        if self.sample_size == 0 {
            return Err(SignatureError::InvalidConfig {
                message: "the sample segment size must be positive",
            });
        }
        if self.io_block_size == 0 {
            return Err(SignatureError::InvalidConfig {
                message: "the I/O block size must be positive",
            });
        }
        if self.max_buffer_size < 2 * self.io_block_size {
            return Err(SignatureError::InvalidConfig {
                message: "the maximum buffer size must be at least twice the I/O block size",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SignatureSettings::new("in.bin", "out.sig");
        assert_eq!(settings.sample_size(), DEFAULT_SAMPLE_SIZE);
        assert_eq!(settings.io_block_size(), DEFAULT_IO_BLOCK_SIZE);
        assert_eq!(settings.max_buffer_size(), DEFAULT_MAX_BUFFER_SIZE);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let settings = SignatureSettings::new("in.bin", "out.sig")
            .with_sample_size(4096)
            .with_io_block_size(1024)
            .with_max_buffer_size(8192);

        assert_eq!(settings.sample_size(), 4096);
        assert_eq!(settings.io_block_size(), 1024);
        assert_eq!(settings.max_buffer_size(), 8192);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_source_rejected() {
        let settings = SignatureSettings::new("", "out.sig");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_empty_result_rejected() {
        let settings = SignatureSettings::new("in.bin", "");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_sample_size_rejected() {
        let settings = SignatureSettings::new("in.bin", "out.sig").with_sample_size(0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_io_block_size_rejected() {
        let settings = SignatureSettings::new("in.bin", "out.sig").with_io_block_size(0);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_buffer_smaller_than_two_blocks_rejected() {
        let settings = SignatureSettings::new("in.bin", "out.sig")
            .with_io_block_size(1024)
            .with_max_buffer_size(2047);
        assert!(settings.validate().is_err());

        let settings = settings.with_max_buffer_size(2048);
        assert!(settings.validate().is_ok());
    }
}
