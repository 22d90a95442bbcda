//! Segment digest type.

use std::fmt;

use md5::{Digest, Md5};

/// The 16-byte MD5 digest of one sample segment.
///
/// The digest size is fixed regardless of the segment's length; the final
/// segment of a file may be shorter than the configured sample size and still
/// produces a full-size digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentDigest([u8; 16]);

impl SegmentDigest {
    /// The size of the digest in bytes.
    pub const SIZE: usize = 16;

    /// Creates a digest from a byte array.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Creates a digest from a slice.
    ///
    /// Returns `None` if the slice is not exactly 16 bytes.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let mut bytes = [0u8; Self::SIZE];
        if slice.len() != Self::SIZE {
            return None;
        }
        bytes.copy_from_slice(slice);
        Some(Self(bytes))
    }

    /// Computes the digest of a byte slice in one shot.
    ///
    /// # Example
    ///
    /// ```
    /// use filesig::SegmentDigest;
    ///
    /// let digest = SegmentDigest::of(b"hello world");
    /// assert_eq!(digest.to_string(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    /// ```
    pub fn of(data: &[u8]) -> Self {
        Self(Md5::digest(data).into())
    }

    /// Returns the digest bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl AsRef<[u8]> for SegmentDigest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for SegmentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
