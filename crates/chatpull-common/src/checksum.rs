//! Checksum utilities for sink verification
//!
//! Sinks are fingerprinted with SHA-256. [`StreamingChecksum`] hashes bytes
//! as they are appended so a multi-gigabyte dump never has to be re-read
//! just to produce its digest.

use crate::error::{CommonError, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Incremental SHA-256 over an append-only byte stream
#[derive(Clone, Default)]
pub struct StreamingChecksum {
    hasher: Sha256,
    bytes: u64,
}

impl std::fmt::Debug for StreamingChecksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingChecksum")
            .field("bytes", &self.bytes)
            .finish_non_exhaustive()
    }
}

impl StreamingChecksum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes that were just appended to the stream
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes hashed so far
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Hex digest of everything fed so far
    pub fn finalize(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Compute the SHA-256 checksum of a file
pub fn compute_file_checksum(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    compute_checksum(&mut file)
}

/// Compute the SHA-256 checksum of any readable source
pub fn compute_checksum<R: Read>(reader: &mut R) -> Result<String> {
    let mut checksum = StreamingChecksum::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        checksum.update(&buffer[..bytes_read]);
    }

    Ok(checksum.finalize())
}

/// Verify the checksum of a file
pub fn verify_file_checksum(path: impl AsRef<Path>, expected: &str) -> Result<()> {
    let actual = compute_file_checksum(path)?;
    if actual == expected {
        Ok(())
    } else {
        Err(CommonError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const HELLO_WORLD_SHA256: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_compute_checksum_sha256() {
        let mut cursor = Cursor::new(b"hello world");
        let checksum = compute_checksum(&mut cursor).unwrap();
        assert_eq!(checksum, HELLO_WORLD_SHA256);
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let mut streaming = StreamingChecksum::new();
        streaming.update(b"hello");
        streaming.update(b" ");
        streaming.update(b"world");
        assert_eq!(streaming.bytes(), 11);
        assert_eq!(streaming.finalize(), HELLO_WORLD_SHA256);
    }

    #[test]
    fn test_verify_file_checksum() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        verify_file_checksum(file.path(), HELLO_WORLD_SHA256).unwrap();

        let err = verify_file_checksum(file.path(), "deadbeef").unwrap_err();
        assert!(matches!(err, CommonError::ChecksumMismatch { .. }));
    }
}
