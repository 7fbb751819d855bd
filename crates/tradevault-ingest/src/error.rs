//! Error types for the archive ingestion pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Error variants for ingestion operations.
///
/// Everything except listing and startup failures is fatal to a single
/// archive only; the orchestrator logs it and moves on to the next candidate.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Wraps standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The payload does not start with the expected magic marker.
    #[error("Input does not start with the archive magic marker")]
    BadMagic,

    /// The payload ends before the magic marker and salt are complete.
    #[error("Archive truncated: {found} bytes, header needs {expected}")]
    Truncated {
        /// Minimum byte count a well-formed payload carries.
        expected: usize,
        /// Bytes actually present.
        found: usize,
    },

    /// Ciphertext length is incompatible with the block cipher.
    #[error("Ciphertext length {len} is not a positive multiple of the cipher block size")]
    BadCiphertextLength {
        /// Ciphertext length in bytes.
        len: usize,
    },

    /// The trailing pad length is outside the valid range.
    #[error("Invalid padding length {pad} for {len} plaintext bytes")]
    BadPadding {
        /// Pad length read from the final plaintext byte.
        pad: u8,
        /// Plaintext length before unpadding.
        len: usize,
    },

    /// The container does not hold exactly one qualifying log member.
    #[error("Container holds {found} qualifying log members, expected exactly 1")]
    MemberCount {
        /// Qualifying members actually found.
        found: usize,
    },

    /// The log member is not valid UTF-8 text.
    #[error("Log member {name} is not valid UTF-8")]
    NotUtf8 {
        /// Name of the offending member.
        name: String,
    },

    /// The destination partition already exists; the archive was processed before.
    #[error("Partition already exists: {path}")]
    WriteConflict {
        /// Path of the existing partition.
        path: PathBuf,
    },

    /// A category buffer is not valid line-delimited JSON.
    #[error("Category {category} is not valid line-delimited JSON: {reason}")]
    Decode {
        /// Category directory name.
        category: &'static str,
        /// Description of the decode failure.
        reason: String,
    },

    /// The partition file could not be written.
    #[error("Partition write failed for {path}: {reason}")]
    Parquet {
        /// Destination partition path.
        path: PathBuf,
        /// Description of the write failure.
        reason: String,
    },

    /// The archive selection pattern is not a valid regular expression.
    #[error("Invalid selection pattern: {0}")]
    BadPattern(#[from] regex::Error),
}
