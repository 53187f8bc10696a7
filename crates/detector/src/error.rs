//! Error types for the mailbox detector.
//!
//! Bad sensor readings are not errors; they are absorbed by the pipeline.
//! Only construction and context restore can fail.

use thiserror::Error;

/// Errors that can occur when building or restoring a detector.
#[derive(Debug, Error, PartialEq)]
pub enum DetectorError {
    /// Configuration rejected at construction
    #[error("Invalid detector configuration: {0}")]
    InvalidConfig(String),

    /// Snapshot buffer has the wrong size
    #[error("Snapshot length mismatch: expected {expected} bytes, got {actual}")]
    SnapshotLength {
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Snapshot does not start with the context magic
    #[error("Snapshot magic mismatch")]
    SnapshotMagic,

    /// Snapshot written by an incompatible layout
    #[error("Snapshot version mismatch: expected {expected}, got {actual}")]
    SnapshotVersion {
        /// Version this build reads
        expected: u16,
        /// Version found in the snapshot
        actual: u16,
    },

    /// Snapshot integrity tag does not match its contents
    #[error("Snapshot checksum mismatch")]
    SnapshotChecksum,

    /// Snapshot fields are internally inconsistent
    #[error("Snapshot corrupt: {0}")]
    SnapshotCorrupt(String),

    /// Restored context was built for a different filter window
    #[error("Filter window mismatch: config has {config}, context has {context}")]
    WindowMismatch {
        /// Window from the configuration
        config: u8,
        /// Window recorded in the context
        context: u8,
    },
}

/// Result type for detector operations.
pub type DetectorResult<T> = Result<T, DetectorError>;
