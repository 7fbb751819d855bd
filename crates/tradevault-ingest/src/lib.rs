#![warn(missing_docs)]

//! Tradevault ingestion subsystem: password-encrypted log archive intake.
//!
//! Pipeline: Archive → Decrypt (PBKDF2 + AES-256-CBC) → Extract (zstd + tar)
//! → Classify → Write (write-once parquet partitions)

pub mod classify;
pub mod container;
pub mod decrypt;
pub mod error;
pub mod pipeline;
pub mod sink;
pub mod source;

pub use classify::{Category, ClassifiedBuffers};
pub use container::{extract_log_member, LogMember, LOG_MEMBER_MARKER};
pub use decrypt::KeyMaterial;
pub use error::{IngestError, IngestResult};
pub use pipeline::{
    ArchiveOrchestrator, ArchiveOutcome, IngestConfig, IngestStats, SkipReason, DEFAULT_EXCLUSION,
    DEFAULT_PATTERN,
};
pub use sink::PartitionStore;
pub use source::{ArchiveEntry, ArchiveSource, DirSource, FileSource};
