use core::fmt;
use std::io;

use qsnap_binary::{BinaryError, SeekError};
use thiserror::Error;

/// Which storage operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageStage {
    Instantiation,
    Persistence,
    Retrieval,
}

impl fmt::Display for StorageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageStage::Instantiation => "instantiation",
            StorageStage::Persistence => "persistence",
            StorageStage::Retrieval => "retrieval",
        })
    }
}

#[derive(Debug, Error)]
pub enum StorageErrorKind {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u16),

    #[error("corrupt snapshot: {0}")]
    Corrupt(&'static str),

    #[error("snapshot index {found:016x} does not match definition index {expected:016x}")]
    IndexMismatch { expected: u64, found: u64 },

    #[error("lz4 decompression failed: {0}")]
    Lz4Decompress(#[from] lz4_flex::block::DecompressError),

    #[error(transparent)]
    Codec(#[from] BinaryError),

    #[error(transparent)]
    Seek(#[from] SeekError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl StorageErrorKind {
    pub fn at(self, stage: StorageStage) -> StorageError {
        StorageError {
            stage,
            source: self,
        }
    }
}

/// A storage failure tagged with the operation it happened in.
#[derive(Debug, Error)]
#[error("session {stage} failed: {source}")]
pub struct StorageError {
    pub stage: StorageStage,
    pub source: StorageErrorKind,
}

impl StorageError {
    pub fn kind(&self) -> &StorageErrorKind {
        &self.source
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
