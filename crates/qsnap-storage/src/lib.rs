//! Persistence of test sessions as binary snapshots.
//!
//! A [`BinaryStorage`] is bound to one test definition. It builds the structural index
//! once, encodes sessions with the snapshot codec, frames them in a small versioned
//! envelope and hands the bytes to a [`BlobStore`].

#![forbid(unsafe_code)]

mod blob;
mod config;
mod envelope;
mod error;
mod fs;
mod service;

pub use crate::blob::{validate_session_id, BlobStore, MemoryBlobStore, MAX_SESSION_ID_LEN};
pub use crate::config::{StorageConfig, REQUIRED_CATEGORIES};
pub use crate::envelope::{
    open as open_envelope, seal as seal_envelope, Compression, MAX_PAYLOAD_LEN, SESSION_MAGIC,
    SESSION_VERSION_V2,
};
pub use crate::error::{Result, StorageError, StorageErrorKind, StorageStage};
pub use crate::fs::FsBlobStore;
pub use crate::service::{BinaryStorage, StorageService};
