//! Binary snapshots of assessment test sessions.
//!
//! - [`types`]: test definitions, variable values and the session state machines.
//! - [`binary`]: the byte stream, value codec, structural index and session codec.
//! - [`storage`]: the snapshot envelope, blob stores and the storage service.
#![forbid(unsafe_code)]

pub use qsnap_binary as binary;
pub use qsnap_storage as storage;
pub use qsnap_types as types;

pub use qsnap_binary::{AssessmentTestSeeker, BinaryError, BinaryStream};
pub use qsnap_storage::{
    BinaryStorage, BlobStore, FsBlobStore, MemoryBlobStore, StorageConfig, StorageError,
    StorageService,
};
pub use qsnap_types::{AssessmentTest, ItemSession, TestSession};
