//! Local variant of the Flash Report storage layer.
//!
//! Tables are held in memory and persisted as a single JSON blob through a
//! [`BlobStore`], reloaded (and merged with factory defaults) on open.

pub mod blob;
mod codec;
pub mod storage;

pub use blob::{BlobStore, MemoryBlobStore, SqliteBlobStore};
pub use storage::{LocalStorage, BLOB_KEY};
