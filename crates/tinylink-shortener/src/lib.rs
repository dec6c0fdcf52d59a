//! The tinylink engine.
//!
//! This crate turns any storage backend into a [`LinkStore`]: code
//! allocation, deduplication, batched soft deletes and the background
//! deletion queue. Core types are re-exported from `tinylink_core`.

pub mod bulk;
pub mod queue;
pub mod service;

#[cfg(test)]
mod testing;

pub use bulk::{BulkDeleter, BulkDeleterSettings};
pub use queue::{DeleteRequest, DeletionQueue, DeletionWorker};
pub use service::{LinkService, ServiceSettings};
pub use tinylink_core::{
    ErrorKind, LinkStore, OwnerId, Resolution, Result, SaveOutcome, ShortCode, StorageError,
    UserLink, ANONYMOUS_OWNER,
};
