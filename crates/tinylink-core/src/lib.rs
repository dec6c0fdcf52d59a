//! Core types and traits for the tinylink short-link engine.
//!
//! This crate provides the data model, the error taxonomy and the two
//! storage seams shared by every backend and by the engine:
//!
//! - [`Repository`]: the per-backend persistence primitives.
//! - [`LinkStore`]: the capability set consumed by the transport layer.

pub mod error;
pub mod link;
pub mod repository;
pub mod shortcode;
pub mod store;

pub use error::{CoreError, ErrorKind, Result, StorageError};
pub use link::{
    NewLink, OwnerId, Resolution, SaveOutcome, ShortLink, UserLink, ANONYMOUS_OWNER,
};
pub use repository::{InsertOutcome, ReadRepository, Repository};
pub use shortcode::ShortCode;
pub use store::LinkStore;
