//! Storage backends for tinylink.
//!
//! Every backend implements [`Repository`] so the engine can run on top of
//! whichever one the deployment selects:
//!
//! - [`InMemoryRepository`]: a locked map, gone when the process exits.
//! - [`FileRepository`]: the same map mirrored to a JSON file.
//! - [`PostgresRepository`]: a `short_links` table.

pub mod file;
pub mod memory;
pub mod postgres;
mod table;

pub use file::FileRepository;
pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;
pub use tinylink_core::{InsertOutcome, ReadRepository, Repository, StorageError};
