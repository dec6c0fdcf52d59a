use crate::error::Result;
use crate::link::{NewLink, OwnerId, ShortLink};
use crate::shortcode::ShortCode;
use async_trait::async_trait;

/// Outcome of an atomic conditional insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row was written.
    Inserted,
    /// The original URL is already stored under this code. Nothing was written.
    UrlTaken(ShortCode),
    /// The candidate code is already in use. Nothing was written.
    CodeTaken,
}

/// A read-only view of a repository.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the row for a given short code, tombstoned or not.
    /// Returns `None` if the code was never assigned.
    async fn get(&self, code: &ShortCode) -> Result<Option<ShortLink>>;

    /// Checks whether a short code has ever been assigned, including
    /// codes of deleted links.
    async fn exists(&self, code: &ShortCode) -> Result<bool>;

    /// Lists every row owned by `owner_id`, ordered by code.
    async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<ShortLink>>;

    /// Checks that the backend is reachable. Has no side effects.
    async fn ping(&self) -> Result<()>;
}

/// Persistence primitives every backend provides.
///
/// Implementations must make each call atomic on its own: `insert` is a
/// single conditional write keyed on both the code and the original URL,
/// and `insert_batch` commits all rows or none.
#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a new row unless its code or its original URL is taken.
    async fn insert(&self, link: NewLink) -> Result<InsertOutcome>;

    /// Inserts every row in one transaction.
    ///
    /// Stops at the first row that is not [`InsertOutcome::Inserted`],
    /// rolls back everything written so far and returns that outcome.
    async fn insert_batch(&self, links: Vec<NewLink>) -> Result<InsertOutcome>;

    /// Marks the given codes as deleted where they belong to `owner_id`.
    ///
    /// Codes owned by someone else, unknown codes and codes that are already
    /// deleted are skipped. Returns the number of rows that changed.
    async fn mark_deleted(&self, owner_id: OwnerId, codes: &[ShortCode]) -> Result<u64>;
}
