use crate::error::Result;
use crate::link::{OwnerId, Resolution, SaveOutcome, UserLink};
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use std::collections::HashMap;

/// The capability set the transport layer consumes.
///
/// The same interface is served whichever backend is active.
#[async_trait]
pub trait LinkStore: Send + Sync + 'static {
    /// Shortens `url` on behalf of `owner_id`.
    ///
    /// If the URL is already stored, by any owner, the existing code is
    /// returned as [`SaveOutcome::Existing`] and nothing is written.
    async fn save(&self, owner_id: OwnerId, url: &str) -> Result<SaveOutcome>;

    /// Shortens every URL in `urls`, keyed by the caller's correlation id.
    ///
    /// Unlike [`LinkStore::save`], a batch never resolves a URL to an
    /// existing code: every URL gets a freshly generated code. Since original
    /// URLs are unique, a batch that contains an already stored URL fails as a
    /// whole with [`StorageError::DuplicateUrl`](crate::StorageError::DuplicateUrl)
    /// and nothing from it is persisted.
    async fn save_batch(
        &self,
        owner_id: OwnerId,
        urls: HashMap<String, String>,
    ) -> Result<HashMap<String, ShortCode>>;

    /// Looks up the original URL behind `code`.
    async fn get(&self, code: &ShortCode) -> Result<Resolution>;

    /// Lists every link owned by `owner_id`, deleted ones included.
    /// An empty vector means the user has no links.
    async fn get_user_urls(&self, owner_id: OwnerId) -> Result<Vec<UserLink>>;

    /// Soft-deletes the given codes where they belong to `owner_id`.
    ///
    /// Blocks until every batch has been applied. Codes owned by other users
    /// are left untouched without error.
    async fn delete_user_urls(&self, owner_id: OwnerId, codes: Vec<ShortCode>) -> Result<()>;

    /// Checks that the active backend is reachable.
    async fn ping(&self) -> Result<()>;
}
