use crate::table::LinkTable;
use async_trait::async_trait;
use parking_lot::RwLock;
use tinylink_core::{
    InsertOutcome, NewLink, OwnerId, ReadRepository, Repository, Result, ShortCode, ShortLink,
};

/// In-memory implementation of the Repository trait.
///
/// A single read/write lock guards both the rows and the original URL index,
/// so the duplicate check and the insert happen under the same write guard.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    table: RwLock<LinkTable>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, tombstones included.
    pub fn len(&self) -> usize {
        self.table.read().links().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        Ok(self.table.read().get(code).cloned())
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.table.read().contains(code))
    }

    async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<ShortLink>> {
        Ok(self.table.read().list_by_owner(owner_id))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert(&self, link: NewLink) -> Result<InsertOutcome> {
        Ok(self.table.write().insert(link))
    }

    async fn insert_batch(&self, links: Vec<NewLink>) -> Result<InsertOutcome> {
        Ok(self.table.write().insert_batch(links))
    }

    async fn mark_deleted(&self, owner_id: OwnerId, codes: &[ShortCode]) -> Result<u64> {
        Ok(self.table.write().mark_deleted(owner_id, codes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn new_link(c: &str, url: &str, owner_id: OwnerId) -> NewLink {
        NewLink {
            code: code(c),
            original_url: url.to_string(),
            owner_id,
        }
    }

    #[tokio::test]
    async fn insert_and_get() {
        let repo = InMemoryRepository::new();

        let outcome = repo
            .insert(new_link("abc12345", "https://example.com", 1))
            .await
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);

        let link = repo.get(&code("abc12345")).await.unwrap().unwrap();
        assert_eq!(link.original_url, "https://example.com");
        assert_eq!(link.owner_id, 1);
        assert!(!link.deleted);
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let repo = InMemoryRepository::new();

        assert!(repo.get(&code("nope0000")).await.unwrap().is_none());
        assert!(!repo.exists(&code("nope0000")).await.unwrap());
    }

    #[tokio::test]
    async fn insert_same_url_reports_existing_code() {
        let repo = InMemoryRepository::new();
        repo.insert(new_link("abc12345", "https://example.com", 1))
            .await
            .unwrap();

        let outcome = repo
            .insert(new_link("xyz98765", "https://example.com", 2))
            .await
            .unwrap();

        assert_eq!(outcome, InsertOutcome::UrlTaken(code("abc12345")));
        assert!(!repo.exists(&code("xyz98765")).await.unwrap());
    }

    #[tokio::test]
    async fn insert_code_conflict() {
        let repo = InMemoryRepository::new();
        repo.insert(new_link("abc12345", "https://example.com", 1))
            .await
            .unwrap();

        let outcome = repo
            .insert(new_link("abc12345", "https://other.com", 1))
            .await
            .unwrap();

        assert_eq!(outcome, InsertOutcome::CodeTaken);
    }

    #[tokio::test]
    async fn deleted_codes_still_exist() {
        let repo = InMemoryRepository::new();
        repo.insert(new_link("abc12345", "https://example.com", 1))
            .await
            .unwrap();

        assert_eq!(repo.mark_deleted(1, &[code("abc12345")]).await.unwrap(), 1);

        assert!(repo.exists(&code("abc12345")).await.unwrap());
        assert!(repo.get(&code("abc12345")).await.unwrap().unwrap().deleted);
    }

    #[tokio::test]
    async fn list_by_owner_is_ordered_and_filtered() {
        let repo = InMemoryRepository::new();
        repo.insert(new_link("bbbbbbbb", "https://b.com", 1))
            .await
            .unwrap();
        repo.insert(new_link("aaaaaaaa", "https://a.com", 1))
            .await
            .unwrap();
        repo.insert(new_link("cccccccc", "https://c.com", 2))
            .await
            .unwrap();

        let links = repo.list_by_owner(1).await.unwrap();
        let codes: Vec<&str> = links.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, ["aaaaaaaa", "bbbbbbbb"]);

        assert!(repo.list_by_owner(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_inserts_of_same_url_have_one_winner() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut handles = vec![];

        for i in 0..16u32 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.insert(new_link(&format!("code{:04}", i), "https://same.com", 1))
                    .await
                    .unwrap()
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() == InsertOutcome::Inserted {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 1);
        assert_eq!(repo.len(), 1);
    }
}
