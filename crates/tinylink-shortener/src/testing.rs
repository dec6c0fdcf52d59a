use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tinylink_core::{
    InsertOutcome, NewLink, OwnerId, ReadRepository, Repository, Result, ShortCode, ShortLink,
    StorageError,
};
use tinylink_storage::InMemoryRepository;

/// An in-memory repository with switchable failures.
#[derive(Debug, Default)]
pub struct FaultyRepository {
    inner: InMemoryRepository,
    hide_existing: AtomicBool,
    fail_insert_batch: AtomicBool,
    fail_mark_deleted: AtomicBool,
    panic_mark_deleted: AtomicBool,
    delay_ms: AtomicU64,
    insert_calls: AtomicUsize,
    insert_batch_calls: AtomicUsize,
    mark_deleted_calls: AtomicUsize,
}

impl FaultyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `exists` answer `false` for every code, so collisions only
    /// show up on insert.
    pub fn hide_existing(&self, hide: bool) {
        self.hide_existing.store(hide, Ordering::SeqCst);
    }

    pub fn fail_insert_batch(&self, fail: bool) {
        self.fail_insert_batch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_mark_deleted(&self, fail: bool) {
        self.fail_mark_deleted.store(fail, Ordering::SeqCst);
    }

    pub fn panic_mark_deleted(&self, panic: bool) {
        self.panic_mark_deleted.store(panic, Ordering::SeqCst);
    }

    /// Delays every call by `delay`.
    pub fn delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn insert_batch_calls(&self) -> usize {
        self.insert_batch_calls.load(Ordering::SeqCst)
    }

    pub fn mark_deleted_calls(&self) -> usize {
        self.mark_deleted_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    async fn pause(&self) {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

#[async_trait]
impl ReadRepository for FaultyRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        self.pause().await;
        self.inner.get(code).await
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        self.pause().await;
        if self.hide_existing.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.exists(code).await
    }

    async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<ShortLink>> {
        self.pause().await;
        self.inner.list_by_owner(owner_id).await
    }

    async fn ping(&self) -> Result<()> {
        self.pause().await;
        self.inner.ping().await
    }
}

#[async_trait]
impl Repository for FaultyRepository {
    async fn insert(&self, link: NewLink) -> Result<InsertOutcome> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.inner.insert(link).await
    }

    async fn insert_batch(&self, links: Vec<NewLink>) -> Result<InsertOutcome> {
        self.insert_batch_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_insert_batch.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected batch failure".to_string()));
        }
        self.inner.insert_batch(links).await
    }

    async fn mark_deleted(&self, owner_id: OwnerId, codes: &[ShortCode]) -> Result<u64> {
        self.mark_deleted_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.panic_mark_deleted.load(Ordering::SeqCst) {
            panic!("injected delete panic");
        }
        if self.fail_mark_deleted.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected delete failure".to_string()));
        }
        self.inner.mark_deleted(owner_id, codes).await
    }
}
