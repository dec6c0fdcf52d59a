use std::sync::Arc;
use tinylink_core::{OwnerId, Repository, Result, ShortCode, StorageError};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

/// Sizing of the bulk delete worker pool.
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct BulkDeleterSettings {
    /// Codes soft-deleted by one statement.
    #[builder(default = 50)]
    pub batch_size: usize,
    /// Workers draining the batch queue.
    #[builder(default = 4)]
    pub workers: usize,
}

impl Default for BulkDeleterSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Soft-deletes many codes through a fixed pool of workers.
///
/// Codes are split into batches that the workers pull from a single queue.
/// Every worker runs to completion even after another one has failed; the
/// first error reported is returned and later ones are dropped. Dropping the
/// future returned by [`BulkDeleter::delete_user_urls`] aborts the workers,
/// so no further batches are issued.
#[derive(Debug)]
pub struct BulkDeleter<R> {
    repository: Arc<R>,
    settings: BulkDeleterSettings,
}

impl<R> Clone for BulkDeleter<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            settings: self.settings,
        }
    }
}

impl<R: Repository> BulkDeleter<R> {
    /// # Panics
    ///
    /// Panics if `batch_size` or `workers` is zero.
    pub fn new(repository: Arc<R>, settings: BulkDeleterSettings) -> Self {
        assert!(settings.batch_size > 0, "bulk delete batch size must be positive");
        assert!(settings.workers > 0, "bulk delete worker count must be positive");

        Self {
            repository,
            settings,
        }
    }

    pub fn settings(&self) -> &BulkDeleterSettings {
        &self.settings
    }

    /// Marks `codes` as deleted where they belong to `owner_id`.
    ///
    /// Returns once every batch has been processed.
    pub async fn delete_user_urls(&self, owner_id: OwnerId, codes: Vec<ShortCode>) -> Result<()> {
        if codes.is_empty() {
            return Ok(());
        }

        let batches: Vec<Vec<ShortCode>> = codes
            .chunks(self.settings.batch_size)
            .map(<[ShortCode]>::to_vec)
            .collect();
        let workers = self.settings.workers.min(batches.len());

        debug!(
            owner_id,
            codes = codes.len(),
            batches = batches.len(),
            workers,
            "starting bulk delete"
        );

        let (batch_tx, batch_rx) = mpsc::channel::<Vec<ShortCode>>(workers);
        let batch_rx = Arc::new(Mutex::new(batch_rx));
        // Single slot: the first error wins, later ones are discarded.
        let (error_tx, mut error_rx) = mpsc::channel::<StorageError>(1);

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let repository = Arc::clone(&self.repository);
            let batch_rx = Arc::clone(&batch_rx);
            let error_tx = error_tx.clone();

            pool.spawn(async move {
                loop {
                    let batch = batch_rx.lock().await.recv().await;
                    let Some(batch) = batch else {
                        break;
                    };

                    match repository.mark_deleted(owner_id, &batch).await {
                        Ok(changed) => debug!(
                            worker,
                            owner_id,
                            requested = batch.len(),
                            changed,
                            "batch deleted"
                        ),
                        Err(err) => {
                            warn!(worker, owner_id, error = %err, "batch delete failed");
                            let _ = error_tx.try_send(err);
                        }
                    }
                }
            });
        }
        drop(error_tx);

        for batch in batches {
            // Fails only once every worker has exited.
            if batch_tx.send(batch).await.is_err() {
                break;
            }
        }
        drop(batch_tx);

        let mut crashed = None;
        while let Some(joined) = pool.join_next().await {
            if let Err(err) = joined {
                crashed.get_or_insert_with(|| err.to_string());
            }
        }

        if let Ok(err) = error_rx.try_recv() {
            return Err(err);
        }
        if let Some(message) = crashed {
            return Err(StorageError::Operation(format!(
                "bulk delete worker failed: {message}"
            )));
        }

        Ok(())
    }
}
