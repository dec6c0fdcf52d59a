//! Fire-and-forget deletes.
//!
//! A request handler submits a [`DeleteRequest`] and returns as soon as it is
//! queued. One background task applies queued requests through
//! [`LinkStore::delete_user_urls`] in submission order.

use std::sync::Arc;
use tinylink_core::{LinkStore, OwnerId, Result, ShortCode, StorageError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub owner_id: OwnerId,
    pub codes: Vec<ShortCode>,
}

/// Submitting half of the deletion queue.
#[derive(Debug, Clone)]
pub struct DeletionQueue {
    sender: mpsc::Sender<DeleteRequest>,
}

/// Handle on the task draining a [`DeletionQueue`].
///
/// Dropping the handle without calling [`DeletionWorker::shutdown`] also
/// stops the task once the queued requests are applied.
#[derive(Debug)]
pub struct DeletionWorker {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl DeletionQueue {
    /// Starts the background worker over `store`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn spawn<S: LinkStore>(store: Arc<S>, capacity: usize) -> (Self, DeletionWorker) {
        let (sender, receiver) = mpsc::channel(capacity);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(drain(store, receiver, shutdown_rx));

        (Self { sender }, DeletionWorker { shutdown, handle })
    }

    /// Queues a delete request. Waits only while the queue is full.
    pub async fn submit(&self, owner_id: OwnerId, codes: Vec<ShortCode>) -> Result<()> {
        self.sender
            .send(DeleteRequest { owner_id, codes })
            .await
            .map_err(|_| StorageError::Unavailable("deletion queue is closed".to_string()))
    }
}

impl DeletionWorker {
    /// Stops accepting requests and waits until every queued one is applied.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.handle
            .await
            .map_err(|err| StorageError::Operation(format!("deletion worker failed: {err}")))
    }
}

async fn drain<S: LinkStore>(
    store: Arc<S>,
    mut receiver: mpsc::Receiver<DeleteRequest>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            request = receiver.recv() => match request {
                Some(request) => apply(store.as_ref(), request).await,
                None => break,
            },
            _ = &mut shutdown => {
                receiver.close();
                while let Some(request) = receiver.recv().await {
                    apply(store.as_ref(), request).await;
                }
                break;
            }
        }
    }

    info!("deletion worker stopped");
}

async fn apply<S: LinkStore>(store: &S, request: DeleteRequest) {
    let DeleteRequest { owner_id, codes } = request;
    let count = codes.len();

    match store.delete_user_urls(owner_id, codes).await {
        Ok(()) => debug!(owner_id, codes = count, "queued delete applied"),
        Err(err) => warn!(owner_id, codes = count, error = %err, "queued delete failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{LinkService, ServiceSettings};
    use crate::testing::FaultyRepository;
    use tinylink_core::Resolution;
    use tinylink_generator::SeqGenerator;

    fn store() -> Arc<LinkService<FaultyRepository, SeqGenerator>> {
        Arc::new(LinkService::new(
            FaultyRepository::new(),
            SeqGenerator::with_prefix("dq").unwrap(),
            ServiceSettings::default(),
        ))
    }

    #[tokio::test]
    async fn shutdown_drains_queued_requests() {
        let store = store();
        let a = store.save(1, "https://a.example").await.unwrap().into_code();
        let b = store.save(1, "https://b.example").await.unwrap().into_code();
        let (queue, worker) = DeletionQueue::spawn(Arc::clone(&store), 8);

        queue.submit(1, vec![a.clone()]).await.unwrap();
        queue.submit(1, vec![b.clone()]).await.unwrap();
        worker.shutdown().await.unwrap();

        assert_eq!(store.get(&a).await.unwrap(), Resolution::Tombstoned);
        assert_eq!(store.get(&b).await.unwrap(), Resolution::Tombstoned);
    }

    #[tokio::test]
    async fn failures_are_not_surfaced_to_submitter() {
        let store = store();
        let a = store.save(1, "https://a.example").await.unwrap().into_code();
        store.repository().fail_mark_deleted(true);
        let (queue, worker) = DeletionQueue::spawn(Arc::clone(&store), 8);

        queue.submit(1, vec![a.clone()]).await.unwrap();
        worker.shutdown().await.unwrap();

        assert_eq!(store.repository().mark_deleted_calls(), 1);
        assert!(store.get(&a).await.unwrap().is_live());
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_rejected() {
        let (queue, worker) = DeletionQueue::spawn(store(), 1);
        worker.shutdown().await.unwrap();

        let err = queue.submit(1, Vec::new()).await.unwrap_err();

        assert!(matches!(err, StorageError::Unavailable(_)));
    }
}
