use crate::table::LinkTable;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tinylink_core::{
    InsertOutcome, NewLink, OwnerId, ReadRepository, Repository, Result, ShortCode, ShortLink,
    StorageError,
};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// One entry of the storage file, keyed by code.
#[derive(Debug, Serialize, Deserialize)]
struct FileRecord {
    owner_id: OwnerId,
    original_url: String,
    #[serde(default)]
    deleted: bool,
}

/// JSON file implementation of the Repository trait.
///
/// The whole table lives in memory and is mirrored to a single JSON object
/// mapping `code -> {owner_id, original_url, deleted}`. Every mutating call
/// rewrites the file in full while holding the write lock, and only swaps
/// the in-memory table once the file has been written.
#[derive(Debug)]
pub struct FileRepository {
    path: Arc<PathBuf>,
    table: Arc<RwLock<LinkTable>>,
}

impl FileRepository {
    /// Opens the repository, loading any rows already in the file.
    ///
    /// A missing or empty file starts an empty repository.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = load(&path).await?;

        info!(
            path = %path.display(),
            links = table.links().count(),
            "opened file repository"
        );

        Ok(Self {
            path: Arc::new(path),
            table: Arc::new(RwLock::new(table)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `mutate` to a copy of the table, persists the copy and swaps
    /// it in. Nothing changes if persisting fails.
    ///
    /// The write and the swap run on their own task holding the write guard
    /// and complete even if the caller is dropped.
    async fn mutate<T>(&self, mutate: impl FnOnce(&mut LinkTable) -> (T, bool)) -> Result<T> {
        let mut table = Arc::clone(&self.table).write_owned().await;
        let mut staged = table.clone();

        let (value, changed) = mutate(&mut staged);
        if changed {
            let path = Arc::clone(&self.path);
            tokio::spawn(async move {
                persist(&path, &staged).await?;
                *table = staged;
                Ok::<_, StorageError>(())
            })
            .await
            .map_err(|e| StorageError::Operation(format!("storage file write failed: {e}")))??;
        }

        Ok(value)
    }
}

async fn persist(path: &Path, table: &LinkTable) -> Result<()> {
    let records: BTreeMap<&ShortCode, FileRecord> = table
        .links()
        .map(|link| {
            (
                &link.code,
                FileRecord {
                    owner_id: link.owner_id,
                    original_url: link.original_url.clone(),
                    deleted: link.deleted,
                },
            )
        })
        .collect();

    let json = serde_json::to_vec_pretty(&records)
        .map_err(|e| StorageError::InvalidData(format!("serialize storage file: {e}")))?;

    // Write beside the target and rename over it so readers never see a
    // half-written file.
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| io_error(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_error(path, e))?;

    debug!(path = %path.display(), links = records.len(), "storage file rewritten");
    Ok(())
}

async fn load(path: &Path) -> Result<LinkTable> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(LinkTable::default()),
        Err(err) => return Err(io_error(path, err)),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(LinkTable::default());
    }

    let records: BTreeMap<ShortCode, FileRecord> = serde_json::from_slice(&bytes).map_err(|e| {
        StorageError::InvalidData(format!("parse storage file {}: {e}", path.display()))
    })?;

    LinkTable::from_links(records.into_iter().map(|(code, record)| ShortLink {
        code,
        original_url: record.original_url,
        owner_id: record.owner_id,
        deleted: record.deleted,
    }))
}

fn io_error(path: &Path, err: std::io::Error) -> StorageError {
    StorageError::Unavailable(format!("{}: {err}", path.display()))
}

#[async_trait]
impl ReadRepository for FileRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        Ok(self.table.read().await.get(code).cloned())
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.table.read().await.contains(code))
    }

    async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<ShortLink>> {
        Ok(self.table.read().await.list_by_owner(owner_id))
    }

    async fn ping(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let metadata = tokio::fs::metadata(dir)
            .await
            .map_err(|e| io_error(dir, e))?;
        if !metadata.is_dir() {
            return Err(StorageError::Unavailable(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Repository for FileRepository {
    async fn insert(&self, link: NewLink) -> Result<InsertOutcome> {
        self.mutate(|table| {
            let outcome = table.insert(link);
            let changed = outcome == InsertOutcome::Inserted;
            (outcome, changed)
        })
        .await
    }

    async fn insert_batch(&self, links: Vec<NewLink>) -> Result<InsertOutcome> {
        self.mutate(|table| {
            let outcome = table.insert_batch(links);
            let changed = outcome == InsertOutcome::Inserted;
            (outcome, changed)
        })
        .await
    }

    async fn mark_deleted(&self, owner_id: OwnerId, codes: &[ShortCode]) -> Result<u64> {
        self.mutate(|table| {
            let changed = table.mark_deleted(owner_id, codes);
            (changed, changed > 0)
        })
        .await
    }
}
