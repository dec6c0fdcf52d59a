use crate::bulk::{BulkDeleter, BulkDeleterSettings};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tinylink_core::{
    InsertOutcome, LinkStore, NewLink, OwnerId, Repository, Resolution, Result, SaveOutcome,
    ShortCode, StorageError, UserLink,
};
use tinylink_generator::{CodeGenerator, CodeGeneratorSettings, Generator};
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

/// Tunables for [`LinkService`].
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct ServiceSettings {
    /// Upper bound on every operation, surfaced as [`StorageError::Timeout`].
    #[builder(default, setter(strip_option))]
    pub operation_timeout: Option<Duration>,
    #[builder(default)]
    pub codes: CodeGeneratorSettings,
    #[builder(default)]
    pub bulk_delete: BulkDeleterSettings,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The link engine: a [`LinkStore`] on top of any [`Repository`].
///
/// This service wraps a repository and a code generator to handle:
/// - URL validation
/// - Code allocation, retrying when an insert hits a taken code
/// - Deduplication of single saves against already stored URLs
/// - Batched soft deletes through a [`BulkDeleter`]
#[derive(Debug)]
pub struct LinkService<R, G> {
    repository: Arc<R>,
    codes: CodeGenerator<G>,
    deleter: BulkDeleter<R>,
    settings: ServiceSettings,
}

impl<R: Repository, G: Generator> LinkService<R, G> {
    pub fn new(repository: R, generator: G, settings: ServiceSettings) -> Self {
        Self::with_shared(Arc::new(repository), generator, settings)
    }

    /// Creates a service over a repository that is also used elsewhere.
    pub fn with_shared(repository: Arc<R>, generator: G, settings: ServiceSettings) -> Self {
        Self {
            deleter: BulkDeleter::new(Arc::clone(&repository), settings.bulk_delete),
            codes: CodeGenerator::new(generator, settings.codes),
            repository,
            settings,
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Validates that the URL has a valid format (has a scheme and host).
    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(StorageError::InvalidInput("URL cannot be empty".to_string()));
        }

        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(StorageError::InvalidInput(format!(
                "URL must have a valid scheme and host: {}",
                url
            )));
        };
        if scheme.is_empty() || rest.is_empty() {
            return Err(StorageError::InvalidInput(format!(
                "URL must have a valid scheme and host: {}",
                url
            )));
        }

        let scheme = scheme.to_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(StorageError::InvalidInput(format!(
                "URL scheme must be http or https: {}",
                scheme
            )));
        }

        Ok(())
    }

    /// Runs `operation` under the configured timeout, if any.
    async fn bounded<T, F>(&self, name: &str, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.settings.operation_timeout {
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| StorageError::Timeout(format!("{name} exceeded {limit:?}")))?,
            None => operation.await,
        }
    }

    async fn save_url(&self, owner_id: OwnerId, url: &str) -> Result<SaveOutcome> {
        Self::validate_url(url)?;

        let attempts = self.codes.settings().max_attempts;
        for _ in 0..attempts {
            let code = self.codes.next_available(self.repository.as_ref()).await?;
            let link = NewLink {
                code: code.clone(),
                original_url: url.to_owned(),
                owner_id,
            };

            match self.repository.insert(link).await? {
                InsertOutcome::Inserted => {
                    debug!(code = %code, owner_id, "short link created");
                    return Ok(SaveOutcome::Created(code));
                }
                InsertOutcome::UrlTaken(existing) => {
                    debug!(code = %existing, owner_id, "url already shortened");
                    return Ok(SaveOutcome::Existing(existing));
                }
                InsertOutcome::CodeTaken => {
                    debug!(code = %code, "code taken on insert, drawing another");
                }
            }
        }

        Err(StorageError::CodeExhausted { attempts })
    }

    async fn save_urls(
        &self,
        owner_id: OwnerId,
        urls: HashMap<String, String>,
    ) -> Result<HashMap<String, ShortCode>> {
        if urls.is_empty() {
            return Ok(HashMap::new());
        }

        let mut seen = HashSet::with_capacity(urls.len());
        for url in urls.values() {
            Self::validate_url(url)?;
            if !seen.insert(url.as_str()) {
                return Err(StorageError::InvalidInput(format!(
                    "URL appears more than once in the batch: {url}"
                )));
            }
        }

        let attempts = self.codes.settings().max_attempts;
        for _ in 0..attempts {
            let mut links = Vec::with_capacity(urls.len());
            let mut assigned = HashMap::with_capacity(urls.len());

            for (correlation_id, url) in &urls {
                let code = self.codes.next_available(self.repository.as_ref()).await?;
                links.push(NewLink {
                    code: code.clone(),
                    original_url: url.clone(),
                    owner_id,
                });
                assigned.insert(correlation_id.clone(), code);
            }

            match self.repository.insert_batch(links).await? {
                InsertOutcome::Inserted => {
                    debug!(owner_id, links = assigned.len(), "batch created");
                    return Ok(assigned);
                }
                InsertOutcome::UrlTaken(code) => {
                    return Err(StorageError::DuplicateUrl { code });
                }
                InsertOutcome::CodeTaken => {
                    debug!(owner_id, "batch hit a taken code, drawing a new set");
                }
            }
        }

        Err(StorageError::CodeExhausted { attempts })
    }
}

#[async_trait]
impl<R: Repository, G: Generator> LinkStore for LinkService<R, G> {
    async fn save(&self, owner_id: OwnerId, url: &str) -> Result<SaveOutcome> {
        self.bounded("save", self.save_url(owner_id, url)).await
    }

    async fn save_batch(
        &self,
        owner_id: OwnerId,
        urls: HashMap<String, String>,
    ) -> Result<HashMap<String, ShortCode>> {
        self.bounded("save_batch", self.save_urls(owner_id, urls)).await
    }

    async fn get(&self, code: &ShortCode) -> Result<Resolution> {
        let link = self.bounded("get", self.repository.get(code)).await?;
        let resolution = Resolution::from(link);
        trace!(code = %code, ?resolution, "resolved short code");
        Ok(resolution)
    }

    async fn get_user_urls(&self, owner_id: OwnerId) -> Result<Vec<UserLink>> {
        let links = self
            .bounded("get_user_urls", self.repository.list_by_owner(owner_id))
            .await?;
        Ok(links.into_iter().map(UserLink::from).collect())
    }

    async fn delete_user_urls(&self, owner_id: OwnerId, codes: Vec<ShortCode>) -> Result<()> {
        self.bounded(
            "delete_user_urls",
            self.deleter.delete_user_urls(owner_id, codes),
        )
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.bounded("ping", self.repository.ping()).await
    }
}
