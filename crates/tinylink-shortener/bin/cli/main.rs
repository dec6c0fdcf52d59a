mod cli;

use crate::cli::{Command, CLI};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tinylink_core::{LinkStore, Repository, SaveOutcome};
use tinylink_generator::RandomGenerator;
use tinylink_shortener::{BulkDeleterSettings, DeletionQueue, LinkService, ServiceSettings};
use tinylink_storage::{FileRepository, InMemoryRepository, PostgresRepository};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = CLI::parse();
    let timeout = Duration::from_millis(config.operation_timeout_ms);
    let settings = ServiceSettings::builder()
        .operation_timeout(timeout)
        .bulk_delete(
            BulkDeleterSettings::builder()
                .batch_size(config.delete_batch_size as usize)
                .workers(config.delete_workers as usize)
                .build(),
        )
        .build();

    if let Some(dsn) = &config.database_dsn {
        info!(backend = "postgres", "opening store");
        let repository = PostgresRepository::connect(dsn, timeout)
            .await
            .context("failed to connect to postgres")?;
        if config.create_schema {
            repository
                .create_schema()
                .await
                .context("failed to create schema")?;
        }
        run(repository, settings, config).await
    } else if let Some(path) = &config.file_storage_path {
        info!(backend = "file", path = %path.display(), "opening store");
        let repository = FileRepository::open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        run(repository, settings, config).await
    } else {
        info!(backend = "memory", "opening store");
        run(InMemoryRepository::new(), settings, config).await
    }
}

async fn run<R: Repository>(
    repository: R,
    settings: ServiceSettings,
    config: CLI,
) -> anyhow::Result<()> {
    let store = Arc::new(LinkService::new(
        repository,
        RandomGenerator::new(),
        settings,
    ));
    let base_url = config.base_url.as_str();

    match config.command {
        Command::Shorten { url, owner } => match store.save(owner, &url).await? {
            SaveOutcome::Created(code) => println!("{}", code.to_url(base_url)),
            SaveOutcome::Existing(code) => {
                println!("{} (already shortened)", code.to_url(base_url))
            }
        },
        Command::Batch { pairs, owner } => {
            let codes = store.save_batch(owner, pairs.into_iter().collect()).await?;
            let mut codes: Vec<_> = codes.into_iter().collect();
            codes.sort();
            for (correlation_id, code) in codes {
                println!("{correlation_id}\t{}", code.to_url(base_url));
            }
        }
        Command::Resolve { code } => {
            let url = store.get(&code).await?.into_result(&code)?;
            println!("{url}");
        }
        Command::List { owner } => {
            for link in store.get_user_urls(owner).await? {
                println!("{}\t{}", link.code.to_url(base_url), link.original_url);
            }
        }
        Command::Delete { codes, owner } => {
            let count = codes.len();
            let (queue, worker) = DeletionQueue::spawn(Arc::clone(&store), 1);
            queue.submit(owner, codes).await?;
            info!(owner_id = owner, codes = count, "delete accepted");
            worker.shutdown().await?;
        }
        Command::Ping => {
            store.ping().await?;
            println!("ok");
        }
    }

    Ok(())
}
