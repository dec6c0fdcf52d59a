use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tinylink_core::{OwnerId, ShortCode, ANONYMOUS_OWNER};

pub const DATABASE_DSN_ENV: &str = "TINYLINK_DATABASE_DSN";
pub const FILE_STORAGE_PATH_ENV: &str = "TINYLINK_FILE_STORAGE_PATH";
pub const BASE_URL_ENV: &str = "TINYLINK_BASE_URL";
pub const OPERATION_TIMEOUT_ENV: &str = "TINYLINK_OPERATION_TIMEOUT_MS";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Parser)]
#[command(name = "tinylink", about = "Operate a tinylink store")]
pub struct CLI {
    /// PostgreSQL connection string. Takes precedence over the file backend.
    #[arg(long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    /// JSON file backing the store when no DSN is given.
    #[arg(long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<PathBuf>,

    /// Create the `short_links` table before running the command.
    #[arg(long)]
    pub create_schema: bool,

    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = OPERATION_TIMEOUT_ENV, default_value_t = DEFAULT_OPERATION_TIMEOUT_MS)]
    pub operation_timeout_ms: u64,

    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..))]
    pub delete_batch_size: u32,

    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    pub delete_workers: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten a single URL.
    Shorten {
        url: String,
        #[arg(long, default_value_t = ANONYMOUS_OWNER)]
        owner: OwnerId,
    },
    /// Shorten several URLs at once, given as `correlation_id=url` pairs.
    Batch {
        #[arg(required = true, value_parser = parse_pair)]
        pairs: Vec<(String, String)>,
        #[arg(long, default_value_t = ANONYMOUS_OWNER)]
        owner: OwnerId,
    },
    /// Print the original URL behind a code.
    Resolve { code: ShortCode },
    /// List every link owned by a user.
    List {
        #[arg(long, default_value_t = ANONYMOUS_OWNER)]
        owner: OwnerId,
    },
    /// Soft-delete codes owned by a user.
    Delete {
        #[arg(required = true)]
        codes: Vec<ShortCode>,
        #[arg(long, default_value_t = ANONYMOUS_OWNER)]
        owner: OwnerId,
    },
    /// Check that the backend is reachable.
    Ping,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((id, url)) if !id.is_empty() => Ok((id.to_string(), url.to_string())),
        _ => Err(format!("expected correlation_id=url, got '{raw}'")),
    }
}
