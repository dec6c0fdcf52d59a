use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use tinylink_core::{
    InsertOutcome, NewLink, OwnerId, ReadRepository, Repository, Result, ShortCode, ShortLink,
    StorageError,
};
use tracing::debug;

/// Name of the primary key constraint on `short_links.code`.
const CODE_CONSTRAINT: &str = "short_links_pkey";

/// Schema expected by [`PostgresRepository`].
pub const SCHEMA: &str = include_str!("../ddl/postgres/short_links.sql");

/// PostgreSQL implementation of the repository contract.
///
/// Soft delete is implemented with the `deleted` flag. Rows are never removed
/// and codes are never reused, including those of deleted rows. The unique
/// constraint on `original_url` is what makes saving the same URL twice
/// collapse to a single row, whichever connection wins the race.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a repository from an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new connection pool.
    ///
    /// `acquire_timeout` bounds how long any operation waits for a connection.
    pub async fn connect(database_url: &str, acquire_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the `short_links` table if it does not exist.
    pub async fn create_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

fn is_code_conflict(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db_err| {
        db_err.is_unique_violation() && db_err.constraint() == Some(CODE_CONSTRAINT)
    })
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn parse_code(raw: String) -> Result<ShortCode> {
    ShortCode::new(raw).map_err(StorageError::from)
}

fn parse_link(row: &PgRow) -> Result<ShortLink> {
    let code: String = row.try_get("code").map_err(map_sqlx_error)?;
    Ok(ShortLink {
        code: parse_code(code)?,
        original_url: row.try_get("original_url").map_err(map_sqlx_error)?,
        owner_id: row.try_get("owner_id").map_err(map_sqlx_error)?,
        deleted: row.try_get("deleted").map_err(map_sqlx_error)?,
    })
}

#[async_trait]
impl ReadRepository for PostgresRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        let row = sqlx::query(
            r#"
            SELECT code, original_url, owner_id, deleted
            FROM short_links
            WHERE code = $1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(parse_link).transpose()
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        let exists = sqlx::query(
            r#"
            SELECT 1
            FROM short_links
            WHERE code = $1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .is_some();

        Ok(exists)
    }

    async fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<ShortLink>> {
        let rows = sqlx::query(
            r#"
            SELECT code, original_url, owner_id, deleted
            FROM short_links
            WHERE owner_id = $1
            ORDER BY code
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(parse_link).collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn insert(&self, link: NewLink) -> Result<InsertOutcome> {
        // The no-op update makes RETURNING yield the code of the row that
        // owns the url, whether this statement created it or not.
        let result = sqlx::query(
            r#"
            INSERT INTO short_links (code, original_url, owner_id, deleted)
            VALUES ($1, $2, $3, FALSE)
            ON CONFLICT (original_url)
            DO UPDATE SET original_url = EXCLUDED.original_url
            RETURNING code
            "#,
        )
        .bind(link.code.as_str())
        .bind(&link.original_url)
        .bind(link.owner_id)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                let stored: String = row.try_get("code").map_err(map_sqlx_error)?;
                if stored == link.code.as_str() {
                    Ok(InsertOutcome::Inserted)
                } else {
                    Ok(InsertOutcome::UrlTaken(parse_code(stored)?))
                }
            }
            Err(err) if is_code_conflict(&err) => Ok(InsertOutcome::CodeTaken),
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn insert_batch(&self, links: Vec<NewLink>) -> Result<InsertOutcome> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for link in &links {
            let inserted = sqlx::query(
                r#"
                INSERT INTO short_links (code, original_url, owner_id, deleted)
                VALUES ($1, $2, $3, FALSE)
                ON CONFLICT DO NOTHING
                RETURNING code
                "#,
            )
            .bind(link.code.as_str())
            .bind(&link.original_url)
            .bind(link.owner_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            if inserted.is_some() {
                continue;
            }

            // Either constraint may have fired; the url index tells which.
            let existing = sqlx::query(
                r#"
                SELECT code
                FROM short_links
                WHERE original_url = $1
                "#,
            )
            .bind(&link.original_url)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            let outcome = match existing {
                Some(row) => {
                    let code: String = row.try_get("code").map_err(map_sqlx_error)?;
                    InsertOutcome::UrlTaken(parse_code(code)?)
                }
                None => InsertOutcome::CodeTaken,
            };

            tx.rollback().await.map_err(map_sqlx_error)?;
            debug!(code = %link.code, ?outcome, "batch insert rolled back");
            return Ok(outcome);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(InsertOutcome::Inserted)
    }

    async fn mark_deleted(&self, owner_id: OwnerId, codes: &[ShortCode]) -> Result<u64> {
        let codes: Vec<String> = codes.iter().map(|code| code.as_str().to_owned()).collect();

        let result = sqlx::query(
            r#"
            UPDATE short_links
            SET deleted = TRUE
            WHERE owner_id = $1
              AND code = ANY($2)
              AND deleted = FALSE
            "#,
        )
        .bind(owner_id)
        .bind(codes)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
