//! SQLite access backend.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, instrument};

use crate::error::{AccessError, AccessResult};
use crate::traits::AccessRepository;
use crate::types::AccessRecord;

/// SQLite-backed access repository.
#[derive(Debug, Clone)]
pub struct SqliteAccess {
    pool: SqlitePool,
}

impl SqliteAccess {
    /// Opens (creating if missing) the database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> AccessResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening access database");

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AccessError::Database(format!("failed to connect: {e}")))?;

        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, creating the schema if needed.
    pub async fn from_pool(pool: SqlitePool) -> AccessResult<Self> {
        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> AccessResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS access (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                config TEXT NOT NULL,
                config_type TEXT NOT NULL,
                usage TEXT NOT NULL DEFAULT 'all',
                created TEXT NOT NULL,
                updated TEXT NOT NULL
            )
            ",
        )
        .execute(pool)
        .await
        .map_err(|e| AccessError::Database(format!("failed to create table: {e}")))?;

        Ok(())
    }

    /// Stores a record, replacing any record with the same id.
    #[instrument(skip(self, record), fields(id = %record.id))]
    pub async fn insert(&self, record: &AccessRecord) -> AccessResult<()> {
        sqlx::query(
            r"
            INSERT INTO access (id, name, config, config_type, usage, created, updated)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                config = excluded.config,
                config_type = excluded.config_type,
                usage = excluded.usage,
                updated = excluded.updated
            ",
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(record.config.expose_secret())
        .bind(&record.config_type)
        .bind(record.usage.as_str())
        .bind(format_timestamp(record.created))
        .bind(format_timestamp(record.updated))
        .execute(&self.pool)
        .await
        .map_err(|e| AccessError::Database(format!("insert failed: {e}")))?;

        Ok(())
    }

    /// Closes the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl AccessRepository for SqliteAccess {
    #[instrument(skip(self), fields(id = %id))]
    async fn get_by_id(&self, id: &str) -> AccessResult<AccessRecord> {
        let row = sqlx::query(
            r"
            SELECT id, name, config, config_type, usage, created, updated
            FROM access WHERE id = ?
            ",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => AccessError::not_found(id),
            other => AccessError::Database(format!("query failed: {other}")),
        })?;

        decode_row(&row)
    }
}

fn decode_row(row: &SqliteRow) -> AccessResult<AccessRecord> {
    let column = |name: &str| -> AccessResult<String> {
        row.try_get::<String, _>(name)
            .map_err(|e| AccessError::Database(format!("failed to read column {name}: {e}")))
    };

    let usage = column("usage")?
        .parse()
        .map_err(AccessError::Database)?;

    Ok(AccessRecord {
        id: column("id")?,
        name: column("name")?,
        config: SecretString::from(column("config")?),
        config_type: column("config_type")?,
        usage,
        created: parse_timestamp(&column("created")?)?,
        updated: parse_timestamp(&column("updated")?)?,
    })
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> AccessResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AccessError::Database(format!("invalid timestamp {raw:?}: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::AccessUsage;
    use tempfile::TempDir;

    async fn setup() -> (SqliteAccess, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let backend = SqliteAccess::open(temp_dir.path().join("access.db"))
            .await
            .unwrap();
        (backend, temp_dir)
    }

    #[tokio::test]
    async fn insert_and_get() {
        let (backend, _temp) = setup().await;

        let record = AccessRecord::new("edge hook", "webhook", r#"{"url":"https://example.com"}"#)
            .with_id("acc1")
            .with_usage(AccessUsage::Deploy);
        backend.insert(&record).await.unwrap();

        let loaded = backend.get_by_id("acc1").await.unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.name, record.name);
        assert_eq!(loaded.config.expose_secret(), r#"{"url":"https://example.com"}"#);
        assert_eq!(loaded.config_type, record.config_type);
        assert_eq!(loaded.usage, AccessUsage::Deploy);
        assert_eq!(loaded.created, record.created);
        assert_eq!(loaded.updated, record.updated);
    }

    #[tokio::test]
    async fn missing_row_maps_to_not_found() {
        let (backend, _temp) = setup().await;

        let err = backend.get_by_id("acc1").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err, AccessError::NotFound { ref id } if id == "acc1"));
    }

    #[tokio::test]
    async fn insert_replaces_existing_record() {
        let (backend, _temp) = setup().await;

        let mut record = AccessRecord::new("hook", "webhook", "{}").with_id("acc1");
        backend.insert(&record).await.unwrap();

        record.name = "renamed".to_owned();
        record.config = SecretString::from(r#"{"url":"https://new.example.com"}"#.to_owned());
        backend.insert(&record).await.unwrap();

        let loaded = backend.get_by_id("acc1").await.unwrap();
        assert_eq!(loaded.name, "renamed");
        assert_eq!(loaded.config.expose_secret(), r#"{"url":"https://new.example.com"}"#);
    }

    #[tokio::test]
    async fn closed_pool_is_a_database_error() {
        let (backend, _temp) = setup().await;
        backend.close().await;

        let err = backend.get_by_id("acc1").await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(matches!(err, AccessError::Database(_)));
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("access.db");

        {
            let backend = SqliteAccess::open(&path).await.unwrap();
            backend
                .insert(&AccessRecord::new("hook", "webhook", "{}").with_id("acc1"))
                .await
                .unwrap();
            backend.close().await;
        }

        let backend = SqliteAccess::open(&path).await.unwrap();
        assert_eq!(backend.get_by_id("acc1").await.unwrap().name, "hook");
    }
}
