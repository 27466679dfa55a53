//! SQLite output and certificate store.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, instrument};

use crate::error::{WorkflowError, WorkflowResult};
use crate::node::WorkflowNode;
use crate::types::{Certificate, WorkflowOutput};

use super::{CertificateSource, OutputStore};

const OUTPUT_COLUMNS: &str = "id, workflow_id, node_id, node, succeed, created, updated";
const CERTIFICATE_COLUMNS: &str = "id, san, certificate, private_key, issuer_certificate, \
     cert_url, cert_stable_url, workflow_id, workflow_node_id, output_id, created, updated";

/// SQLite-backed output and certificate store.
#[derive(Debug, Clone)]
pub struct SqliteOutputStore {
    pool: SqlitePool,
}

impl SqliteOutputStore {
    /// Opens (creating if missing) the database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> WorkflowResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening output database");

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| WorkflowError::storage(format!("failed to connect: {e}")))?;

        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, creating the schema if needed.
    pub async fn from_pool(pool: SqlitePool) -> WorkflowResult<Self> {
        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> WorkflowResult<()> {
        let statements = [
            r"
            CREATE TABLE IF NOT EXISTS workflow_output (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                node_id TEXT NOT NULL,
                node TEXT NOT NULL,
                succeed INTEGER NOT NULL,
                created TEXT NOT NULL,
                updated TEXT NOT NULL,
                UNIQUE (workflow_id, node_id)
            )
            ",
            r"CREATE INDEX IF NOT EXISTS idx_workflow_output_node ON workflow_output(node_id, updated)",
            r"
            CREATE TABLE IF NOT EXISTS certificate (
                id TEXT PRIMARY KEY,
                san TEXT NOT NULL,
                certificate TEXT NOT NULL,
                private_key TEXT NOT NULL,
                issuer_certificate TEXT NOT NULL DEFAULT '',
                cert_url TEXT NOT NULL DEFAULT '',
                cert_stable_url TEXT NOT NULL DEFAULT '',
                workflow_id TEXT NOT NULL DEFAULT '',
                workflow_node_id TEXT NOT NULL DEFAULT '',
                output_id TEXT,
                created TEXT NOT NULL,
                updated TEXT NOT NULL
            )
            ",
            r"CREATE INDEX IF NOT EXISTS idx_certificate_node ON certificate(workflow_node_id, created)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(|e| WorkflowError::storage(format!("failed to create schema: {e}")))?;
        }

        Ok(())
    }

    /// Stores a certificate as given, replacing any with the same id.
    #[instrument(skip(self, certificate), fields(id = %certificate.id))]
    pub async fn insert_certificate(&self, certificate: &Certificate) -> WorkflowResult<()> {
        insert_certificate(&self.pool, certificate)
            .await
            .map_err(|e| WorkflowError::storage(format!("certificate insert failed: {e}")))
    }

    /// Closes the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn insert_certificate<'e, E>(executor: E, certificate: &Certificate) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(&format!(
        r"
        INSERT INTO certificate ({CERTIFICATE_COLUMNS})
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            workflow_id = excluded.workflow_id,
            workflow_node_id = excluded.workflow_node_id,
            output_id = excluded.output_id,
            updated = excluded.updated
        "
    ))
    .bind(&certificate.id)
    .bind(&certificate.san)
    .bind(&certificate.certificate)
    .bind(certificate.private_key.expose_secret())
    .bind(&certificate.issuer_certificate)
    .bind(&certificate.cert_url)
    .bind(&certificate.cert_stable_url)
    .bind(&certificate.workflow_id)
    .bind(&certificate.workflow_node_id)
    .bind(&certificate.output_id)
    .bind(format_timestamp(certificate.created))
    .bind(format_timestamp(certificate.updated))
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl OutputStore for SqliteOutputStore {
    #[instrument(skip(self), fields(node_id = %node_id))]
    async fn get(&self, node_id: &str) -> WorkflowResult<WorkflowOutput> {
        let row = sqlx::query(&format!(
            "SELECT {OUTPUT_COLUMNS} FROM workflow_output WHERE node_id = ? ORDER BY updated DESC LIMIT 1"
        ))
        .bind(node_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => WorkflowError::not_found(format!("output of node {node_id}")),
            other => WorkflowError::storage(format!("query failed: {other}")),
        })?;

        decode_output(&row)
    }

    #[instrument(skip(self, output, certificate), fields(workflow = %output.workflow, node_id = %output.node_id))]
    async fn save(
        &self,
        output: &WorkflowOutput,
        certificate: Option<&Certificate>,
    ) -> WorkflowResult<WorkflowOutput> {
        let persistence = |e: sqlx::Error| WorkflowError::Persistence(e.to_string());

        let node = serde_json::to_string(&output.node)
            .map_err(|e| WorkflowError::Serialisation(e.to_string()))?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(persistence)?;

        let taken = match &output.id {
            Some(id) => sqlx::query(
                "SELECT 1 FROM workflow_output WHERE id = ? AND (workflow_id != ? OR node_id != ?)",
            )
            .bind(id)
            .bind(&output.workflow)
            .bind(&output.node_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(persistence)?
            .is_some(),
            None => false,
        };
        let id = match &output.id {
            Some(id) if !taken => id.clone(),
            _ => ulid::Ulid::new().to_string().to_lowercase(),
        };

        let row = sqlx::query(
            r"
            INSERT INTO workflow_output (id, workflow_id, node_id, node, succeed, created, updated)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(workflow_id, node_id) DO UPDATE SET
                node = excluded.node,
                succeed = excluded.succeed,
                updated = excluded.updated
            RETURNING id, created
            ",
        )
        .bind(&id)
        .bind(&output.workflow)
        .bind(&output.node_id)
        .bind(&node)
        .bind(output.succeed)
        .bind(format_timestamp(now))
        .bind(format_timestamp(now))
        .fetch_one(&mut *tx)
        .await
        .map_err(persistence)?;

        let saved = WorkflowOutput {
            id: Some(row.try_get("id").map_err(persistence)?),
            workflow: output.workflow.clone(),
            node_id: output.node_id.clone(),
            node: output.node.clone(),
            succeed: output.succeed,
            created: parse_timestamp(&row.try_get::<String, _>("created").map_err(persistence)?)?,
            updated: now,
        };

        if let Some(certificate) = certificate {
            let mut certificate = certificate.clone();
            certificate.output_id.clone_from(&saved.id);
            certificate.workflow_id.clone_from(&saved.workflow);
            certificate.workflow_node_id.clone_from(&saved.node_id);
            insert_certificate(&mut *tx, &certificate)
                .await
                .map_err(persistence)?;
        }

        tx.commit().await.map_err(persistence)?;
        debug!(id = ?saved.id, "saved output");
        Ok(saved)
    }
}

#[async_trait]
impl CertificateSource for SqliteOutputStore {
    #[instrument(skip(self), fields(node_id = %node_id))]
    async fn get_certificate(&self, node_id: &str) -> WorkflowResult<Certificate> {
        let row = sqlx::query(&format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificate WHERE workflow_node_id = ? ORDER BY created DESC LIMIT 1"
        ))
        .bind(node_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                WorkflowError::not_found(format!("certificate of node {node_id}"))
            }
            other => WorkflowError::storage(format!("query failed: {other}")),
        })?;

        decode_certificate(&row)
    }
}

fn column<T>(row: &SqliteRow, name: &str) -> WorkflowResult<T>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| WorkflowError::storage(format!("failed to read column {name}: {e}")))
}

fn decode_output(row: &SqliteRow) -> WorkflowResult<WorkflowOutput> {
    let node: WorkflowNode = serde_json::from_str(&column::<String>(row, "node")?)
        .map_err(|e| WorkflowError::Serialisation(format!("invalid node snapshot: {e}")))?;

    Ok(WorkflowOutput {
        id: Some(column(row, "id")?),
        workflow: column(row, "workflow_id")?,
        node_id: column(row, "node_id")?,
        node,
        succeed: column(row, "succeed")?,
        created: parse_timestamp(&column::<String>(row, "created")?)?,
        updated: parse_timestamp(&column::<String>(row, "updated")?)?,
    })
}

fn decode_certificate(row: &SqliteRow) -> WorkflowResult<Certificate> {
    Ok(Certificate {
        id: column(row, "id")?,
        san: column(row, "san")?,
        certificate: column(row, "certificate")?,
        private_key: SecretString::from(column::<String>(row, "private_key")?),
        issuer_certificate: column(row, "issuer_certificate")?,
        cert_url: column(row, "cert_url")?,
        cert_stable_url: column(row, "cert_stable_url")?,
        workflow_id: column(row, "workflow_id")?,
        workflow_node_id: column(row, "workflow_node_id")?,
        output_id: column(row, "output_id")?,
        created: parse_timestamp(&column::<String>(row, "created")?)?,
        updated: parse_timestamp(&column::<String>(row, "updated")?)?,
    })
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> WorkflowResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| WorkflowError::storage(format!("invalid timestamp {raw:?}: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::node::{NodeType, CONFIG_ACCESS};
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    async fn setup() -> (SqliteOutputStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteOutputStore::open(temp_dir.path().join("outputs.db"))
            .await
            .unwrap();
        (store, temp_dir)
    }

    fn output(workflow: &str, node_id: &str) -> WorkflowOutput {
        let node = WorkflowNode::new(node_id, "Deploy", NodeType::Deploy).with_config(CONFIG_ACCESS, "acc1");
        WorkflowOutput::new(workflow, node, true)
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (store, _dir) = setup().await;
        assert!(store.get("n1").await.unwrap_err().is_not_found());
        assert!(store.get_certificate("n1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn save_then_get() {
        let (store, _dir) = setup().await;

        let saved = store.save(&output("wf1", "n1"), None).await.unwrap();
        let loaded = store.get("n1").await.unwrap();

        assert_eq!(loaded.id, saved.id);
        assert_eq!(loaded.workflow, "wf1");
        assert!(loaded.succeed);
        assert_eq!(loaded.node.get_config_string(CONFIG_ACCESS), "acc1");
        assert_eq!(loaded.updated, saved.updated);
    }

    #[tokio::test]
    async fn save_upserts_by_workflow_and_node() {
        let (store, _dir) = setup().await;

        let first = store.save(&output("wf1", "n1"), None).await.unwrap();
        let mut rerun = output("wf1", "n1");
        rerun.succeed = false;
        let second = store.save(&rerun, None).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created, second.created);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workflow_output")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(!store.get("n1").await.unwrap().succeed);
    }

    #[tokio::test]
    async fn save_never_reuses_another_records_id() {
        let (store, _dir) = setup().await;
        let first = store.save(&output("wf1", "n1"), None).await.unwrap();

        let foreign = output("wf2", "n1").with_id(first.id.clone());
        let second = store.save(&foreign, None).await.unwrap();
        let again = store.save(&foreign, None).await.unwrap();

        assert!(second.id.is_some());
        assert_ne!(second.id, first.id);
        assert_eq!(again.id, second.id);
        assert_eq!(again.created, second.created);
    }

    #[tokio::test]
    async fn save_links_certificate() {
        let (store, _dir) = setup().await;
        let cert = Certificate::new("example.com;www.example.com", "LEAF", "KEY")
            .with_issuer("ISSUER")
            .with_urls("https://acme/cert/1", "https://acme/cert/stable");

        let saved = store.save(&output("wf1", "apply1"), Some(&cert)).await.unwrap();
        let loaded = store.get_certificate("apply1").await.unwrap();

        assert_eq!(loaded.id, cert.id);
        assert_eq!(loaded.output_id, saved.id);
        assert_eq!(loaded.workflow_id, "wf1");
        assert_eq!(loaded.domains(), vec!["example.com", "www.example.com"]);
        assert_eq!(loaded.issuer_certificate, "ISSUER");
        assert_eq!(loaded.created, cert.created);
    }

    #[tokio::test]
    async fn latest_certificate_wins() {
        let (store, _dir) = setup().await;
        let now = Utc::now();

        let mut old = Certificate::new("example.com", "OLD", "KEY").with_created(now - ChronoDuration::days(60));
        old.workflow_node_id = "apply1".to_owned();
        let mut new = Certificate::new("example.com", "NEW", "KEY").with_created(now);
        new.workflow_node_id = "apply1".to_owned();

        store.insert_certificate(&new).await.unwrap();
        store.insert_certificate(&old).await.unwrap();

        assert_eq!(store.get_certificate("apply1").await.unwrap().certificate, "NEW");
    }

    #[tokio::test]
    async fn save_on_closed_pool_is_persistence_error() {
        let (store, _dir) = setup().await;
        store.close().await;

        let err = store.save(&output("wf1", "n1"), None).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Persistence(_)));
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("outputs.db");

        let store = SqliteOutputStore::open(&path).await.unwrap();
        let saved = store.save(&output("wf1", "n1"), None).await.unwrap();
        store.close().await;

        let store = SqliteOutputStore::open(&path).await.unwrap();
        assert_eq!(store.get("n1").await.unwrap().id, saved.id);
    }
}
