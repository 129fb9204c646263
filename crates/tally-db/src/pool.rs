//! # SQLite Document Store
//!
//! Connection pool setup and the SQLite implementation of
//! [`DocumentStore`].
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SQLite Document Store                              │
//! │                                                                         │
//! │  DbConfig::new(url) ← Configure pool settings                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SqliteStore::new(config).await ← Create pool + run migrations          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  put(id, body, expected)                                                │
//! │    BEGIN                                                                │
//! │      UPDATE documents ... WHERE id = ? AND revision = ?   (or INSERT)   │
//! │      0 rows → read actual revision → StaleRevision                      │
//! │      DELETE doc_index rows, INSERT rows from Indexer                    │
//! │    COMMIT                                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File databases run in WAL mode: readers don't block the single writer.
//! The write statement comes first in every transaction, so a writer takes
//! its lock up front instead of upgrading a read lock.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::index::{doc_type, Indexer};
use crate::migrations;
use crate::revision::Revision;
use crate::store::{check_expected, BatchOp, Document, DocumentStore};

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust
/// use tally_db::DbConfig;
///
/// let config = DbConfig::new("sqlite://tally.db").max_connections(5);
/// assert_eq!(config.max_connections, 5);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite URL, `sqlite://path/to/file.db` or `sqlite::memory:`.
    pub url: String,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection. `None` keeps them open.
    /// Default: 10 minutes
    pub idle_timeout: Option<Duration>,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    pub fn new(url: impl Into<String>) -> Self {
        DbConfig {
            url: url.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// An in-memory database (for testing).
    ///
    /// One connection that never idles out; the data lives as long as it.
    pub fn in_memory() -> Self {
        DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            run_migrations: true,
        }
    }

    pub fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    indexer: Indexer,
}

impl SqliteStore {
    /// Opens the pool and, unless disabled, runs migrations.
    ///
    /// File databases are created if missing and use WAL journaling with
    /// NORMAL synchronous mode. Foreign keys are enabled so index rows go
    /// away with their document.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(url = %config.url, "Initializing document store");

        let mut connect_options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);
        if !config.is_memory() {
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(if config.is_memory() {
                None
            } else {
                Some(Duration::from_secs(30 * 60))
            })
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(max_connections = config.max_connections, "Document store pool created");

        let store = SqliteStore {
            pool,
            indexer: Indexer::standard(),
        };
        if config.run_migrations {
            store.run_migrations().await?;
        }
        Ok(store)
    }

    pub fn with_indexer(mut self, indexer: Indexer) -> Self {
        self.indexer = indexer;
        self
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        info!("Closing document store pool");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Statements
// =============================================================================

fn row_to_document(row: &SqliteRow) -> DbResult<Document> {
    let body: String = row.try_get("body")?;
    Ok(Document {
        id: row.try_get("id")?,
        revision: Revision::from_stored(row.try_get::<String, _>("revision")?),
        doc_type: row.try_get("doc_type")?,
        body: serde_json::from_str(&body)?,
    })
}

async fn current_revision(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Revision>> {
    let revision: Option<String> = sqlx::query_scalar("SELECT revision FROM documents WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(revision.map(Revision::from_stored))
}

async fn put_in(
    conn: &mut SqliteConnection,
    indexer: &Indexer,
    id: &str,
    body: &Value,
    expected: Option<&Revision>,
) -> DbResult<Revision> {
    let revision = expected.map_or_else(Revision::first, Revision::next);
    let text = serde_json::to_string(body)?;
    let now = Utc::now().to_rfc3339();

    let written = match expected {
        Some(expected) => {
            sqlx::query(
                "UPDATE documents SET revision = ?, doc_type = ?, body = ?, updated_at = ? \
                 WHERE id = ? AND revision = ?",
            )
            .bind(revision.as_str())
            .bind(doc_type(body))
            .bind(&text)
            .bind(&now)
            .bind(id)
            .bind(expected.as_str())
            .execute(&mut *conn)
            .await?
        }
        None => {
            sqlx::query(
                "INSERT INTO documents (id, revision, doc_type, body, updated_at) \
                 VALUES (?, ?, ?, ?, ?) ON CONFLICT(id) DO NOTHING",
            )
            .bind(id)
            .bind(revision.as_str())
            .bind(doc_type(body))
            .bind(&text)
            .bind(&now)
            .execute(&mut *conn)
            .await?
        }
    };

    if written.rows_affected() == 0 {
        let actual = current_revision(conn, id).await?;
        check_expected(id, actual.as_ref(), expected)?;
        // revision matched between the two statements; treat as a lost race
        return Err(DbError::stale(
            id,
            expected.map(Revision::as_str),
            actual.as_ref().map(Revision::as_str),
        ));
    }

    sqlx::query("DELETE FROM doc_index WHERE doc_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    for (index, key) in indexer.entries(body) {
        sqlx::query("INSERT INTO doc_index (index_name, key, doc_id) VALUES (?, ?, ?)")
            .bind(index)
            .bind(key)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(revision)
}

async fn delete_in(
    conn: &mut SqliteConnection,
    id: &str,
    expected: Option<&Revision>,
) -> DbResult<()> {
    let deleted = match expected {
        Some(expected) => {
            sqlx::query("DELETE FROM documents WHERE id = ? AND revision = ?")
                .bind(id)
                .bind(expected.as_str())
                .execute(&mut *conn)
                .await?
        }
        None => {
            sqlx::query("DELETE FROM documents WHERE id = ?")
                .bind(id)
                .execute(&mut *conn)
                .await?
        }
    };
    if deleted.rows_affected() == 0 {
        return match current_revision(conn, id).await? {
            None => Err(DbError::not_found("Document", id)),
            Some(actual) => Err(DbError::stale(
                id,
                expected.map(Revision::as_str),
                Some(actual.as_str()),
            )),
        };
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, id: &str) -> DbResult<Option<Document>> {
        let row = sqlx::query("SELECT id, revision, doc_type, body FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_document).transpose()
    }

    async fn get_revision(&self, id: &str) -> DbResult<Option<Revision>> {
        let mut conn = self.pool.acquire().await?;
        current_revision(&mut conn, id).await
    }

    async fn put(&self, id: &str, body: Value, expected: Option<&Revision>) -> DbResult<Revision> {
        let mut tx = self.pool.begin().await?;
        let revision = put_in(&mut tx, &self.indexer, id, &body, expected).await?;
        tx.commit().await?;
        debug!(id, revision = %revision, "document written");
        Ok(revision)
    }

    async fn delete(&self, id: &str, expected: Option<&Revision>) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        delete_in(&mut tx, id, expected).await?;
        tx.commit().await?;
        debug!(id, "document deleted");
        Ok(())
    }

    async fn query_by_index(&self, index: &str, key: &str) -> DbResult<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT d.id, d.revision, d.doc_type, d.body FROM documents d \
             JOIN doc_index i ON i.doc_id = d.id \
             WHERE i.index_name = ? AND i.key = ? ORDER BY d.id",
        )
        .bind(index)
        .bind(key)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_document).collect()
    }

    async fn run_batch(&self, ops: Vec<BatchOp>) -> DbResult<Vec<Option<Revision>>> {
        let mut tx = self.pool.begin().await?;
        let mut revisions = Vec::with_capacity(ops.len());
        for op in &ops {
            match op {
                BatchOp::Put { id, body, expected } => {
                    let rev = put_in(&mut tx, &self.indexer, id, body, expected.as_ref()).await?;
                    revisions.push(Some(rev));
                }
                BatchOp::Delete { id, expected } => {
                    delete_in(&mut tx, id, expected.as_ref()).await?;
                    revisions.push(None);
                }
            }
        }
        // dropping `tx` on any error above rolls the batch back
        tx.commit().await?;
        debug!(ops = ops.len(), "batch committed");
        Ok(revisions)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ORDER_BY_SHIFT, UNSETTLED_TRANSACTIONS_BY_SHIFT};
    use crate::store::{load_typed, put_typed, query_typed};
    use serde_json::json;
    use tally_core::model::{Bill, OpenOrder, Order, Transaction};
    use tally_core::{Money, SessionContext};

    async fn store() -> SqliteStore {
        SqliteStore::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = store().await;
        assert!(store.health_check().await);
        let (total, applied) = migrations::migration_status(store.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("sqlite:///tmp/tally-test.db")
            .max_connections(10)
            .min_connections(2);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.is_memory());
        assert!(DbConfig::in_memory().is_memory());
    }

    #[tokio::test]
    async fn test_put_conflicts() {
        let store = store().await;
        let r1 = store.put("a", json!({"n": 1}), None).await.unwrap();
        let r2 = store.put("a", json!({"n": 2}), Some(&r1)).await.unwrap();
        assert_eq!(r2.counter(), 2);

        let err = store.put("a", json!({"n": 3}), Some(&r1)).await.unwrap_err();
        match err {
            DbError::StaleRevision { expected, actual, .. } => {
                assert_eq!(expected, r1.as_str());
                assert_eq!(actual, r2.as_str());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.put("a", json!({}), None).await.unwrap_err().is_conflict());
        assert!(store
            .put("missing", json!({}), Some(&r1))
            .await
            .unwrap_err()
            .is_conflict());
        assert_eq!(store.get("a").await.unwrap().unwrap().body["n"], 2);
    }

    #[tokio::test]
    async fn test_delete_and_batch_rollback() {
        let store = store().await;
        let r1 = store.put("a", json!({}), None).await.unwrap();

        let err = store
            .run_batch(vec![
                BatchOp::Put {
                    id: "b".into(),
                    body: json!({}),
                    expected: None,
                },
                BatchOp::Delete {
                    id: "a".into(),
                    expected: Some(Revision::from_stored("7-x")),
                },
            ])
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(store.get("b").await.unwrap().is_none());

        store.delete("a", Some(&r1)).await.unwrap();
        assert!(matches!(
            store.delete("a", None).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_index_rows_follow_the_body() {
        let store = store().await;
        let mut ctx = SessionContext::default();
        ctx.store.id = "s1".into();
        ctx.shift.id = "sh1".into();

        let order = Order::open(&ctx, OpenOrder::default());
        let rev = put_typed(&store, &order, None).await.unwrap();
        let bill = Bill::with_pricing(order.pricing.clone(), Money::ZERO);
        let trans = Transaction::cash(&ctx, &order, &bill, Money::from_cents(500), None);
        put_typed(&store, &trans, None).await.unwrap();

        let by_shift = query_typed::<Order>(&store, ORDER_BY_SHIFT, "sh1").await.unwrap();
        assert_eq!(by_shift.len(), 1);
        assert_eq!(by_shift[0].revision, rev);

        let unsettled = query_typed::<Transaction>(&store, UNSETTLED_TRANSACTIONS_BY_SHIFT, "sh1")
            .await
            .unwrap();
        assert_eq!(unsettled.len(), 1);
        assert_eq!(unsettled[0].value.approved_amount.cents(), 500);

        let loaded = load_typed::<Order>(&store, &order.id).await.unwrap();
        assert_eq!(loaded.value, order);
        assert!(matches!(
            load_typed::<Order>(&store, "nope").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
