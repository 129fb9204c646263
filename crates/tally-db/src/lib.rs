//! # tally-db: Revisioned Document Store
//!
//! Every order, transaction and lock document is a JSON body stored under an
//! id with a revision. Writes name the revision they read; a mismatch is
//! refused with [`DbError::StaleRevision`] and never merged.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          tally-db                                       │
//! │                                                                         │
//! │   put_typed(&order, Some(&rev))                                         │
//! │          │                                                              │
//! │          ▼                                                              │
//! │   ┌──────────────────┐     ┌──────────────────────────────────────┐     │
//! │   │  DocumentStore   │────►│ MemoryStore  BTreeMap + RwLock       │     │
//! │   │  (async trait)   │     └──────────────────────────────────────┘     │
//! │   │                  │     ┌──────────────────────────────────────┐     │
//! │   │                  │────►│ SqliteStore  documents + doc_index   │     │
//! │   └──────────────────┘     └──────────────────────────────────────┘     │
//! │          │                                                              │
//! │          ▼                                                              │
//! │   Revision "N-<hex>"  (N increases by one per write)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use tally_db::{DbConfig, SqliteStore, DocumentStore};
//!
//! # async fn example() -> tally_db::DbResult<()> {
//! let store = SqliteStore::new(DbConfig::new("sqlite://tally.db")).await?;
//! let rev = store.put("doc-1", serde_json::json!({"n": 1}), None).await?;
//! store.put("doc-1", serde_json::json!({"n": 2}), Some(&rev)).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod index;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod revision;
pub mod store;

pub use error::{DbError, DbResult};
pub use index::{
    Indexer, IndexRule, OPEN_ORDERS_BY_STORE, ORDER_BY_SHIFT, UNSETTLED_TRANSACTIONS_BY_SHIFT,
};
pub use memory::MemoryStore;
pub use pool::{DbConfig, SqliteStore};
pub use revision::{is_greater_or_equal_rev, revision_counter, Revision};
pub use store::{
    get_typed, load_typed, put_typed, query_typed, BatchOp, Document, DocumentStore,
    StoredDocument, Versioned,
};
