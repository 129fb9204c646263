//! # Document Store Interface
//!
//! The narrow interface the ledger and the lock coordinator consume.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     DocumentStore (async trait)                         │
//! │                                                                         │
//! │  get(id)                         ──► Option<Document>                   │
//! │  get_revision(id)                ──► Option<Revision>                   │
//! │  put(id, body, expected)         ──► Revision  |  StaleRevision         │
//! │  delete(id, expected)            ──► ()        |  StaleRevision         │
//! │  query_by_index(index, key)      ──► Vec<Document>                      │
//! │  run_batch(ops)                  ──► all applied, or none               │
//! │                                                                         │
//! │  Implementations: MemoryStore (memory.rs), SqliteStore (pool.rs)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Optimistic Writes
//! `expected` is the revision the caller read. `None` means "create": the
//! write fails when the document already exists. A mismatch never merges;
//! the caller re-reads and decides.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tally_core::model::{Order, Transaction};

use crate::error::{DbError, DbResult};
use crate::index::TYPE_FIELD;
use crate::revision::Revision;

// =============================================================================
// Documents
// =============================================================================

/// A stored body with its current revision.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub revision: Revision,
    pub doc_type: String,
    pub body: Value,
}

/// One step of an all-or-nothing batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Put {
        id: String,
        body: Value,
        expected: Option<Revision>,
    },
    Delete {
        id: String,
        expected: Option<Revision>,
    },
}

impl BatchOp {
    pub fn id(&self) -> &str {
        match self {
            BatchOp::Put { id, .. } | BatchOp::Delete { id, .. } => id,
        }
    }
}

/// A typed value and the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub revision: Revision,
}

// =============================================================================
// Store Trait
// =============================================================================

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, id: &str) -> DbResult<Option<Document>>;

    async fn get_revision(&self, id: &str) -> DbResult<Option<Revision>> {
        Ok(self.get(id).await?.map(|doc| doc.revision))
    }

    /// Writes `body` if the stored revision is still `expected`.
    async fn put(&self, id: &str, body: Value, expected: Option<&Revision>) -> DbResult<Revision>;

    /// Removes a document. With `expected` set, only at that revision.
    async fn delete(&self, id: &str, expected: Option<&Revision>) -> DbResult<()>;

    /// Documents whose index rows match, ordered by id.
    async fn query_by_index(&self, index: &str, key: &str) -> DbResult<Vec<Document>>;

    /// Applies every op or none. Returns the new revision of each put
    /// (`None` for deletes), in op order.
    async fn run_batch(&self, ops: Vec<BatchOp>) -> DbResult<Vec<Option<Revision>>>;
}

/// Checks a write against the stored revision.
///
/// Shared by both stores so they refuse exactly the same writes.
pub(crate) fn check_expected(
    id: &str,
    current: Option<&Revision>,
    expected: Option<&Revision>,
) -> DbResult<()> {
    match (current, expected) {
        (None, None) => Ok(()),
        (Some(current), Some(expected)) if current == expected => Ok(()),
        (current, expected) => Err(DbError::stale(
            id,
            expected.map(Revision::as_str),
            current.map(Revision::as_str),
        )),
    }
}

// =============================================================================
// Typed Documents
// =============================================================================

/// A ledger entity stored as one document.
pub trait StoredDocument: Serialize + DeserializeOwned {
    /// Value of the body's `type` field.
    const DOC_TYPE: &'static str;

    fn doc_id(&self) -> String;
}

impl StoredDocument for Order {
    const DOC_TYPE: &'static str = "order";

    fn doc_id(&self) -> String {
        self.id.clone()
    }
}

impl StoredDocument for Transaction {
    const DOC_TYPE: &'static str = "transaction";

    fn doc_id(&self) -> String {
        self.id.clone()
    }
}

/// Serializes a value and stamps its `type`.
pub fn to_body<T: StoredDocument>(value: &T) -> DbResult<Value> {
    let mut body = serde_json::to_value(value)?;
    if let Value::Object(map) = &mut body {
        map.insert(TYPE_FIELD.to_string(), Value::String(T::DOC_TYPE.to_string()));
    }
    Ok(body)
}

pub fn from_document<T: StoredDocument>(doc: Document) -> DbResult<Versioned<T>> {
    let value = serde_json::from_value(doc.body)?;
    Ok(Versioned {
        value,
        revision: doc.revision,
    })
}

pub async fn get_typed<T: StoredDocument>(
    store: &dyn DocumentStore,
    id: &str,
) -> DbResult<Option<Versioned<T>>> {
    store.get(id).await?.map(from_document).transpose()
}

/// Like [`get_typed`], failing with `NotFound` when absent.
pub async fn load_typed<T: StoredDocument>(
    store: &dyn DocumentStore,
    id: &str,
) -> DbResult<Versioned<T>> {
    get_typed(store, id)
        .await?
        .ok_or_else(|| DbError::not_found(T::DOC_TYPE, id))
}

pub async fn put_typed<T: StoredDocument>(
    store: &dyn DocumentStore,
    value: &T,
    expected: Option<&Revision>,
) -> DbResult<Revision> {
    store.put(&value.doc_id(), to_body(value)?, expected).await
}

pub async fn query_typed<T: StoredDocument>(
    store: &dyn DocumentStore,
    index: &str,
    key: &str,
) -> DbResult<Vec<Versioned<T>>> {
    store
        .query_by_index(index, key)
        .await?
        .into_iter()
        .filter(|doc| doc.doc_type == T::DOC_TYPE)
        .map(from_document)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_expected() {
        let a = Revision::from_stored("1-a");
        let b = Revision::from_stored("2-b");
        assert!(check_expected("x", None, None).is_ok());
        assert!(check_expected("x", Some(&a), Some(&a)).is_ok());
        assert!(check_expected("x", Some(&b), Some(&a)).unwrap_err().is_conflict());
        assert!(check_expected("x", Some(&a), None).unwrap_err().is_conflict());
        assert!(check_expected("x", None, Some(&a)).unwrap_err().is_conflict());
    }

    #[test]
    fn test_to_body_stamps_type() {
        let order = Order::open(&Default::default(), Default::default());
        let body = to_body(&order).unwrap();
        assert_eq!(body["type"], "order");
        assert_eq!(body["id"], order.id.as_str());
    }
}
