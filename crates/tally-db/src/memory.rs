//! In-process document store.
//!
//! Used by tests and by stations running without a database file. Applies
//! the same revision checks as the SQLite store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::index::{doc_type, Indexer};
use crate::revision::Revision;
use crate::store::{check_expected, BatchOp, Document, DocumentStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<String, Document>>,
    indexer: Indexer,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indexer(indexer: Indexer) -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            indexer,
        }
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

fn apply_put(
    docs: &mut BTreeMap<String, Document>,
    id: &str,
    body: Value,
    expected: Option<&Revision>,
) -> DbResult<Revision> {
    let current = docs.get(id).map(|doc| &doc.revision);
    check_expected(id, current, expected)?;
    let revision = current.map_or_else(Revision::first, Revision::next);
    docs.insert(
        id.to_string(),
        Document {
            id: id.to_string(),
            revision: revision.clone(),
            doc_type: doc_type(&body).to_string(),
            body,
        },
    );
    Ok(revision)
}

fn apply_delete(
    docs: &mut BTreeMap<String, Document>,
    id: &str,
    expected: Option<&Revision>,
) -> DbResult<()> {
    let current = docs
        .get(id)
        .map(|doc| &doc.revision)
        .ok_or_else(|| DbError::not_found("Document", id))?;
    if let Some(expected) = expected {
        check_expected(id, Some(current), Some(expected))?;
    }
    docs.remove(id);
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: &str) -> DbResult<Option<Document>> {
        Ok(self.docs.read().await.get(id).cloned())
    }

    async fn put(&self, id: &str, body: Value, expected: Option<&Revision>) -> DbResult<Revision> {
        let mut docs = self.docs.write().await;
        let revision = apply_put(&mut docs, id, body, expected)?;
        debug!(id, revision = %revision, "memory put");
        Ok(revision)
    }

    async fn delete(&self, id: &str, expected: Option<&Revision>) -> DbResult<()> {
        let mut docs = self.docs.write().await;
        apply_delete(&mut docs, id, expected)?;
        debug!(id, "memory delete");
        Ok(())
    }

    async fn query_by_index(&self, index: &str, key: &str) -> DbResult<Vec<Document>> {
        let docs = self.docs.read().await;
        Ok(docs
            .values()
            .filter(|doc| {
                self.indexer
                    .entries(&doc.body)
                    .iter()
                    .any(|(name, value)| *name == index && value == key)
            })
            .cloned()
            .collect())
    }

    async fn run_batch(&self, ops: Vec<BatchOp>) -> DbResult<Vec<Option<Revision>>> {
        let mut docs = self.docs.write().await;
        // apply to a scratch copy so a failing op leaves nothing behind
        let mut scratch = docs.clone();
        let mut revisions = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                BatchOp::Put { id, body, expected } => {
                    revisions.push(Some(apply_put(&mut scratch, &id, body, expected.as_ref())?));
                }
                BatchOp::Delete { id, expected } => {
                    apply_delete(&mut scratch, &id, expected.as_ref())?;
                    revisions.push(None);
                }
            }
        }
        *docs = scratch;
        debug!(ops = revisions.len(), "memory batch applied");
        Ok(revisions)
    }
}
