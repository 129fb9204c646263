//! # Cross-Station Order Locks
//!
//! One document per store, `lo_<store_id>`, maps order ids to the station
//! holding them. Every station reads and writes it through the shared
//! document store; there is no other channel between stations.
//!
//! ## Lock Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Lock Entry Lifecycle                             │
//! │                                                                         │
//! │   acquire(order @ rev 5)                                                │
//! │          │                                                              │
//! │          ▼                                                              │
//! │   ┌──────────────┐   release(order @ rev 6)    ┌──────────────────────┐ │
//! │   │ locked  r5   │────────────────────────────►│ store already at r6? │ │
//! │   └──────┬───────┘                             └──────┬───────┬───────┘ │
//! │          │ reconcile: store at ≥ r5                yes│       │no       │
//! │          ▼                                            ▼       ▼         │
//! │   ┌──────────────┐                              (entry     ┌──────────┐ │
//! │   │ locked  r7   │  rev follows the store        deleted)  │ waiting- │ │
//! │   └──────────────┘                                         │ unlocked │ │
//! │                                                            │   r6     │ │
//! │          reconcile: store at ≥ r6  ◄───────────────────────┴──────────┘ │
//! │                 └──► entry deleted                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A station that released an order keeps a `waiting-unlocked` entry until
//! its own write is visible in the store. Another station reading the order
//! before that would see stale data.
//!
//! ## Writes
//! Each operation reads the lock document, changes it in memory and puts it
//! back with the revision it read. A stale put is retried from the read, up
//! to [`DEFAULT_MAX_ATTEMPTS`] times. An operation that changes nothing
//! writes nothing. Revisions are compared by their leading counter only.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_core::context::SessionContext;
use tally_core::model::Order;
use tally_db::{DbError, DocumentStore, Revision, Versioned};
use tracing::{debug, info, warn};

use crate::error::{StationError, StationResult};

/// Id prefix of the per-store lock document.
pub const LOCK_DOC_PREFIX: &str = "lo_";

/// Attempts per operation before a stale conflict is surfaced.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

// =============================================================================
// Lock Entries
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockStatus {
    Locked,
    /// Released, waiting for the release's write to reach the store.
    WaitingUnlocked,
}

/// Who holds an order, and at which revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    pub station: String,
    pub station_name: String,
    pub current_employee: String,
    pub current_employee_name: String,
    pub status: LockStatus,
    pub rev: Revision,
}

impl LockEntry {
    pub fn is_locked(&self) -> bool {
        self.status == LockStatus::Locked
    }

    pub fn held_by(&self, station_id: &str) -> bool {
        self.station == station_id
    }
}

/// Body of the lock document: order id to entry.
pub type LockTable = BTreeMap<String, LockEntry>;

/// An order id and the revision the caller knows it at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRev {
    pub order_id: String,
    pub rev: Revision,
}

impl OrderRev {
    pub fn new(order_id: impl Into<String>, rev: Revision) -> Self {
        Self {
            order_id: order_id.into(),
            rev,
        }
    }
}

impl From<&Versioned<Order>> for OrderRev {
    fn from(order: &Versioned<Order>) -> Self {
        Self::new(order.value.id.clone(), order.revision.clone())
    }
}

/// Current store revision of each order looked up for one pass.
type CurrentRevisions = HashMap<String, Option<Revision>>;

fn current_is_at_least(current: &CurrentRevisions, order_id: &str, rev: &Revision) -> bool {
    match current.get(order_id) {
        Some(Some(current)) => current.is_greater_or_equal(rev),
        // a deleted order has nothing left to wait for
        _ => true,
    }
}

// =============================================================================
// Coordinator
// =============================================================================

#[derive(Clone)]
pub struct LockCoordinator {
    store: Arc<dyn DocumentStore>,
    store_id: String,
    max_attempts: u32,
}

impl std::fmt::Debug for LockCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockCoordinator")
            .field("store_id", &self.store_id)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl LockCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>, store_id: impl Into<String>) -> Self {
        Self {
            store,
            store_id: store_id.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    pub fn doc_id(&self) -> String {
        format!("{LOCK_DOC_PREFIX}{}", self.store_id)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The whole lock table as stored now.
    pub async fn table(&self) -> StationResult<LockTable> {
        Ok(self.read().await?.0)
    }

    /// Entries held by `station_id`, or every entry when `None` or empty.
    pub async fn locked_orders(&self, station_id: Option<&str>) -> StationResult<LockTable> {
        let table = self.table().await?;
        Ok(match station_id.filter(|id| !id.is_empty()) {
            Some(station_id) => table
                .into_iter()
                .filter(|(_, entry)| entry.held_by(station_id))
                .collect(),
            None => table,
        })
    }

    /// Entries held by any station other than `station_id`.
    pub async fn locked_orders_not_by(&self, station_id: &str) -> StationResult<LockTable> {
        if station_id.is_empty() {
            return Ok(LockTable::new());
        }
        Ok(self
            .table()
            .await?
            .into_iter()
            .filter(|(_, entry)| !entry.held_by(station_id))
            .collect())
    }

    /// `(station_name, employee_id)` of whoever holds `order_id`.
    pub async fn locked_info(&self, order_id: &str) -> StationResult<Option<(String, String)>> {
        if order_id.is_empty() {
            return Ok(None);
        }
        Ok(self
            .table()
            .await?
            .remove(order_id)
            .map(|entry| (entry.station_name, entry.current_employee)))
    }

    /// True when every order is locked by `station_id` and the caller's
    /// revision is at least the locked one.
    pub async fn are_locked(&self, station_id: &str, orders: &[OrderRev]) -> StationResult<bool> {
        if station_id.is_empty() || orders.is_empty() {
            return Ok(false);
        }
        let table = self.table().await?;
        Ok(orders.iter().all(|order| {
            table.get(&order.order_id).is_some_and(|entry| {
                entry.is_locked()
                    && entry.held_by(station_id)
                    && order.rev.is_greater_or_equal(&entry.rev)
            })
        }))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Locks `orders` for the context's station and employee, replacing
    /// whatever entry each order had.
    pub async fn acquire(&self, ctx: &SessionContext, orders: &[OrderRev]) -> StationResult<bool> {
        if ctx.station.id.is_empty() || ctx.employee.id.is_empty() || orders.is_empty() {
            return Ok(false);
        }
        let changed = self
            .modify("acquire", |_| Vec::new(), |table, _| {
                for order in orders {
                    table.insert(order.order_id.clone(), locked_entry(ctx, &order.rev));
                }
                true
            })
            .await?;
        info!(station = %ctx.station.id, orders = orders.len(), "Orders locked");
        Ok(changed)
    }

    /// Like [`acquire`](Self::acquire), but refuses when another station
    /// holds any of the orders locked at the requested revision or newer.
    ///
    /// ## When This Fails
    /// `StationError::LockDenied` naming the first refused order. Nothing is
    /// written.
    pub async fn try_lock(&self, ctx: &SessionContext, orders: &[OrderRev]) -> StationResult<bool> {
        if ctx.station.id.is_empty() || ctx.employee.id.is_empty() || orders.is_empty() {
            return Ok(false);
        }
        let mut denied: Option<StationError> = None;
        let changed = self
            .modify("try_lock", |_| Vec::new(), |table, _| {
                denied = orders.iter().find_map(|order| {
                    table
                        .get(&order.order_id)
                        .filter(|entry| {
                            entry.is_locked()
                                && !entry.held_by(&ctx.station.id)
                                && entry.rev.is_greater_or_equal(&order.rev)
                        })
                        .map(|entry| StationError::LockDenied {
                            order_id: order.order_id.clone(),
                            station_name: entry.station_name.clone(),
                            employee_id: entry.current_employee.clone(),
                        })
                });
                if denied.is_some() {
                    return false;
                }
                for order in orders {
                    table.insert(order.order_id.clone(), locked_entry(ctx, &order.rev));
                }
                true
            })
            .await?;
        if let Some(err) = denied {
            warn!(station = %ctx.station.id, error = %err, "Lock denied");
            return Err(err);
        }
        info!(station = %ctx.station.id, orders = orders.len(), "Orders locked");
        Ok(changed)
    }

    /// Releases `station_id`'s locks after an edit that produced `orders`'
    /// revisions.
    ///
    /// An entry whose order is already at that revision in the store is
    /// deleted. Otherwise it turns `waiting-unlocked` at the edited revision
    /// and a later reconcile deletes it. Entries of other stations are left
    /// alone.
    pub async fn release(&self, station_id: &str, orders: &[OrderRev]) -> StationResult<bool> {
        if orders.is_empty() {
            return Ok(false);
        }
        let changed = self
            .modify(
                "release",
                |table| {
                    orders
                        .iter()
                        .filter(|order| {
                            table
                                .get(&order.order_id)
                                .is_some_and(|entry| entry.held_by(station_id))
                        })
                        .map(|order| order.order_id.clone())
                        .collect()
                },
                |table, current| {
                    let mut changed = false;
                    for order in orders {
                        let Some(entry) = table.get_mut(&order.order_id) else {
                            continue;
                        };
                        if !entry.held_by(station_id) {
                            continue;
                        }
                        if current_is_at_least(current, &order.order_id, &order.rev) {
                            table.remove(&order.order_id);
                        } else {
                            entry.status = LockStatus::WaitingUnlocked;
                            entry.rev = order.rev.clone();
                        }
                        changed = true;
                    }
                    changed
                },
            )
            .await?;
        if changed {
            info!(station = %station_id, orders = orders.len(), "Orders released");
        }
        Ok(changed)
    }

    /// Settles the entries of `order_ids` against the store: once an order's
    /// current revision reaches the entry's, a `waiting-unlocked` entry is
    /// deleted and a `locked` one moves to the current revision.
    pub async fn update_locked_orders(&self, order_ids: &[&str]) -> StationResult<bool> {
        let order_ids: Vec<String> = order_ids
            .iter()
            .filter(|id| !id.is_empty())
            .map(|id| id.to_string())
            .collect();
        if order_ids.is_empty() {
            return Ok(false);
        }
        let changed = self
            .modify(
                "update_locked_orders",
                |table| {
                    order_ids
                        .iter()
                        .filter(|id| table.contains_key(id.as_str()))
                        .cloned()
                        .collect()
                },
                |table, current| settle(table, current, |_, _| true),
            )
            .await?;
        if changed {
            info!(orders = order_ids.len(), "Locked orders updated");
        }
        Ok(changed)
    }

    /// [`update_locked_orders`](Self::update_locked_orders) for every entry
    /// of `station_id`. Writes only when some entry changed.
    pub async fn update_all_locked_orders(&self, station_id: &str) -> StationResult<bool> {
        if station_id.is_empty() {
            return Ok(false);
        }
        let changed = self
            .modify(
                "update_all_locked_orders",
                |table| {
                    table
                        .iter()
                        .filter(|(_, entry)| entry.held_by(station_id))
                        .map(|(id, _)| id.clone())
                        .collect()
                },
                |table, current| settle(table, current, |_, entry| entry.held_by(station_id)),
            )
            .await?;
        if changed {
            info!(station = %station_id, "Locked orders reconciled");
        }
        Ok(changed)
    }

    /// Drops every entry of `station_id` regardless of status, or the whole
    /// table when no station is given.
    pub async fn remove_all_locked_orders(&self, station_id: Option<&str>) -> StationResult<bool> {
        let station_id = station_id.filter(|id| !id.is_empty());
        let changed = self
            .modify("remove_all_locked_orders", |_| Vec::new(), |table, _| {
                let before = table.len();
                match station_id {
                    Some(station_id) => table.retain(|_, entry| !entry.held_by(station_id)),
                    None => table.clear(),
                }
                table.len() != before
            })
            .await?;
        if changed {
            info!(station = station_id.unwrap_or("*"), "Locks force-released");
        }
        Ok(changed)
    }

    // =========================================================================
    // Document I/O
    // =========================================================================

    /// Reads the table and the revision it was read at. A missing document
    /// is an empty table with no revision. Entries that fail to parse are
    /// skipped.
    async fn read(&self) -> StationResult<(LockTable, Option<Revision>)> {
        let doc_id = self.doc_id();
        let Some(doc) = self.store.get(&doc_id).await? else {
            return Ok((LockTable::new(), None));
        };
        let Value::Object(map) = doc.body else {
            warn!(doc_id = %doc_id, "Lock document body is not an object");
            return Ok((LockTable::new(), Some(doc.revision)));
        };
        let mut table = LockTable::new();
        for (order_id, value) in map {
            match serde_json::from_value::<LockEntry>(value) {
                Ok(entry) => {
                    table.insert(order_id, entry);
                }
                Err(e) => warn!(order_id = %order_id, error = %e, "Skipping malformed lock entry"),
            }
        }
        Ok((table, Some(doc.revision)))
    }

    async fn current_revisions(&self, order_ids: Vec<String>) -> StationResult<CurrentRevisions> {
        let mut current = CurrentRevisions::with_capacity(order_ids.len());
        for order_id in order_ids {
            let revision = self.store.get_revision(&order_id).await?;
            current.insert(order_id, revision);
        }
        Ok(current)
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(200),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Read, change, put with the read revision.
    ///
    /// `needs` names the orders whose current store revision `apply` looks
    /// at. `apply` returns whether it changed the table; `false` writes
    /// nothing.
    async fn modify<N, F>(&self, op: &'static str, needs: N, mut apply: F) -> StationResult<bool>
    where
        N: Fn(&LockTable) -> Vec<String> + Send + Sync,
        F: FnMut(&mut LockTable, &CurrentRevisions) -> bool + Send,
    {
        let doc_id = self.doc_id();
        let mut backoff = self.create_backoff();
        let mut attempt = 1;
        loop {
            let (mut table, read_rev) = self.read().await?;
            let current = self.current_revisions(needs(&table)).await?;
            if !apply(&mut table, &current) {
                debug!(op, doc_id = %doc_id, "Lock document unchanged");
                return Ok(false);
            }

            let body = serde_json::to_value(&table).map_err(DbError::from)?;
            match self.store.put(&doc_id, body, read_rev.as_ref()).await {
                Ok(revision) => {
                    debug!(
                        op,
                        store_id = %self.store_id,
                        revision = %revision,
                        entries = table.len(),
                        "Lock document written"
                    );
                    return Ok(true);
                }
                Err(e) if e.is_conflict() && attempt < self.max_attempts => {
                    warn!(op, attempt, error = %e, "Lock document changed underneath, retrying");
                    if let Some(wait) = backoff.next_backoff() {
                        tokio::time::sleep(wait).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn locked_entry(ctx: &SessionContext, rev: &Revision) -> LockEntry {
    LockEntry {
        station: ctx.station.id.clone(),
        station_name: ctx.station.name.clone(),
        current_employee: ctx.employee.id.clone(),
        current_employee_name: ctx.employee.name.clone(),
        status: LockStatus::Locked,
        rev: rev.clone(),
    }
}

/// Applies the reconcile rule to the entries `current` was fetched for.
fn settle(
    table: &mut LockTable,
    current: &CurrentRevisions,
    include: impl Fn(&str, &LockEntry) -> bool,
) -> bool {
    let mut changed = false;
    for (order_id, current_rev) in current {
        let Some(entry) = table.get_mut(order_id) else {
            continue;
        };
        if !include(order_id, entry) {
            continue;
        }
        match (entry.status, current_rev) {
            (LockStatus::WaitingUnlocked, None) => {
                debug!(order_id = %order_id, "Removing lock of deleted order");
                table.remove(order_id);
                changed = true;
            }
            (LockStatus::WaitingUnlocked, Some(current_rev))
                if current_rev.is_greater_or_equal(&entry.rev) =>
            {
                debug!(order_id = %order_id, "Removing settled lock");
                table.remove(order_id);
                changed = true;
            }
            (LockStatus::Locked, Some(current_rev))
                if current_rev.is_greater_or_equal(&entry.rev) && entry.rev != *current_rev =>
            {
                debug!(order_id = %order_id, rev = %current_rev, "Lock follows order revision");
                entry.rev = current_rev.clone();
                changed = true;
            }
            _ => {}
        }
    }
    changed
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tally_core::context::{EmployeeRef, StationRef};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tally_db::{BatchOp, DbResult, Document, MemoryStore};

    fn ctx(station: &str, name: &str) -> SessionContext {
        let mut ctx = SessionContext::default();
        ctx.store.id = "s1".into();
        ctx.station = StationRef::new(station, name);
        ctx.employee = EmployeeRef::new("e1", "Ana");
        ctx
    }

    fn setup() -> (Arc<MemoryStore>, LockCoordinator) {
        let store = Arc::new(MemoryStore::new());
        let locks = LockCoordinator::new(store.clone(), "s1");
        (store, locks)
    }

    /// Writes order `id` until its revision counter reaches `counter`.
    async fn order_at(store: &MemoryStore, id: &str, counter: u64) -> Revision {
        let mut rev = match store.get_revision(id).await.unwrap() {
            Some(rev) => rev,
            None => store.put(id, json!({"n": 1}), None).await.unwrap(),
        };
        while rev.counter() < counter {
            rev = store.put(id, json!({"n": rev.counter() + 1}), Some(&rev)).await.unwrap();
        }
        rev
    }

    fn rev(counter: u64) -> Revision {
        Revision::from_stored(format!("{counter}-abc"))
    }

    /// Store whose first `failing` puts come back stale.
    struct ContendedStore {
        inner: MemoryStore,
        failing: u32,
        puts: AtomicU32,
    }

    impl ContendedStore {
        fn new(failing: u32) -> Self {
            Self {
                inner: MemoryStore::new(),
                failing,
                puts: AtomicU32::new(0),
            }
        }

        fn puts(&self) -> u32 {
            self.puts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentStore for ContendedStore {
        async fn get(&self, id: &str) -> DbResult<Option<Document>> {
            self.inner.get(id).await
        }

        async fn put(&self, id: &str, body: Value, expected: Option<&Revision>) -> DbResult<Revision> {
            if self.puts.fetch_add(1, Ordering::SeqCst) < self.failing {
                return Err(DbError::stale(id, expected.map(Revision::as_str), Some("9-other")));
            }
            self.inner.put(id, body, expected).await
        }

        async fn delete(&self, id: &str, expected: Option<&Revision>) -> DbResult<()> {
            self.inner.delete(id, expected).await
        }

        async fn query_by_index(&self, index: &str, key: &str) -> DbResult<Vec<Document>> {
            self.inner.query_by_index(index, key).await
        }

        async fn run_batch(&self, ops: Vec<BatchOp>) -> DbResult<Vec<Option<Revision>>> {
            self.inner.run_batch(ops).await
        }
    }

    #[tokio::test]
    async fn test_lock_document_layout() {
        let (store, locks) = setup();
        locks
            .acquire(&ctx("st-a", "Front"), &[OrderRev::new("o1", rev(5))])
            .await
            .unwrap();

        let doc = store.get("lo_s1").await.unwrap().unwrap();
        assert_eq!(
            doc.body,
            json!({
                "o1": {
                    "station": "st-a",
                    "station_name": "Front",
                    "current_employee": "e1",
                    "current_employee_name": "Ana",
                    "status": "locked",
                    "rev": "5-abc"
                }
            })
        );
    }

    #[tokio::test]
    async fn test_last_acquire_wins() {
        let (_, locks) = setup();
        let o5 = [OrderRev::new("o1", rev(5))];
        locks.acquire(&ctx("st-a", "Front"), &o5).await.unwrap();
        locks.acquire(&ctx("st-b", "Bar"), &o5).await.unwrap();

        assert!(!locks.are_locked("st-a", &o5).await.unwrap());
        assert!(locks.are_locked("st-b", &o5).await.unwrap());
        assert_eq!(
            locks.locked_info("o1").await.unwrap(),
            Some(("Bar".to_string(), "e1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_are_locked_compares_counters() {
        let (_, locks) = setup();
        locks
            .acquire(&ctx("st-a", "Front"), &[OrderRev::new("o1", rev(5))])
            .await
            .unwrap();

        assert!(locks.are_locked("st-a", &[OrderRev::new("o1", rev(6))]).await.unwrap());
        assert!(!locks.are_locked("st-a", &[OrderRev::new("o1", rev(4))]).await.unwrap());
        assert!(!locks
            .are_locked("st-a", &[OrderRev::new("o1", rev(5)), OrderRev::new("o2", rev(1))])
            .await
            .unwrap());
        assert!(!locks.are_locked("", &[OrderRev::new("o1", rev(5))]).await.unwrap());
        assert!(!locks.are_locked("st-a", &[]).await.unwrap());
    }

    #[tokio::test]
    async fn test_try_lock_denies_other_station() {
        let (store, locks) = setup();
        locks
            .acquire(&ctx("st-a", "Front"), &[OrderRev::new("o1", rev(5))])
            .await
            .unwrap();
        let before = store.get_revision("lo_s1").await.unwrap();

        let err = locks
            .try_lock(&ctx("st-b", "Bar"), &[OrderRev::new("o1", rev(5))])
            .await
            .unwrap_err();
        match err {
            StationError::LockDenied {
                order_id,
                station_name,
                employee_id,
            } => {
                assert_eq!(order_id, "o1");
                assert_eq!(station_name, "Front");
                assert_eq!(employee_id, "e1");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.get_revision("lo_s1").await.unwrap(), before);

        // a newer revision than the stale lock goes through
        assert!(locks
            .try_lock(&ctx("st-b", "Bar"), &[OrderRev::new("o1", rev(6))])
            .await
            .unwrap());
        // the holder itself may always re-lock
        assert!(locks
            .try_lock(&ctx("st-b", "Bar"), &[OrderRev::new("o1", rev(6))])
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_release_when_store_caught_up() {
        let (store, locks) = setup();
        let r5 = order_at(&store, "o1", 5).await;
        locks.acquire(&ctx("st-a", "Front"), &[OrderRev::new("o1", r5)]).await.unwrap();

        let r7 = order_at(&store, "o1", 7).await;
        assert!(locks.release("st-a", &[OrderRev::new("o1", r7)]).await.unwrap());
        assert!(locks.table().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_waits_then_reconcile_deletes() {
        let (store, locks) = setup();
        let r5 = order_at(&store, "o1", 5).await;
        locks.acquire(&ctx("st-a", "Front"), &[OrderRev::new("o1", r5)]).await.unwrap();

        // edited at rev 7, but the store still shows 5
        locks.release("st-a", &[OrderRev::new("o1", rev(7))]).await.unwrap();
        let entry = locks.table().await.unwrap().remove("o1").unwrap();
        assert_eq!(entry.status, LockStatus::WaitingUnlocked);
        assert_eq!(entry.rev.counter(), 7);

        // not there yet: nothing written
        assert!(!locks.update_locked_orders(&["o1"]).await.unwrap());

        order_at(&store, "o1", 7).await;
        assert!(locks.update_locked_orders(&["o1"]).await.unwrap());
        assert!(locks.table().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_of_deleted_order_drops_entry() {
        let (store, locks) = setup();
        let r1 = order_at(&store, "o1", 1).await;
        locks
            .acquire(&ctx("st-a", "Front"), &[OrderRev::new("o1", r1.clone())])
            .await
            .unwrap();
        store.delete("o1", Some(&r1)).await.unwrap();

        assert!(locks.release("st-a", &[OrderRev::new("o1", rev(2))]).await.unwrap());
        assert!(locks.table().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_ignores_other_station() {
        let (store, locks) = setup();
        order_at(&store, "o1", 5).await;
        locks
            .acquire(&ctx("st-b", "Bar"), &[OrderRev::new("o1", rev(5))])
            .await
            .unwrap();

        assert!(!locks.release("st-a", &[OrderRev::new("o1", rev(5))]).await.unwrap());
        assert_eq!(locks.locked_orders(Some("st-b")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_all_refreshes_locked_rev() {
        let (store, locks) = setup();
        let r2 = order_at(&store, "o1", 2).await;
        order_at(&store, "o2", 1).await;
        locks
            .acquire(
                &ctx("st-a", "Front"),
                &[OrderRev::new("o1", r2), OrderRev::new("o2", rev(4))],
            )
            .await
            .unwrap();

        let r3 = order_at(&store, "o1", 3).await;
        assert!(locks.update_all_locked_orders("st-a").await.unwrap());

        let table = locks.table().await.unwrap();
        assert_eq!(table["o1"].rev, r3);
        assert!(table["o1"].is_locked());
        // o2 is behind its lock: untouched
        assert_eq!(table["o2"].rev.counter(), 4);

        // second pass has nothing to do
        let before = store.get_revision("lo_s1").await.unwrap();
        assert!(!locks.update_all_locked_orders("st-a").await.unwrap());
        assert_eq!(store.get_revision("lo_s1").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_remove_all_by_station_and_everything() {
        let (_, locks) = setup();
        locks
            .acquire(&ctx("st-a", "Front"), &[OrderRev::new("o1", rev(1))])
            .await
            .unwrap();
        locks
            .acquire(&ctx("st-b", "Bar"), &[OrderRev::new("o2", rev(1))])
            .await
            .unwrap();

        assert!(!locks.remove_all_locked_orders(Some("st-z")).await.unwrap());
        assert!(locks.remove_all_locked_orders(Some("st-a")).await.unwrap());
        let rest = locks.locked_orders_not_by("st-a").await.unwrap();
        assert_eq!(rest.keys().collect::<Vec<_>>(), vec!["o2"]);

        assert!(locks.remove_all_locked_orders(None).await.unwrap());
        assert!(locks.table().await.unwrap().is_empty());
        assert!(!locks.remove_all_locked_orders(None).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_employee_is_a_no_op() {
        let (store, locks) = setup();
        let mut anonymous = ctx("st-a", "Front");
        anonymous.employee = EmployeeRef::default();
        assert!(!locks
            .acquire(&anonymous, &[OrderRev::new("o1", rev(1))])
            .await
            .unwrap());
        assert!(store.get("lo_s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_entries_are_skipped() {
        let (store, locks) = setup();
        store
            .put("lo_s1", json!({"o1": {"station": "st-a"}, "o2": 7}), None)
            .await
            .unwrap();
        assert!(locks.table().await.unwrap().is_empty());

        // the next write replaces the document from the read revision
        assert!(locks
            .acquire(&ctx("st-a", "Front"), &[OrderRev::new("o3", rev(1))])
            .await
            .unwrap());
        assert_eq!(locks.table().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_lock_write_is_retried() {
        let store = Arc::new(ContendedStore::new(2));
        let locks = LockCoordinator::new(store.clone(), "s1");

        assert!(locks
            .acquire(&ctx("st-a", "Front"), &[OrderRev::new("o1", rev(1))])
            .await
            .unwrap());
        assert_eq!(store.puts(), 3);
        assert!(locks.table().await.unwrap()["o1"].held_by("st-a"));
    }

    #[tokio::test]
    async fn test_stale_lock_write_surfaces_after_max_attempts() {
        let store = Arc::new(ContendedStore::new(3));
        let locks = LockCoordinator::new(store.clone(), "s1");

        let err = locks
            .acquire(&ctx("st-a", "Front"), &[OrderRev::new("o1", rev(1))])
            .await
            .unwrap_err();
        assert!(matches!(err, StationError::Store(DbError::StaleRevision { .. })));
        assert!(err.is_retryable());
        assert_eq!(store.puts(), DEFAULT_MAX_ATTEMPTS);
        assert!(locks.table().await.unwrap().is_empty());
    }
}
