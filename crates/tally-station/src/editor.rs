//! # Order Edit Sessions
//!
//! Every change a station makes to a stored order goes through
//! [`OrderEditor`], which brackets the ledger mutation with the lock
//! protocol.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         OrderEditor::edit                               │
//! │                                                                         │
//! │   load order ──► rev r                                                  │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   try_lock(order @ r) ──── LockDenied ──► return error                  │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   closure(&mut order) ─┐                                                │
//! │        │               │                                                │
//! │        ▼               │  any error                                     │
//! │   still locked?  ──────┤                                                │
//! │        │               │                                                │
//! │        ▼               ▼                                                │
//! │   put(order, r)     release(order @ r) ──► return error                 │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   release(order @ r') ──► Versioned { value, revision: r' }             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Payment, payment void and order merge touch more than one document; those
//! writes go through one `run_batch` so they land together or not at all.

use std::sync::Arc;

use tally_core::context::SessionContext;
use tally_core::model::{GroupGratuity, OpenOrder, Order, OrderLimits, OrderItem, Transaction};
use tally_core::{CoreError, CoreResult, PaymentOutcome};
use tally_db::store::to_body;
use tally_db::{
    load_typed, put_typed, BatchOp, DbError, DocumentStore, Revision, Versioned,
};
use tracing::{info, warn};

use crate::error::{StationError, StationResult};
use crate::lock::{LockCoordinator, OrderRev};

pub struct OrderEditor {
    locks: LockCoordinator,
    ctx: SessionContext,
    limits: OrderLimits,
}

impl OrderEditor {
    pub fn new(locks: LockCoordinator, ctx: SessionContext) -> Self {
        Self {
            locks,
            ctx,
            limits: OrderLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: OrderLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn locks(&self) -> &LockCoordinator {
        &self.locks
    }

    fn store(&self) -> &Arc<dyn DocumentStore> {
        self.locks.store()
    }

    fn station_id(&self) -> &str {
        &self.ctx.station.id
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Creates and stores a new order. Nobody can hold a lock on it yet.
    pub async fn open(&self, request: OpenOrder) -> StationResult<Versioned<Order>> {
        let order = Order::open(&self.ctx, request);
        let revision = put_typed(self.store().as_ref(), &order, None).await?;
        info!(order_id = %order.id, order_no = order.order_no, "Order opened");
        Ok(Versioned {
            value: order,
            revision,
        })
    }

    /// Applies `change` to a stored order under this station's lock.
    ///
    /// Returns the closure's value and the order's new revision. Any error,
    /// from the lock, the closure or the store, releases the lock at the
    /// revision that was loaded and is returned unchanged.
    pub async fn edit<R, F>(&self, order_id: &str, change: F) -> StationResult<Versioned<R>>
    where
        F: FnOnce(&mut Order) -> CoreResult<R>,
    {
        self.edit_with(order_id, |order| Ok((change(order)?, Vec::new())))
            .await
    }

    /// Adds a line within this station's configured limits.
    pub async fn add_item(&self, order_id: &str, item: OrderItem) -> StationResult<Versioned<String>> {
        let limits = self.limits;
        self.edit(order_id, move |order| {
            order.add_item_within(item, &limits).map(|line| line.id.clone())
        })
        .await
    }

    /// Pays a bill and stores the transaction with the order.
    pub async fn pay_bill(
        &self,
        order_id: &str,
        bill_id: &str,
        transaction: &Transaction,
    ) -> StationResult<Versioned<PaymentOutcome>> {
        let body = to_body(transaction)?;
        let employee = self.ctx.employee.clone();
        self.edit_with(order_id, |order| {
            let outcome = order.pay_bill(bill_id, transaction, &employee)?;
            let trans = BatchOp::Put {
                id: transaction.id.clone(),
                body,
                expected: None,
            };
            Ok((outcome, vec![trans]))
        })
        .await
    }

    /// Voids the transaction that paid `bill_id` and reopens the bill.
    pub async fn void_payment(
        &self,
        order_id: &str,
        bill_id: &str,
        reason: &str,
    ) -> StationResult<Versioned<Transaction>> {
        let order = load_typed::<Order>(self.store().as_ref(), order_id).await?;
        let trans_id = order
            .value
            .bill(bill_id)
            .ok_or_else(|| CoreError::BillNotFound(bill_id.to_string()))?
            .transaction
            .clone()
            .ok_or_else(|| CoreError::BillNotPaid(bill_id.to_string()))?;
        let stored = load_typed::<Transaction>(self.store().as_ref(), &trans_id).await?;

        let mut trans = stored.value;
        trans.void(reason, &self.ctx.employee)?;
        let body = to_body(&trans)?;
        let write = BatchOp::Put {
            id: trans.id.clone(),
            body,
            expected: Some(stored.revision),
        };
        let edited = self
            .edit_with(order_id, |order| {
                order.void_bill(bill_id)?;
                Ok(((), vec![write]))
            })
            .await?;
        Ok(Versioned {
            value: trans,
            revision: edited.revision,
        })
    }

    /// Merges `others` into `target` and deletes them, all under lock.
    pub async fn merge_orders(
        &self,
        target_id: &str,
        others: &[&str],
        tiers: &[GroupGratuity],
    ) -> StationResult<Versioned<Order>> {
        let mut loaded = Vec::with_capacity(others.len());
        for id in others.iter().filter(|id| **id != target_id) {
            loaded.push(load_typed::<Order>(self.store().as_ref(), id).await?);
        }
        let held: Vec<OrderRev> = loaded.iter().map(OrderRev::from).collect();
        self.locks.try_lock(&self.ctx, &held).await?;

        let deletes: Vec<BatchOp> = loaded
            .iter()
            .map(|other| BatchOp::Delete {
                id: other.value.id.clone(),
                expected: Some(other.revision.clone()),
            })
            .collect();
        let incoming: Vec<Order> = loaded.into_iter().map(|other| other.value).collect();

        let result = self
            .edit_with(target_id, |order| {
                order.merge_orders(incoming, tiers)?;
                Ok((order.clone(), deletes))
            })
            .await;

        // deleted orders release as settled; on failure they go back as read
        self.release_quietly(&held).await;
        if let Ok(merged) = &result {
            info!(order = %merged.value.short_summary(), merged = held.len(), "Orders merged");
        }
        result
    }

    // =========================================================================
    // Session
    // =========================================================================

    async fn edit_with<R, F>(&self, order_id: &str, change: F) -> StationResult<Versioned<R>>
    where
        F: FnOnce(&mut Order) -> CoreResult<(R, Vec<BatchOp>)>,
    {
        let loaded = load_typed::<Order>(self.store().as_ref(), order_id).await?;
        let held = [OrderRev::from(&loaded)];
        self.locks.try_lock(&self.ctx, &held).await?;

        match self.apply(loaded, &held, change).await {
            Ok(edited) => {
                self.release_quietly(&[OrderRev::new(order_id, edited.revision.clone())])
                    .await;
                info!(order_id, revision = %edited.revision, "Order saved");
                Ok(edited)
            }
            Err(e) => {
                warn!(order_id, error = %e, "Order edit failed, releasing lock");
                self.release_quietly(&held).await;
                Err(e)
            }
        }
    }

    async fn apply<R, F>(
        &self,
        loaded: Versioned<Order>,
        held: &[OrderRev],
        change: F,
    ) -> StationResult<Versioned<R>>
    where
        F: FnOnce(&mut Order) -> CoreResult<(R, Vec<BatchOp>)>,
    {
        let mut order = loaded.value;
        let (value, extra) = change(&mut order)?;

        if !self.locks.are_locked(self.station_id(), held).await? {
            return Err(StationError::NotLocked {
                order_id: order.id.clone(),
            });
        }

        let revision = if extra.is_empty() {
            put_typed(self.store().as_ref(), &order, Some(&loaded.revision)).await?
        } else {
            let mut ops = vec![BatchOp::Put {
                id: order.id.clone(),
                body: to_body(&order)?,
                expected: Some(loaded.revision),
            }];
            ops.extend(extra);
            first_revision(self.store().run_batch(ops).await?)?
        };
        Ok(Versioned { value, revision })
    }

    /// A release that fails leaves the entry for the reconciler.
    async fn release_quietly(&self, orders: &[OrderRev]) {
        if let Err(e) = self.locks.release(self.station_id(), orders).await {
            warn!(error = %e, "Failed to release order locks");
        }
    }
}

fn first_revision(revisions: Vec<Option<Revision>>) -> StationResult<Revision> {
    revisions
        .into_iter()
        .next()
        .flatten()
        .ok_or_else(|| DbError::Internal("batch returned no order revision".into()).into())
}

// =============================================================================
// Unit Tests
// =============================================================================
