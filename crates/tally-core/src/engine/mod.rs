//! # Order Mutation Engine
//!
//! Every edit a station can make to an order, as methods on [`Order`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Mutation Flow                                     │
//! │                                                                         │
//! │   UI action ──► Order::<operation>(..)                                  │
//! │                      │                                                  │
//! │                      ├── checks: open? found? paid? reason given?       │
//! │                      │       └── Err(CoreError) ── order untouched      │
//! │                      │                                                  │
//! │                      ├── mutate items / bills                           │
//! │                      └── recompute_totals()                             │
//! │                                                                         │
//! │   caller ──► store.put(order, revision it read) ──► lock release        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`items`]: add, modifier toggles, submit, void
//! - [`bills`]: print, checkout, split/merge/move, pay, void bill
//! - [`orders`]: close, merge orders, customer/driver
//!
//! Nothing in here suspends or performs I/O.
//!
//! [`Order`]: crate::model::Order

pub mod bills;
pub mod items;
pub mod orders;

pub use bills::{ItemMove, PaymentOutcome};

use crate::error::{CoreError, CoreResult};
use crate::model::Order;

impl Order {
    pub(crate) fn ensure_open(&self) -> CoreResult<()> {
        if self.is_closed() {
            return Err(CoreError::OrderClosed {
                order_id: self.id.clone(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::context::{EmployeeRef, SessionContext, ShiftRef, StationRef, StoreRef};
    use crate::model::{CatalogItem, Discount, OpenOrder, Order, OrderItem, Tax};
    use crate::money::{Money, Percent};

    pub fn ctx() -> SessionContext {
        SessionContext::new(
            StoreRef {
                id: "store-1".into(),
                merchant_id: "m-1".into(),
                name: "Main".into(),
            },
            StationRef::new("st-1", "Front"),
            EmployeeRef::new("emp-1", "Ana"),
            ShiftRef {
                id: "shift-1".into(),
                index: 1,
                trans_num: 1,
            },
        )
    }

    pub fn employee() -> EmployeeRef {
        ctx().employee
    }

    pub fn catalog(id: &str, cents: i64) -> CatalogItem {
        CatalogItem {
            id: id.into(),
            category_id: "cat".into(),
            name: id.to_uppercase(),
            name2: String::new(),
            price: Money::from_cents(cents),
            is_open_item: false,
        }
    }

    pub fn line(id: &str, cents: i64) -> OrderItem {
        OrderItem::from_catalog(&catalog(id, cents))
    }

    /// An order with no tax and no discount.
    pub fn plain_order() -> Order {
        Order::open(
            &ctx(),
            OpenOrder {
                order_no: 1,
                ..OpenOrder::default()
            },
        )
    }

    /// An order taxed at 8% with a 10% discount.
    pub fn taxed_order() -> Order {
        Order::open(
            &ctx(),
            OpenOrder {
                order_no: 2,
                tax: Tax::new("tax", "Sales Tax", Percent::from_whole(8)),
                discount: Discount::new("d10", "10% Off", Percent::from_whole(10)),
                ..OpenOrder::default()
            },
        )
    }

    /// Adds lines and submits them; returns the line ids.
    pub fn submitted(order: &mut Order, lines: Vec<OrderItem>) -> Vec<String> {
        let mut ids = Vec::new();
        for item in lines {
            let id = order.add_item(item).map(|line| line.id.clone()).unwrap();
            ids.push(id);
        }
        order.submit().unwrap();
        ids
    }
}
