//! # tally-core: Ledger Rules for Tally
//!
//! Orders, their lines and bills, payment transactions and every mutation
//! a station can apply to them. No I/O happens in this crate.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Ledger Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 tally-station (per terminal)                    │   │
//! │  │   OrderEditor ──► LockCoordinator ──► Reconciler task           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │   model   │  │   money   │  │  engine   │  │  factory  │   │   │
//! │  │   │   Order   │  │   Money   │  │ pay/split │  │ cash/card │   │   │
//! │  │   │   Bill    │  │  Percent  │  │ void/move │  │  batch    │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              tally-db (revisioned document store)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`model`] - Order, Bill, OrderItem, Transaction and pricing
//! - [`engine`] - Order mutations (add, void, checkout, split, pay)
//! - [`factory`] - Transaction constructors and transitions
//! - [`money`] - Integer cents and basis-point rates
//! - [`context`] - Who and where a change is made
//! - [`validation`] - Input checks
//! - [`error`] - Refusal types
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::context::{EmployeeRef, SessionContext};
//! use tally_core::model::{CatalogItem, Discount, OpenOrder, Order, OrderItem, Tax};
//! use tally_core::model::ItemsContainer;
//! use tally_core::money::{Money, Percent};
//!
//! let ctx = SessionContext::default().with_employee(EmployeeRef::new("e1", "Ana"));
//! let mut order = Order::open(&ctx, OpenOrder {
//!     tax: Tax::new("tax", "Sales Tax", Percent::from_whole(8)),
//!     discount: Discount::new("d10", "10% Off", Percent::from_whole(10)),
//!     ..OpenOrder::default()
//! });
//!
//! let pho = CatalogItem {
//!     id: "pho".into(),
//!     price: Money::from_cents(1000),
//!     ..CatalogItem::default()
//! };
//! order.add_item(OrderItem::from_catalog(&pho).with_count(2)).unwrap();
//!
//! // $20.00 - 10% = $18.00, + 8% tax = $19.44
//! assert_eq!(order.total().cents(), 1944);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod context;
pub mod engine;
pub mod error;
pub mod factory;
pub mod ids;
pub mod model;
pub mod money;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use context::{EmployeeRef, SessionContext, ShiftRef, StationRef, StoreRef};
pub use engine::{ItemMove, PaymentOutcome};
pub use error::{CoreError, CoreResult, ValidationError};
pub use model::*;
pub use money::{Money, Percent};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Lines an order may hold before it stops taking new ones.
pub const MAX_ORDER_ITEMS: usize = 99;

/// Order total at which new lines are refused ($1,000,000.00).
pub const DEFAULT_ORDER_TOTAL_CEILING: Money = Money::from_cents(100_000_000);
