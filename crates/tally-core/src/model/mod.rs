//! Ledger entities: orders, their lines and bills, and payment records.
//!
//! ```text
//! Order ─┬─ items: Vec<OrderItem> ── modifiers: Vec<OrderModifier>
//!        └─ bills: Vec<Bill> ──────── items: Vec<OrderItem>  (copies)
//!                   │
//!                   └─ transaction id ──► Transaction (separate document)
//! ```

pub mod bill;
pub mod container;
pub mod item;
pub mod order;
pub mod pricing;
pub mod transaction;

pub use bill::Bill;
pub use container::ItemsContainer;
pub use item::{
    CatalogItem, ItemStatus, Modifier, ModifierOption, OrderItem, OrderModifier, MAX_ITEM_COUNT,
};
pub use order::{CustomerInfo, OpenOrder, Order, OrderLimits, OrderStatus, OrderType};
pub use pricing::{find_group_gratuity, Amounts, Discount, GroupGratuity, Pricing, Tax};
pub use transaction::{
    BatchResult, PaymentDevice, PaymentResult, PaymentType, ProcessorResponse, Transaction,
    TransactionStatus, TransactionType,
};
