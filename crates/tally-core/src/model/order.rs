//! The Order aggregate.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Order Lifecycle                                 │
//! │                                                                         │
//! │   new ──submit──► submitted ──print──► printed ──all paid──► checked    │
//! │    │                  │                   ▲                     │       │
//! │    │                  │                   └── void a paid bill ─┘       │
//! │    └──── void all ────┴──────────► voided                               │
//! │                                                                         │
//! │   checked and voided are closed: only bill voiding reopens one.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mutations live in [`crate::engine`]; this module holds the data and the
//! read-only views over it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::context::{EmployeeRef, SessionContext};
use crate::ids::new_id;
use crate::money::{Money, Percent};
use crate::{DEFAULT_ORDER_TOTAL_CEILING, MAX_ORDER_ITEMS};

use super::bill::Bill;
use super::container::ItemsContainer;
use super::item::OrderItem;
use super::pricing::{Amounts, Discount, Pricing, Tax};

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    New,
    Submitted,
    Printed,
    Checked,
    Voided,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Submitted => "submitted",
            OrderStatus::Printed => "printed",
            OrderStatus::Checked => "checked",
            OrderStatus::Voided => "voided",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum OrderType {
    #[default]
    #[serde(rename = "")]
    Unspecified,
    #[serde(rename = "DINE-IN")]
    DineIn,
    #[serde(rename = "DELIVERY")]
    Delivery,
    #[serde(rename = "PICKUP")]
    Pickup,
}

// =============================================================================
// Supporting Types
// =============================================================================

/// Customer details copied onto the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub email: String,
}

/// Ceilings past which an order stops taking new lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLimits {
    pub max_items: usize,
    pub total_ceiling: Money,
}

impl Default for OrderLimits {
    fn default() -> Self {
        Self {
            max_items: MAX_ORDER_ITEMS,
            total_ceiling: DEFAULT_ORDER_TOTAL_CEILING,
        }
    }
}

/// What the table screen knows when a new order is opened.
#[derive(Debug, Clone, Default)]
pub struct OpenOrder {
    pub order_no: u32,
    pub order_type: OrderType,
    pub area: String,
    pub area_name: String,
    pub table: String,
    pub table_name: String,
    pub persons: u32,
    pub tax: Tax,
    pub discount: Discount,
    pub service_fee_tax: Percent,
}

// =============================================================================
// Order
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub store_id: String,
    #[serde(default)]
    pub merchant_id: String,
    /// Sequential within the shift.
    pub order_no: u32,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub area_name: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub table_name: String,
    pub persons: u32,
    pub shift_id: String,
    #[serde(default)]
    pub shift_index: u32,
    #[serde(default)]
    pub status: OrderStatus,

    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub bills: Vec<Bill>,

    #[serde(flatten)]
    pub pricing: Pricing,
    #[serde(flatten)]
    pub amounts: Amounts,
    #[serde(default)]
    pub service_fee_reason: String,
    /// Employee who removed tax, if any.
    #[serde(default)]
    pub tax_removed_by: String,
    #[serde(default)]
    pub tip: Money,

    #[serde(default)]
    pub customer: CustomerInfo,
    #[serde(default)]
    pub driver: EmployeeRef,
    #[serde(default)]
    pub delivered: bool,

    pub created_by: EmployeeRef,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_by: Option<String>,
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Opens an empty `new` order for the session's store and shift.
    pub fn open(ctx: &SessionContext, request: OpenOrder) -> Self {
        let mut order = Self {
            id: new_id(),
            store_id: ctx.store.id.clone(),
            merchant_id: ctx.store.merchant_id.clone(),
            order_no: request.order_no,
            order_type: request.order_type,
            area: request.area,
            area_name: request.area_name,
            table: request.table,
            table_name: request.table_name,
            persons: request.persons.max(1),
            shift_id: ctx.shift.id.clone(),
            shift_index: ctx.shift.index,
            status: OrderStatus::New,
            items: Vec::new(),
            bills: Vec::new(),
            pricing: Pricing {
                tax: request.tax,
                discount: request.discount,
                service_fee_tax: request.service_fee_tax,
                ..Pricing::default()
            },
            amounts: Amounts::default(),
            service_fee_reason: String::new(),
            tax_removed_by: String::new(),
            tip: Money::ZERO,
            customer: CustomerInfo::default(),
            driver: EmployeeRef::default(),
            delivered: false,
            created_by: ctx.employee.clone(),
            created_at: Utc::now(),
            closed_by: None,
            closed_at: None,
        };
        order.recompute_totals();
        order
    }

    // -------------------------------------------------------------------------
    // Status predicates
    // -------------------------------------------------------------------------

    pub fn is_new(&self) -> bool {
        self.status == OrderStatus::New
    }

    pub fn is_submitted(&self) -> bool {
        self.status == OrderStatus::Submitted
    }

    pub fn is_printed(&self) -> bool {
        self.status == OrderStatus::Printed
    }

    pub fn is_checked(&self) -> bool {
        self.status == OrderStatus::Checked
    }

    pub fn is_voided(&self) -> bool {
        self.status == OrderStatus::Voided
    }

    pub fn is_closed(&self) -> bool {
        self.is_checked() || self.is_voided()
    }

    /// No lines, or only voided ones.
    pub fn is_empty(&self) -> bool {
        self.items.iter().all(OrderItem::is_voided)
    }

    /// Open and below the default ceilings.
    pub fn is_mutable(&self) -> bool {
        self.is_mutable_within(&OrderLimits::default())
    }

    pub fn is_mutable_within(&self, limits: &OrderLimits) -> bool {
        !self.is_closed()
            && self.items.len() < limits.max_items
            && self.amounts.total < limits.total_ceiling
    }

    // -------------------------------------------------------------------------
    // Item views
    // -------------------------------------------------------------------------

    pub fn item(&self, id: &str) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn new_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(|item| item.is_new())
    }

    /// New lines not on hold.
    pub fn submittable_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(|item| item.is_new() && !item.hold)
    }

    /// Lines already sent to the kitchen and not yet paid.
    pub fn submitted_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items
            .iter()
            .filter(|item| item.is_submitted() || item.is_checked())
    }

    pub fn hold_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(|item| item.hold)
    }

    /// Sent lines with units not yet moved into any bill.
    pub fn unbilled_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(|item| {
            !item.is_new() && !item.is_voided() && item.billed_count < item.count
        })
    }

    // -------------------------------------------------------------------------
    // Bill views
    // -------------------------------------------------------------------------

    pub fn bill(&self, id: &str) -> Option<&Bill> {
        self.bills.iter().find(|bill| bill.id == id)
    }

    pub(crate) fn bill_index(&self, id: &str) -> Option<usize> {
        self.bills.iter().position(|bill| bill.id == id)
    }

    pub fn unpaid_bills(&self) -> impl Iterator<Item = &Bill> {
        self.bills.iter().filter(|bill| !bill.paid)
    }

    /// No unpaid bill, no new line and no unbilled units.
    pub fn all_paid(&self) -> bool {
        self.unpaid_bills().next().is_none()
            && self.new_items().next().is_none()
            && self.unbilled_items().next().is_none()
    }

    /// A bill carrying this order's current selectors.
    pub(crate) fn blank_bill(&self) -> Bill {
        Bill::with_pricing(self.pricing.clone(), self.amounts.custom_service_fee_amount)
    }

    /// `#12 - 09:30 - 2 bill(s)`
    pub fn short_summary(&self) -> String {
        format!(
            "#{} - {} - {} bill(s)",
            self.order_no,
            self.created_at.format("%H:%M"),
            self.bills.len()
        )
    }
}

impl ItemsContainer for Order {
    fn items(&self) -> &[OrderItem] {
        &self.items
    }

    fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    fn amounts(&self) -> &Amounts {
        &self.amounts
    }

    fn amounts_mut(&mut self) -> &mut Amounts {
        &mut self.amounts
    }

    fn tip(&self) -> Money {
        self.tip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_short_summary() {
        let mut order = Order::open(
            &SessionContext::default(),
            OpenOrder {
                order_no: 12,
                ..OpenOrder::default()
            },
        );
        order.created_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        order.bills.push(order.blank_bill());
        order.bills.push(order.blank_bill());
        assert_eq!(order.short_summary(), "#12 - 09:30 - 2 bill(s)");
    }

    #[test]
    fn test_open_starts_new_and_empty() {
        let order = Order::open(&SessionContext::default(), OpenOrder::default());
        assert!(order.is_new());
        assert!(order.is_empty());
        assert!(order.is_mutable());
        assert_eq!(order.persons, 1);
    }
}
