//! Bills: payable sub-ledgers of an order.
//!
//! ```text
//! Partial payment of a $30.00 bill with $10.00
//!
//!   before:  Bill A  total 30.00
//!
//!   after:   Bill A  total 10.00  parent=A parent_total=30.00  (paid)
//!            Bill B  total 20.00  parent=A parent_total=30.00  (unpaid)
//!
//!   Σ sibling totals == parent_total while no sibling is voided.
//! ```
//!
//! Split siblings carry the same lines; only their pinned totals differ.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::new_id;
use crate::money::Money;

use super::container::ItemsContainer;
use super::item::OrderItem;
use super::pricing::{Amounts, Pricing};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Bill {
    pub id: String,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(flatten)]
    pub pricing: Pricing,
    #[serde(flatten)]
    pub amounts: Amounts,
    #[serde(default)]
    pub tip: Money,

    // Split linkage
    /// Id of the bill this one was split from (itself for the first half).
    #[serde(default)]
    pub parent_bill: Option<String>,
    /// Total of the original bill before the first split.
    #[serde(default)]
    pub parent_total: Money,

    #[serde(default)]
    pub printed: bool,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub paid_by: Option<String>,
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    /// Transaction that paid this bill.
    #[serde(default)]
    pub transaction: Option<String>,
    /// Transactions that paid this bill and were voided since.
    #[serde(default)]
    pub voided_transactions: Vec<String>,
    #[serde(default)]
    pub voided: bool,
    #[serde(default)]
    pub settled: bool,
}

impl Bill {
    /// An empty bill priced with the given selectors.
    pub fn with_pricing(pricing: Pricing, fixed_custom_fee: Money) -> Self {
        let mut bill = Self {
            id: new_id(),
            items: Vec::new(),
            pricing,
            amounts: Amounts {
                custom_service_fee_amount: fixed_custom_fee,
                ..Amounts::default()
            },
            tip: Money::ZERO,
            parent_bill: None,
            parent_total: Money::ZERO,
            printed: false,
            paid: false,
            paid_by: None,
            paid_at: None,
            transaction: None,
            voided_transactions: Vec::new(),
            voided: false,
            settled: false,
        };
        bill.recompute_totals();
        bill
    }

    pub fn is_split(&self) -> bool {
        self.parent_bill.is_some()
    }

    /// Shares a split group with `other`.
    pub fn is_sibling_of(&self, other: &Bill) -> bool {
        self.parent_bill.is_some() && self.parent_bill == other.parent_bill
    }

    pub fn payable(&self) -> bool {
        !self.paid && !self.items.is_empty()
    }

    pub fn splittable(&self) -> bool {
        !self.paid && self.amounts.quantity > 0
    }

    /// A new unpaid sibling owing `amount`.
    pub fn split_off(&self, amount: Money) -> Bill {
        let (parent, parent_total) = match &self.parent_bill {
            Some(parent) => (parent.clone(), self.parent_total),
            None => (self.id.clone(), self.amounts.total),
        };
        Bill {
            id: new_id(),
            parent_bill: Some(parent),
            parent_total,
            amounts: Amounts {
                total: amount,
                ..self.amounts
            },
            printed: false,
            paid: false,
            paid_by: None,
            paid_at: None,
            transaction: None,
            voided_transactions: Vec::new(),
            voided: false,
            settled: false,
            ..self.clone()
        }
    }

    /// Turns this bill into a split bill owing `amount`.
    pub fn convert_to_split(&mut self, amount: Money) {
        if self.parent_bill.is_none() {
            self.parent_bill = Some(self.id.clone());
            self.parent_total = self.amounts.total;
        }
        self.amounts.total = amount;
    }

    /// Restores the original total and leaves the split group.
    pub fn unsplit(&mut self) {
        self.amounts.total = self.parent_total;
        self.parent_bill = None;
        self.parent_total = Money::ZERO;
        self.recompute_totals();
    }

    /// Takes over what a removed sibling owed.
    pub(crate) fn absorb_split_total(&mut self, amount: Money) {
        self.amounts.total += amount;
    }

    /// Adds lines, merging counts into lines with the same id.
    pub fn merge_items(&mut self, items: &[OrderItem]) {
        if items.is_empty() {
            return;
        }
        for item in items {
            match self.items.iter_mut().find(|line| line.id == item.id) {
                Some(line) => {
                    line.count += item.count;
                    line.recompute_subtotal();
                }
                None => self.items.push(item.clone()),
            }
        }
        self.recompute_totals();
    }

    /// Units of an order line this bill covers.
    pub fn count_of(&self, item_id: &str) -> i64 {
        self.items
            .iter()
            .filter(|line| line.id == item_id)
            .map(|line| line.count)
            .sum()
    }
}

impl ItemsContainer for Bill {
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

    fn pinned_total(&self) -> Option<Money> {
        self.is_split().then_some(self.amounts.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::CatalogItem;
    use crate::money::Percent;
    use crate::model::pricing::Tax;

    fn line(cents: i64, count: i64) -> OrderItem {
        OrderItem::from_catalog(&CatalogItem {
            id: format!("itm-{cents}"),
            category_id: "c".into(),
            name: "Thing".into(),
            name2: String::new(),
            price: Money::from_cents(cents),
            is_open_item: false,
        })
        .with_count(count)
    }

    fn bill_of(items: Vec<OrderItem>) -> Bill {
        let mut bill = Bill::with_pricing(
            Pricing {
                tax: Tax::new("t", "Tax", Percent::from_whole(10)),
                ..Pricing::default()
            },
            Money::ZERO,
        );
        bill.merge_items(&items);
        bill
    }

    #[test]
    fn test_merge_items_adds_counts_by_line_id() {
        let a = line(500, 1);
        let mut bill = bill_of(vec![a.clone()]);
        bill.merge_items(&[a.clone().with_count(2)]);
        assert_eq!(bill.items.len(), 1);
        assert_eq!(bill.items[0].count, 3);
        assert_eq!(bill.amounts.subtotal.cents(), 1500);
        assert_eq!(bill.amounts.total.cents(), 1650);
    }

    #[test]
    fn test_split_and_unsplit() {
        let mut bill = bill_of(vec![line(1000, 3)]);
        assert_eq!(bill.total().cents(), 3300);

        let rest = bill.split_off(Money::from_cents(2300));
        bill.convert_to_split(Money::from_cents(1000));

        assert_eq!(rest.parent_bill.as_deref(), Some(bill.id.as_str()));
        assert_eq!(bill.parent_bill.as_deref(), Some(bill.id.as_str()));
        assert_eq!(rest.parent_total.cents(), 3300);
        assert!(bill.is_sibling_of(&rest));
        assert_eq!(bill.total() + rest.total(), bill.parent_total);

        // a split bill keeps its pinned total
        bill.recompute_totals();
        assert_eq!(bill.total().cents(), 1000);

        bill.unsplit();
        assert!(!bill.is_split());
        assert_eq!(bill.total().cents(), 3300);
    }

    #[test]
    fn test_split_of_split_keeps_original_parent() {
        let mut bill = bill_of(vec![line(1000, 3)]);
        let mut second = bill.split_off(Money::from_cents(2000));
        bill.convert_to_split(Money::from_cents(1300));
        let third = second.split_off(Money::from_cents(500));
        second.convert_to_split(Money::from_cents(1500));
        assert_eq!(third.parent_bill, bill.parent_bill);
        assert_eq!(third.parent_total.cents(), 3300);
        assert_eq!((bill.total() + second.total() + third.total()).cents(), 3300);
    }

    #[test]
    fn test_count_of() {
        let a = line(500, 2);
        let bill = bill_of(vec![a.clone()]);
        assert_eq!(bill.count_of(&a.id), 2);
        assert_eq!(bill.count_of("missing"), 0);
        assert!(bill.payable());
    }
}
