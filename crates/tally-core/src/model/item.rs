//! Order lines and their modifiers.
//!
//! ```text
//! OrderItem lifecycle
//!
//!   new ──submit──► submitted ──print──► checked ──pay──► paid
//!    │                  │
//!    └─ void (deleted)  └─ void ──► voided (terminal)
//! ```
//!
//! Persisted status strings keep the legacy spelling: a checked (printed)
//! line is stored as `"printed"` and a paid line as `"checked"`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::new_id;
use crate::money::Money;

/// Most units one line can hold before a new line is started.
pub const MAX_ITEM_COUNT: i64 = 99;

// =============================================================================
// Status
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ItemStatus {
    #[serde(rename = "void")]
    Voided,
    #[default]
    #[serde(rename = "new")]
    New,
    #[serde(rename = "submitted")]
    Submitted,
    /// On a printed check, waiting for payment.
    #[serde(rename = "printed")]
    Checked,
    #[serde(rename = "checked")]
    Paid,
}

// =============================================================================
// Modifiers
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ModifierOption {
    pub id: String,
    pub name: String,
    pub price: Money,
}

impl ModifierOption {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Money) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
        }
    }
}

/// A catalog modifier ("Cook temp", "Add-ons") and the options it offers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Modifier {
    pub id: String,
    pub name: String,
    /// More than one option may be selected at once.
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub required: bool,
    /// Printed on the same line as the item name.
    #[serde(default)]
    pub sameline: bool,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub options: Vec<ModifierOption>,
}

/// A modifier as selected on one order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderModifier {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub sameline: bool,
    #[serde(default)]
    pub custom: bool,
    pub options: Vec<ModifierOption>,
}

impl OrderModifier {
    pub fn from_selection(modifier: &Modifier, option: &ModifierOption) -> Self {
        Self {
            id: modifier.id.clone(),
            name: modifier.name.clone(),
            global: modifier.global,
            sameline: modifier.sameline,
            custom: modifier.custom,
            options: vec![option.clone()],
        }
    }
}

// =============================================================================
// Catalog Item
// =============================================================================

/// The menu entry an order line is rung from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CatalogItem {
    pub id: String,
    pub category_id: String,
    pub name: String,
    #[serde(default)]
    pub name2: String,
    pub price: Money,
    /// Priced at the register; every ring becomes its own line.
    #[serde(default)]
    pub is_open_item: bool,
}

// =============================================================================
// Order Item
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItem {
    /// Line id. Bill copies keep it so they can be traced back.
    pub id: String,
    /// Catalog id; two lines of the same product share it.
    pub item_id: String,
    #[serde(default)]
    pub category_id: String,
    pub name: String,
    #[serde(default)]
    pub name2: String,
    pub price: Money,
    #[serde(default)]
    pub is_open_item: bool,
    pub count: i64,
    #[serde(default)]
    pub togo: bool,
    #[serde(default)]
    pub hold: bool,
    #[serde(default)]
    pub note: String,
    /// Per-unit charge attached to the note ("extra plate").
    #[serde(default)]
    pub price_note: Money,
    #[serde(default)]
    pub modifiers: Vec<OrderModifier>,
    /// Units already moved into a bill. Never above `count`.
    #[serde(default)]
    pub billed_count: i64,
    #[serde(default)]
    pub void_reason: String,
    #[serde(default)]
    pub status: ItemStatus,
    /// Changed after it was sent to the kitchen.
    #[serde(default)]
    pub is_updated: bool,
    #[serde(default)]
    pub subtotal: Money,
}

impl OrderItem {
    /// A fresh `new` line with count 1.
    pub fn from_catalog(item: &CatalogItem) -> Self {
        let item_id = if item.is_open_item {
            new_id()
        } else {
            item.id.clone()
        };
        let mut line = Self {
            id: new_id(),
            item_id,
            category_id: item.category_id.clone(),
            name: item.name.clone(),
            name2: item.name2.clone(),
            price: item.price,
            is_open_item: item.is_open_item,
            count: 1,
            togo: false,
            hold: false,
            note: String::new(),
            price_note: Money::ZERO,
            modifiers: Vec::new(),
            billed_count: 0,
            void_reason: String::new(),
            status: ItemStatus::New,
            is_updated: false,
            subtotal: Money::ZERO,
        };
        line.recompute_subtotal();
        line
    }

    pub fn with_count(mut self, count: i64) -> Self {
        self.count = count;
        self.recompute_subtotal();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>, price_note: Money) -> Self {
        self.note = note.into();
        self.price_note = price_note;
        self.recompute_subtotal();
        self
    }

    // -------------------------------------------------------------------------
    // Status predicates
    // -------------------------------------------------------------------------

    pub fn is_new(&self) -> bool {
        self.status == ItemStatus::New
    }

    pub fn is_submitted(&self) -> bool {
        self.status == ItemStatus::Submitted
    }

    pub fn is_checked(&self) -> bool {
        self.status == ItemStatus::Checked
    }

    pub fn is_paid(&self) -> bool {
        self.status == ItemStatus::Paid
    }

    pub fn is_voided(&self) -> bool {
        self.status == ItemStatus::Voided
    }

    /// Partly or fully in a bill that is not paid yet.
    pub fn is_billed(&self) -> bool {
        !self.is_paid() && self.billed_count > 0
    }

    pub fn has_note(&self) -> bool {
        self.price_note.is_positive() || !self.note.is_empty()
    }

    pub fn has_modifiers(&self) -> bool {
        !self.modifiers.is_empty()
    }

    /// Can absorb more units of the same product instead of a new line.
    pub(crate) fn is_plain(&self) -> bool {
        !self.has_note() && !self.has_modifiers()
    }

    // -------------------------------------------------------------------------
    // Amounts
    // -------------------------------------------------------------------------

    /// `price × count + Σ option.price × count + price_note × count`.
    ///
    /// Each product is exact in cents, so rounding never compounds across
    /// options.
    pub fn recompute_subtotal(&mut self) {
        let options: Money = self
            .modifiers
            .iter()
            .flat_map(|m| m.options.iter())
            .map(|o| o.price.times(self.count))
            .sum();
        self.subtotal = self.price.times(self.count) + options + self.price_note.times(self.count);
    }

    /// Item price plus sameline option prices, for receipt layout.
    pub fn sameline_subtotal(&self) -> Money {
        let options: Money = self
            .modifiers
            .iter()
            .filter(|m| m.sameline)
            .flat_map(|m| m.options.iter())
            .map(|o| o.price.times(self.count))
            .sum();
        self.price.times(self.count) + options
    }

    /// `"Burger Medium Rare"` when "Medium Rare" is a sameline option.
    pub fn sameline_name(&self) -> String {
        let options: Vec<&str> = self
            .modifiers
            .iter()
            .filter(|m| m.sameline)
            .flat_map(|m| m.options.iter())
            .map(|o| o.name.as_str())
            .collect();
        if options.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, options.join(" "))
        }
    }

    /// Options printed on their own lines, with their extended price.
    pub fn option_lines(&self) -> Vec<(String, Money)> {
        self.modifiers
            .iter()
            .filter(|m| !m.sameline)
            .flat_map(|m| m.options.iter())
            .map(|o| (o.name.clone(), o.price.times(self.count)))
            .collect()
    }

    /// The copy that goes into a bill.
    ///
    /// Drops status, billed count, togo and hold; keeps the line id.
    pub fn bill_copy(&self) -> Self {
        Self {
            status: ItemStatus::New,
            billed_count: 0,
            togo: false,
            hold: false,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burger() -> CatalogItem {
        CatalogItem {
            id: "itm-burger".into(),
            category_id: "cat-grill".into(),
            name: "Burger".into(),
            name2: String::new(),
            price: Money::from_cents(1050),
            is_open_item: false,
        }
    }

    #[test]
    fn test_subtotal_includes_options_and_note() {
        let mut line = OrderItem::from_catalog(&burger()).with_count(2);
        line.modifiers.push(OrderModifier {
            id: "m-add".into(),
            name: "Add-ons".into(),
            global: false,
            sameline: false,
            custom: false,
            options: vec![
                ModifierOption::new("o-bacon", "Bacon", Money::from_cents(150)),
                ModifierOption::new("o-egg", "Egg", Money::from_cents(100)),
            ],
        });
        line = line.with_note("extra plate", Money::from_cents(50));
        // 2x10.50 + 2x1.50 + 2x1.00 + 2x0.50
        assert_eq!(line.subtotal.cents(), 2100 + 300 + 200 + 100);
        assert!(line.has_note());
        assert!(line.has_modifiers());
        assert!(!line.is_plain());
    }

    #[test]
    fn test_sameline_name_and_subtotal() {
        let mut line = OrderItem::from_catalog(&burger());
        line.modifiers.push(OrderModifier {
            id: "m-temp".into(),
            name: "Temp".into(),
            global: false,
            sameline: true,
            custom: false,
            options: vec![ModifierOption::new("o-mr", "Medium Rare", Money::from_cents(25))],
        });
        line.recompute_subtotal();
        assert_eq!(line.sameline_name(), "Burger Medium Rare");
        assert_eq!(line.sameline_subtotal().cents(), 1075);
        assert!(line.option_lines().is_empty());
    }

    #[test]
    fn test_open_items_get_fresh_catalog_ids() {
        let mut open = burger();
        open.is_open_item = true;
        let a = OrderItem::from_catalog(&open);
        let b = OrderItem::from_catalog(&open);
        assert_ne!(a.item_id, b.item_id);
        assert_eq!(OrderItem::from_catalog(&burger()).item_id, "itm-burger");
    }

    #[test]
    fn test_bill_copy_resets_line_state() {
        let mut line = OrderItem::from_catalog(&burger()).with_count(3);
        line.status = ItemStatus::Checked;
        line.billed_count = 3;
        line.togo = true;
        line.hold = true;
        let copy = line.bill_copy();
        assert_eq!(copy.id, line.id);
        assert_eq!(copy.count, 3);
        assert_eq!(copy.status, ItemStatus::New);
        assert_eq!(copy.billed_count, 0);
        assert!(!copy.togo && !copy.hold);
    }

    #[test]
    fn test_status_keeps_legacy_strings() {
        assert_eq!(serde_json::to_string(&ItemStatus::Voided).unwrap(), "\"void\"");
        assert_eq!(serde_json::to_string(&ItemStatus::Checked).unwrap(), "\"printed\"");
        assert_eq!(serde_json::to_string(&ItemStatus::Paid).unwrap(), "\"checked\"");
        let s: ItemStatus = serde_json::from_str("\"submitted\"").unwrap();
        assert_eq!(s, ItemStatus::Submitted);
    }

    #[test]
    fn test_is_billed() {
        let mut line = OrderItem::from_catalog(&burger());
        assert!(!line.is_billed());
        line.billed_count = 1;
        assert!(line.is_billed());
        line.status = ItemStatus::Paid;
        assert!(!line.is_billed());
    }
}
