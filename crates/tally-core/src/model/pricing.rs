//! Tax, discount and service-fee selectors plus the derived amounts they
//! produce. Orders and bills each carry their own copy, so a bill keeps the
//! rates it was printed with even if the order's selectors change later.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Percent};

/// Id used by [`Tax::none`] and [`Discount::none`].
pub const NONE_SELECTOR_ID: &str = "no";

// =============================================================================
// Selectors
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Tax {
    pub id: String,
    pub name: String,
    pub percent: Percent,
    #[serde(default)]
    pub is_default: bool,
}

impl Tax {
    pub fn new(id: impl Into<String>, name: impl Into<String>, percent: Percent) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            percent,
            is_default: false,
        }
    }

    /// "No Tax", used when a manager removes tax from an order.
    pub fn none() -> Self {
        Self::new(NONE_SELECTOR_ID, "No Tax", Percent::ZERO)
    }
}

impl Default for Tax {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Discount {
    pub id: String,
    pub name: String,
    pub percent: Percent,
    /// Manager-adjusted rate; wins over `percent` when non-zero.
    #[serde(default)]
    pub adjusted_percent: Percent,
    #[serde(default)]
    pub adjusted_reason: String,
}

impl Discount {
    pub fn new(id: impl Into<String>, name: impl Into<String>, percent: Percent) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            percent,
            adjusted_percent: Percent::ZERO,
            adjusted_reason: String::new(),
        }
    }

    pub fn none() -> Self {
        Self::new(NONE_SELECTOR_ID, "No Discount", Percent::ZERO)
    }

    /// The rate actually applied.
    pub fn final_percent(&self) -> Percent {
        if self.adjusted_percent.is_zero() {
            self.percent
        } else {
            self.adjusted_percent
        }
    }

    pub fn adjust(&mut self, percent: Percent, reason: impl Into<String>) {
        self.adjusted_percent = percent;
        self.adjusted_reason = reason.into();
    }
}

impl Default for Discount {
    fn default() -> Self {
        Self::none()
    }
}

/// Service fee tier applied automatically by party size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GroupGratuity {
    /// Minimum number of guests for this tier.
    pub number: u32,
    pub percent: Percent,
}

/// Picks the tier for a party of `persons`.
///
/// Returns the largest tier whose `number` is at most `persons`, or `None`
/// when the party is smaller than every tier. With tiers at 10 and 20
/// guests, 15 gets the 10 tier and 25 gets the 20 tier.
pub fn find_group_gratuity(tiers: &[GroupGratuity], persons: u32) -> Option<GroupGratuity> {
    tiers
        .iter()
        .filter(|tier| tier.number <= persons)
        .max_by_key(|tier| tier.number)
        .copied()
}

/// The rate selectors an items container is priced with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Pricing {
    pub tax: Tax,
    pub discount: Discount,
    /// Group gratuity rate, charged on the subtotal.
    pub service_fee: Percent,
    /// Tax charged on the group gratuity.
    pub service_fee_tax: Percent,
    /// Manual service fee as a rate of the taxed, discounted subtotal.
    /// When zero, `Amounts::custom_service_fee_amount` is a fixed amount.
    pub custom_service_fee_percent: Percent,
}

// =============================================================================
// Derived Amounts
// =============================================================================

/// Everything `recompute_totals` writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Amounts {
    pub quantity: i64,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub custom_service_fee_amount: Money,
    pub service_fee_amount: Money,
    pub service_fee_tax_amount: Money,
    pub total: Money,
}

impl Amounts {
    /// Applies the ledger formula to a quantity and subtotal.
    ///
    /// ```text
    /// discount   = subtotal × discount%
    /// tax        = (subtotal − discount) × tax%
    /// custom fee = (subtotal − discount + tax) × custom%   (or the fixed amount)
    /// svc fee    = subtotal × service_fee%
    /// svc tax    = svc fee × service_fee_tax%
    /// total      = subtotal − discount + tax + custom fee + svc fee + svc tax
    /// ```
    ///
    /// Each product is rounded to the cent before it is used again.
    pub fn compute(
        quantity: i64,
        subtotal: Money,
        pricing: &Pricing,
        fixed_custom_fee: Money,
    ) -> Self {
        let discount_amount = subtotal.apply_percent(pricing.discount.final_percent());
        let taxable = subtotal - discount_amount;
        let tax_amount = taxable.apply_percent(pricing.tax.percent);
        let custom_service_fee_amount = if pricing.custom_service_fee_percent.is_zero() {
            fixed_custom_fee
        } else {
            (taxable + tax_amount).apply_percent(pricing.custom_service_fee_percent)
        };
        let service_fee_amount = subtotal.apply_percent(pricing.service_fee);
        let service_fee_tax_amount = service_fee_amount.apply_percent(pricing.service_fee_tax);
        let total = subtotal - discount_amount
            + tax_amount
            + custom_service_fee_amount
            + service_fee_amount
            + service_fee_tax_amount;

        Self {
            quantity,
            subtotal,
            discount_amount,
            tax_amount,
            custom_service_fee_amount,
            service_fee_amount,
            service_fee_tax_amount,
            total,
        }
    }
}
