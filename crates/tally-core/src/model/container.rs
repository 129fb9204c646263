//! Behaviour shared by [`Order`](super::Order) and [`Bill`](super::Bill).
//!
//! Both hold order lines, a [`Pricing`] and the [`Amounts`] derived from
//! them. The trait owns the one implementation of the total formula.

use crate::money::Money;

use super::item::OrderItem;
use super::pricing::{Amounts, Pricing};

pub trait ItemsContainer {
    fn items(&self) -> &[OrderItem];

    fn pricing(&self) -> &Pricing;

    fn amounts(&self) -> &Amounts;

    fn amounts_mut(&mut self) -> &mut Amounts;

    fn tip(&self) -> Money;

    /// A total that must survive recomputation. Split bills pin theirs.
    fn pinned_total(&self) -> Option<Money> {
        None
    }

    fn total(&self) -> Money {
        self.amounts().total
    }

    fn total_with_tip(&self) -> Money {
        self.total() + self.tip()
    }

    /// Rebuilds every derived amount from the non-voided lines.
    fn recompute_totals(&mut self) {
        let live = self.items().iter().filter(|item| !item.is_voided());
        let (quantity, subtotal) = live.fold((0i64, Money::ZERO), |(q, s), item| {
            (q + item.count, s + item.subtotal)
        });
        let mut amounts = Amounts::compute(
            quantity,
            subtotal,
            self.pricing(),
            self.amounts().custom_service_fee_amount,
        );
        if let Some(total) = self.pinned_total() {
            amounts.total = total;
        }
        *self.amounts_mut() = amounts;
    }
}
