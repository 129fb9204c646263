//! Whole-order edits: closing, merging tables, customer and driver.

use chrono::Utc;

use crate::context::EmployeeRef;
use crate::error::{CoreError, CoreResult};
use crate::model::{
    find_group_gratuity, CustomerInfo, GroupGratuity, ItemStatus, ItemsContainer, Order,
    OrderStatus, MAX_ITEM_COUNT,
};
use crate::money::Percent;

impl Order {
    /// Closes the order as `checked`, or `voided` when `voided` is set.
    pub fn close(&mut self, employee: &EmployeeRef, voided: bool) {
        self.status = if voided {
            OrderStatus::Voided
        } else {
            OrderStatus::Checked
        };
        self.closed_by = Some(employee.id.clone());
        self.closed_at = Some(Utc::now());
    }

    /// Attaches or clears the customer.
    pub fn set_customer(&mut self, customer: Option<CustomerInfo>) {
        self.customer = customer.unwrap_or_default();
    }

    /// Assigns or clears the delivery driver.
    pub fn set_driver(&mut self, driver: Option<&EmployeeRef>) {
        self.driver = driver.cloned().unwrap_or_default();
    }

    /// Folds other open orders into this one.
    ///
    /// Guests add up. Lines with a note or modifiers are appended; plain
    /// lines land on an existing plain line of the same product with the
    /// same status, to-go and hold flags while the sum stays below 99
    /// units. Incoming lines arrive unbilled. The group gratuity tier is
    /// re-picked for the new party size.
    ///
    /// Bills of the merged orders are not carried over, so an order with a
    /// paid bill is refused.
    pub fn merge_orders(
        &mut self,
        others: Vec<Order>,
        tiers: &[GroupGratuity],
    ) -> CoreResult<()> {
        self.ensure_open()?;
        for other in &others {
            if other.id == self.id {
                continue;
            }
            other.ensure_open()?;
            if other.bills.iter().any(|bill| bill.paid) {
                return Err(CoreError::OrderHasPayments(other.id.clone()));
            }
        }

        for other in others.into_iter().filter(|o| o.id != self.id) {
            self.persons += other.persons;
            for mut incoming in other.items {
                incoming.billed_count = 0;
                if incoming.status == ItemStatus::Checked {
                    incoming.status = ItemStatus::Submitted;
                }
                let target = if incoming.is_plain() {
                    self.items.iter_mut().find(|line| {
                        line.is_plain()
                            && line.item_id == incoming.item_id
                            && line.status == incoming.status
                            && line.togo == incoming.togo
                            && line.hold == incoming.hold
                            && line.count + incoming.count < MAX_ITEM_COUNT
                    })
                } else {
                    None
                };
                match target {
                    Some(line) => {
                        line.count += incoming.count;
                        line.recompute_subtotal();
                    }
                    None => self.items.push(incoming),
                }
            }
        }

        self.items.sort_by(|a, b| a.id.cmp(&b.id));
        self.pricing.service_fee = find_group_gratuity(tiers, self.persons)
            .map(|tier| tier.percent)
            .unwrap_or(Percent::ZERO);
        self.service_fee_reason.clear();
        if self.items.iter().any(|line| !line.is_new() && !line.is_voided()) && self.is_new() {
            self.status = OrderStatus::Submitted;
        }
        self.recompute_totals();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{employee, line, plain_order, submitted};
    use crate::money::{Money, Percent};

    fn tiers() -> Vec<GroupGratuity> {
        vec![
            GroupGratuity {
                number: 6,
                percent: Percent::from_whole(18),
            },
            GroupGratuity {
                number: 10,
                percent: Percent::from_whole(20),
            },
        ]
    }

    #[test]
    fn test_close_stamps_employee() {
        let mut order = plain_order();
        order.close(&employee(), false);
        assert_eq!(order.status, OrderStatus::Checked);
        assert_eq!(order.closed_by.as_deref(), Some("emp-1"));
        assert!(order.is_closed());
    }

    #[test]
    fn test_set_customer_and_driver() {
        let mut order = plain_order();
        order.set_customer(Some(CustomerInfo {
            id: "c-1".into(),
            name: "Lee".into(),
            ..CustomerInfo::default()
        }));
        order.set_driver(Some(&EmployeeRef::new("drv", "Sam")));
        assert_eq!(order.customer.name, "Lee");
        assert_eq!(order.driver.id, "drv");

        order.set_customer(None);
        order.set_driver(None);
        assert!(order.customer.id.is_empty());
        assert!(order.driver.id.is_empty());
    }

    #[test]
    fn test_merge_sums_persons_and_lines() {
        let mut target = plain_order();
        target.persons = 4;
        submitted(&mut target, vec![line("soda", 200)]);

        let mut other = plain_order();
        other.persons = 3;
        submitted(
            &mut other,
            vec![
                line("soda", 200).with_count(2),
                line("soup", 500).with_note("no salt", Money::ZERO),
            ],
        );

        target.merge_orders(vec![other], &tiers()).unwrap();

        assert_eq!(target.persons, 7);
        assert_eq!(target.items.len(), 2);
        let soda = target.items.iter().find(|i| i.item_id == "soda").unwrap();
        assert_eq!(soda.count, 3);
        assert_eq!(target.pricing.service_fee, Percent::from_whole(18));
        // 600 + 500 subtotal, 18% gratuity
        assert_eq!(target.total().cents(), 1100 + 198);
    }

    #[test]
    fn test_merge_keeps_lines_apart_at_99_units() {
        let mut target = plain_order();
        submitted(&mut target, vec![line("soda", 100).with_count(90)]);
        let mut other = plain_order();
        submitted(&mut other, vec![line("soda", 100).with_count(9)]);

        target.merge_orders(vec![other], &[]).unwrap();

        let mut counts: Vec<i64> = target.items.iter().map(|i| i.count).collect();
        counts.sort();
        assert_eq!(counts, vec![9, 90]);
        assert_eq!(target.total().cents(), 9900);
    }

    #[test]
    fn test_merge_refuses_paid_orders() {
        let mut target = plain_order();
        let mut other = plain_order();
        submitted(&mut other, vec![line("a", 100)]);
        other.checkout().unwrap();
        other.bills[0].paid = true;

        let err = target.merge_orders(vec![other], &tiers()).unwrap_err();
        assert!(matches!(err, CoreError::OrderHasPayments(_)));
        assert_eq!(target.persons, 1);
    }

    #[test]
    fn test_merge_clears_gratuity_below_first_tier() {
        let mut target = plain_order();
        target.pricing.service_fee = Percent::from_whole(18);
        target.service_fee_reason = "big party".into();
        target.merge_orders(vec![plain_order()], &tiers()).unwrap();
        assert_eq!(target.persons, 2);
        assert_eq!(target.pricing.service_fee, Percent::ZERO);
        assert!(target.service_fee_reason.is_empty());
    }
}
