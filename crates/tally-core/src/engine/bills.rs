//! # Bill Operations
//!
//! Printing, checkout, splitting and paying bills.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bill Workflow                                    │
//! │                                                                         │
//! │   submitted items ──checkout──► main bill ──check──► printed            │
//! │                                     │                                   │
//! │                     add_bill / move_items / remove_bill                 │
//! │                                     │                                   │
//! │                                 pay_bill ──► paid (maybe + split rest)  │
//! │                                     │                                   │
//! │                                 void_bill ──► unpaid again              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Main Bill
//! The first unpaid, non-split bill. Checkout fills it and `reset_bills`
//! folds every other unpaid non-split bill into it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::context::EmployeeRef;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::model::{ItemStatus, ItemsContainer, Order, OrderItem, OrderStatus, Transaction};
use crate::money::Money;
use crate::validation::validate_move_count;

/// Units of one bill line to move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemMove {
    pub item_id: String,
    pub count: i64,
}

impl ItemMove {
    pub fn new(item_id: impl Into<String>, count: i64) -> Self {
        Self {
            item_id: item_id.into(),
            count,
        }
    }
}

/// What a payment did to the order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentOutcome {
    /// The sibling created for the unpaid balance.
    pub split_bill: Option<String>,
    /// Text for the cashier when a balance remains.
    pub message: Option<String>,
    /// The payment settled the whole order.
    pub order_closed: bool,
}

impl Order {
    fn bill_position(&self, bill_id: &str) -> CoreResult<usize> {
        self.bill_index(bill_id)
            .ok_or_else(|| CoreError::BillNotFound(bill_id.to_string()))
    }

    fn main_bill_position(&self) -> Option<usize> {
        self.bills
            .iter()
            .position(|bill| !bill.paid && !bill.is_split())
    }

    // =========================================================================
    // Print / Checkout
    // =========================================================================

    /// Prints one bill, or every bill when `bill_id` is `None`.
    ///
    /// Only unpaid, unprinted bills with lines are printed. Their submitted
    /// lines move to `checked`, and a `submitted` order becomes `printed`.
    pub fn check(&mut self, bill_id: Option<&str>) -> CoreResult<()> {
        self.ensure_open()?;
        if let Some(id) = bill_id {
            self.bill_position(id)?;
        }
        if self.is_submitted() {
            self.status = OrderStatus::Printed;
        }

        let mut printed_lines: Vec<String> = Vec::new();
        for bill in self
            .bills
            .iter_mut()
            .filter(|bill| bill_id.map_or(true, |id| bill.id == id))
        {
            if bill.paid || bill.printed || bill.items.is_empty() {
                continue;
            }
            bill.printed = true;
            printed_lines.extend(bill.items.iter().map(|line| line.id.clone()));
        }
        for line in self
            .items
            .iter_mut()
            .filter(|line| line.is_submitted() && printed_lines.contains(&line.id))
        {
            line.status = ItemStatus::Checked;
        }
        Ok(())
    }

    /// Moves every unbilled unit into the main bill, creating it if needed.
    ///
    /// Returns the main bill id.
    pub fn checkout(&mut self) -> CoreResult<String> {
        self.ensure_open()?;
        let copies: Vec<OrderItem> = self
            .unbilled_items()
            .map(|line| {
                let mut copy = line.bill_copy();
                copy.count = line.count - line.billed_count;
                copy.recompute_subtotal();
                copy
            })
            .collect();
        if copies.is_empty() {
            return Err(CoreError::NothingToCheckout);
        }

        for line in self
            .items
            .iter_mut()
            .filter(|line| !line.is_new() && !line.is_voided())
        {
            line.billed_count = line.count;
        }

        let main = match self.main_bill_position() {
            Some(index) => index,
            None => {
                let bill = self.blank_bill();
                self.bills.push(bill);
                self.bills.len() - 1
            }
        };
        self.bills[main].merge_items(&copies);
        Ok(self.bills[main].id.clone())
    }

    // =========================================================================
    // Bill Layout
    // =========================================================================

    /// Collapses the bill layout back to as few bills as payments allow.
    ///
    /// Within each split group the unpaid siblings fold into the first
    /// one; a group with nothing paid is unsplit. Empty bills are dropped
    /// and the remaining unpaid non-split bills merge into the main bill.
    pub fn reset_bills(&mut self) -> CoreResult<()> {
        self.ensure_open()?;

        let mut parents: Vec<String> = Vec::new();
        for parent in self.bills.iter().filter_map(|bill| bill.parent_bill.as_ref()) {
            if !parents.contains(parent) {
                parents.push(parent.clone());
            }
        }

        for parent in parents {
            let group: Vec<&crate::model::Bill> = self
                .bills
                .iter()
                .filter(|bill| bill.parent_bill.as_deref() == Some(parent.as_str()))
                .collect();
            let unpaid: Vec<String> = group
                .iter()
                .filter(|bill| !bill.paid)
                .map(|bill| bill.id.clone())
                .collect();
            if unpaid.len() < 2 {
                continue;
            }
            let nothing_paid = unpaid.len() == group.len();
            let (target_id, rest) = (&unpaid[0], &unpaid[1..]);
            let absorbed: Money = self
                .bills
                .iter()
                .filter(|bill| rest.contains(&bill.id))
                .map(|bill| bill.total())
                .sum();

            self.bills.retain(|bill| !rest.contains(&bill.id));
            if let Some(target) = self.bills.iter_mut().find(|bill| &bill.id == target_id) {
                if nothing_paid {
                    target.unsplit();
                } else {
                    target.absorb_split_total(absorbed);
                }
            }
        }

        self.bills.retain(|bill| !bill.items.is_empty());

        if let Some(main) = self.main_bill_position() {
            let rest: Vec<String> = self
                .bills
                .iter()
                .skip(main + 1)
                .filter(|bill| !bill.paid && !bill.is_split())
                .map(|bill| bill.id.clone())
                .collect();
            if !rest.is_empty() {
                let lines: Vec<OrderItem> = self
                    .bills
                    .iter()
                    .filter(|bill| rest.contains(&bill.id))
                    .flat_map(|bill| bill.items.iter().cloned())
                    .collect();
                self.bills[main].merge_items(&lines);
                self.bills.retain(|bill| !rest.contains(&bill.id));
            }
        }
        Ok(())
    }

    /// Appends an empty bill and returns its id.
    pub fn add_bill(&mut self) -> CoreResult<String> {
        self.ensure_open()?;
        let bill = self.blank_bill();
        let id = bill.id.clone();
        self.bills.push(bill);
        Ok(id)
    }

    /// Removes an unpaid bill.
    ///
    /// A split bill hands its total to the first unpaid sibling, which is
    /// unsplit when it is the last one left in the group. A plain bill hands
    /// its lines to the main bill, or gives the units back to the order
    /// when there is no other unpaid plain bill.
    pub fn remove_bill(&mut self, bill_id: &str) -> CoreResult<()> {
        self.ensure_open()?;
        let index = self.bill_position(bill_id)?;
        let bill = self.bills[index].clone();
        if bill.paid {
            return Err(CoreError::BillAlreadyPaid(bill.id));
        }

        let target = self.bills.iter().position(|other| {
            !other.paid
                && other.id != bill.id
                && if bill.is_split() {
                    other.parent_bill == bill.parent_bill
                } else {
                    !other.is_split()
                }
        });

        match target {
            Some(target) if bill.is_split() => {
                let parent = self.bills[target].parent_bill.clone();
                let others_in_group = self
                    .bills
                    .iter()
                    .enumerate()
                    .filter(|(i, other)| *i != target && other.parent_bill == parent)
                    .count();
                if others_in_group == 1 {
                    self.bills[target].unsplit();
                } else {
                    self.bills[target].absorb_split_total(bill.total());
                }
            }
            Some(target) => self.bills[target].merge_items(&bill.items),
            None if bill.is_split() => return Err(CoreError::NoMergeTarget(bill.id)),
            None => {
                for billed in &bill.items {
                    if let Some(line) = self.items.iter_mut().find(|line| line.id == billed.id) {
                        line.billed_count = (line.billed_count - billed.count).max(0);
                        if line.is_checked() && line.billed_count == 0 {
                            line.status = ItemStatus::Submitted;
                        }
                    }
                }
            }
        }

        self.bills.remove(index);
        Ok(())
    }

    /// Moves units between unpaid bills.
    ///
    /// With `to` unset a new bill receives them. Every move is checked
    /// against the source bill before anything changes. Returns the
    /// destination bill id.
    pub fn move_items(
        &mut self,
        moves: &[ItemMove],
        from: &str,
        to: Option<&str>,
    ) -> CoreResult<String> {
        self.ensure_open()?;
        if moves.is_empty() {
            return Err(CoreError::EmptySelection("items to move"));
        }
        let from_index = self.bill_position(from)?;
        if self.bills[from_index].paid {
            return Err(CoreError::BillAlreadyPaid(from.to_string()));
        }
        if to == Some(from) {
            return Ok(from.to_string());
        }
        // repeated ids draw on the same line
        let mut requested: Vec<(&str, i64)> = Vec::with_capacity(moves.len());
        for item_move in moves {
            let available = self.bills[from_index].count_of(&item_move.item_id);
            if available == 0 {
                return Err(CoreError::ItemNotFound(item_move.item_id.clone()));
            }
            validate_move_count(item_move.count, available)?;
            match requested.iter_mut().find(|(id, _)| *id == item_move.item_id) {
                Some((_, total)) => *total += item_move.count,
                None => requested.push((item_move.item_id.as_str(), item_move.count)),
            }
        }
        for (item_id, total) in &requested {
            validate_move_count(*total, self.bills[from_index].count_of(item_id))?;
        }
        let to_index = match to {
            Some(id) => {
                let index = self.bill_position(id)?;
                if self.bills[index].paid {
                    return Err(CoreError::BillAlreadyPaid(id.to_string()));
                }
                index
            }
            None => {
                let bill = self.blank_bill();
                self.bills.push(bill);
                self.bills.len() - 1
            }
        };

        let mut moved: Vec<OrderItem> = Vec::with_capacity(moves.len());
        let source = &mut self.bills[from_index];
        for item_move in moves {
            let Some(pos) = source.items.iter().position(|l| l.id == item_move.item_id) else {
                continue;
            };
            let line = &mut source.items[pos];
            line.count -= item_move.count;
            line.recompute_subtotal();
            let mut copy = line.clone();
            copy.count = item_move.count;
            copy.recompute_subtotal();
            moved.push(copy);
            if line.count == 0 {
                source.items.remove(pos);
            }
        }
        source.recompute_totals();

        self.bills[to_index].merge_items(&moved);
        Ok(self.bills[to_index].id.clone())
    }

    // =========================================================================
    // Payment
    // =========================================================================

    /// Records `trans` as the payment of a bill.
    ///
    /// When the approved amount falls short by a cent or more, the bill is
    /// split: it keeps the approved amount and a new sibling right after it
    /// owes the balance. The order closes once everything is paid.
    pub fn pay_bill(
        &mut self,
        bill_id: &str,
        trans: &Transaction,
        employee: &EmployeeRef,
    ) -> CoreResult<PaymentOutcome> {
        self.ensure_open()?;
        let index = self.bill_position(bill_id)?;
        if self.bills[index].paid {
            return Err(CoreError::BillAlreadyPaid(bill_id.to_string()));
        }
        let approved = trans.approved_amount;
        if !approved.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "approved amount".to_string(),
            }
            .into());
        }

        let mut outcome = PaymentOutcome::default();
        let balance = self.bills[index].total() - approved;
        if balance >= Money::CENT {
            let rest = self.bills[index].split_off(balance);
            self.bills[index].convert_to_split(approved);
            outcome.split_bill = Some(rest.id.clone());
            outcome.message = Some(format!(
                "Please see the Bill #{} for Remaining Balance: {}",
                index + 2,
                balance
            ));
            self.bills.insert(index + 1, rest);
        }

        let bill = &mut self.bills[index];
        bill.transaction = Some(trans.id.clone());
        bill.voided = false;
        bill.paid_by = Some(employee.id.clone());
        bill.paid_at = Some(Utc::now());
        bill.paid = true;
        let paid_lines: Vec<String> = bill.items.iter().map(|line| line.id.clone()).collect();

        for line in self
            .items
            .iter_mut()
            .filter(|line| paid_lines.contains(&line.id))
        {
            line.status = ItemStatus::Paid;
        }

        if self.all_paid() {
            self.close(employee, false);
            outcome.order_closed = true;
        }
        Ok(outcome)
    }

    /// Reverses the payment of a bill.
    ///
    /// A `checked` order reopens as `printed`. Lines no other paid bill
    /// covers go back to `checked`. The caller voids the transaction
    /// itself.
    pub fn void_bill(&mut self, bill_id: &str) -> CoreResult<()> {
        let index = self.bill_position(bill_id)?;
        if !self.bills[index].paid {
            return Err(CoreError::BillNotPaid(bill_id.to_string()));
        }
        if self.is_checked() {
            self.status = OrderStatus::Printed;
            self.closed_by = None;
            self.closed_at = None;
        }

        let bill = &mut self.bills[index];
        if let Some(trans) = bill.transaction.take() {
            bill.voided_transactions.push(trans);
        }
        bill.paid = false;
        bill.paid_by = None;
        bill.paid_at = None;
        bill.voided = false;
        let lines: Vec<String> = bill.items.iter().map(|line| line.id.clone()).collect();

        for id in lines {
            let still_paid: i64 = self
                .bills
                .iter()
                .filter(|bill| bill.paid)
                .map(|bill| bill.count_of(&id))
                .sum();
            if still_paid == 0 {
                if let Some(line) = self.items.iter_mut().find(|line| line.id == id) {
                    line.status = ItemStatus::Checked;
                }
            }
        }
        Ok(())
    }
}
