//! Line-level edits: ringing items, modifier choices, sending to the
//! kitchen and voiding.

use std::collections::HashSet;

use crate::context::EmployeeRef;
use crate::error::{CoreError, CoreResult};
use crate::model::{
    ItemStatus, ItemsContainer, Modifier, ModifierOption, Order, OrderItem, OrderLimits,
    OrderModifier, MAX_ITEM_COUNT,
};
use crate::validation::{validate_count, validate_reason};

impl Order {
    /// Rings an item up under the default ceilings.
    ///
    /// A plain (no note, no modifiers, not to-go) new line of the same
    /// product absorbs the count while it stays within 99 units; otherwise
    /// the item becomes a new line. Returns the line that now holds it.
    pub fn add_item(&mut self, item: OrderItem) -> CoreResult<&OrderItem> {
        self.add_item_within(item, &OrderLimits::default())
    }

    pub fn add_item_within(
        &mut self,
        mut item: OrderItem,
        limits: &OrderLimits,
    ) -> CoreResult<&OrderItem> {
        self.ensure_open()?;
        validate_count(item.count)?;
        if !self.is_mutable_within(limits) {
            let reason = if self.items.len() >= limits.max_items {
                format!("{} lines is the maximum", limits.max_items)
            } else {
                format!("total reached {}", limits.total_ceiling)
            };
            return Err(CoreError::OrderNotMutable {
                order_id: self.id.clone(),
                reason,
            });
        }

        let mergeable = item.is_plain() && !item.togo;
        let existing = self.items.iter().position(|line| {
            mergeable
                && line.is_new()
                && line.item_id == item.item_id
                && line.is_plain()
                && !line.togo
                && line.count + item.count <= MAX_ITEM_COUNT
        });

        let index = match existing {
            Some(index) => {
                let line = &mut self.items[index];
                line.count += item.count;
                line.recompute_subtotal();
                index
            }
            None => {
                item.status = ItemStatus::New;
                item.recompute_subtotal();
                self.items.push(item);
                self.items.len() - 1
            }
        };
        self.recompute_totals();
        Ok(&self.items[index])
    }

    /// Selects or deselects `option` of `modifier` on a line.
    ///
    /// Multi-select modifiers toggle the option in and out of the set.
    /// Single-select modifiers replace the set, and picking the already
    /// selected option clears it. A modifier left with no option is removed.
    pub fn toggle_modifier_option(
        &mut self,
        item_id: &str,
        modifier: &Modifier,
        option: &ModifierOption,
    ) -> CoreResult<()> {
        self.ensure_open()?;
        let line = self
            .items
            .iter_mut()
            .find(|line| line.id == item_id)
            .ok_or_else(|| CoreError::ItemNotFound(item_id.to_string()))?;

        match line.modifiers.iter().position(|m| m.id == modifier.id) {
            Some(mi) => {
                let now_empty = {
                    let selected = &mut line.modifiers[mi];
                    let existing = selected.options.iter().position(|o| o.id == option.id);
                    if modifier.multiple {
                        match existing {
                            Some(oi) => {
                                selected.options.remove(oi);
                            }
                            None => selected.options.push(option.clone()),
                        }
                    } else {
                        selected.options.clear();
                        if existing.is_none() {
                            selected.options.push(option.clone());
                        }
                    }
                    selected.options.is_empty()
                };
                if now_empty {
                    line.modifiers.remove(mi);
                }
            }
            None => line
                .modifiers
                .push(OrderModifier::from_selection(modifier, option)),
        }

        line.recompute_subtotal();
        self.recompute_totals();
        Ok(())
    }

    /// Flags lines as changed after they were sent.
    pub fn mark_updated(&mut self, item_ids: &[&str]) {
        for line in self.items.iter_mut().filter(|l| item_ids.contains(&l.id.as_str())) {
            line.is_updated = true;
        }
    }

    /// Sends the given new lines to the kitchen.
    ///
    /// A `new` order becomes `submitted`. Returns how many lines changed.
    pub fn submit_items(&mut self, item_ids: &[&str]) -> CoreResult<usize> {
        self.ensure_open()?;
        let targets: Vec<usize> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, line)| line.is_new() && item_ids.contains(&line.id.as_str()))
            .map(|(index, _)| index)
            .collect();
        if targets.is_empty() {
            return Err(CoreError::EmptySelection("new items to submit"));
        }
        for index in &targets {
            self.items[*index].status = ItemStatus::Submitted;
        }
        if self.is_new() {
            self.status = crate::model::OrderStatus::Submitted;
        }
        Ok(targets.len())
    }

    /// Sends every new line that is not on hold.
    pub fn submit(&mut self) -> CoreResult<usize> {
        let ids: Vec<String> = self.submittable_items().map(|l| l.id.clone()).collect();
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        self.submit_items(&ids)
    }

    /// Voids lines.
    ///
    /// New lines are deleted outright. Submitted lines become `voided` with
    /// the reason and are stripped from unpaid bills; a bill left empty is
    /// removed. When no live line remains the order closes as `voided`.
    /// Fails when no selected line is new or submitted.
    pub fn void_items(
        &mut self,
        item_ids: &[&str],
        reason: &str,
        employee: &EmployeeRef,
    ) -> CoreResult<()> {
        validate_reason("void reason", reason)?;
        let selected = |line: &OrderItem| item_ids.contains(&line.id.as_str());
        if !self
            .items
            .iter()
            .any(|line| selected(line) && (line.is_new() || line.is_submitted()))
        {
            return Err(CoreError::NothingToVoid);
        }

        self.items.retain(|line| !(selected(line) && line.is_new()));

        let mut voided: HashSet<String> = HashSet::new();
        for line in self
            .items
            .iter_mut()
            .filter(|line| item_ids.contains(&line.id.as_str()) && line.is_submitted())
        {
            line.status = ItemStatus::Voided;
            line.void_reason = reason.trim().to_string();
            voided.insert(line.id.clone());
        }

        if !voided.is_empty() {
            let mut emptied: Vec<String> = Vec::new();
            for bill in self.bills.iter_mut().filter(|bill| !bill.paid) {
                let before = bill.items.len();
                bill.items.retain(|line| !voided.contains(&line.id));
                if bill.items.len() != before {
                    if bill.items.is_empty() {
                        emptied.push(bill.id.clone());
                    } else {
                        bill.recompute_totals();
                    }
                }
            }
            self.bills.retain(|bill| !emptied.contains(&bill.id));
        }

        self.recompute_totals();
        // deleting every new line also counts as voiding the order
        if self.items.iter().all(OrderItem::is_voided) {
            self.close(employee, true);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::fixtures::{employee, line, plain_order, submitted, taxed_order};
    use crate::model::OrderStatus;
    use crate::money::Money;

    fn size() -> Modifier {
        Modifier {
            id: "m-size".into(),
            name: "Size".into(),
            ..Modifier::default()
        }
    }

    fn addons() -> Modifier {
        Modifier {
            id: "m-add".into(),
            name: "Add-ons".into(),
            multiple: true,
            ..Modifier::default()
        }
    }

    #[test]
    fn test_add_item_merges_plain_lines() {
        let mut order = plain_order();
        order.add_item(line("soda", 250)).unwrap();
        order.add_item(line("soda", 250)).unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].count, 2);
        assert_eq!(order.total().cents(), 500);

        // a noted line never absorbs another ring
        order
            .add_item(line("soda", 250).with_note("no ice", Money::ZERO))
            .unwrap();
        order.add_item(line("soda", 250)).unwrap();
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].count, 3);
    }

    #[test]
    fn test_add_item_starts_new_line_at_cap() {
        let mut order = plain_order();
        order.add_item(line("soda", 100).with_count(99)).unwrap();
        order.add_item(line("soda", 100)).unwrap();
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].count, 99);
    }

    #[test]
    fn test_add_item_does_not_merge_into_submitted_line() {
        let mut order = plain_order();
        submitted(&mut order, vec![line("soda", 100)]);
        order.add_item(line("soda", 100)).unwrap();
        assert_eq!(order.items.len(), 2);
    }

    #[test]
    fn test_add_item_refused_past_ceiling() {
        let mut order = plain_order();
        let limits = OrderLimits {
            max_items: 1,
            ..OrderLimits::default()
        };
        order.add_item_within(line("a", 100), &limits).unwrap();
        let err = order.add_item_within(line("b", 100), &limits).unwrap_err();
        assert!(matches!(err, CoreError::OrderNotMutable { .. }));
        assert_eq!(order.items.len(), 1);
    }

    #[test]
    fn test_single_select_modifier_toggles() {
        let mut order = plain_order();
        let id = order.add_item(line("burger", 1000)).unwrap().id.clone();
        let small = ModifierOption::new("s", "Small", Money::ZERO);
        let large = ModifierOption::new("l", "Large", Money::from_cents(200));

        order.toggle_modifier_option(&id, &size(), &small).unwrap();
        order.toggle_modifier_option(&id, &size(), &large).unwrap();
        let item = order.item(&id).unwrap();
        assert_eq!(item.modifiers.len(), 1);
        assert_eq!(item.modifiers[0].options, vec![large.clone()]);
        assert_eq!(order.total().cents(), 1200);

        // picking the selected option again clears the modifier
        order.toggle_modifier_option(&id, &size(), &large).unwrap();
        assert!(order.item(&id).unwrap().modifiers.is_empty());
        assert_eq!(order.total().cents(), 1000);
    }

    #[test]
    fn test_multi_select_modifier_toggles() {
        let mut order = plain_order();
        let id = order.add_item(line("burger", 1000)).unwrap().id.clone();
        let bacon = ModifierOption::new("b", "Bacon", Money::from_cents(150));
        let egg = ModifierOption::new("e", "Egg", Money::from_cents(100));

        order.toggle_modifier_option(&id, &addons(), &bacon).unwrap();
        order.toggle_modifier_option(&id, &addons(), &egg).unwrap();
        assert_eq!(order.item(&id).unwrap().modifiers[0].options.len(), 2);
        assert_eq!(order.total().cents(), 1250);

        order.toggle_modifier_option(&id, &addons(), &bacon).unwrap();
        assert_eq!(order.item(&id).unwrap().modifiers[0].options, vec![egg]);
        assert_eq!(order.total().cents(), 1100);
    }

    #[test]
    fn test_submit_moves_order_to_submitted() {
        let mut order = plain_order();
        order.add_item(line("a", 100)).unwrap();
        let mut held = line("b", 100);
        held.hold = true;
        order.add_item(held).unwrap();

        assert_eq!(order.submit().unwrap(), 1);
        assert_eq!(order.status, OrderStatus::Submitted);
        assert_eq!(order.hold_items().count(), 1);
        assert!(matches!(order.submit(), Err(CoreError::EmptySelection(_))));
    }

    #[test]
    fn test_void_new_item_deletes_it() {
        let mut order = plain_order();
        let id = order.add_item(line("a", 100)).unwrap().id.clone();
        order.add_item(line("b", 200)).unwrap();
        order.void_items(&[&id], "wrong item", &employee()).unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.total().cents(), 200);
        assert!(!order.is_closed());
    }

    #[test]
    fn test_void_all_submitted_items_voids_order() {
        let mut order = taxed_order();
        let ids = submitted(&mut order, vec![line("a", 1000), line("b", 500)]);
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();

        order.void_items(&ids, "customer left", &employee()).unwrap();

        assert_eq!(order.status, OrderStatus::Voided);
        assert!(order.items.iter().all(|i| i.is_voided()));
        assert_eq!(order.items[0].void_reason, "customer left");
        assert_eq!(order.total(), Money::ZERO);
        assert!(order.closed_at.is_some());
    }

    #[test]
    fn test_void_only_new_items_voids_order() {
        let mut order = taxed_order();
        let id = order.add_item(line("a", 1000).with_count(2)).unwrap().id.clone();
        assert_eq!(order.total().cents(), 1944);

        order.void_items(&[&id], "mistake", &employee()).unwrap();

        assert!(order.items.is_empty());
        assert_eq!(order.status, OrderStatus::Voided);
        assert_eq!(order.total(), Money::ZERO);
    }

    #[test]
    fn test_void_strips_item_from_unpaid_bills() {
        let mut order = plain_order();
        let ids = submitted(&mut order, vec![line("a", 1000), line("b", 500)]);
        order.checkout().unwrap();
        let bill_id = order.bills[0].id.clone();

        order.void_items(&[&ids[0]], "spilled", &employee()).unwrap();

        let bill = order.bill(&bill_id).unwrap();
        assert_eq!(bill.items.len(), 1);
        assert_eq!(bill.total().cents(), 500);
        assert_eq!(order.total().cents(), 500);
    }

    #[test]
    fn test_void_requires_reason_and_live_item() {
        let mut order = plain_order();
        let ids = submitted(&mut order, vec![line("a", 1000)]);
        assert!(matches!(
            order.void_items(&[&ids[0]], "  ", &employee()),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            order.void_items(&["nope"], "reason", &employee()),
            Err(CoreError::NothingToVoid)
        ));
        assert_eq!(order.items[0].status, ItemStatus::Submitted);
    }
}
