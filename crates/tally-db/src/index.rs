//! # Secondary Indexes
//!
//! Index rows are derived from a document body on every write. A rule looks
//! at the body and either yields a key or skips the document.
//!
//! ```text
//! put(order) ──► Indexer::entries(body)
//!                   ├── order_by_shift           key = shift_id
//!                   └── open_orders_by_store     key = store_id  (status not closed)
//!
//! put(trans) ──► unsettled_transactions_by_shift key = shift  (status new|voided)
//! ```

use serde_json::Value;

/// Orders of a shift, any status.
pub const ORDER_BY_SHIFT: &str = "order_by_shift";
/// Orders of a store that are neither checked nor voided.
pub const OPEN_ORDERS_BY_STORE: &str = "open_orders_by_store";
/// Transactions of a shift not yet included in a batch close.
pub const UNSETTLED_TRANSACTIONS_BY_SHIFT: &str = "unsettled_transactions_by_shift";

/// Field every stored body carries to name its kind.
pub const TYPE_FIELD: &str = "type";

type KeyFn = fn(&Value) -> Option<String>;

/// One named index and how to derive its key.
#[derive(Clone, Copy)]
pub struct IndexRule {
    pub name: &'static str,
    key: KeyFn,
}

impl IndexRule {
    pub const fn new(name: &'static str, key: KeyFn) -> Self {
        Self { name, key }
    }
}

impl std::fmt::Debug for IndexRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRule").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub struct Indexer {
    rules: Vec<IndexRule>,
}

impl Default for Indexer {
    fn default() -> Self {
        Self::standard()
    }
}

impl Indexer {
    /// The ledger's indexes.
    pub fn standard() -> Self {
        Self {
            rules: vec![
                IndexRule::new(ORDER_BY_SHIFT, order_by_shift),
                IndexRule::new(OPEN_ORDERS_BY_STORE, open_orders_by_store),
                IndexRule::new(UNSETTLED_TRANSACTIONS_BY_SHIFT, unsettled_by_shift),
            ],
        }
    }

    pub fn with_rule(mut self, rule: IndexRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// `(index_name, key)` rows for a body.
    pub fn entries(&self, body: &Value) -> Vec<(&'static str, String)> {
        self.rules
            .iter()
            .filter_map(|rule| (rule.key)(body).map(|key| (rule.name, key)))
            .collect()
    }

    pub fn knows(&self, index: &str) -> bool {
        self.rules.iter().any(|rule| rule.name == index)
    }
}

/// The `type` field of a body, empty when absent.
pub fn doc_type(body: &Value) -> &str {
    body.get(TYPE_FIELD).and_then(Value::as_str).unwrap_or("")
}

fn str_field(body: &Value, field: &str) -> Option<String> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn order_by_shift(body: &Value) -> Option<String> {
    if doc_type(body) != "order" {
        return None;
    }
    str_field(body, "shift_id")
}

fn open_orders_by_store(body: &Value) -> Option<String> {
    if doc_type(body) != "order" {
        return None;
    }
    match body.get("status").and_then(Value::as_str) {
        Some("checked") | Some("voided") => None,
        _ => str_field(body, "store_id"),
    }
}

fn unsettled_by_shift(body: &Value) -> Option<String> {
    if doc_type(body) != "transaction" {
        return None;
    }
    match body.get("status").and_then(Value::as_str) {
        Some("new") | Some("voided") | None => str_field(body, "shift"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_open_order_is_indexed_twice() {
        let body = json!({"type": "order", "store_id": "s1", "shift_id": "sh1", "status": "printed"});
        let entries = Indexer::standard().entries(&body);
        assert_eq!(
            entries,
            vec![
                (ORDER_BY_SHIFT, "sh1".to_string()),
                (OPEN_ORDERS_BY_STORE, "s1".to_string()),
            ]
        );
    }

    #[test]
    fn test_closed_order_leaves_open_index() {
        let body = json!({"type": "order", "store_id": "s1", "shift_id": "sh1", "status": "checked"});
        let entries = Indexer::standard().entries(&body);
        assert_eq!(entries, vec![(ORDER_BY_SHIFT, "sh1".to_string())]);
    }

    #[test]
    fn test_settled_transaction_not_indexed() {
        let indexer = Indexer::standard();
        let new = json!({"type": "transaction", "shift": "sh1", "status": "new"});
        let settled = json!({"type": "transaction", "shift": "sh1", "status": "settled"});
        assert_eq!(indexer.entries(&new).len(), 1);
        assert!(indexer.entries(&settled).is_empty());
    }

    #[test]
    fn test_untyped_body_has_no_entries() {
        let body = json!({"store_id": "s1", "shift_id": "sh1"});
        assert!(Indexer::standard().entries(&body).is_empty());
        assert_eq!(doc_type(&body), "");
    }
}
