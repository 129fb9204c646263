//! # Session Context
//!
//! Who is acting, where, and during which shift.
//!
//! The UI builds one `SessionContext` after login and passes it to every
//! ledger or locking call that stamps identity, instead of the ledger
//! reaching for ambient "current user" state.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │ SessionContext                                                       │
//! │  ├── store    ─► order/transaction store_id, merchant_id             │
//! │  ├── station  ─► lock entry owner                                    │
//! │  ├── employee ─► created_by, closed_by, paid_by, voided_by           │
//! │  └── shift    ─► shift id/index, next transaction number             │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// The store (and its merchant) a station belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StoreRef {
    pub id: String,
    pub merchant_id: String,
    pub name: String,
}

/// A physical terminal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StationRef {
    pub id: String,
    pub name: String,
}

/// An employee, also used for drivers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct EmployeeRef {
    pub id: String,
    pub name: String,
}

/// The open shift. Order and transaction numbers are sequential inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShiftRef {
    pub id: String,
    pub index: u32,
    /// Number the next transaction created in this shift receives.
    pub trans_num: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionContext {
    pub store: StoreRef,
    pub station: StationRef,
    pub employee: EmployeeRef,
    pub shift: ShiftRef,
}

impl SessionContext {
    pub fn new(store: StoreRef, station: StationRef, employee: EmployeeRef, shift: ShiftRef) -> Self {
        Self {
            store,
            station,
            employee,
            shift,
        }
    }

    /// Same session, different employee (manager override, clock-in swap).
    pub fn with_employee(&self, employee: EmployeeRef) -> Self {
        Self {
            employee,
            ..self.clone()
        }
    }
}

impl StationRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl EmployeeRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_employee_keeps_station() {
        let ctx = SessionContext::new(
            StoreRef {
                id: "s1".into(),
                merchant_id: "m1".into(),
                name: "Main St".into(),
            },
            StationRef::new("st-1", "Bar"),
            EmployeeRef::new("e-1", "Ana"),
            ShiftRef {
                id: "sh-1".into(),
                index: 3,
                trans_num: 10,
            },
        );
        let other = ctx.with_employee(EmployeeRef::new("e-2", "Manager"));
        assert_eq!(other.station.id, "st-1");
        assert_eq!(other.employee.id, "e-2");
        assert_eq!(other.shift.index, 3);
    }
}
