//! Time-ordered document ids.
//!
//! Ids start with a `yyMMddHHmmssSSS` UTC stamp so sorting items by id
//! reproduces the order they were rung in; a random hex tail keeps two
//! stations from colliding inside the same millisecond.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A new id, e.g. `260117093015123a41f09c2`.
pub fn new_id() -> String {
    new_id_at(Utc::now())
}

pub fn new_id_at(at: DateTime<Utc>) -> String {
    let tail = Uuid::new_v4().simple().to_string();
    format!("{}{}", at.format("%y%m%d%H%M%S%3f"), &tail[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ids_sort_by_time() {
        let early = Utc.with_ymd_and_hms(2026, 1, 17, 9, 30, 15).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 17, 9, 30, 16).unwrap();
        let a = new_id_at(early);
        let b = new_id_at(late);
        assert!(a < b);
        assert!(a.starts_with("260117093015000"));
        assert_eq!(a.len(), 23);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }
}
