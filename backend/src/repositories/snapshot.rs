//! Entity snapshots for the audit trail.
//!
//! Every audited entity provides a JSON-safe snapshot of its persisted
//! attributes: identifiers as strings, timestamps as ISO-8601, decimals as
//! doubles, enums as their string value. Snapshots are diffed key-wise to
//! produce the `changes` map stored on audit rows.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

/// JSON-safe attribute map of a persisted entity.
pub type Snapshot = Map<String, Value>;

/// Implemented by every entity whose mutations are audited.
pub trait AuditEntity {
    /// Name recorded in `audit_logs.entity_type`.
    const ENTITY_TYPE: &'static str;

    /// Raw primary key recorded in `audit_logs.entity_id`.
    fn audit_entity_id(&self) -> Uuid;

    /// Enumerated attribute snapshot of the persisted columns.
    fn snapshot(&self) -> Snapshot;
}

/// Key-wise diff over keys present in either snapshot with differing values.
///
/// Returns `{key: {"old": .., "new": ..}}`, or `None` when nothing changed.
pub fn snapshot_diff(old: &Snapshot, new: &Snapshot) -> Option<Value> {
    let mut changed = Map::new();
    for (key, old_value) in old {
        let new_value = new.get(key).unwrap_or(&Value::Null);
        if old_value != new_value {
            changed.insert(
                key.clone(),
                serde_json::json!({ "old": old_value, "new": new_value }),
            );
        }
    }
    for (key, new_value) in new {
        if !old.contains_key(key) && *new_value != Value::Null {
            changed.insert(
                key.clone(),
                serde_json::json!({ "old": Value::Null, "new": new_value }),
            );
        }
    }

    if changed.is_empty() {
        None
    } else {
        Some(Value::Object(changed))
    }
}

pub fn id_value(id: impl Into<Uuid>) -> Value {
    Value::String(id.into().to_string())
}

pub fn opt_id_value(id: Option<impl Into<Uuid>>) -> Value {
    id.map(id_value).unwrap_or(Value::Null)
}

pub fn timestamp_value(ts: &DateTime<Utc>) -> Value {
    Value::String(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

pub fn opt_timestamp_value(ts: &Option<DateTime<Utc>>) -> Value {
    ts.as_ref().map(timestamp_value).unwrap_or(Value::Null)
}

pub fn date_value(date: &NaiveDate) -> Value {
    Value::String(date.format("%Y-%m-%d").to_string())
}

pub fn opt_string_value(s: &Option<String>) -> Value {
    s.as_ref()
        .map(|s| Value::String(s.clone()))
        .unwrap_or(Value::Null)
}

pub fn opt_f64_value(v: Option<f64>) -> Value {
    v.map(|v| serde_json::json!(v)).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(pairs: &[(&str, Value)]) -> Snapshot {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn diff_of_identical_snapshots_is_none() {
        let snap = snapshot(&[("status", json!("draft")), ("total_days", json!(3.0))]);
        assert_eq!(snapshot_diff(&snap, &snap), None);
    }

    #[test]
    fn diff_reports_old_and_new_per_key() {
        let old = snapshot(&[("status", json!("draft")), ("total_days", json!(3.0))]);
        let new = snapshot(&[
            ("status", json!("pending_approval")),
            ("total_days", json!(3.0)),
        ]);

        let diff = snapshot_diff(&old, &new).expect("diff");
        assert_eq!(
            diff,
            json!({ "status": { "old": "draft", "new": "pending_approval" } })
        );
    }

    #[test]
    fn diff_covers_keys_missing_on_either_side() {
        let old = snapshot(&[("decided_by", json!("u1"))]);
        let new = snapshot(&[("decision_remarks", json!("ok"))]);

        let diff = snapshot_diff(&old, &new).expect("diff");
        assert_eq!(
            diff,
            json!({
                "decided_by": { "old": "u1", "new": null },
                "decision_remarks": { "old": null, "new": "ok" },
            })
        );
    }

    #[test]
    fn timestamp_values_are_iso8601_utc() {
        let ts = DateTime::parse_from_rfc3339("2024-02-01T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp_value(&ts), json!("2024-02-01T09:30:00.000000Z"));
    }

    #[test]
    fn date_values_use_plain_dates() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(date_value(&date), json!("2024-02-01"));
    }
}
