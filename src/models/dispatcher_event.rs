use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Append-only audit log row, bucketed by month for bulk retention deletes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherEvent {
    pub id: i64,
    pub company_id: Option<i64>,
    /// `year * 100 + month` of the event's creation time
    pub period: i32,
    pub event: String,
    pub params: serde_json::Value,
}

impl DispatcherEvent {
    pub fn new(id: i64, created_on: DateTime<Utc>, event: impl Into<String>) -> Self {
        Self {
            id,
            company_id: None,
            period: Self::period_of(created_on),
            event: event.into(),
            params: serde_json::Value::Null,
        }
    }

    /// Coarse retention bucket of a timestamp, e.g. 2026-10-18 → 202610
    pub fn period_of(created_on: DateTime<Utc>) -> i32 {
        created_on.year() * 100 + created_on.month() as i32
    }
}
