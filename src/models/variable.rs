use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An input/output value scoped to one execution context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: i64,
    pub exec_context_id: i64,
    pub name: String,
    /// Inline payload; `None` when the data lives behind `external_ref`
    pub data: Option<Vec<u8>>,
    pub external_ref: Option<String>,
    pub nullified: bool,
    pub created_on: DateTime<Utc>,
}

impl Variable {
    pub fn new(id: i64, exec_context_id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            exec_context_id,
            name: name.into(),
            data: None,
            external_ref: None,
            nullified: true,
            created_on: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self.nullified = false;
        self
    }
}
