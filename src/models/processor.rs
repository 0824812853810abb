use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A remote worker node registered with the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Processor {
    pub id: i64,
    pub ip: Option<String>,
    pub updated_on: DateTime<Utc>,
}

impl Processor {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ip: None,
            updated_on: Utc::now(),
        }
    }
}

/// An execution slot of a processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorCore {
    pub id: i64,
    pub processor_id: i64,
    pub code: String,
}

impl ProcessorCore {
    pub fn new(id: i64, processor_id: i64, code: impl Into<String>) -> Self {
        Self {
            id,
            processor_id,
            code: code.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct ProcessorCoreRef {
    pub id: i64,
    pub processor_id: i64,
}
