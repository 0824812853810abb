use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A client-submitted execution request wrapping one execution context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Batch {
    pub id: i64,
    pub exec_context_id: i64,
    pub company_id: i64,
    /// Soft-deletion flag; the row is reclaimed once past the retention timeout
    pub deleted: bool,
    pub created_on: DateTime<Utc>,
}

impl Batch {
    pub fn new(id: i64, exec_context_id: i64, company_id: i64) -> Self {
        Self {
            id,
            exec_context_id,
            company_id,
            deleted: false,
            created_on: Utc::now(),
        }
    }

    pub fn created_at(mut self, created_on: DateTime<Utc>) -> Self {
        self.created_on = created_on;
        self
    }

    pub fn mark_deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// Batches are read in full by the sweep, the projection is the row itself
pub type BatchRef = Batch;
