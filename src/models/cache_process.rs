use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Cached result of running a function on a given input signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheProcess {
    pub id: i64,
    pub function_code: String,
    /// Hash of the inputs the cached result was produced from
    pub key_sha256_length: String,
    pub created_on: DateTime<Utc>,
}

impl CacheProcess {
    pub fn new(id: i64, function_code: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id,
            function_code: function_code.into(),
            key_sha256_length: key.into(),
            created_on: Utc::now(),
        }
    }
}

/// Payload of one output variable stored under a cache entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheVariable {
    pub id: i64,
    pub cache_process_id: i64,
    pub variable_name: String,
    pub data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CacheProcessRef {
    pub id: i64,
    pub function_code: String,
}
