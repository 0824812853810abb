use serde::{Deserialize, Serialize};

/// Stored executable payload of a function, keyed by function code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionData {
    pub id: i64,
    pub function_code: String,
    pub data: Vec<u8>,
}

impl FunctionData {
    pub fn new(id: i64, function_code: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id,
            function_code: function_code.into(),
            data,
        }
    }
}
