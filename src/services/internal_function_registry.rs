//! Built-in functions executed by the dispatcher itself rather than by processors.
//!
//! Internal functions never get an `mh_function` row. A cache entry produced by one
//! is only legitimate when that internal function is cachable.

use std::collections::{BTreeMap, HashSet};

use crate::constants::internal_functions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalFunction {
    pub code: &'static str,
    pub cachable: bool,
}

#[derive(Debug, Clone)]
pub struct InternalFunctionRegistry {
    functions: BTreeMap<&'static str, InternalFunction>,
}

impl InternalFunctionRegistry {
    /// Registry containing every built-in function
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(internal_functions::NOP, false);
        registry.register(internal_functions::FINISH, false);
        registry.register(internal_functions::PERMUTE_VARIABLES_AND_HYPER_PARAMS, false);
        registry.register(internal_functions::BATCH_LINE_SPLITTER, false);
        registry.register(internal_functions::API_CALL, true);
        registry
    }

    pub fn empty() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, code: &'static str, cachable: bool) {
        self.functions
            .insert(code, InternalFunction { code, cachable });
    }

    pub fn get(&self, code: &str) -> Option<&InternalFunction> {
        self.functions.get(code)
    }

    pub fn is_internal(&self, code: &str) -> bool {
        self.functions.contains_key(code)
    }

    pub fn is_cachable(&self, code: &str) -> bool {
        self.get(code).is_some_and(|f| f.cachable)
    }

    /// Codes whose cache entries must be kept
    pub fn cachable_codes(&self) -> HashSet<String> {
        self.functions
            .values()
            .filter(|f| f.cachable)
            .map(|f| f.code.to_string())
            .collect()
    }
}

impl Default for InternalFunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_api_call_is_cachable() {
        let registry = InternalFunctionRegistry::new();
        assert!(registry.is_internal(internal_functions::NOP));
        assert!(!registry.is_cachable(internal_functions::NOP));
        assert!(registry.is_cachable(internal_functions::API_CALL));
        assert_eq!(
            registry.cachable_codes(),
            HashSet::from([internal_functions::API_CALL.to_string()])
        );
        assert!(!registry.is_internal("user.fit-model"));
    }
}
