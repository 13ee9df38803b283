//! Request-scoped context
//!
//! Carries ambient per-request state (tenant, user, locale...) through the
//! whole resolution tree. It is passed explicitly to every scope and copied by
//! value into each concurrent sideload task, so a branch can never observe or
//! leak mutations made by a sibling.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Arbitrary key/value state for one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    values: HashMap<String, Value>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The `tenant_id` entry, if present
    pub fn tenant_id(&self) -> Option<&Value> {
        self.get("tenant_id")
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_copies_are_independent() {
        let parent = RequestContext::new().with("tenant_id", 1);
        let mut child = parent.clone();
        child.insert("tenant_id", 2);
        child.insert("user_id", "u1");

        assert_eq!(parent.tenant_id(), Some(&json!(1)));
        assert!(!parent.contains("user_id"));
        assert_eq!(child.tenant_id(), Some(&json!(2)));
    }
}
