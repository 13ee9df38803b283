//! Store query objects
//!
//! A [`ScopeObject`] is the adapter-facing description of "which records":
//! the scoping stages narrow it down and the store adapter executes it.

use crate::core::query::{Operator, SortParam};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write;

/// A single `attribute <op> value` condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub attribute: String,
    pub operator: Operator,
    pub value: Value,
}

/// Mutable store query built up by the scoping pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeObject {
    resource_type: String,
    conditions: Vec<Condition>,
    order: Vec<SortParam>,
    limit: Option<usize>,
    offset: Option<usize>,
    lookup: Option<Vec<String>>,
}

impl ScopeObject {
    /// An unconstrained query over every record of `resource_type`
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            conditions: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            lookup: None,
        }
    }

    pub fn filter(mut self, attribute: impl Into<String>, operator: Operator, value: Value) -> Self {
        self.conditions.push(Condition {
            attribute: attribute.into(),
            operator,
            value,
        });
        self
    }

    pub fn where_eq(self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(attribute, Operator::Eq, value.into())
    }

    pub fn where_in<I, V>(self, attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(attribute, Operator::In, Value::Array(values))
    }

    /// Fetch records by id, one result slot per requested id
    ///
    /// Adapters return `None` in the slot of every id they cannot find.
    pub fn lookup<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lookup = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn order(mut self, sort: SortParam) -> Self {
        self.order.push(sort);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    // === Accessors ===

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn has_condition(&self, attribute: &str) -> bool {
        self.conditions.iter().any(|c| c.attribute == attribute)
    }

    pub fn ordering(&self) -> &[SortParam] {
        &self.order
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<usize> {
        self.offset
    }

    pub fn lookup_ids(&self) -> Option<&[String]> {
        self.lookup.as_deref()
    }

    pub fn is_paginated(&self) -> bool {
        self.limit.is_some() || self.offset.is_some()
    }

    /// Stable, human readable rendering of the whole query
    ///
    /// Two structurally identical scope objects always render identically.
    pub fn fingerprint(&self) -> String {
        let mut out = format!("FROM {}", self.resource_type);

        if let Some(ids) = &self.lookup {
            let _ = write!(out, " LOOKUP [{}]", ids.join(","));
        }

        for (i, condition) in self.conditions.iter().enumerate() {
            let keyword = if i == 0 { "WHERE" } else { "AND" };
            let _ = write!(
                out,
                " {} {} {} {}",
                keyword,
                condition.attribute,
                condition.operator.symbol(),
                condition.value
            );
        }

        if !self.order.is_empty() {
            let clauses: Vec<String> = self
                .order
                .iter()
                .map(|s| format!("{} {}", s.attribute, s.direction.as_str()))
                .collect();
            let _ = write!(out, " ORDER BY {}", clauses.join(", "));
        }

        if let Some(limit) = self.limit {
            let _ = write!(out, " LIMIT {}", limit);
        }
        if let Some(offset) = self.offset {
            let _ = write!(out, " OFFSET {}", offset);
        }

        out
    }
}
