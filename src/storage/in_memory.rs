//! In-memory store adapter for testing and development

use crate::core::adapter::Adapter;
use crate::core::query::{Operator, SortDirection};
use crate::core::record::{Record, RecordRef};
use crate::core::scope_object::{Condition, ScopeObject};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

type Table = IndexMap<String, RecordRef>;

/// In-memory store adapter
///
/// Keeps one table per resource type, in insertion order. Clones share the
/// same tables and counters. Uses RwLock for thread-safe access. Every
/// resolve hands out detached copies, so relationships attached during one
/// request never leak into the stored rows.
#[derive(Clone, Default)]
pub struct InMemoryAdapter {
    tables: Arc<RwLock<HashMap<String, Table>>>,
    resolve_calls: Arc<AtomicUsize>,
    close_calls: Arc<AtomicUsize>,
}

impl InMemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record (keyed by type and id)
    pub fn insert(&self, record: RecordRef) -> Result<()> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        tables
            .entry(record.resource_type().to_string())
            .or_default()
            .insert(record.id().to_string(), record);
        Ok(())
    }

    pub fn insert_all(&self, records: impl IntoIterator<Item = RecordRef>) -> Result<()> {
        records.into_iter().try_for_each(|record| self.insert(record))
    }

    pub fn remove(&self, resource_type: &str, id: &str) -> Result<Option<RecordRef>> {
        let mut tables = self
            .tables
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        Ok(tables
            .get_mut(resource_type)
            .and_then(|table| table.shift_remove(id)))
    }

    /// Number of `resolve` calls served so far
    pub fn resolve_count(&self) -> usize {
        self.resolve_calls.load(AtomicOrdering::SeqCst)
    }

    /// Number of `close` calls received so far
    pub fn close_count(&self) -> usize {
        self.close_calls.load(AtomicOrdering::SeqCst)
    }

    /// Records matched by the scope, with ordering and pagination applied
    fn select(&self, scope: &ScopeObject) -> Result<Vec<RecordRef>> {
        let tables = self
            .tables
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let Some(table) = tables.get(scope.resource_type()) else {
            return Ok(Vec::new());
        };

        let mut records: Vec<RecordRef> = match scope.lookup_ids() {
            Some(ids) => ids.iter().filter_map(|id| table.get(id).cloned()).collect(),
            None => table.values().cloned().collect(),
        };
        records.retain(|record| matches_all(record, scope.conditions()));

        if !scope.ordering().is_empty() {
            records.sort_by(|a, b| {
                scope
                    .ordering()
                    .iter()
                    .map(|sort| {
                        let ordering = compare_attribute(a, b, &sort.attribute);
                        match sort.direction {
                            SortDirection::Asc => ordering,
                            SortDirection::Desc => ordering.reverse(),
                        }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }

        let offset = scope.offset_value().unwrap_or(0);
        let limit = scope.limit_value().unwrap_or(usize::MAX);
        Ok(records
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|record| record.detached())
            .collect())
    }
}

#[async_trait]
impl Adapter for InMemoryAdapter {
    /// Lookups yield one slot per requested id, `None` for missing ones
    async fn resolve(&self, scope: &ScopeObject) -> Result<Vec<Option<RecordRef>>> {
        self.resolve_calls.fetch_add(1, AtomicOrdering::SeqCst);

        let selected = self.select(scope)?;
        let Some(ids) = scope.lookup_ids() else {
            return Ok(selected.into_iter().map(Some).collect());
        };

        Ok(ids
            .iter()
            .map(|id| selected.iter().find(|record| record.id() == id).cloned())
            .collect())
    }

    async fn count(&self, scope: &ScopeObject) -> Result<usize> {
        Ok(self.select(scope)?.len())
    }

    /// `{type}/query-{query digest}-{count}-{version digest}`
    async fn cache_key_with_version(&self, scope: &ScopeObject) -> Result<String> {
        let records = self.select(scope)?;

        let mut versions = Sha256::new();
        for record in &records {
            versions.update(record.id().as_bytes());
            versions.update(b":");
            versions.update(record.cache_version().to_be_bytes());
            versions.update(b";");
        }

        Ok(format!(
            "{}/query-{}-{}-{}",
            scope.resource_type(),
            hex::encode(Sha256::digest(scope.fingerprint().as_bytes())),
            records.len(),
            hex::encode(versions.finalize()),
        ))
    }

    async fn maximum_updated_at(&self, scope: &ScopeObject) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .select(scope)?
            .iter()
            .map(|record| record.updated_at())
            .max())
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

fn matches_all(record: &Record, conditions: &[Condition]) -> bool {
    conditions.iter().all(|condition| matches(record, condition))
}

fn matches(record: &Record, condition: &Condition) -> bool {
    let actual = record
        .attribute(&condition.attribute)
        .unwrap_or(Value::Null);
    let expected = &condition.value;

    match condition.operator {
        Operator::Eq => loose_eq(&actual, expected),
        Operator::NotEq => !loose_eq(&actual, expected),
        Operator::In => expected
            .as_array()
            .is_some_and(|values| values.iter().any(|value| loose_eq(&actual, value))),
        Operator::Gt => compare_values(&actual, expected) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare_values(&actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => compare_values(&actual, expected) == Some(Ordering::Less),
        Operator::Lte => matches!(
            compare_values(&actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

/// Equality that treats `1` and `"1"` as the same value
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            *s == n.to_string()
        }
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Missing and null attributes sort first
fn compare_attribute(a: &Record, b: &Record, attribute: &str) -> Ordering {
    match (a.attribute(attribute), b.attribute(attribute)) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => compare_values(&x, &y).unwrap_or(Ordering::Equal),
    }
}
