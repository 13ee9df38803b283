//! Resolved records and the relationships attached onto them

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared handle to a resolved record
///
/// Records are shared between the parent result set and every sideload
/// branch that attaches children onto them, possibly from several tasks.
pub type RecordRef = Arc<Record>;

/// Children attached to a parent under one relationship name
#[derive(Debug, Clone)]
pub enum Related {
    /// To-one relationship (belongs-to, has-one)
    One(Option<RecordRef>),
    /// To-many relationship (has-many, many-to-many)
    Many(Vec<RecordRef>),
}

impl Related {
    /// All attached records, regardless of cardinality
    pub fn records(&self) -> Vec<RecordRef> {
        match self {
            Related::One(record) => record.iter().cloned().collect(),
            Related::Many(records) => records.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct RecordState {
    serializer: Option<String>,
    relationships: IndexMap<String, Related>,
}

/// A record produced by a store adapter
#[derive(Debug)]
pub struct Record {
    resource_type: String,
    id: String,
    attributes: Map<String, Value>,
    updated_at: DateTime<Utc>,
    state: RwLock<RecordState>,
}

impl Record {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        attributes: Value,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let attributes = match attributes {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            attributes,
            updated_at,
            state: RwLock::new(RecordState::default()),
        }
    }

    /// Convenience constructor returning a shared handle
    pub fn shared(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        attributes: Value,
        updated_at: DateTime<Utc>,
    ) -> RecordRef {
        Arc::new(Self::new(resource_type, id, attributes, updated_at))
    }

    /// Fresh copy of the stored data, without serializer or relationships
    pub fn detached(&self) -> RecordRef {
        Arc::new(Self {
            resource_type: self.resource_type.clone(),
            id: self.id.clone(),
            attributes: self.attributes.clone(),
            updated_at: self.updated_at,
            state: RwLock::new(RecordState::default()),
        })
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Attribute lookup; `id` resolves to the record id
    pub fn attribute(&self, name: &str) -> Option<Value> {
        if name == "id" {
            return Some(Value::String(self.id.clone()));
        }
        self.attributes.get(name).cloned()
    }

    /// Attribute as a string, when it is one
    pub fn str_attribute(&self, name: &str) -> Option<String> {
        match self.attribute(name)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Version token used for cache keys
    pub fn cache_version(&self) -> i64 {
        self.updated_at.timestamp_micros()
    }

    // === Mutable state (shared across sideload branches) ===

    fn read_state(&self) -> RwLockReadGuard<'_, RecordState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RecordState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Assign the serializer that renders this record
    pub fn assign_serializer(&self, serializer: impl Into<String>) {
        self.write_state().serializer = Some(serializer.into());
    }

    pub fn serializer(&self) -> Option<String> {
        self.read_state().serializer.clone()
    }

    /// Attach children under `name`, replacing anything attached before
    pub fn attach(&self, name: impl Into<String>, related: Related) {
        self.write_state().relationships.insert(name.into(), related);
    }

    /// Append one child to a to-many relationship
    pub fn push_related(&self, name: &str, record: RecordRef) {
        let mut state = self.write_state();
        match state.relationships.get_mut(name) {
            Some(Related::Many(records)) => records.push(record),
            _ => {
                state
                    .relationships
                    .insert(name.to_string(), Related::Many(vec![record]));
            }
        }
    }

    pub fn related(&self, name: &str) -> Option<Related> {
        self.read_state().relationships.get(name).cloned()
    }

    /// Names of every attached relationship, in attachment order
    pub fn relationship_names(&self) -> Vec<String> {
        self.read_state().relationships.keys().cloned().collect()
    }

    /// Render the record and its attached graph as JSON
    pub fn to_json(&self) -> Value {
        let mut object = self.attributes.clone();
        object.insert("id".to_string(), Value::String(self.id.clone()));
        object.insert(
            "type".to_string(),
            Value::String(self.resource_type.clone()),
        );

        let state = self.read_state();
        for (name, related) in &state.relationships {
            let value = match related {
                Related::One(Some(record)) => record.to_json(),
                Related::One(None) => Value::Null,
                Related::Many(records) => {
                    Value::Array(records.iter().map(|r| r.to_json()).collect())
                }
            };
            object.insert(name.clone(), value);
        }

        Value::Object(object)
    }
}
