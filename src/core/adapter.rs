//! Store adapter trait
//!
//! The adapter is the only component that talks to a concrete store. The
//! engine is agnostic to the underlying storage mechanism: it hands over a
//! [`ScopeObject`] and receives records back.

use crate::core::record::RecordRef;
use crate::core::scope_object::ScopeObject;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Executes scope objects against a store
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Execute the scope and return matching records
    ///
    /// The result may contain holes (`None`), e.g. ids of a batched lookup
    /// that do not exist; the engine drops them.
    async fn resolve(&self, scope: &ScopeObject) -> Result<Vec<Option<RecordRef>>>;

    /// Number of records matched by the scope
    async fn count(&self, scope: &ScopeObject) -> Result<usize>;

    /// Versioned cache token for the records matched by the scope
    ///
    /// Must change whenever any matched record changes.
    async fn cache_key_with_version(&self, scope: &ScopeObject) -> Result<String>;

    /// Most recent `updated_at` among matched records
    async fn maximum_updated_at(&self, scope: &ScopeObject) -> Result<Option<DateTime<Utc>>>;

    /// Release the connection held by the current task
    ///
    /// Only called by concurrent sideload tasks; sequential resolution shares
    /// the parent's connection.
    async fn close(&self) {}
}
