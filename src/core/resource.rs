//! Resource definitions
//!
//! A [`Resource`] is defined once at startup through [`ResourceBuilder`] and
//! is read-only afterwards. It owns the store adapter, the registered
//! sideloads and the hook strategy objects the scope calls into.

use crate::core::adapter::Adapter;
use crate::core::error::ConfigError;
use crate::core::query::{FilterPredicate, Filters, Query, SortParam, insert_filter};
use crate::core::record::{Record, RecordRef};
use crate::core::scope_object::ScopeObject;
use crate::core::sideload::{Sideload, SideloadBuilder};
use anyhow::Result;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Rewrites the scope object around the scoping pipeline
///
/// Receives the initial scope object, the query, and the function that runs
/// the pipeline. Implementations may adjust the object before and after
/// calling `apply`, or skip it entirely.
pub type AroundScoping = Arc<
    dyn Fn(
            ScopeObject,
            &Query,
            &mut dyn FnMut(ScopeObject) -> Result<ScopeObject>,
        ) -> Result<ScopeObject>
        + Send
        + Sync,
>;

/// Rewrites the scope object right before it is handed to the adapter
pub type BeforeResolve = Arc<dyn Fn(ScopeObject, &Query) -> ScopeObject + Send + Sync>;

/// Decorates a resolved record, given its position in the result set
pub type DecorateRecord = Arc<dyn Fn(&Record, usize) + Send + Sync>;

/// A resource definition
pub struct Resource {
    resource_type: String,
    adapter: Arc<dyn Adapter>,
    sideloads: IndexMap<String, Arc<Sideload>>,
    remote: bool,
    default_filters: Filters,
    default_sort: Vec<SortParam>,
    default_page_size: Option<usize>,
    serializer: String,
    around_scoping: Option<AroundScoping>,
    before_resolve: Option<BeforeResolve>,
    decorate: Option<DecorateRecord>,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("resource_type", &self.resource_type)
            .field("sideloads", &self.sideloads.keys().collect::<Vec<_>>())
            .field("remote", &self.remote)
            .field("serializer", &self.serializer)
            .finish_non_exhaustive()
    }
}

impl Resource {
    pub fn builder(resource_type: impl Into<String>) -> ResourceBuilder {
        ResourceBuilder::new(resource_type)
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    /// Look up a registered sideload by name
    pub fn sideload(&self, name: &str) -> Option<&Arc<Sideload>> {
        self.sideloads.get(name)
    }

    /// Registered sideloads, in registration order
    pub fn sideloads(&self) -> &IndexMap<String, Arc<Sideload>> {
        &self.sideloads
    }

    /// Remote resources delegate filtering elsewhere; no local scoping runs
    pub fn is_remote(&self) -> bool {
        self.remote
    }

    pub fn default_filters(&self) -> &Filters {
        &self.default_filters
    }

    pub fn default_sort(&self) -> &[SortParam] {
        &self.default_sort
    }

    pub fn default_page_size(&self) -> Option<usize> {
        self.default_page_size
    }

    pub fn serializer(&self) -> &str {
        &self.serializer
    }

    // === Hooks ===

    pub fn around_scoping(
        &self,
        scope: ScopeObject,
        query: &Query,
        apply: &mut dyn FnMut(ScopeObject) -> Result<ScopeObject>,
    ) -> Result<ScopeObject> {
        match &self.around_scoping {
            Some(hook) => hook(scope, query, apply),
            None => apply(scope),
        }
    }

    pub fn before_resolve(&self, scope: ScopeObject, query: &Query) -> ScopeObject {
        match &self.before_resolve {
            Some(hook) => hook(scope, query),
            None => scope,
        }
    }

    /// Run the scope object through the store adapter
    pub async fn resolve(&self, scope: &ScopeObject) -> Result<Vec<Option<RecordRef>>> {
        self.adapter.resolve(scope).await
    }

    /// Assign this resource's serializer onto a resolved record
    pub fn decorate_record(&self, record: &Record, index: usize) {
        match &self.decorate {
            Some(hook) => hook(record, index),
            None => record.assign_serializer(self.serializer.as_str()),
        }
    }
}

/// Builder for [`Resource`]; validation happens in [`ResourceBuilder::build`]
pub struct ResourceBuilder {
    resource_type: String,
    adapter: Option<Arc<dyn Adapter>>,
    sideloads: Vec<SideloadBuilder>,
    remote: bool,
    default_filters: Filters,
    default_sort: Vec<SortParam>,
    default_page_size: Option<usize>,
    serializer: Option<String>,
    around_scoping: Option<AroundScoping>,
    before_resolve: Option<BeforeResolve>,
    decorate: Option<DecorateRecord>,
}

impl ResourceBuilder {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            adapter: None,
            sideloads: Vec::new(),
            remote: false,
            default_filters: IndexMap::new(),
            default_sort: Vec::new(),
            default_page_size: None,
            serializer: None,
            around_scoping: None,
            before_resolve: None,
            decorate: None,
        }
    }

    pub fn adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Register a sideload (`allow_sideload`)
    pub fn sideload(mut self, sideload: SideloadBuilder) -> Self {
        self.sideloads.push(sideload);
        self
    }

    pub fn remote(mut self, remote: bool) -> Self {
        self.remote = remote;
        self
    }

    /// Filter applied unless the request filters the same attribute
    pub fn default_filter(mut self, key: &str, value: impl Into<Value>) -> Self {
        let (attribute, predicate) = FilterPredicate::parse_key(key, value.into());
        insert_filter(&mut self.default_filters, attribute, predicate);
        self
    }

    pub fn default_sort(mut self, sort: SortParam) -> Self {
        self.default_sort.push(sort);
        self
    }

    pub fn default_page_size(mut self, size: usize) -> Self {
        self.default_page_size = Some(size);
        self
    }

    pub fn serializer(mut self, serializer: impl Into<String>) -> Self {
        self.serializer = Some(serializer.into());
        self
    }

    pub fn around_scoping<F>(mut self, hook: F) -> Self
    where
        F: Fn(
                ScopeObject,
                &Query,
                &mut dyn FnMut(ScopeObject) -> Result<ScopeObject>,
            ) -> Result<ScopeObject>
            + Send
            + Sync
            + 'static,
    {
        self.around_scoping = Some(Arc::new(hook));
        self
    }

    pub fn before_resolve<F>(mut self, hook: F) -> Self
    where
        F: Fn(ScopeObject, &Query) -> ScopeObject + Send + Sync + 'static,
    {
        self.before_resolve = Some(Arc::new(hook));
        self
    }

    pub fn decorate<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Record, usize) + Send + Sync + 'static,
    {
        self.decorate = Some(Arc::new(hook));
        self
    }

    /// Validate and freeze the definition
    pub fn build(self) -> Result<Arc<Resource>, ConfigError> {
        let adapter = self.adapter.ok_or_else(|| ConfigError::MissingAdapter {
            resource: self.resource_type.clone(),
        })?;

        let mut sideloads = IndexMap::new();
        for builder in self.sideloads {
            let sideload = builder.build()?;
            let name = sideload.name().to_string();
            if sideloads.contains_key(&name) {
                return Err(ConfigError::DuplicateSideload {
                    owner: self.resource_type,
                    name,
                });
            }
            sideloads.insert(name, Arc::new(sideload));
        }

        let serializer = self
            .serializer
            .unwrap_or_else(|| self.resource_type.clone());

        Ok(Arc::new(Resource {
            resource_type: self.resource_type,
            adapter,
            sideloads,
            remote: self.remote,
            default_filters: self.default_filters,
            default_sort: self.default_sort,
            default_page_size: self.default_page_size,
            serializer,
            around_scoping: self.around_scoping,
            before_resolve: self.before_resolve,
            decorate: self.decorate,
        }))
    }
}
