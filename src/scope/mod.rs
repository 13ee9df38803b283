//! Scopes: apply a query to a store query object and resolve it
//!
//! A [`Scope`] is created per resource per request (the root, and one per
//! resolved sideload). Construction runs the scoping pipeline; [`Scope::resolve`]
//! executes the result through the resource's adapter and then resolves the
//! requested sideloads against the returned records.
//!
//! Computing [`Scope::cache_key`] or [`Scope::last_modified`] costs as much as
//! a resolve: the records are needed to reach the nested sideload scopes, and
//! the key must reflect live data rather than a cached view of it.

mod coordinator;

use crate::core::context::RequestContext;
use crate::core::events::ResolveEvent;
use crate::core::query::Query;
use crate::core::record::RecordRef;
use crate::core::resource::Resource;
use crate::core::scope_object::ScopeObject;
use crate::core::sideload::{Sideload, SideloadEnv};
use crate::runtime::Runtime;
use crate::scoping::{ScopingOptions, ScopingPipeline, StageKind};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Callback invoked with the final records, before sideloads are resolved
pub type AfterResolve = Arc<dyn Fn(&[RecordRef]) + Send + Sync>;

/// Per-scope options
#[derive(Clone, Default)]
pub struct ScopeOptions {
    /// Logical relation name this scope resolves for (sideload scopes only)
    pub namespace: Option<String>,

    /// Type of the resource owning the parent records (sideload scopes only)
    pub parent: Option<String>,

    /// Request parameters, reported in instrumentation
    pub params: Option<Value>,

    /// Sideload this scope was created for; its children take precedence
    /// over the resource's own sideloads when looking up nested names
    pub sideload: Option<Arc<Sideload>>,

    /// Request-scoped context
    pub context: RequestContext,

    pub after_resolve: Option<AfterResolve>,
}

impl fmt::Debug for ScopeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeOptions")
            .field("namespace", &self.namespace)
            .field("parent", &self.parent)
            .field("params", &self.params)
            .field("sideload", &self.sideload.as_ref().map(|s| s.name()))
            .field("context", &self.context)
            .field("after_resolve", &self.after_resolve.is_some())
            .finish()
    }
}

/// One resource's scoped, resolvable query
pub struct Scope {
    object: ScopeObject,
    unpaginated_object: ScopeObject,
    resource: Arc<Resource>,
    query: Query,
    runtime: Arc<Runtime>,
    options: ScopeOptions,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("resource", &self.resource.resource_type())
            .field("object", &self.object)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Scope {
    /// Apply the scoping pipeline to `object`
    ///
    /// Stages run inside the resource's `around_scoping` hook, in the fixed
    /// order default filter, filter, sort, paginate. Remote resources skip
    /// every stage.
    pub fn new(
        object: ScopeObject,
        resource: Arc<Resource>,
        query: Query,
        runtime: Arc<Runtime>,
        options: ScopeOptions,
    ) -> Result<Self> {
        let mut unpaginated_object = object.clone();
        let scoping = ScopingOptions::from_config(runtime.config(), &query);

        let object = resource.around_scoping(object, &query, &mut |scope: ScopeObject| {
            if resource.is_remote() {
                return Ok(scope);
            }
            apply_scoping(
                runtime.pipeline(),
                &resource,
                &query,
                scope,
                &scoping,
                &mut unpaginated_object,
            )
        })?;

        Ok(Self {
            object,
            unpaginated_object,
            resource,
            query,
            runtime,
            options,
        })
    }

    pub fn object(&self) -> &ScopeObject {
        &self.object
    }

    /// The scope object as it was before pagination was applied
    pub fn unpaginated_object(&self) -> &ScopeObject {
        &self.unpaginated_object
    }

    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn options(&self) -> &ScopeOptions {
        &self.options
    }

    /// Resolve into records, then resolve requested sideloads onto them
    pub async fn resolve(&mut self) -> Result<Vec<RecordRef>> {
        if self.query.zero_results() {
            return Ok(Vec::new());
        }

        let span = tracing::info_span!(
            "resolve",
            resource = %self.resource.resource_type(),
            sideload = self.options.namespace.as_deref(),
            parent = self.options.parent.as_deref(),
        );
        self.resolve_instrumented().instrument(span).await
    }

    async fn resolve_instrumented(&mut self) -> Result<Vec<RecordRef>> {
        let started = Instant::now();

        self.object = self.resource.before_resolve(self.object.clone(), &self.query);
        let records: Vec<RecordRef> = self
            .resource
            .resolve(&self.object)
            .await?
            .into_iter()
            .flatten()
            .collect();

        for (index, record) in records.iter().enumerate() {
            self.resource.decorate_record(record, index);
        }

        self.publish(records.len(), started);

        if let Some(after_resolve) = &self.options.after_resolve {
            after_resolve(&records);
        }

        if !self.query.sideloads().is_empty() {
            self.resolve_sideloads(&records).await?;
        }

        Ok(records)
    }

    fn publish(&self, result_count: usize, started: Instant) {
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(result_count, elapsed_ms, "Resolved scope");

        if let Some(bus) = self.runtime.events() {
            bus.publish(ResolveEvent {
                resource: self.resource.resource_type().to_string(),
                params: self.options.params.clone().unwrap_or(Value::Null),
                sideload: self.options.namespace.clone(),
                parent: self.options.parent.clone(),
                result_count,
                elapsed_ms,
            });
        }
    }

    /// Composite cache key of this scope and every included sideload
    ///
    /// The keys of the requested sideloads come first, in query order,
    /// followed by the scope's own versioned token. Shared-remote sideloads
    /// are excluded.
    pub async fn cache_key(&mut self) -> Result<String> {
        let results = self.resolve_for_cache().await?;

        let mut keys = Vec::new();
        for (name, query) in self.query.sideloads() {
            let Some(sideload) = self.included_sideload(name) else {
                continue;
            };
            keys.extend(sideload.cache_keys(&results, query, self.env()).await?);
        }

        keys.push(
            self.resource
                .adapter()
                .cache_key_with_version(&self.object)
                .await?,
        );

        Ok(keys.join(&self.runtime.config().cache_key_separator))
    }

    /// Most recent modification across this scope and every included sideload
    pub async fn last_modified(&mut self) -> Result<Option<DateTime<Utc>>> {
        let results = self.resolve_for_cache().await?;

        let mut latest = self
            .resource
            .adapter()
            .maximum_updated_at(&self.object)
            .await?;

        for (name, query) in self.query.sideloads() {
            let Some(sideload) = self.included_sideload(name) else {
                continue;
            };
            latest = latest.max(sideload.last_modified(&results, query, self.env()).await?);
        }

        Ok(latest)
    }

    /// Number of records matched, ignoring pagination
    pub async fn total_count(&self) -> Result<usize> {
        self.resource
            .adapter()
            .count(&self.unpaginated_object)
            .await
    }

    async fn resolve_for_cache(&mut self) -> Result<Vec<RecordRef>> {
        self.object = self.resource.before_resolve(self.object.clone(), &self.query);
        Ok(self
            .resource
            .resolve(&self.object)
            .await?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Look up a requested sideload by name
    pub(crate) fn lookup_sideload(&self, name: &str) -> Option<Arc<Sideload>> {
        self.options
            .sideload
            .as_ref()
            .and_then(|sideload| sideload.child(name))
            .or_else(|| self.resource.sideload(name))
            .cloned()
    }

    fn included_sideload(&self, name: &str) -> Option<Arc<Sideload>> {
        self.lookup_sideload(name)
            .filter(|sideload| !sideload.is_shared_remote())
    }

    fn env(&self) -> SideloadEnv<'_> {
        SideloadEnv {
            runtime: &self.runtime,
            context: &self.options.context,
            parent: self.resource.resource_type(),
        }
    }
}

fn apply_scoping(
    pipeline: &ScopingPipeline,
    resource: &Resource,
    query: &Query,
    mut scope: ScopeObject,
    options: &ScopingOptions,
    unpaginated: &mut ScopeObject,
) -> Result<ScopeObject> {
    for (kind, stage) in pipeline.stages() {
        scope = stage.apply(resource, query, scope, options)?;
        if kind != StageKind::Paginate {
            *unpaginated = scope.clone();
        }
    }
    Ok(scope)
}
