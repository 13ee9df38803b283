//! Runtime: the process-wide resolution engine
//!
//! A [`Runtime`] bundles the configuration, the registry of resources, the
//! scoping pipeline and the optional instrumentation sink. It is built once
//! at startup, shared behind an `Arc`, and used to start every request.

use crate::config::ResolverConfig;
use crate::core::context::RequestContext;
use crate::core::error::{ConfigError, ResolveError};
use crate::core::events::EventBus;
use crate::core::query::Query;
use crate::core::record::RecordRef;
use crate::core::registry::ResourceRegistry;
use crate::core::resource::Resource;
use crate::core::scope_object::ScopeObject;
use crate::scope::{Scope, ScopeOptions};
use crate::scoping::{ScopingPipeline, ScopingStage, StageKind};
use anyhow::Result;
use std::fmt;
use std::sync::Arc;

/// Hook run at the start of every concurrent sideload task
pub type BeforeSideload = Arc<dyn Fn(&RequestContext) + Send + Sync>;

/// Records returned by [`Runtime::all`]
#[derive(Debug, Clone)]
pub struct ResolvedSet {
    pub records: Vec<RecordRef>,

    /// Composite cache key, when caching is enabled
    pub cache_key: Option<String>,
}

pub struct Runtime {
    config: ResolverConfig,
    registry: ResourceRegistry,
    pipeline: ScopingPipeline,
    events: Option<EventBus>,
    before_sideload: Option<BeforeSideload>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("resources", &self.registry.resource_types())
            .field("events", &self.events.is_some())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn pipeline(&self) -> &ScopingPipeline {
        &self.pipeline
    }

    pub fn events(&self) -> Option<&EventBus> {
        self.events.as_ref()
    }

    pub fn before_sideload(&self) -> Option<&BeforeSideload> {
        self.before_sideload.as_ref()
    }

    /// Look up a registered resource
    pub fn resource(&self, resource_type: &str) -> Result<Arc<Resource>, ResolveError> {
        self.registry
            .get(resource_type)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownResource {
                resource: resource_type.to_string(),
            })
    }

    /// Root scope for `resource_type`
    pub fn scope(
        self: &Arc<Self>,
        resource_type: &str,
        query: Query,
        context: RequestContext,
    ) -> Result<Scope> {
        let resource = self.resource(resource_type)?;
        let options = ScopeOptions {
            params: Some(query.to_params()),
            context,
            ..ScopeOptions::default()
        };

        Scope::new(
            ScopeObject::new(resource_type),
            resource,
            query,
            Arc::clone(self),
            options,
        )
    }

    /// Resolve every record of `resource_type` matching `query`
    ///
    /// When caching is enabled the composite cache key is computed on a
    /// separate scope, so hooks see each scope object exactly once.
    pub async fn all(
        self: &Arc<Self>,
        resource_type: &str,
        query: Query,
        context: RequestContext,
    ) -> Result<ResolvedSet> {
        let cache_key = if self.config.cache {
            let mut scope = self.scope(resource_type, query.clone(), context.clone())?;
            Some(scope.cache_key().await?)
        } else {
            None
        };

        let records = self.scope(resource_type, query, context)?.resolve().await?;

        Ok(ResolvedSet { records, cache_key })
    }

    /// Resolve a single record by id
    pub async fn find(
        self: &Arc<Self>,
        resource_type: &str,
        id: &str,
        query: Query,
        context: RequestContext,
    ) -> Result<RecordRef> {
        let query = query.with_filter("id", id);
        let records = self.scope(resource_type, query, context)?.resolve().await?;

        records.into_iter().next().ok_or_else(|| {
            ResolveError::RecordNotFound {
                resource: resource_type.to_string(),
                id: id.to_string(),
            }
            .into()
        })
    }
}

/// Builder for [`Runtime`]
///
/// # Example
///
/// ```ignore
/// let runtime = Runtime::builder()
///     .with_config(ResolverConfig::default().with_concurrency(true))
///     .register(post_resource)
///     .register(comment_resource)
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config: ResolverConfig,
    resources: Vec<Arc<Resource>>,
    pipeline: ScopingPipeline,
    events: Option<EventBus>,
    before_sideload: Option<BeforeSideload>,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config: ResolverConfig::default(),
            resources: Vec::new(),
            pipeline: ScopingPipeline::default(),
            events: None,
            before_sideload: None,
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a resource definition
    pub fn register(mut self, resource: Arc<Resource>) -> Self {
        self.resources.push(resource);
        self
    }

    /// Replace one of the scoping stages
    pub fn with_stage(mut self, kind: StageKind, stage: Arc<dyn ScopingStage>) -> Self {
        self.pipeline = self.pipeline.with_stage(kind, stage);
        self
    }

    /// Publish a `resolve` event for every scope resolution
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn before_sideload<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext) + Send + Sync + 'static,
    {
        self.before_sideload = Some(Arc::new(hook));
        self
    }

    /// Register every resource and validate the sideload graph
    pub fn build(self) -> Result<Arc<Runtime>, ConfigError> {
        let mut registry = ResourceRegistry::new();
        for resource in self.resources {
            registry.register(resource)?;
        }
        registry.validate()?;

        tracing::debug!(
            resources = ?registry.resource_types(),
            concurrency = self.config.concurrency,
            "Runtime built"
        );

        Ok(Arc::new(Runtime {
            config: self.config,
            registry,
            pipeline: self.pipeline,
            events: self.events,
            before_sideload: self.before_sideload,
        }))
    }
}
