//! Scoping stages
//!
//! Each stage is a pure transformation of a [`ScopeObject`] driven by the
//! resource definition and the query. A [`ScopingPipeline`] holds the four
//! stages as injected strategy objects and the scope always applies them in
//! the same order: default filter, filter, sort, paginate.

pub mod default_filter;
pub mod filter;
pub mod paginate;
pub mod sort;

pub use default_filter::DefaultFilter;
pub use filter::Filter;
pub use paginate::Paginate;
pub use sort::Sort;

use crate::config::ResolverConfig;
use crate::core::query::Query;
use crate::core::resource::Resource;
use crate::core::scope_object::ScopeObject;
use anyhow::Result;
use std::fmt;
use std::sync::Arc;

/// Identifies a stage's slot in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    DefaultFilter,
    Filter,
    Sort,
    Paginate,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::DefaultFilter => "default_filter",
            StageKind::Filter => "filter",
            StageKind::Sort => "sort",
            StageKind::Paginate => "paginate",
        }
    }
}

/// Options shared by every stage of one scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopingOptions {
    /// Apply a default page when the query did not request one
    pub default_paginate: bool,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl ScopingOptions {
    pub fn from_config(config: &ResolverConfig, query: &Query) -> Self {
        Self {
            default_paginate: query.paginate(),
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }
}

/// A single transformation step applied to a scope object
pub trait ScopingStage: Send + Sync {
    fn apply(
        &self,
        resource: &Resource,
        query: &Query,
        scope: ScopeObject,
        options: &ScopingOptions,
    ) -> Result<ScopeObject>;
}

/// The four scoping stages, in application order
#[derive(Clone)]
pub struct ScopingPipeline {
    default_filter: Arc<dyn ScopingStage>,
    filter: Arc<dyn ScopingStage>,
    sort: Arc<dyn ScopingStage>,
    paginate: Arc<dyn ScopingStage>,
}

impl fmt::Debug for ScopingPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopingPipeline").finish_non_exhaustive()
    }
}

impl Default for ScopingPipeline {
    fn default() -> Self {
        Self {
            default_filter: Arc::new(DefaultFilter),
            filter: Arc::new(Filter),
            sort: Arc::new(Sort),
            paginate: Arc::new(Paginate),
        }
    }
}

impl ScopingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stage in `kind`'s slot
    pub fn with_stage(mut self, kind: StageKind, stage: Arc<dyn ScopingStage>) -> Self {
        match kind {
            StageKind::DefaultFilter => self.default_filter = stage,
            StageKind::Filter => self.filter = stage,
            StageKind::Sort => self.sort = stage,
            StageKind::Paginate => self.paginate = stage,
        }
        self
    }

    /// Stages in the order they must be applied
    pub fn stages(&self) -> [(StageKind, &Arc<dyn ScopingStage>); 4] {
        [
            (StageKind::DefaultFilter, &self.default_filter),
            (StageKind::Filter, &self.filter),
            (StageKind::Sort, &self.sort),
            (StageKind::Paginate, &self.paginate),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    impl ScopingStage for Marker {
        fn apply(
            &self,
            _resource: &Resource,
            _query: &Query,
            scope: ScopeObject,
            _options: &ScopingOptions,
        ) -> Result<ScopeObject> {
            Ok(scope)
        }
    }

    #[test]
    fn test_stage_order_is_fixed() {
        let kinds: Vec<_> = ScopingPipeline::new()
            .stages()
            .iter()
            .map(|(kind, _)| kind.as_str())
            .collect();
        assert_eq!(kinds, vec!["default_filter", "filter", "sort", "paginate"]);
    }

    #[test]
    fn test_with_stage_replaces_slot() {
        let marker: Arc<dyn ScopingStage> = Arc::new(Marker);
        let pipeline = ScopingPipeline::new().with_stage(StageKind::Sort, marker.clone());

        let (kind, stage) = pipeline.stages()[2];
        assert_eq!(kind, StageKind::Sort);
        assert!(Arc::ptr_eq(stage, &marker));
    }

    #[test]
    fn test_options_follow_query_paginate_flag() {
        let config = ResolverConfig::default();
        assert!(ScopingOptions::from_config(&config, &Query::new()).default_paginate);
        assert!(!ScopingOptions::from_config(&config, &Query::nested()).default_paginate);
    }
}
