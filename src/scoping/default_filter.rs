//! Resource-level default filters

use super::{ScopingOptions, ScopingStage};
use crate::core::query::Query;
use crate::core::resource::Resource;
use crate::core::scope_object::ScopeObject;
use anyhow::Result;

/// Applies the resource's default filters
///
/// A default is skipped when the request filters the same attribute, so a
/// request can always override it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFilter;

impl ScopingStage for DefaultFilter {
    fn apply(
        &self,
        resource: &Resource,
        query: &Query,
        mut scope: ScopeObject,
        _options: &ScopingOptions,
    ) -> Result<ScopeObject> {
        for (attribute, predicates) in resource.default_filters() {
            if query.filters().contains_key(attribute) {
                continue;
            }
            for predicate in predicates {
                scope = scope.filter(attribute.clone(), predicate.operator, predicate.value.clone());
            }
        }
        Ok(scope)
    }
}
