//! Sorting

use super::{ScopingOptions, ScopingStage};
use crate::core::query::Query;
use crate::core::resource::Resource;
use crate::core::scope_object::ScopeObject;
use anyhow::Result;

/// Applies the request's sort, or the resource's default sort when none
#[derive(Debug, Clone, Copy, Default)]
pub struct Sort;

impl ScopingStage for Sort {
    fn apply(
        &self,
        resource: &Resource,
        query: &Query,
        scope: ScopeObject,
        _options: &ScopingOptions,
    ) -> Result<ScopeObject> {
        let clauses = if query.sort().is_empty() {
            resource.default_sort()
        } else {
            query.sort()
        };

        Ok(clauses
            .iter()
            .fold(scope, |scope, clause| scope.order(clause.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::core::query::SortParam;
    use crate::storage::InMemoryAdapter;
    use std::sync::Arc;

    fn resource() -> Arc<Resource> {
        Resource::builder("post")
            .adapter(Arc::new(InMemoryAdapter::new()))
            .default_sort(SortParam::desc("created_at"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_sort_when_none_requested() {
        let query = Query::new();
        let options = ScopingOptions::from_config(&ResolverConfig::default(), &query);
        let scope = Sort
            .apply(&resource(), &query, ScopeObject::new("post"), &options)
            .unwrap();

        assert_eq!(scope.ordering(), &[SortParam::desc("created_at")]);
    }

    #[test]
    fn test_requested_sort_replaces_default() {
        let query = Query::new().with_sort(SortParam::asc("title"));
        let options = ScopingOptions::from_config(&ResolverConfig::default(), &query);
        let scope = Sort
            .apply(&resource(), &query, ScopeObject::new("post"), &options)
            .unwrap();

        assert_eq!(scope.ordering(), &[SortParam::asc("title")]);
    }
}
