//! Request filters

use super::{ScopingOptions, ScopingStage};
use crate::core::query::Query;
use crate::core::resource::Resource;
use crate::core::scope_object::ScopeObject;
use anyhow::Result;

/// Applies every filter of the request as a store condition
#[derive(Debug, Clone, Copy, Default)]
pub struct Filter;

impl ScopingStage for Filter {
    fn apply(
        &self,
        _resource: &Resource,
        query: &Query,
        scope: ScopeObject,
        _options: &ScopingOptions,
    ) -> Result<ScopeObject> {
        Ok(query
            .filters()
            .iter()
            .flat_map(|(attribute, predicates)| predicates.iter().map(move |p| (attribute, p)))
            .fold(scope, |scope, (attribute, predicate)| {
                scope.filter(attribute.clone(), predicate.operator, predicate.value.clone())
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::core::query::Operator;
    use crate::storage::InMemoryAdapter;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_filters_become_conditions() {
        let resource = Resource::builder("post")
            .adapter(Arc::new(InMemoryAdapter::new()))
            .build()
            .unwrap();
        let query = Query::new()
            .with_filter("views>", 10)
            .with_filter("id", json!(["p1", "p2"]));
        let options = ScopingOptions::from_config(&ResolverConfig::default(), &query);

        let scope = Filter
            .apply(&resource, &query, ScopeObject::new("post"), &options)
            .unwrap();

        let operators: Vec<_> = scope.conditions().iter().map(|c| c.operator).collect();
        assert_eq!(operators, vec![Operator::Gt, Operator::In]);
    }

    #[test]
    fn test_range_on_one_attribute() {
        let resource = Resource::builder("post")
            .adapter(Arc::new(InMemoryAdapter::new()))
            .build()
            .unwrap();
        let query = Query::new().with_filter("views>", 10).with_filter("views<", 30);
        let options = ScopingOptions::from_config(&ResolverConfig::default(), &query);

        let scope = Filter
            .apply(&resource, &query, ScopeObject::new("post"), &options)
            .unwrap();

        let operators: Vec<_> = scope.conditions().iter().map(|c| c.operator).collect();
        assert_eq!(operators, vec![Operator::Gt, Operator::Lt]);
    }
}
