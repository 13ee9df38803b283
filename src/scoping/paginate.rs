//! Pagination

use super::{ScopingOptions, ScopingStage};
use crate::core::query::Query;
use crate::core::resource::Resource;
use crate::core::scope_object::ScopeObject;
use anyhow::Result;

/// Applies limit/offset for the requested page
///
/// Without an explicit page, the default page (resource default size, else
/// the configured one) is only applied when `default_paginate` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Paginate;

impl ScopingStage for Paginate {
    fn apply(
        &self,
        resource: &Resource,
        query: &Query,
        scope: ScopeObject,
        options: &ScopingOptions,
    ) -> Result<ScopeObject> {
        let default_size = resource
            .default_page_size()
            .unwrap_or(options.default_page_size);

        let (size, number) = match query.pagination() {
            Some(page) => (page.size.unwrap_or(default_size), page.number),
            None if options.default_paginate => (default_size, 1),
            None => return Ok(scope),
        };

        let size = size.min(options.max_page_size);
        let scope = scope.limit(size);
        // pages past the end saturate to an empty page
        Ok(if number > 1 {
            scope.offset((number - 1).saturating_mul(size))
        } else {
            scope
        })
    }
}
