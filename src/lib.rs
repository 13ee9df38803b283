//! # Scopegraph
//!
//! A resource-oriented query resolution engine. A request names a root
//! resource, a set of filters, sort clauses and a page, plus a tree of
//! related resources to include. The engine resolves the root records through
//! a store adapter and walks the include tree, attaching related records onto
//! their parents.
//!
//! ## Features
//!
//! - **Scoping Pipeline**: default filter, filter, sort and paginate stages,
//!   each replaceable as a strategy object
//! - **Sideloads**: basic and polymorphic relations, nested to any depth,
//!   cyclic graphs allowed
//! - **Concurrent Resolution**: sibling sideloads on parallel tasks, with
//!   per-task context copies and connection release
//! - **Cache Keys**: composite versioned keys and last-modified timestamps
//!   spanning the whole include tree
//! - **Instrumentation**: `tracing` spans plus an optional broadcast event bus
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use scopegraph::prelude::*;
//!
//! let store = Arc::new(InMemoryAdapter::new());
//!
//! let post = Resource::builder("post")
//!     .adapter(store.clone())
//!     .sideload(
//!         SideloadBuilder::new("comments", "comment")
//!             .scope(|posts| {
//!                 ScopeObject::new("comment").where_in("post_id", posts.iter().map(|p| p.id()))
//!             })
//!             .assign(|posts, comments| {
//!                 for post in posts {
//!                     let mine = comments
//!                         .iter()
//!                         .filter(|c| c.str_attribute("post_id").as_deref() == Some(post.id()))
//!                         .cloned()
//!                         .collect();
//!                     post.attach("comments", Related::Many(mine));
//!                 }
//!             }),
//!     )
//!     .build()?;
//! let comment = Resource::builder("comment").adapter(store.clone()).build()?;
//!
//! let runtime = Runtime::builder().register(post).register(comment).build()?;
//!
//! let query = Query::new().include("comments")?;
//! let posts = runtime.all("post", query, RequestContext::new()).await?;
//! ```

pub mod config;
pub mod core;
pub mod runtime;
pub mod scope;
pub mod scoping;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        Adapter, Condition, ConfigError, EventBus, EventEnvelope, FilterPredicate, IncludeTree,
        Operator, Pagination, Query, QueryError, QueryParams, Record, RecordRef, Related,
        RequestContext, ResolveError, ResolveEvent, Resource, ResourceBuilder, ResourceRegistry,
        ScopeObject, Sideload, SideloadBuilder, SortDirection, SortParam,
    };

    // === Engine ===
    pub use crate::config::ResolverConfig;
    pub use crate::runtime::{ResolvedSet, Runtime, RuntimeBuilder};
    pub use crate::scope::{Scope, ScopeOptions};
    pub use crate::scoping::{ScopingOptions, ScopingPipeline, ScopingStage, StageKind};

    // === Storage ===
    pub use crate::storage::InMemoryAdapter;

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use serde_json::{Value, json};
    pub use std::sync::Arc;
}
