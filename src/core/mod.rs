//! Core module containing the fundamental types of the resolution engine

pub mod adapter;
pub mod context;
pub mod error;
pub mod events;
pub mod query;
pub mod record;
pub mod registry;
pub mod resource;
pub mod scope_object;
pub mod sideload;

pub use adapter::Adapter;
pub use context::RequestContext;
pub use error::{ConfigError, QueryError, ResolveError};
pub use events::{EventBus, EventEnvelope, ResolveEvent};
pub use query::{FilterPredicate, Filters, Operator, Pagination, Query, QueryParams, SortDirection, SortParam};
pub use record::{Record, RecordRef, Related};
pub use registry::ResourceRegistry;
pub use resource::{Resource, ResourceBuilder};
pub use scope_object::{Condition, ScopeObject};
pub use sideload::{IncludeTree, Sideload, SideloadBuilder, SideloadKind};
