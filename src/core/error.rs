//! Typed errors for the resolution engine
//!
//! Errors fall into three categories that are surfaced at different times:
//!
//! - [`ConfigError`]: raised while resources and sideloads are being defined.
//!   These are fatal: a resource that fails to build can never be resolved.
//! - [`QueryError`]: raised while turning request parameters into a [`Query`].
//! - [`ResolveError`]: raised by the engine itself during a request.
//!
//! Store adapter failures are *not* wrapped: they travel as the original
//! `anyhow::Error` so callers can still `downcast_ref` to the adapter's own
//! error type, even when the failure happened on a concurrent sideload branch.
//!
//! [`Query`]: crate::core::query::Query

use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors detected at resource-definition time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Two sideloads with the same name were registered on one owner
    #[error("sideload '{name}' is already registered on '{owner}'")]
    DuplicateSideload { owner: String, name: String },

    /// A polymorphic sideload was given a direct scope or assign function
    #[error("polymorphic sideload '{name}' cannot define its own scope or assign")]
    PolymorphicWithScope { name: String },

    /// A polymorphic sideload has no classifier
    #[error("polymorphic sideload '{name}' requires a group_by classifier")]
    MissingGrouper { name: String },

    /// A basic sideload is missing its scope or assign function
    #[error("sideload '{name}' is missing its {missing} function")]
    MissingFunction { name: String, missing: &'static str },

    /// A resource was defined without a store adapter
    #[error("resource '{resource}' has no adapter")]
    MissingAdapter { resource: String },

    /// The same resource type was registered twice
    #[error("resource '{resource}' is already registered")]
    DuplicateResource { resource: String },

    /// A sideload points at a resource type that was never registered
    #[error("sideload '{sideload}' on '{owner}' targets unknown resource '{target}'")]
    UnknownTarget {
        owner: String,
        sideload: String,
        target: String,
    },

    /// Configuration file could not be read or parsed
    #[error("failed to load configuration: {message}")]
    Load { message: String },
}

impl ConfigError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigError::DuplicateSideload { .. } => "DUPLICATE_SIDELOAD",
            ConfigError::PolymorphicWithScope { .. } => "POLYMORPHIC_WITH_SCOPE",
            ConfigError::MissingGrouper { .. } => "MISSING_GROUPER",
            ConfigError::MissingFunction { .. } => "MISSING_FUNCTION",
            ConfigError::MissingAdapter { .. } => "MISSING_ADAPTER",
            ConfigError::DuplicateResource { .. } => "DUPLICATE_RESOURCE",
            ConfigError::UnknownTarget { .. } => "UNKNOWN_TARGET",
            ConfigError::Load { .. } => "CONFIG_LOAD_ERROR",
        }
    }
}

// =============================================================================
// Query Errors
// =============================================================================

/// Errors raised while building a query from request parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The filter parameter was not a JSON object
    #[error("invalid filter: {message}")]
    InvalidFilter { message: String },

    /// A sort clause used an unknown direction
    #[error("invalid sort direction '{direction}' for '{attribute}'")]
    InvalidSort { attribute: String, direction: String },

    /// An include path contained an empty segment
    #[error("invalid include path '{path}'")]
    InvalidInclude { path: String },
}

impl QueryError {
    pub fn error_code(&self) -> &'static str {
        match self {
            QueryError::InvalidFilter { .. } => "INVALID_FILTER",
            QueryError::InvalidSort { .. } => "INVALID_SORT",
            QueryError::InvalidInclude { .. } => "INVALID_INCLUDE",
        }
    }
}

// =============================================================================
// Resolve Errors
// =============================================================================

/// Errors raised by the engine while resolving a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No resource is registered under this type
    #[error("unknown resource type '{resource}'")]
    UnknownResource { resource: String },

    /// A single-record lookup found nothing
    #[error("{resource} with id '{id}' not found")]
    RecordNotFound { resource: String, id: String },

    /// A concurrent sideload task panicked or was aborted
    #[error("sideload '{sideload}' task failed: {message}")]
    TaskFailed { sideload: String, message: String },
}

impl ResolveError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ResolveError::UnknownResource { .. } => "UNKNOWN_RESOURCE",
            ResolveError::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            ResolveError::TaskFailed { .. } => "SIDELOAD_TASK_FAILED",
        }
    }
}
