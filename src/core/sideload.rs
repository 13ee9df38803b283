//! Sideload definitions and resolution
//!
//! A [`Sideload`] describes one named relation of a resource: how to derive
//! the child scope from the parent records (`scope`), and how to attach the
//! resolved children back onto their parents (`assign`). A polymorphic
//! sideload instead classifies each parent (`group_by`) and delegates to the
//! sideload registered for that group.
//!
//! Sideloads nest: besides the target resource's own sideloads, a sideload
//! may register children that are only reachable through it. Together they
//! form the static graph that [`Sideload::to_tree`] walks.

use crate::core::context::RequestContext;
use crate::core::error::ConfigError;
use crate::core::query::Query;
use crate::core::record::{Record, RecordRef};
use crate::core::registry::ResourceRegistry;
use crate::core::scope_object::ScopeObject;
use crate::runtime::Runtime;
use crate::scope::{Scope, ScopeOptions};
use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Derives the child scope object from the parent records
pub type ScopeFn = Arc<dyn Fn(&[RecordRef]) -> ScopeObject + Send + Sync>;

/// Attaches resolved children onto the parent records
pub type AssignFn = Arc<dyn Fn(&[RecordRef], &[RecordRef]) + Send + Sync>;

/// Classifies a parent record into a polymorphic group
pub type GroupByFn = Arc<dyn Fn(&Record) -> String + Send + Sync>;

/// How a sideload resolves
pub enum SideloadKind {
    /// Direct relation
    Basic { scope: ScopeFn, assign: AssignFn },
    /// Type-dispatched relation; each group has its own basic sideload
    Polymorphic {
        group_by: GroupByFn,
        groups: IndexMap<String, Arc<Sideload>>,
    },
}

/// A named relation between a resource and its children
pub struct Sideload {
    name: String,
    resource_type: String,
    shared_remote: bool,
    kind: SideloadKind,
    children: IndexMap<String, Arc<Sideload>>,
}

impl fmt::Debug for Sideload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: Vec<&String> = match &self.kind {
            SideloadKind::Basic { .. } => Vec::new(),
            SideloadKind::Polymorphic { groups, .. } => groups.keys().collect(),
        };
        f.debug_struct("Sideload")
            .field("name", &self.name)
            .field("resource_type", &self.resource_type)
            .field("shared_remote", &self.shared_remote)
            .field("groups", &groups)
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Everything a sideload branch needs from its owner scope
#[derive(Clone, Copy)]
pub struct SideloadEnv<'a> {
    pub runtime: &'a Arc<Runtime>,
    pub context: &'a RequestContext,
    /// Type of the resource that owns the parent records
    pub parent: &'a str,
}

/// Static include tree reachable through a sideload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IncludeTree(pub IndexMap<String, IncludeTree>);

impl IncludeTree {
    pub fn get(&self, name: &str) -> Option<&IncludeTree> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Sideload {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type of the resource the children belong to
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn is_polymorphic(&self) -> bool {
        matches!(self.kind, SideloadKind::Polymorphic { .. })
    }

    /// Shared-remote data is resolved and cached by another subsystem
    pub fn is_shared_remote(&self) -> bool {
        self.shared_remote
    }

    pub fn kind(&self) -> &SideloadKind {
        &self.kind
    }

    /// Nested sideload registered directly on this sideload
    pub fn child(&self, name: &str) -> Option<&Arc<Sideload>> {
        self.children.get(name)
    }

    pub fn children(&self) -> &IndexMap<String, Arc<Sideload>> {
        &self.children
    }

    /// Sideload registered for a polymorphic group
    pub fn group(&self, key: &str) -> Option<&Arc<Sideload>> {
        match &self.kind {
            SideloadKind::Basic { .. } => None,
            SideloadKind::Polymorphic { groups, .. } => groups.get(key),
        }
    }

    /// Resolve this relation for `parents` and attach the results
    ///
    /// `parents` must be non-empty; the owner scope skips sideloading
    /// entirely when it resolved nothing. `namespace` defaults to this
    /// sideload's name and is what nested instrumentation is attributed to.
    pub fn resolve<'a>(
        self: &'a Arc<Self>,
        parents: &'a [RecordRef],
        query: &'a Query,
        namespace: Option<&'a str>,
        env: SideloadEnv<'a>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let namespace = namespace.unwrap_or(self.name.as_str());

            match &self.kind {
                SideloadKind::Polymorphic { group_by, groups } => {
                    for (key, members) in partition(parents, group_by) {
                        match groups.get(&key) {
                            Some(sideload) => {
                                sideload
                                    .resolve(&members, query, Some(self.name.as_str()), env)
                                    .await?
                            }
                            None => tracing::debug!(
                                sideload = %self.name,
                                group = %key,
                                "No sideload registered for polymorphic group, skipping"
                            ),
                        }
                    }
                    Ok(())
                }
                SideloadKind::Basic { assign, .. } => {
                    let Some(mut scope) = self.build_scope(parents, query, namespace, env)? else {
                        return Ok(());
                    };
                    let children = scope.resolve().await?;
                    assign(parents, &children);
                    Ok(())
                }
            }
        }
        .boxed()
    }

    /// Cache keys of every child scope reachable for `parents`
    pub fn cache_keys<'a>(
        self: &'a Arc<Self>,
        parents: &'a [RecordRef],
        query: &'a Query,
        env: SideloadEnv<'a>,
    ) -> BoxFuture<'a, Result<Vec<String>>> {
        async move {
            let mut keys = Vec::new();
            for mut scope in self.child_scopes(parents, query, env)? {
                keys.push(scope.cache_key().await?);
            }
            Ok(keys)
        }
        .boxed()
    }

    /// Last-modified timestamps of every child scope reachable for `parents`
    pub fn last_modified<'a>(
        self: &'a Arc<Self>,
        parents: &'a [RecordRef],
        query: &'a Query,
        env: SideloadEnv<'a>,
    ) -> BoxFuture<'a, Result<Option<DateTime<Utc>>>> {
        async move {
            let mut latest = None;
            for mut scope in self.child_scopes(parents, query, env)? {
                latest = latest.max(scope.last_modified().await?);
            }
            Ok(latest)
        }
        .boxed()
    }

    /// Static include tree below this sideload
    ///
    /// Combines the sideload's own children with the sideloads of its target
    /// resource(s). A resource already on the current path is not expanded
    /// again, so cyclic graphs terminate.
    pub fn to_tree(&self, registry: &ResourceRegistry) -> IncludeTree {
        let mut path = HashSet::new();
        self.tree_below(registry, &mut path)
    }

    pub(crate) fn tree_below(&self, registry: &ResourceRegistry, path: &mut HashSet<String>) -> IncludeTree {
        let mut tree = IndexMap::new();

        for (name, child) in &self.children {
            tree.insert(name.clone(), child.tree_below(registry, path));
        }

        let targets: Vec<&str> = match &self.kind {
            SideloadKind::Basic { .. } => vec![self.resource_type.as_str()],
            SideloadKind::Polymorphic { groups, .. } => {
                groups.values().map(|g| g.resource_type()).collect()
            }
        };

        for target in targets {
            if !path.insert(target.to_string()) {
                continue;
            }
            if let Some(resource) = registry.get(target) {
                for (name, sideload) in resource.sideloads() {
                    if !tree.contains_key(name) {
                        tree.insert(name.clone(), sideload.tree_below(registry, path));
                    }
                }
            }
            path.remove(target);
        }

        IncludeTree(tree)
    }

    /// One child scope per basic relation reachable for `parents`
    fn child_scopes(
        self: &Arc<Self>,
        parents: &[RecordRef],
        query: &Query,
        env: SideloadEnv<'_>,
    ) -> Result<Vec<Scope>> {
        match &self.kind {
            SideloadKind::Basic { .. } => Ok(self
                .build_scope(parents, query, &self.name, env)?
                .into_iter()
                .collect()),
            SideloadKind::Polymorphic { group_by, groups } => {
                let mut scopes = Vec::new();
                for (key, members) in partition(parents, group_by) {
                    if let Some(sideload) = groups.get(&key) {
                        scopes.extend(sideload.build_scope(&members, query, &self.name, env)?);
                    }
                }
                Ok(scopes)
            }
        }
    }

    fn build_scope(
        self: &Arc<Self>,
        parents: &[RecordRef],
        query: &Query,
        namespace: &str,
        env: SideloadEnv<'_>,
    ) -> Result<Option<Scope>> {
        let SideloadKind::Basic { scope, .. } = &self.kind else {
            return Ok(None);
        };

        let resource = env.runtime.resource(&self.resource_type)?;
        let options = ScopeOptions {
            namespace: Some(namespace.to_string()),
            parent: Some(env.parent.to_string()),
            sideload: Some(Arc::clone(self)),
            context: env.context.clone(),
            ..ScopeOptions::default()
        };

        let scope = Scope::new(
            scope(parents),
            resource,
            query.clone(),
            Arc::clone(env.runtime),
            options,
        )?;
        Ok(Some(scope))
    }
}

/// Group parents by classifier, preserving first-seen group order
fn partition(parents: &[RecordRef], group_by: &GroupByFn) -> IndexMap<String, Vec<RecordRef>> {
    let mut groups: IndexMap<String, Vec<RecordRef>> = IndexMap::new();
    for parent in parents {
        groups
            .entry(group_by(parent))
            .or_default()
            .push(Arc::clone(parent));
    }
    groups
}

/// Builder for [`Sideload`]; validation happens in [`SideloadBuilder::build`]
pub struct SideloadBuilder {
    name: String,
    resource_type: String,
    polymorphic: bool,
    shared_remote: bool,
    scope: Option<ScopeFn>,
    assign: Option<AssignFn>,
    group_by: Option<GroupByFn>,
    groups: Vec<(String, SideloadBuilder)>,
    children: Vec<SideloadBuilder>,
}

impl SideloadBuilder {
    /// A direct relation named `name`, resolving records of `resource_type`
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            polymorphic: false,
            shared_remote: false,
            scope: None,
            assign: None,
            group_by: None,
            groups: Vec::new(),
            children: Vec::new(),
        }
    }

    /// A type-dispatched relation; register members with [`Self::group`]
    pub fn polymorphic(name: impl Into<String>) -> Self {
        Self {
            polymorphic: true,
            ..Self::new(name, String::new())
        }
    }

    pub fn scope<F>(mut self, f: F) -> Self
    where
        F: Fn(&[RecordRef]) -> ScopeObject + Send + Sync + 'static,
    {
        self.scope = Some(Arc::new(f));
        self
    }

    pub fn assign<F>(mut self, f: F) -> Self
    where
        F: Fn(&[RecordRef], &[RecordRef]) + Send + Sync + 'static,
    {
        self.assign = Some(Arc::new(f));
        self
    }

    pub fn group_by<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record) -> String + Send + Sync + 'static,
    {
        self.group_by = Some(Arc::new(f));
        self
    }

    /// Register the sideload used for parents classified as `key`
    pub fn group(mut self, key: impl Into<String>, sideload: SideloadBuilder) -> Self {
        self.groups.push((key.into(), sideload));
        self
    }

    /// Register a nested sideload reachable only through this one
    pub fn allow_sideload(mut self, sideload: SideloadBuilder) -> Self {
        self.children.push(sideload);
        self
    }

    pub fn shared_remote(mut self, shared_remote: bool) -> Self {
        self.shared_remote = shared_remote;
        self
    }

    /// Validate and freeze the definition
    pub fn build(self) -> Result<Sideload, ConfigError> {
        let kind = if self.polymorphic {
            if self.scope.is_some() || self.assign.is_some() {
                return Err(ConfigError::PolymorphicWithScope { name: self.name });
            }
            let group_by = self
                .group_by
                .ok_or_else(|| ConfigError::MissingGrouper {
                    name: self.name.clone(),
                })?;

            let mut groups = IndexMap::new();
            for (key, builder) in self.groups {
                if groups.contains_key(&key) {
                    return Err(ConfigError::DuplicateSideload {
                        owner: self.name,
                        name: key,
                    });
                }
                groups.insert(key, Arc::new(builder.build()?));
            }
            SideloadKind::Polymorphic { group_by, groups }
        } else {
            let scope = self.scope.ok_or_else(|| ConfigError::MissingFunction {
                name: self.name.clone(),
                missing: "scope",
            })?;
            let assign = self.assign.ok_or_else(|| ConfigError::MissingFunction {
                name: self.name.clone(),
                missing: "assign",
            })?;
            SideloadKind::Basic { scope, assign }
        };

        let mut children = IndexMap::new();
        for builder in self.children {
            let child = builder.build()?;
            if children.contains_key(child.name()) {
                return Err(ConfigError::DuplicateSideload {
                    owner: self.name,
                    name: child.name().to_string(),
                });
            }
            children.insert(child.name().to_string(), Arc::new(child));
        }

        Ok(Sideload {
            name: self.name,
            resource_type: self.resource_type,
            shared_remote: self.shared_remote,
            kind,
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(name: &str, resource_type: &str) -> SideloadBuilder {
        SideloadBuilder::new(name, resource_type)
            .scope(|_| ScopeObject::new("any"))
            .assign(|_, _| {})
    }

    #[test]
    fn test_polymorphic_with_scope_is_config_error() {
        let err = SideloadBuilder::polymorphic("commentable")
            .group_by(|r| r.resource_type().to_string())
            .scope(|_| ScopeObject::new("post"))
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            ConfigError::PolymorphicWithScope {
                name: "commentable".to_string()
            }
        );
    }

    #[test]
    fn test_polymorphic_requires_grouper() {
        let err = SideloadBuilder::polymorphic("commentable")
            .group("post", basic("post", "post"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingGrouper { .. }));
    }

    #[test]
    fn test_basic_requires_assign() {
        let err = SideloadBuilder::new("author", "user")
            .scope(|_| ScopeObject::new("user"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingFunction { missing: "assign", .. }));
    }

    #[test]
    fn test_duplicate_children_rejected() {
        let err = basic("comments", "comment")
            .allow_sideload(basic("author", "user"))
            .allow_sideload(basic("author", "user"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateSideload { .. }));
    }

    #[test]
    fn test_polymorphic_groups() {
        let sideload = SideloadBuilder::polymorphic("commentable")
            .group_by(|r| r.resource_type().to_string())
            .group("post", basic("post", "post"))
            .group("photo", basic("photo", "photo"))
            .build()
            .unwrap();

        assert!(sideload.is_polymorphic());
        assert_eq!(sideload.group("photo").unwrap().resource_type(), "photo");
        assert!(sideload.group("video").is_none());
        assert!(!sideload.is_shared_remote());
    }

    #[test]
    fn test_partition_preserves_first_seen_order() {
        use chrono::Utc;
        use serde_json::json;

        let records: Vec<RecordRef> = [("p1", "b"), ("p2", "a"), ("p3", "b")]
            .into_iter()
            .map(|(id, kind)| Record::shared("item", id, json!({ "kind": kind }), Utc::now()))
            .collect();
        let group_by: GroupByFn =
            Arc::new(|r: &Record| r.str_attribute("kind").unwrap_or_default());

        let groups = partition(&records, &group_by);
        let keys: Vec<_> = groups.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(groups["b"].len(), 2);
    }
}
