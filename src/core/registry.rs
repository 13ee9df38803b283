//! Resource registry
//!
//! Maps resource type names to their definitions. Sideloads refer to their
//! target resource by name and are resolved through the registry, which is
//! what allows cyclic graphs (post → author → posts).

use crate::core::error::ConfigError;
use crate::core::resource::Resource;
use crate::core::sideload::{IncludeTree, Sideload, SideloadKind};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Registry of every resource known to a runtime
#[derive(Debug, Default, Clone)]
pub struct ResourceRegistry {
    resources: IndexMap<String, Arc<Resource>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource definition
    ///
    /// Each resource type may only be registered once.
    pub fn register(&mut self, resource: Arc<Resource>) -> Result<(), ConfigError> {
        let resource_type = resource.resource_type().to_string();
        if self.resources.contains_key(&resource_type) {
            return Err(ConfigError::DuplicateResource {
                resource: resource_type,
            });
        }
        self.resources.insert(resource_type, resource);
        Ok(())
    }

    pub fn get(&self, resource_type: &str) -> Option<&Arc<Resource>> {
        self.resources.get(resource_type)
    }

    /// All registered resource types, in registration order
    pub fn resource_types(&self) -> Vec<&str> {
        self.resources.keys().map(|s| s.as_str()).collect()
    }

    /// Check that every sideload in the graph targets a registered resource
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (owner, resource) in &self.resources {
            for sideload in resource.sideloads().values() {
                self.validate_sideload(owner, sideload)?;
            }
        }
        Ok(())
    }

    fn validate_sideload(&self, owner: &str, sideload: &Sideload) -> Result<(), ConfigError> {
        match sideload.kind() {
            SideloadKind::Basic { .. } => {
                if !self.resources.contains_key(sideload.resource_type()) {
                    return Err(ConfigError::UnknownTarget {
                        owner: owner.to_string(),
                        sideload: sideload.name().to_string(),
                        target: sideload.resource_type().to_string(),
                    });
                }
            }
            SideloadKind::Polymorphic { groups, .. } => {
                for group in groups.values() {
                    self.validate_sideload(owner, group)?;
                }
            }
        }

        for child in sideload.children().values() {
            self.validate_sideload(sideload.name(), child)?;
        }
        Ok(())
    }

    /// Full static include tree of a resource
    pub fn include_tree(&self, resource_type: &str) -> IncludeTree {
        let Some(resource) = self.get(resource_type) else {
            return IncludeTree::default();
        };

        let mut path = HashSet::from([resource_type.to_string()]);
        IncludeTree(
            resource
                .sideloads()
                .iter()
                .map(|(name, sideload)| (name.clone(), sideload.tree_below(self, &mut path)))
                .collect(),
        )
    }
}
