//! Shared fixtures: a small blog graph and recording test doubles
//!
//! Graph:
//! - `post` → `author` (user, lookup), `comments` (comment, has-many)
//! - `comment` → `author` (user), `post` (post, belongs-to)
//! - `user` → `posts` (post, has-many)
//! - `like` → `subject` (polymorphic over post/photo)
//! - `photo`

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use scopegraph::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration as StdDuration;

pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
}

pub fn ids(records: &[RecordRef]) -> Vec<String> {
    records.iter().map(|r| r.id().to_string()).collect()
}

pub fn related_ids(record: &Record, name: &str) -> Vec<String> {
    record
        .related(name)
        .map(|related| ids(&related.records()))
        .unwrap_or_default()
}

fn attribute_ids(records: &[RecordRef], attribute: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for id in records.iter().filter_map(|r| r.str_attribute(attribute)) {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

// =============================================================================
// Data
// =============================================================================

pub fn seed(store: &InMemoryAdapter) {
    store
        .insert_all([
            Record::shared("user", "u1", json!({"name": "Ada"}), at(1)),
            Record::shared("user", "u2", json!({"name": "Grace"}), at(2)),
            Record::shared(
                "post",
                "p1",
                json!({"title": "Alpha", "status": "published", "author_id": "u1", "views": 10}),
                at(3),
            ),
            Record::shared(
                "post",
                "p2",
                json!({"title": "Beta", "status": "draft", "author_id": "u2", "views": 20}),
                at(4),
            ),
            Record::shared(
                "post",
                "p3",
                json!({"title": "Gamma", "status": "published", "author_id": "u2", "views": 30}),
                at(5),
            ),
            Record::shared("comment", "c1", json!({"post_id": "p1", "author_id": "u2"}), at(6)),
            Record::shared("comment", "c2", json!({"post_id": "p3", "author_id": "u1"}), at(7)),
            Record::shared("comment", "c3", json!({"post_id": "p3", "author_id": "u2"}), at(8)),
            Record::shared("photo", "ph1", json!({"caption": "Sunset"}), at(9)),
            Record::shared(
                "like",
                "l1",
                json!({"subject_type": "post", "subject_id": "p1"}),
                at(10),
            ),
            Record::shared(
                "like",
                "l2",
                json!({"subject_type": "photo", "subject_id": "ph1"}),
                at(11),
            ),
            Record::shared(
                "like",
                "l3",
                json!({"subject_type": "video", "subject_id": "v1"}),
                at(12),
            ),
            Record::shared(
                "like",
                "l4",
                json!({"subject_type": "post", "subject_id": "p3"}),
                at(13),
            ),
        ])
        .unwrap();
}

// =============================================================================
// Sideloads
// =============================================================================

/// belongs-to through `{name}_id`, resolved as a batched lookup
pub fn belongs_to(name: &str, target: &str) -> SideloadBuilder {
    let foreign_key = format!("{}_id", name);
    let assign_key = foreign_key.clone();
    let target_type = target.to_string();
    let relation = name.to_string();

    SideloadBuilder::new(name, target)
        .scope(move |records| {
            ScopeObject::new(target_type.clone()).lookup(attribute_ids(records, &foreign_key))
        })
        .assign(move |records, targets| {
            for record in records {
                let key = record.str_attribute(&assign_key);
                let target = targets
                    .iter()
                    .find(|t| key.as_deref() == Some(t.id()))
                    .cloned();
                record.attach(relation.clone(), Related::One(target));
            }
        })
}

/// has-many through the children's `foreign_key`
pub fn has_many(name: &str, target: &str, foreign_key: &str) -> SideloadBuilder {
    let target_type = target.to_string();
    let scope_key = foreign_key.to_string();
    let assign_key = foreign_key.to_string();
    let relation = name.to_string();

    SideloadBuilder::new(name, target)
        .scope(move |records| {
            ScopeObject::new(target_type.clone())
                .where_in(scope_key.clone(), records.iter().map(|r| r.id()))
        })
        .assign(move |records, children| {
            for record in records {
                let mine = children
                    .iter()
                    .filter(|c| c.str_attribute(&assign_key).as_deref() == Some(record.id()))
                    .cloned()
                    .collect();
                record.attach(relation.clone(), Related::Many(mine));
            }
        })
}

/// Polymorphic `subject` of a like, dispatched on `subject_type`
pub fn subject() -> SideloadBuilder {
    SideloadBuilder::polymorphic("subject")
        .group_by(|record| record.str_attribute("subject_type").unwrap_or_default())
        .group("post", belongs_to("subject", "post"))
        .group("photo", belongs_to("subject", "photo"))
}

// =============================================================================
// Resources
// =============================================================================

pub fn post(adapter: Arc<dyn Adapter>) -> ResourceBuilder {
    Resource::builder("post")
        .adapter(adapter)
        .default_sort(SortParam::asc("title"))
        .sideload(belongs_to("author", "user"))
        .sideload(has_many("comments", "comment", "post_id"))
}

pub fn comment(adapter: Arc<dyn Adapter>) -> ResourceBuilder {
    Resource::builder("comment")
        .adapter(adapter)
        .default_sort(SortParam::asc("id"))
        .sideload(belongs_to("author", "user"))
        .sideload(belongs_to("post", "post"))
}

pub fn user(adapter: Arc<dyn Adapter>) -> ResourceBuilder {
    Resource::builder("user")
        .adapter(adapter)
        .sideload(has_many("posts", "post", "author_id"))
}

pub fn photo(adapter: Arc<dyn Adapter>) -> ResourceBuilder {
    Resource::builder("photo").adapter(adapter)
}

pub fn like(adapter: Arc<dyn Adapter>) -> ResourceBuilder {
    Resource::builder("like")
        .adapter(adapter)
        .default_sort(SortParam::asc("id"))
        .sideload(subject())
}

/// Every blog resource, built over the same adapter
pub fn blog_resources(adapter: Arc<dyn Adapter>) -> Vec<ResourceBuilder> {
    vec![
        post(adapter.clone()),
        comment(adapter.clone()),
        user(adapter.clone()),
        photo(adapter.clone()),
        like(adapter),
    ]
}

pub fn runtime(config: ResolverConfig, resources: Vec<ResourceBuilder>) -> Arc<Runtime> {
    resources
        .into_iter()
        .fold(Runtime::builder().with_config(config), |builder, resource| {
            builder.register(resource.build().unwrap())
        })
        .build()
        .unwrap()
}

/// Seeded store plus a runtime over the whole blog graph
pub fn blog(config: ResolverConfig) -> (InMemoryAdapter, Arc<Runtime>) {
    let store = InMemoryAdapter::new();
    seed(&store);
    let runtime = runtime(config, blog_resources(Arc::new(store.clone())));
    (store, runtime)
}

// =============================================================================
// Test doubles
// =============================================================================

/// Error raised by [`RecordingAdapter`] for resource types configured to fail
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("store unavailable for {resource}")]
pub struct StoreUnavailable {
    pub resource: String,
}

/// Wraps an [`InMemoryAdapter`], recording calls and injecting failures
/// and latency per resource type
#[derive(Default)]
pub struct RecordingAdapter {
    pub store: InMemoryAdapter,
    failing: HashSet<String>,
    delays: HashMap<String, StdDuration>,
    calls: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    closes: AtomicUsize,
}

impl RecordingAdapter {
    pub fn new(store: InMemoryAdapter) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    pub fn failing(mut self, resource_type: &str) -> Self {
        self.failing.insert(resource_type.to_string());
        self
    }

    pub fn delayed(mut self, resource_type: &str, millis: u64) -> Self {
        self.delays
            .insert(resource_type.to_string(), StdDuration::from_millis(millis));
        self
    }

    /// Resource types passed to `resolve`, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Resource types whose `resolve` finished, in completion order
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Adapter for RecordingAdapter {
    async fn resolve(&self, scope: &ScopeObject) -> Result<Vec<Option<RecordRef>>> {
        let resource_type = scope.resource_type().to_string();
        self.calls.lock().unwrap().push(resource_type.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(&resource_type) {
            tokio::time::sleep(*delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.finished.lock().unwrap().push(resource_type.clone());

        if self.failing.contains(&resource_type) {
            return Err(StoreUnavailable {
                resource: resource_type,
            }
            .into());
        }
        self.store.resolve(scope).await
    }

    async fn count(&self, scope: &ScopeObject) -> Result<usize> {
        self.store.count(scope).await
    }

    async fn cache_key_with_version(&self, scope: &ScopeObject) -> Result<String> {
        self.store.cache_key_with_version(scope).await
    }

    async fn maximum_updated_at(&self, scope: &ScopeObject) -> Result<Option<DateTime<Utc>>> {
        self.store.maximum_updated_at(scope).await
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Scoping stage that records its name before delegating
pub struct RecordingStage {
    pub name: &'static str,
    pub inner: Arc<dyn ScopingStage>,
    pub log: Arc<Mutex<Vec<&'static str>>>,
}

impl ScopingStage for RecordingStage {
    fn apply(
        &self,
        resource: &Resource,
        query: &Query,
        scope: ScopeObject,
        options: &ScopingOptions,
    ) -> Result<ScopeObject> {
        self.log.lock().unwrap().push(self.name);
        self.inner.apply(resource, query, scope, options)
    }
}
