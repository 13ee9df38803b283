//! Sideload coordination
//!
//! Runs every requested sideload of a scope against its resolved records.
//! Sequential mode awaits the branches one after another on the caller's
//! task. Concurrent mode spawns one task per branch; each task gets its own
//! copy of the request context, runs the `before_sideload` hook, and releases
//! the owner adapter's connection when it finishes.

use super::Scope;
use crate::core::context::RequestContext;
use crate::core::error::ResolveError;
use crate::core::query::Query;
use crate::core::record::RecordRef;
use crate::core::resource::Resource;
use crate::core::sideload::{Sideload, SideloadEnv};
use crate::runtime::Runtime;
use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

type Scheduled = (String, JoinHandle<Result<()>>);

impl Scope {
    /// Resolve every requested sideload onto `results`
    ///
    /// Names without a matching sideload and shared-remote sideloads are
    /// skipped. In concurrent mode every spawned branch is awaited before
    /// returning, even when one of them failed; the first failure in
    /// scheduling order is returned.
    pub async fn resolve_sideloads(&self, results: &[RecordRef]) -> Result<()> {
        if results.is_empty() {
            return Ok(());
        }

        let concurrent = self.runtime.config().concurrency;
        let mut branches: Vec<Scheduled> = Vec::new();

        for (name, query) in self.query.sideloads() {
            let Some(sideload) = self.lookup_sideload(name) else {
                tracing::debug!(
                    resource = %self.resource.resource_type(),
                    sideload = %name,
                    "Unknown sideload requested, skipping"
                );
                continue;
            };

            if sideload.is_shared_remote() {
                tracing::debug!(sideload = %name, "Shared remote sideload, skipping");
                continue;
            }

            if concurrent {
                branches.push((name.clone(), self.spawn_branch(sideload, results, query)));
            } else {
                sideload.resolve(results, query, None, self.env()).await?;
            }
        }

        join_branches(branches).await
    }

    fn spawn_branch(
        &self,
        sideload: Arc<Sideload>,
        results: &[RecordRef],
        query: &Query,
    ) -> JoinHandle<Result<()>> {
        let task = SideloadTask {
            sideload,
            parents: results.to_vec(),
            query: query.clone(),
            runtime: Arc::clone(&self.runtime),
            context: self.options.context.clone(),
            owner: Arc::clone(&self.resource),
        };
        tokio::spawn(task.run().in_current_span())
    }
}

/// Everything a spawned branch owns
struct SideloadTask {
    sideload: Arc<Sideload>,
    parents: Vec<RecordRef>,
    query: Query,
    runtime: Arc<Runtime>,
    context: RequestContext,
    owner: Arc<Resource>,
}

impl SideloadTask {
    async fn run(self) -> Result<()> {
        if let Some(hook) = self.runtime.before_sideload() {
            hook(&self.context);
        }

        let env = SideloadEnv {
            runtime: &self.runtime,
            context: &self.context,
            parent: self.owner.resource_type(),
        };
        let result = self
            .sideload
            .resolve(&self.parents, &self.query, None, env)
            .await;

        self.owner.adapter().close().await;
        result
    }
}

async fn join_branches(branches: Vec<Scheduled>) -> Result<()> {
    if branches.is_empty() {
        return Ok(());
    }

    let (names, handles): (Vec<String>, Vec<_>) = branches.into_iter().unzip();
    let outcomes = join_all(handles).await;

    let mut first_error = None;
    for (name, outcome) in names.into_iter().zip(outcomes) {
        let result = outcome.unwrap_or_else(|join_error| {
            Err(ResolveError::TaskFailed {
                sideload: name.clone(),
                message: join_error.to_string(),
            }
            .into())
        });

        if let Err(err) = result {
            if first_error.is_none() {
                first_error = Some(err);
            } else {
                tracing::warn!(sideload = %name, error = %err, "Additional sideload failure");
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
