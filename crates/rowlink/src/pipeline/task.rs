//! Per-record resolution: key extraction, cache probe, lookup, cache fill.

use crate::cache::{Cache, namespaced};
use crate::error::TaskError;
use crate::lookup::LookupClient;
use crate::record::Record;
use std::sync::Arc;

use super::PipelineConfig;

/// State every task in a run borrows through an [`Arc`].
pub(crate) struct Shared<L, C> {
    pub(crate) lookup: L,
    pub(crate) cache: Option<C>,
    pub(crate) config: PipelineConfig,
}

impl<L, C> Shared<L, C> {
    pub(crate) fn new(lookup: L, cache: Option<C>, config: PipelineConfig) -> Self {
        Self {
            lookup,
            cache,
            config,
        }
    }
}

/// What a task hands back through its completion handle.
pub(crate) enum TaskOutcome {
    /// The record, augmented with its resolved link.
    Resolved(Record),
    /// The record could not be resolved; the sequencer applies the error
    /// policy to it.
    Failed { record: Record, error: TaskError },
}

impl TaskOutcome {
    pub(crate) fn failed(record: Record, error: TaskError) -> Self {
        Self::Failed { record, error }
    }
}

/// Resolves one record under the configured deadline. Never panics or
/// escalates: any failure is folded into the outcome for the sequencer.
pub(crate) async fn execute<L, C>(mut record: Record, shared: Arc<Shared<L, C>>) -> TaskOutcome
where
    L: LookupClient,
    C: Cache,
{
    let deadline = shared.config.task_timeout;
    let error = match tokio::time::timeout(deadline, resolve(&mut record, &shared)).await {
        Ok(Ok(())) => return TaskOutcome::Resolved(record),
        Ok(Err(error)) => error,
        Err(_) => TaskError::DeadlineExceeded(deadline),
    };
    let key = record.field(shared.config.key_column).unwrap_or("");
    tracing::warn!(key = %key, %error, "record task failed");
    TaskOutcome::Failed { record, error }
}

/// Cache-aside resolution. The cache is strictly an optimization: read and
/// write failures are logged and the task proceeds as if it missed.
async fn resolve<L, C>(
    record: &mut Record,
    shared: &Shared<L, C>,
) -> core::result::Result<(), TaskError>
where
    L: LookupClient,
    C: Cache,
{
    let config = &shared.config;
    let key = record
        .field(config.key_column)
        .ok_or(TaskError::KeyColumnOutOfRange {
            column: config.key_column,
            fields: record.len(),
        })?
        .to_string();

    let cache_key = namespaced(&config.cache_prefix, &key);
    if let Some(cache) = &shared.cache {
        match cache.get(&cache_key).await {
            Ok(Some(link)) => {
                tracing::debug!(key = %key, "cache hit");
                record.push(link);
                return Ok(());
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(%error, "cache read failed; treating as a miss");
            }
        }
    }

    let hits = shared
        .lookup
        .search(&key, &config.search)
        .await
        .map_err(|error| TaskError::LookupFailed {
            message: error.to_string(),
        })?;
    let Some(hit) = hits.into_iter().next() else {
        return Err(TaskError::NoResults);
    };

    if let Some(cache) = &shared.cache {
        if let Err(error) = cache.set(&cache_key, &hit.link).await {
            tracing::warn!(%error, "cache write failed");
        }
    }
    record.push(hit.link);
    Ok(())
}
