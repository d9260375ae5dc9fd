//! # The order-preserving concurrent pipeline
//!
//! The scheduler reads records, pushes one completion handle per record onto
//! the ordering queue **before** launching its task, then admits the task
//! under the semaphore and spawns it. The sequencer drains the queue in push
//! order and awaits each handle, so output order always equals input order no
//! matter how lookups interleave.
//!
//! ## Invariants
//!
//! - At most `concurrency` tasks execute at once; the semaphore is the only
//!   producer-side backpressure (the ordering queue is unbounded, holding at
//!   most lightweight handles).
//! - Each task resolves its outcome exactly once, within `task_timeout` of
//!   launch.
//! - Cancellation stops admission; everything already queued is drained, so
//!   nothing is silently lost. Fatal read/write errors instead abort the run
//!   and discard in-flight output.

mod sequencer;
mod task;

use crate::cache::Cache;
use crate::error::{Error, Result, TaskError};
use crate::lookup::{LookupClient, SearchOptions};
use crate::record::{CodecError, DEFAULT_DELIMITER, Record, RecordCodec};
use core::fmt;
use core::str::FromStr;
use core::time::Duration;
use futures::StreamExt;
use std::sync::Arc;
use task::{Shared, TaskOutcome};
use tokio::io::AsyncWrite;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;

/// Default capacity of the admission semaphore.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default per-task deadline.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cache-key namespace prefix.
pub const DEFAULT_CACHE_PREFIX: &str = "rowlink";

/// What the sequencer emits for a record whose task failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Drop the record; the failure is only visible in the logs.
    #[default]
    Skip,
    /// Emit the record with an empty trailing sentinel field.
    EmitEmpty,
}

/// A policy value outside the recognized set.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[error("Invalid error policy {0:?} (expected one of: skip, emit-empty)")]
pub struct InvalidErrorPolicy(pub String);

impl FromStr for ErrorPolicy {
    type Err = InvalidErrorPolicy;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "emit-empty" => Ok(Self::EmitEmpty),
            _ => Err(InvalidErrorPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Skip => "skip",
            Self::EmitEmpty => "emit-empty",
        })
    }
}

/// Tunables for a pipeline run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Admission semaphore capacity.
    pub concurrency: usize,
    /// Deadline covering one task's cache probe, lookup, and cache write.
    pub task_timeout: Duration,
    /// Index of the field used as the lookup key.
    pub key_column: usize,
    /// Field delimiter for the output stream.
    pub delimiter: u8,
    /// What to do with records whose task failed.
    pub on_error: ErrorPolicy,
    /// Filters forwarded with every lookup.
    pub search: SearchOptions,
    /// Namespace prefix for cache keys.
    pub cache_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            task_timeout: DEFAULT_TASK_TIMEOUT,
            key_column: 0,
            delimiter: DEFAULT_DELIMITER,
            on_error: ErrorPolicy::default(),
            search: SearchOptions::default(),
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
        }
    }
}

/// Counters reported after a completed or cancelled run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Records written to the output stream.
    pub emitted: u64,
    /// Records whose task failed (skipped or emitted with a sentinel).
    pub failed: u64,
    /// Whether the run was cut short by cancellation.
    pub cancelled: bool,
}

/// The order-preserving concurrent lookup pipeline.
///
/// Construct with a lookup client, an optional cache, a config, and a
/// [`CancellationToken`]; cancelling the token stops admission and drains
/// what was already queued. A pipeline runs once: [`Pipeline::run`] consumes
/// it.
pub struct Pipeline<L, C> {
    shared: Arc<Shared<L, C>>,
    cancel: CancellationToken,
}

impl<L, C> Pipeline<L, C>
where
    L: LookupClient,
    C: Cache,
{
    pub fn new(
        lookup: L,
        cache: Option<C>,
        config: PipelineConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shared: Arc::new(Shared::new(lookup, cache, config)),
            cancel,
        }
    }

    /// Runs the pipeline to completion: reads `records`, resolves each key
    /// under the admission bound, and emits augmented records to `output` in
    /// input order, flushing after every record.
    ///
    /// Returns the run counters, or the first fatal error. Per-record
    /// failures never surface here; they are logged and routed through the
    /// configured [`ErrorPolicy`].
    pub async fn run<S, W>(self, mut records: S, output: W) -> Result<PipelineSummary>
    where
        S: futures::Stream<Item = core::result::Result<Record, CodecError>> + Unpin,
        W: AsyncWrite + Unpin,
    {
        let config = &self.shared.config;
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let writer = FramedWrite::new(output, RecordCodec::new(config.delimiter));
        let semaphore = Arc::new(Semaphore::new(config.concurrency));
        // Admission stops when the caller cancels or when the sequencer hits
        // a fatal write error; the child token folds both without mutating
        // the caller's token.
        let admission = self.cancel.child_token();
        // Fired only on fatal read errors: tells the sequencer to stop
        // draining instead of finishing the queue.
        let abort = CancellationToken::new();

        let sequencer = sequencer::drain(
            queue_rx,
            writer,
            config.on_error,
            admission.clone(),
            abort.clone(),
        );

        let scheduler = async {
            let mut result = Ok(());
            loop {
                tokio::select! {
                    biased;
                    () = admission.cancelled() => {
                        tracing::info!("stopping admission; draining queued tasks");
                        break;
                    }
                    next = records.next() => {
                        let record = match next {
                            None => break,
                            Some(Ok(record)) => record,
                            Some(Err(error)) => {
                                result = Err(Error::Read(error));
                                abort.cancel();
                                break;
                            }
                        };
                        let (done_tx, done_rx) = oneshot::channel();
                        if queue_tx.send(done_rx).is_err() {
                            // The sequencer bailed on a fatal write; its
                            // error takes precedence below.
                            break;
                        }
                        tokio::select! {
                            biased;
                            () = admission.cancelled() => {
                                let key = record.field(config.key_column).unwrap_or("");
                                let error = TaskError::Cancelled;
                                tracing::warn!(key = %key, %error, "record task failed");
                                let _ = done_tx.send(TaskOutcome::failed(record, error));
                                tracing::info!("stopping admission; draining queued tasks");
                                break;
                            }
                            permit = semaphore.clone().acquire_owned() => {
                                let Ok(permit) = permit else {
                                    result = Err(Error::Channel {
                                        context: "admission semaphore closed".to_string(),
                                    });
                                    abort.cancel();
                                    break;
                                };
                                let shared = Arc::clone(&self.shared);
                                tokio::spawn(async move {
                                    let outcome = task::execute(record, shared).await;
                                    // The sequencer may be gone after a fatal
                                    // error; the outcome is discarded then.
                                    let _ = done_tx.send(outcome);
                                    drop(permit);
                                });
                            }
                        }
                    }
                }
            }
            drop(queue_tx);
            result
        };

        let (scheduler_result, sequencer_result) = tokio::join!(scheduler, sequencer);
        // A write failure made the scheduler stop without an error of its
        // own, so check the sequencer side first.
        let stats = sequencer_result?;
        scheduler_result?;
        Ok(PipelineSummary {
            emitted: stats.emitted,
            failed: stats.failed,
            cancelled: self.cancel.is_cancelled(),
        })
    }
}
