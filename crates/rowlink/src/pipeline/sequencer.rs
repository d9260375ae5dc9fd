use super::ErrorPolicy;
use super::task::TaskOutcome;
use crate::error::{Error, Result};
use crate::record::RecordCodec;
use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SequencerStats {
    pub(crate) emitted: u64,
    pub(crate) failed: u64,
}

/// Drains the ordering queue strictly in push order, awaiting each task's
/// completion handle before touching the next. This wait is the
/// synchronization point that enforces output ordering: a fast task behind a
/// slow one sits in the queue until its predecessor is committed.
///
/// A write failure cancels `admission` (stopping the producer) and returns
/// the fatal error. `abort` short-circuits the drain when the producer hit a
/// fatal read error and in-flight output must be discarded.
pub(crate) async fn drain<W>(
    mut queue: mpsc::UnboundedReceiver<oneshot::Receiver<TaskOutcome>>,
    mut writer: FramedWrite<W, RecordCodec>,
    policy: ErrorPolicy,
    admission: CancellationToken,
    abort: CancellationToken,
) -> Result<SequencerStats>
where
    W: AsyncWrite + Unpin,
{
    let mut stats = SequencerStats::default();
    loop {
        let done = tokio::select! {
            biased;
            () = abort.cancelled() => break,
            next = queue.recv() => match next {
                None => break,
                Some(done) => done,
            },
        };
        let outcome = tokio::select! {
            biased;
            () = abort.cancelled() => break,
            outcome = done => outcome,
        };
        let record = match outcome {
            Ok(TaskOutcome::Resolved(record)) => record,
            Ok(TaskOutcome::Failed { mut record, error }) => {
                stats.failed += 1;
                tracing::debug!(%error, "applying error policy to failed record");
                match policy {
                    ErrorPolicy::Skip => continue,
                    ErrorPolicy::EmitEmpty => {
                        record.push("");
                        record
                    }
                }
            }
            Err(_) => {
                // A task dropped its handle without signaling (a panic);
                // stop rather than emit records out of order.
                admission.cancel();
                return Err(Error::Channel {
                    context: "task finished without signaling its outcome".to_string(),
                });
            }
        };
        if let Err(error) = writer.send(record).await {
            admission.cancel();
            return Err(Error::Write(error));
        }
        stats.emitted += 1;
    }
    Ok(stats)
}
