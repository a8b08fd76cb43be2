//! 🧵 The submission worker: the one and only writer. It owns the transport, drains the
//! queue one job at a time, and never lets two bulk calls overlap.
//!
//! 🦆 It receives batches. It sends batches. It reads the receipts. It asks no questions.

use anyhow::Result;
use async_channel::Receiver;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::common::BatchBuffer;
use crate::error::{BulkError, BulkResult};
use crate::outcome::{BatchOutcome, classify};
use crate::transport::BulkTransport;

/// 🏗️ A background worker, that does work. duh.
pub trait Worker {
    fn start(self) -> JoinHandle<Result<()>>;
}

/// 📨 One queued submission and the line to call back on.
#[derive(Debug)]
pub(crate) struct SubmissionJob {
    pub(crate) buffer: BatchBuffer,
    pub(crate) reply: oneshot::Sender<BulkResult<BatchOutcome>>,
}

#[derive(Debug)]
pub(crate) struct SubmissionWorker<T> {
    rx: Receiver<SubmissionJob>,
    transport: T,
}

impl<T: BulkTransport + 'static> SubmissionWorker<T> {
    pub(crate) fn new(rx: Receiver<SubmissionJob>, transport: T) -> Self {
        Self { rx, transport }
    }

    /// 📡 Send, then classify. Runs with exclusive use of the transport.
    async fn submit(&self, buffer: BatchBuffer) -> BulkResult<BatchOutcome> {
        let expected_items = buffer.entry_count();
        let payload = buffer.into_payload();

        // -- 💀 transport failure: report it as-is, the payload is never looked at again
        let response = self
            .transport
            .execute_bulk(payload)
            .await
            .map_err(BulkError::Transport)?;

        let outcome = classify(response.status, &response.body)?;
        if outcome.items.len() != expected_items {
            warn!(
                "⚠️ sent {} entries but the backend reported {} items",
                expected_items,
                outcome.items.len()
            );
        }
        debug!(
            "📬 bulk call done in {}ms: {} ok, {} failed",
            outcome.took_ms,
            outcome.succeeded_count(),
            outcome.failed_count()
        );
        Ok(outcome)
    }
}

impl<T: BulkTransport + 'static> Worker for SubmissionWorker<T> {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("📥 SubmissionWorker started draining the queue...");
            while let Ok(job) = self.rx.recv().await {
                let result = self.submit(job.buffer).await;
                if job.reply.send(result).is_err() {
                    // -- 🙈 the caller stopped waiting; the batch was still sent
                    debug!("📭 submission finished but its caller is gone");
                }
            }
            debug!("🏁 SubmissionWorker: queue closed. Shutting down.");
            Ok(())
        })
    }
}
