//! 🚀 BatchSubmitter: validate, encode, enqueue, await the verdict.
//!
//! 🧠 Knowledge graph:
//! - Callers hold cheap, clone-able [`BatchSubmitter`] handles.
//! - Validation and encoding run on the caller's task. They're pure, so there's no reason
//!   to make them wait in line.
//! - The queue feeds exactly one [`worker::SubmissionWorker`], which owns the transport.
//!   One consumer means one in-flight bulk call, in queue order, process-wide.
//! - Drop every handle and the queue closes; the worker finishes what's queued and exits.
//!
//! ```text
//! caller ─validate─▶ encode ─▶ [queue] ─▶ SubmissionWorker ─▶ transport ─▶ classify ─┐
//!    ▲                                                                              │
//!    └──────────────────────────── oneshot reply ◀──────────────────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::Result;
use async_channel::Sender;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::clock::SystemClock;
use crate::common::{BatchBuffer, BatchRequest};
use crate::encoder::BatchEncoder;
use crate::error::{BulkError, BulkResult};
use crate::outcome::BatchOutcome;
use crate::transport::BulkTransport;

pub mod worker;

use worker::{SubmissionJob, SubmissionWorker, Worker};

/// 🚫 Fail fast on requests that could never be a valid batch.
pub fn validate(request: &BatchRequest) -> BulkResult<()> {
    match request {
        BatchRequest::Create {
            destination,
            records,
        } => {
            if destination.is_empty() {
                return Err(BulkError::validation("create needs a destination"));
            }
            if records.is_empty() {
                return Err(BulkError::validation("create needs at least one record"));
            }
            if let Some(position) = records.iter().position(|record| record.is_empty()) {
                return Err(BulkError::validation(format!(
                    "create record at position {position} is empty"
                )));
            }
        }
        BatchRequest::Update {
            destination,
            id,
            document,
        } => {
            if id.is_empty() {
                return Err(BulkError::validation("update needs a document id"));
            }
            if destination.is_empty() {
                return Err(BulkError::validation("update needs a destination"));
            }
            if document.is_empty() {
                return Err(BulkError::validation("update needs a non-empty document"));
            }
        }
        BatchRequest::Delete { targets } => {
            if targets.is_empty() {
                return Err(BulkError::validation("delete needs at least one target"));
            }
            if let Some(position) = targets
                .iter()
                .position(|target| target.destination.is_empty() || target.id.is_empty())
            {
                return Err(BulkError::validation(format!(
                    "delete target at position {position} needs both a destination and an id"
                )));
            }
        }
    }
    Ok(())
}

/// 📨 Handle to the single-writer submission queue.
#[derive(Debug, Clone)]
pub struct BatchSubmitter {
    tx: Sender<SubmissionJob>,
    encoder: BatchEncoder,
}

impl BatchSubmitter {
    /// 🏗️ Spawn the worker that owns `transport`. The returned handle resolves once every
    /// `BatchSubmitter` clone has been dropped and the queue has drained.
    ///
    /// `queue_capacity` bounds how many encoded batches may wait in line (minimum 1).
    pub fn spawn<T: BulkTransport + 'static>(
        transport: T,
        encoder: BatchEncoder,
        queue_capacity: usize,
    ) -> (Self, JoinHandle<Result<()>>) {
        let (tx, rx) = async_channel::bounded(queue_capacity.max(1));
        let handle = SubmissionWorker::new(rx, transport).start();
        (Self { tx, encoder }, handle)
    }

    /// 🕰️ Same as [`BatchSubmitter::spawn`] with the wall clock.
    pub fn spawn_with_system_clock<T: BulkTransport + 'static>(
        transport: T,
        queue_capacity: usize,
    ) -> (Self, JoinHandle<Result<()>>) {
        Self::spawn(
            transport,
            BatchEncoder::new(Arc::new(SystemClock)),
            queue_capacity,
        )
    }

    pub fn encoder(&self) -> &BatchEncoder {
        &self.encoder
    }

    /// 🚀 Validate, encode, submit, classify.
    ///
    /// `Err` means no per-item results exist (validation, encoding, transport, rejection).
    /// A partially failed batch is `Ok`, with the first failure in [`BatchOutcome::error`].
    pub async fn submit(&self, request: BatchRequest) -> BulkResult<BatchOutcome> {
        validate(&request)?;
        let buffer = self.encoder.encode(request)?;
        self.submit_buffer(buffer).await
    }

    /// 📜 Submit an already-encoded buffer. Waits its turn behind every earlier submission.
    pub async fn submit_buffer(&self, buffer: BatchBuffer) -> BulkResult<BatchOutcome> {
        if buffer.is_empty() {
            return Err(BulkError::validation("refusing to submit an empty batch"));
        }
        debug!("📨 queueing a batch of {} entries", buffer.entry_count());
        let (reply, verdict) = oneshot::channel();
        self.tx
            .send(SubmissionJob { buffer, reply })
            .await
            .map_err(|_| BulkError::SubmitterClosed)?;
        verdict.await.map_err(|_| BulkError::SubmitterClosed)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::common::{DeleteTarget, Record};
    use crate::transport::{InMemoryTransport, TransportResponse};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("💀 test fixture must be an object, got {other}"),
        }
    }

    fn pinned_encoder() -> BatchEncoder {
        let pinned = Utc
            .with_ymd_and_hms(2024, 3, 7, 10, 0, 0)
            .single()
            .expect("💀 a valid date should be valid");
        BatchEncoder::new(Arc::new(FixedClock(pinned)))
    }

    fn three_records() -> BatchRequest {
        BatchRequest::Create {
            destination: "logs-%{YYYY.MM.DD}".into(),
            records: vec![
                record(json!({ "n": 1 })),
                record(json!({ "n": 2 })),
                record(json!({ "n": 3 })),
            ],
        }
    }

    #[tokio::test]
    async fn the_one_where_an_empty_id_never_reaches_the_network() {
        let transport = InMemoryTransport::new();
        let (submitter, _worker) = BatchSubmitter::spawn(transport.clone(), pinned_encoder(), 4);

        let result = submitter
            .submit(BatchRequest::Update {
                destination: "users".into(),
                id: String::new(),
                document: record(json!({ "name": "ada" })),
            })
            .await;

        assert!(matches!(result, Err(BulkError::Validation(_))));
        assert_eq!(transport.invocations().await, 0);
    }

    #[tokio::test]
    async fn the_one_where_bad_requests_are_all_bounced_at_the_door() {
        let cases = vec![
            BatchRequest::Create {
                destination: String::new(),
                records: vec![record(json!({ "a": 1 }))],
            },
            BatchRequest::Create {
                destination: "logs".into(),
                records: vec![],
            },
            BatchRequest::Create {
                destination: "logs".into(),
                records: vec![record(json!({ "a": 1 })), Record::new()],
            },
            BatchRequest::Update {
                destination: String::new(),
                id: "1".into(),
                document: record(json!({ "a": 1 })),
            },
            BatchRequest::Update {
                destination: "users".into(),
                id: "1".into(),
                document: Record::new(),
            },
            BatchRequest::Delete { targets: vec![] },
            BatchRequest::Delete {
                targets: vec![DeleteTarget::new("logs", "")],
            },
        ];
        for case in &cases {
            assert!(
                matches!(validate(case), Err(BulkError::Validation(_))),
                "expected {case:?} to fail validation"
            );
        }
    }

    #[tokio::test]
    async fn the_one_where_item_two_fails_and_the_caller_hears_about_it() -> anyhow::Result<()> {
        let transport = InMemoryTransport::new();
        transport
            .script(Ok(TransportResponse::new(
                200,
                json!({
                    "took": 4, "errors": true,
                    "items": [
                        { "create": { "_index": "logs-2024.03.07", "status": 201, "result": "created" } },
                        { "create": { "_index": "logs-2024.03.07", "status": 400,
                            "error": { "type": "mapper_parsing_exception", "reason": "mapper_parsing_exception" } } },
                        { "create": { "_index": "logs-2024.03.07", "status": 201, "result": "created" } }
                    ]
                })
                .to_string(),
            )))
            .await;
        let (submitter, _worker) = BatchSubmitter::spawn(transport.clone(), pinned_encoder(), 4);

        let outcome = submitter.submit(three_records()).await?;

        assert_eq!(outcome.succeeded_count(), 2);
        assert!(outcome.items[0].is_success() && outcome.items[2].is_success());
        let aggregate = outcome
            .error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        assert!(aggregate.contains("mapper_parsing_exception"), "{aggregate}");

        let sent = transport.received().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("{\"create\":{\"_index\":\"logs-2024.03.07\"}}\n"));
        assert_eq!(sent[0].lines().count(), 6);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_transport_failure_is_reported_and_the_line_keeps_moving(
    ) -> anyhow::Result<()> {
        let transport = InMemoryTransport::new();
        transport.script(Err(anyhow!("connection refused"))).await;
        let (submitter, _worker) = BatchSubmitter::spawn(transport.clone(), pinned_encoder(), 4);

        let first = submitter.submit(three_records()).await;
        match first {
            Err(BulkError::Transport(err)) => assert!(err.to_string().contains("connection refused")),
            other => panic!("💀 expected a transport error, got {other:?}"),
        }

        // -- 🔓 the worker is free again; the next batch goes straight through
        let second = submitter.submit(three_records()).await?.into_result()?;
        assert_eq!(second.succeeded_count(), 3);
        assert_eq!(transport.invocations().await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_whole_call_is_rejected() {
        let transport = InMemoryTransport::new();
        transport
            .script(Ok(TransportResponse::new(
                413,
                r#"{"error":{"type":"content_too_long","reason":"request too large"},"status":413}"#,
            )))
            .await;
        let (submitter, _worker) = BatchSubmitter::spawn(transport, pinned_encoder(), 4);

        match submitter.submit(three_records()).await {
            Err(BulkError::Rejected { status, reason, .. }) => {
                assert_eq!(status, 413);
                assert_eq!(reason, "request too large");
            }
            other => panic!("💀 expected a rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn the_one_where_batches_arrive_in_the_order_they_were_sent() -> anyhow::Result<()> {
        let transport = InMemoryTransport::new();
        let (submitter, worker) = BatchSubmitter::spawn(transport.clone(), pinned_encoder(), 1);

        for n in 0..5 {
            submitter
                .submit(BatchRequest::Delete {
                    targets: vec![DeleteTarget::new("logs", n.to_string())],
                })
                .await?;
        }
        drop(submitter);
        worker.await??;

        let ids: Vec<String> = transport
            .received()
            .await
            .iter()
            .map(|payload| {
                let action: Value = serde_json::from_str(payload.trim_end()).unwrap_or_default();
                action["delete"]["_id"].as_str().unwrap_or_default().to_string()
            })
            .collect();
        assert_eq!(ids, vec!["0", "1", "2", "3", "4"]);
        Ok(())
    }

    /// 🐢 A transport that naps mid-call and remembers the most callers it ever saw at once.
    #[derive(Debug, Clone, Default)]
    struct NappingTransport {
        in_flight: Arc<AtomicUsize>,
        high_water: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BulkTransport for NappingTransport {
        async fn execute_bulk(&self, _payload: String) -> anyhow::Result<TransportResponse> {
            let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(now_in_flight, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(15)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TransportResponse::new(200, r#"{"took":0,"errors":false,"items":[]}"#))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn the_one_where_concurrent_callers_politely_take_turns() {
        let transport = NappingTransport::default();
        let (submitter, _worker) = BatchSubmitter::spawn(transport.clone(), pinned_encoder(), 8);

        let callers = (0..8).map(|n| {
            let submitter = submitter.clone();
            tokio::spawn(async move {
                submitter
                    .submit(BatchRequest::Create {
                        destination: format!("caller-{n}"),
                        records: vec![record(json!({ "n": n }))],
                    })
                    .await
            })
        });
        let results = futures::future::join_all(callers).await;

        for result in results {
            let outcome = result.expect("💀 caller task panicked");
            assert!(outcome.is_ok(), "{outcome:?}");
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 8);
        assert_eq!(
            transport.high_water.load(Ordering::SeqCst),
            1,
            "two bulk calls were in flight at the same time"
        );
    }

    #[tokio::test]
    async fn the_one_where_the_worker_is_gone() {
        let transport = InMemoryTransport::new();
        let (submitter, worker) = BatchSubmitter::spawn(transport, pinned_encoder(), 1);
        worker.abort();
        let _ = worker.await;

        assert!(matches!(
            submitter.submit(three_records()).await,
            Err(BulkError::SubmitterClosed)
        ));
    }

    #[tokio::test]
    async fn the_one_where_an_empty_buffer_is_not_worth_a_round_trip() {
        let transport = InMemoryTransport::new();
        let (submitter, _worker) = BatchSubmitter::spawn(transport.clone(), pinned_encoder(), 1);
        assert!(matches!(
            submitter.submit_buffer(BatchBuffer::new()).await,
            Err(BulkError::Validation(_))
        ));
        assert_eq!(transport.invocations().await, 0);
    }

    #[tokio::test]
    async fn the_one_where_the_wall_clock_submitter_still_delivers() -> BulkResult<()> {
        let transport = InMemoryTransport::new();
        let (submitter, _worker) = BatchSubmitter::spawn_with_system_clock(transport.clone(), 2);
        assert_eq!(submitter.encoder().destinations().resolve("plain-logs"), "plain-logs");

        let outcome = submitter
            .submit(BatchRequest::Delete {
                targets: vec![DeleteTarget::new("plain-logs", "42")],
            })
            .await?;
        assert_eq!(outcome.succeeded_count(), 1);
        assert_eq!(transport.invocations().await, 1);
        Ok(())
    }
}
