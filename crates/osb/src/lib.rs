//! 🚀 osb: batches records into `_bulk` calls and tells you, item by item, what the
//! backend thought of them.
//!
//! 🧠 Knowledge graph:
//! - [`records`] reads NDJSON off disk.
//! - [`encoder`] resolves `@timestamp` ([`timestamps`]) and the destination ([`destinations`]),
//!   flattens `data`, and serializes action/document line pairs ([`common::BatchBuffer`]).
//! - [`submitter`] validates, then hands buffers to one worker that owns the [`transport`].
//! - [`outcome`] turns the response body into per-item verdicts.
//! - [`run`] wires all of it to an [`app_config::AppConfig`] for the CLI.

use anyhow::{Context, Result};
use tracing::{info, warn};

pub mod app_config;
pub mod clock;
pub mod common;
pub mod destinations;
pub mod encoder;
pub mod error;
pub mod outcome;
mod progress;
pub mod records;
pub mod submitter;
pub mod timestamps;
pub mod transport;

pub use app_config::{AppConfig, load_config};
pub use clock::{Clock, FixedClock, SystemClock};
pub use common::{BatchBuffer, BatchRequest, DeleteTarget, Record};
pub use encoder::BatchEncoder;
pub use error::{BulkError, BulkResult};
pub use outcome::{BatchOutcome, ItemOutcome, ItemStatus};
pub use submitter::BatchSubmitter;
pub use transport::{BulkTransport, TransportBackend, TransportConfig};

use crate::progress::IngestProgress;
use crate::records::read_records;

/// 🎬 One ingest run: read the input file, create every record in the configured
/// destination, batch by batch.
///
/// A call-level failure (transport, rejection, malformed response) stops the run.
/// Item failures don't; the run keeps going and returns the first one at the end.
pub async fn run(app_config: AppConfig) -> Result<()> {
    let AppConfig {
        transport,
        ingest,
        runtime,
    } = app_config;

    let transport = TransportBackend::from_config(&transport)?;
    let records = read_records(&ingest.input_file).await?;
    if records.is_empty() {
        warn!(
            "🦗 '{}' holds no records. Nothing to send.",
            ingest.input_file.display()
        );
        return Ok(());
    }

    let (submitter, worker) =
        BatchSubmitter::spawn_with_system_clock(transport, runtime.queue_capacity);
    let destination_preview = submitter
        .encoder()
        .destinations()
        .resolve(&ingest.destination);

    let batch_size = ingest.max_batch_size_docs.max(1);
    let mut progress = IngestProgress::new(destination_preview, records.len() as u64);
    let mut first_item_failure: Option<BulkError> = None;
    let mut call_failure: Option<anyhow::Error> = None;

    for (batch_number, chunk) in records.chunks(batch_size).enumerate() {
        let request = BatchRequest::Create {
            destination: ingest.destination.clone(),
            records: chunk.to_vec(),
        };
        match submitter.submit(request).await {
            Ok(mut outcome) => {
                progress.update(chunk.len() as u64, outcome.failed_count() as u64);
                if first_item_failure.is_none() {
                    first_item_failure = outcome.error.take();
                }
            }
            Err(err) => {
                call_failure = Some(
                    anyhow::Error::new(err)
                        .context(format!("💀 batch {} never got item results", batch_number + 1)),
                );
                break;
            }
        }
    }

    progress.finish();
    info!("📊 ingest summary\n{}", progress.summary());

    // -- 🚪 last handle out turns off the lights, then we wait for the worker to notice
    drop(submitter);
    worker
        .await
        .context("💀 The submission worker panicked or was cancelled")??;

    if let Some(err) = call_failure {
        return Err(err);
    }
    if let Some(err) = first_item_failure {
        return Err(anyhow::Error::new(err).context(format!(
            "💀 {} item(s) were refused by the backend",
            progress.failed_items()
        )));
    }
    Ok(())
}
