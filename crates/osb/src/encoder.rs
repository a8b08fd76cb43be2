//! 📡 Bulk encoding: records in, NDJSON lines out. The bulk API's peculiar tastes, catered to.
//!
//! 🎬 *[the bulk API has rules. two lines per create. one line per delete. newlines everywhere.]*
//! *[three engineers lost weekends to the trailing newline. their families miss them.]*
//!
//! 🧠 Knowledge graph:
//! - Create: flatten `data` one level, inject `@timestamp`, two lines.
//! - Update: `{"doc":{...},"@timestamp":"..."}`. The timestamp sits beside `doc`, not in it.
//! - Delete: one metadata line. No document.
//! - Destinations go through [`DestinationNameResolver`] once per request, so every entry
//!   in a batch lands in the same dated index even if midnight strikes mid-encode.
//! - Encoding is pure. No lock, no I/O, safe to call from any number of tasks at once.

use std::sync::Arc;

use serde_json::Value;
use serde_json::map::Entry;
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::common::{BatchAction, BatchBuffer, BatchEntry, BatchRequest, DeleteTarget, Record};
use crate::destinations::DestinationNameResolver;
use crate::error::BulkResult;
use crate::timestamps::{TIMESTAMP_FIELD, TimestampResolver};

/// 📦 The nested key whose contents get hoisted onto the envelope.
pub const NESTED_PAYLOAD_FIELD: &str = "data";

/// 🫓 Hoist the keys of a nested `data` object to the top level and drop `data`.
///
/// Collision policy: the top level wins. A hoisted key never overwrites an envelope key
/// of the same name; the nested value is discarded. `data` holding anything other than
/// an object is left exactly where it was.
pub fn flatten(mut record: Record) -> Record {
    match record.remove(NESTED_PAYLOAD_FIELD) {
        Some(Value::Object(nested)) => {
            for (key, value) in nested {
                match record.entry(key) {
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                    Entry::Occupied(kept) => {
                        trace!("🫓 '{}' exists on the envelope; nested value dropped", kept.key());
                    }
                }
            }
        }
        Some(not_an_object) => {
            record.insert(NESTED_PAYLOAD_FIELD.to_string(), not_an_object);
        }
        None => {}
    }
    record
}

/// 📡 Builds [`BatchEntry`]s and serializes them into a [`BatchBuffer`].
#[derive(Debug, Clone)]
pub struct BatchEncoder {
    timestamps: TimestampResolver,
    destinations: DestinationNameResolver,
}

impl BatchEncoder {
    /// 🏗️ Both resolvers share one clock, so a fixed clock pins the whole batch.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            timestamps: TimestampResolver::new(clock.clone()),
            destinations: DestinationNameResolver::new(clock),
        }
    }

    pub fn destinations(&self) -> &DestinationNameResolver {
        &self.destinations
    }

    /// ➕ A create entry. `destination` must already be resolved.
    pub fn create_entry(&self, destination: &str, record: Record) -> BatchEntry {
        // -- ⏱️ resolve BEFORE flattening: data.samples[0].timestamp lives inside `data`
        let timestamp = self.timestamps.resolve(&record);
        let mut document = flatten(record);
        document.insert(TIMESTAMP_FIELD.to_string(), Value::String(timestamp));
        BatchEntry {
            action: BatchAction::Create {
                destination: destination.to_string(),
            },
            document: Some(Value::Object(document)),
        }
    }

    /// ✏️ An update entry with partial-doc semantics. `destination` must already be resolved.
    pub fn update_entry(&self, destination: &str, id: &str, document: Record) -> BatchEntry {
        let timestamp = self.timestamps.resolve(&document);
        let mut envelope = Record::new();
        envelope.insert("doc".to_string(), Value::Object(document));
        envelope.insert(TIMESTAMP_FIELD.to_string(), Value::String(timestamp));
        BatchEntry {
            action: BatchAction::Update {
                destination: destination.to_string(),
                id: id.to_string(),
            },
            document: Some(Value::Object(envelope)),
        }
    }

    /// 🗑️ A delete entry. The destination template is resolved here.
    pub fn delete_entry(&self, target: &DeleteTarget) -> BatchEntry {
        BatchEntry {
            action: BatchAction::Delete {
                destination: self.destinations.resolve(&target.destination),
                id: target.id.clone(),
            },
            document: None,
        }
    }

    /// 🧩 Expand a request into its ordered entries.
    pub fn entries(&self, request: BatchRequest) -> Vec<BatchEntry> {
        match request {
            BatchRequest::Create {
                destination,
                records,
            } => {
                let destination = self.destinations.resolve(&destination);
                records
                    .into_iter()
                    .map(|record| self.create_entry(&destination, record))
                    .collect()
            }
            BatchRequest::Update {
                destination,
                id,
                document,
            } => {
                let destination = self.destinations.resolve(&destination);
                vec![self.update_entry(&destination, &id, document)]
            }
            BatchRequest::Delete { targets } => {
                targets.iter().map(|target| self.delete_entry(target)).collect()
            }
        }
    }

    /// 📜 Entries → NDJSON lines. Fails only if serde_json does.
    pub fn serialize(entries: &[BatchEntry]) -> BulkResult<BatchBuffer> {
        let mut buffer = BatchBuffer::new();
        for entry in entries {
            let action_line = serde_json::to_string(&entry.action)?;
            let document_line = entry
                .document
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            buffer.push_entry(action_line, document_line);
        }
        Ok(buffer)
    }

    /// 🚀 Request → buffer, the whole trip. Does not validate; see `submitter::validate`.
    pub fn encode(&self, request: BatchRequest) -> BulkResult<BatchBuffer> {
        let mode = request.mode();
        let entries = self.entries(request);
        let buffer = Self::serialize(&entries)?;
        debug!(
            "📡 encoded {} {} entries into {} bytes of NDJSON",
            buffer.entry_count(),
            mode,
            buffer.payload_len()
        );
        Ok(buffer)
    }
}
