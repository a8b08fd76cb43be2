//! 📥 Reading raw records off disk: one JSON object per line, optionally gzipped.
//!
//! 🔍 Newlines are found with `memchr`, because telemetry dumps are large and scanning
//! bytes one `char` at a time is how you end up writing a post-mortem.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use serde_json::Value;
use tracing::{debug, info};

use crate::common::Record;
use crate::error::{BulkError, BulkResult};

/// 📦 Parse NDJSON bytes into records. Blank lines are skipped; line numbers are 1-based.
pub fn parse_ndjson(bytes: &[u8]) -> BulkResult<Vec<Record>> {
    let mut records = Vec::new();
    let mut line_start = 0;
    let mut line_number = 0;
    let ends = memchr::memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len()));
    for line_end in ends {
        line_number += 1;
        let line = bytes[line_start..line_end].trim_ascii();
        line_start = line_end + 1;
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<Value>(line) {
            Ok(Value::Object(record)) => records.push(record),
            Ok(other) => {
                return Err(BulkError::Decode {
                    line: line_number,
                    reason: format!("expected an object, found {}", json_kind(&other)),
                });
            }
            Err(err) => {
                return Err(BulkError::Decode {
                    line: line_number,
                    reason: err.to_string(),
                });
            }
        }
    }
    debug!("📥 parsed {} records from {} lines", records.len(), line_number);
    Ok(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// 🫁 Read a records file. Names ending in `.gz` are decompressed first.
pub async fn read_records(path: &Path) -> Result<Vec<Record>> {
    info!("📂 reading records from {}", path.display());
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("💀 Could not read records file '{}'", path.display()))?;

    let bytes = if path.extension().is_some_and(|ext| ext == "gz") {
        let mut inflated = Vec::with_capacity(raw.len() * 4);
        GzDecoder::new(raw.as_slice())
            .read_to_end(&mut inflated)
            .with_context(|| format!("💀 '{}' claims to be gzip but isn't", path.display()))?;
        inflated
    } else {
        raw
    };

    parse_ndjson(&bytes)
        .with_context(|| format!("💀 '{}' contains a line that isn't a record", path.display()))
}
