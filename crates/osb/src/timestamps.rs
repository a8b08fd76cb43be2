//! ⏱️ Timestamp resolution. Every document leaves here with an `@timestamp`. No exceptions.
//!
//! 🎬 *[a record arrives. it has a `ts` field. it is a number. it was supposed to be a string.]*
//! *[the resolver shrugs and checks the next field.]*
//!
//! 🧠 Knowledge graph:
//! - Ordered strategy list: [`TimestampSource::PRECEDENCE`]. First `Some` wins.
//! - String fields are trusted verbatim. Numeric epochs are normalized to
//!   `YYYY-MM-DDThh:mm:ss.sssZ`.
//! - Nothing matches? The [`Clock`] decides. Resolution cannot fail.

use std::sync::Arc;

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde_json::Value;
use tracing::trace;

use crate::clock::Clock;
use crate::common::Record;

/// 🏷️ The reserved key every encoded document carries.
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// 🎯 One way of digging a timestamp out of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    /// A top-level field that already holds a formatted string.
    StringField(&'static str),
    /// `time_received_ns`: integer nanoseconds since the epoch.
    ReceivedNanos,
    /// `data.samples[0].timestamp`: milliseconds since the epoch (metrics payloads).
    FirstSampleMillis,
}

impl TimestampSource {
    /// 📜 Probe order. Do not reorder without updating every consumer's expectations.
    pub const PRECEDENCE: [TimestampSource; 5] = [
        TimestampSource::StringField("time"),
        TimestampSource::StringField("ts"),
        TimestampSource::StringField("timestamp"),
        TimestampSource::ReceivedNanos,
        TimestampSource::FirstSampleMillis,
    ];

    /// 🔍 Try this strategy. Wrong types and missing paths are `None`, never errors.
    pub fn extract(&self, record: &Record) -> Option<String> {
        match self {
            TimestampSource::StringField(name) => record
                .get(*name)
                .and_then(Value::as_str)
                .filter(|raw| !raw.is_empty())
                .map(str::to_owned),
            TimestampSource::ReceivedNanos => record
                .get("time_received_ns")
                .and_then(Value::as_i64)
                .map(DateTime::from_timestamp_nanos)
                .filter(fits_four_digit_year)
                .map(format_millis),
            TimestampSource::FirstSampleMillis => record
                .get("data")
                .and_then(|data| data.get("samples"))
                .and_then(|samples| samples.get(0))
                .and_then(|sample| sample.get("timestamp"))
                .and_then(epoch_millis)
                .and_then(DateTime::from_timestamp_millis)
                .filter(fits_four_digit_year)
                .map(format_millis),
        }
    }
}

// -- 🔢 integers pass straight through; floats are floored so sub-millisecond crumbs don't round up
fn epoch_millis(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|millis| millis.is_finite())
            .map(|millis| millis.floor() as i64)
    })
}

// -- 📏 years outside 0000..=9999 gain a sign and a fifth digit in RFC 3339; treat them as unusable
fn fits_four_digit_year(instant: &DateTime<Utc>) -> bool {
    (0..=9999).contains(&instant.year())
}

/// 📏 The one true output format: millisecond precision, `Z` suffix.
pub fn format_millis(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// ⏱️ Resolves the canonical timestamp of a record. Pure, apart from asking the clock.
#[derive(Debug, Clone)]
pub struct TimestampResolver {
    clock: Arc<dyn Clock>,
}

impl TimestampResolver {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// 🎯 First matching strategy wins; otherwise "now".
    pub fn resolve(&self, record: &Record) -> String {
        for source in TimestampSource::PRECEDENCE {
            if let Some(resolved) = source.extract(record) {
                trace!("⏱️ timestamp resolved via {:?}: {}", source, resolved);
                return resolved;
            }
        }
        let fallback = format_millis(self.clock.now());
        trace!("⏱️ no timestamp field found, falling back to the clock: {}", fallback);
        fallback
    }
}
