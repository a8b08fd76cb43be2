//! 💀 The error taxonomy. Every way a batch can go sideways, with a name tag.
//!
//! 🧠 Knowledge graph:
//! - `Validation` / `Encoding` / `Decode`: caught before the network. Nothing was sent.
//! - `Transport`: the collaborator never produced a response. No partial side effects assumed.
//! - `Rejected`: the backend answered, but refused the whole call (top-level error envelope).
//! - `MalformedResponse`: the backend answered in a dialect we could not parse.
//! - `Item`: the call worked, some entries did not. Only the FIRST failure is surfaced here.
//! - `SubmitterClosed`: the single-writer worker is gone. Someone dropped the last handle, or it died.
//!
//! Errors are values. Nothing in this crate panics on bad input. 🦆

use thiserror::Error;

/// 📦 Convenience alias, because typing the full thing is a tax on joy.
pub type BulkResult<T> = std::result::Result<T, BulkError>;

#[derive(Debug, Error)]
pub enum BulkError {
    /// 🚫 Inputs were missing or malformed. Never encoded, never sent.
    #[error("💀 batch rejected before encoding: {0}")]
    Validation(String),

    /// 🧱 A document refused to become JSON. Nothing was submitted.
    #[error("💀 failed to encode batch: {0}")]
    Encoding(#[from] serde_json::Error),

    /// 📥 An input line could not be decoded into a record.
    #[error("💀 input line {line} is not a JSON object: {reason}")]
    Decode { line: usize, reason: String },

    /// 📡 The transport could not execute the call at all.
    #[error("💀 transport failed to execute the bulk call: {0:#}")]
    Transport(anyhow::Error),

    /// 🛑 The backend refused the whole request before any per-item results existed.
    #[error("💀 bulk call rejected with status {status}: [{kind}] {reason} (cause: {cause})")]
    Rejected {
        status: u16,
        kind: String,
        reason: String,
        cause: String,
    },

    /// 🤷 The backend answered, but not in a shape we recognise.
    #[error("💀 bulk response could not be decoded: {0}")]
    MalformedResponse(String),

    /// ⚠️ At least one entry failed. This carries the first one; the outcome carries the rest.
    #[error(
        "💀 {failed} of {total} bulk items failed, first at position {position}: [{kind}] {reason} (cause: {cause})"
    )]
    Item {
        position: usize,
        failed: usize,
        total: usize,
        kind: String,
        reason: String,
        cause: String,
    },

    /// 🪦 The submission worker is no longer accepting jobs.
    #[error("💀 submission worker is closed; no further batches can be sent")]
    SubmitterClosed,
}

impl BulkError {
    /// 🔧 Shorthand for the most common failure in this crate: a caller forgot something.
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        BulkError::Validation(message.into())
    }

    /// 🔍 True when nothing reached the network because of this error.
    pub fn is_pre_submission(&self) -> bool {
        matches!(
            self,
            BulkError::Validation(_) | BulkError::Encoding(_) | BulkError::Decode { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_item_errors_tell_you_who_failed_first() {
        let err = BulkError::Item {
            position: 1,
            failed: 1,
            total: 3,
            kind: "mapper_parsing_exception".into(),
            reason: "failed to parse field [bytes]".into(),
            cause: "illegal_argument_exception: not a number".into(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("1 of 3"));
        assert!(rendered.contains("mapper_parsing_exception"));
        assert!(!err.is_pre_submission());
    }

    #[test]
    fn the_one_where_validation_never_left_the_building() {
        assert!(BulkError::validation("no id").is_pre_submission());
        assert!(!BulkError::SubmitterClosed.is_pre_submission());
    }
}
