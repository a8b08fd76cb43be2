//! 📬 Reading the bulk response: who made it, who didn't, and what to tell the caller.
//!
//! 🧠 Knowledge graph:
//! - Non-2xx status → the whole call was refused. Decode the top-level error envelope into
//!   [`BulkError::Rejected`]. There are no items to look at.
//! - 2xx → decode `items`. Every item is scanned. Status > 299 is a failure.
//! - The FIRST failure becomes the aggregate [`BulkError::Item`]. The rest are still in
//!   [`BatchOutcome::items`] for anyone who cares to look.
//! - Nothing is retried or re-split here. Failures are reported, not corrected.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{trace, warn};

use crate::error::{BulkError, BulkResult};

/// ❌ Anything above this is a failed item.
pub const MAX_SUCCESS_STATUS: u16 = 299;

/// 📦 The `_bulk` success body. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BTreeMap<String, ItemResponse>>,
}

/// 🎯 One entry of `items`, minus the action key wrapping it.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemResponse {
    #[serde(rename = "_index", default)]
    pub index: Option<String>,
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    pub status: u16,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}

/// 🔍 The backend's error object. Same shape at item level and envelope level,
/// give or take which fields it feels like filling in.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub root_cause: Vec<ErrorDetail>,
    #[serde(default)]
    pub caused_by: Option<Box<ErrorDetail>>,
}

impl ErrorDetail {
    fn kind_or_unknown(&self) -> String {
        self.kind.clone().unwrap_or_else(|| "unknown".to_string())
    }

    fn summary(&self) -> String {
        match (&self.kind, &self.reason) {
            (Some(kind), Some(reason)) => format!("{kind}: {reason}"),
            (Some(kind), None) => kind.clone(),
            (None, Some(reason)) => reason.clone(),
            (None, None) => String::new(),
        }
    }

    /// 🧅 `root_cause[0]` if present, otherwise the `caused_by` chain's first link.
    pub fn cause(&self) -> String {
        self.root_cause
            .first()
            .or(self.caused_by.as_deref())
            .map(ErrorDetail::summary)
            .unwrap_or_default()
    }
}

/// 🛑 `{"error": {...} | "...", "status": 400}`
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: EnvelopeError,
    #[serde(default)]
    pub status: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EnvelopeError {
    Detailed(ErrorDetail),
    Plain(String),
}

/// 💔 Why one entry failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub kind: String,
    pub reason: String,
    pub cause: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Succeeded { result: Option<String> },
    Failed(ItemFailure),
}

/// 📋 The fate of one entry, at the same position it had in the batch (0-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub position: usize,
    pub action: String,
    pub index: Option<String>,
    pub id: Option<String>,
    pub status: u16,
    pub outcome: ItemStatus,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ItemStatus::Succeeded { .. })
    }
}

/// 📊 Everything one bulk response told us.
#[derive(Debug)]
pub struct BatchOutcome {
    pub took_ms: u64,
    pub items: Vec<ItemOutcome>,
    /// The aggregate of the first failed item, when any item failed.
    pub error: Option<BulkError>,
}

impl BatchOutcome {
    pub fn failed_count(&self) -> usize {
        self.items.iter().filter(|item| !item.is_success()).count()
    }

    pub fn succeeded_count(&self) -> usize {
        self.items.len() - self.failed_count()
    }

    /// 🎯 Treat a partially failed batch as an error. The per-item detail is dropped.
    pub fn into_result(self) -> BulkResult<BatchOutcome> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// 🛑 Turn a refused call into [`BulkError::Rejected`]. Unparseable bodies still get reported.
pub fn rejection(status: u16, body: &str) -> BulkError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error: EnvelopeError::Detailed(detail),
            status: reported,
        }) => BulkError::Rejected {
            status: reported.unwrap_or(status),
            kind: detail.kind_or_unknown(),
            reason: detail.reason.clone().unwrap_or_default(),
            cause: detail.cause(),
        },
        Ok(ErrorEnvelope {
            error: EnvelopeError::Plain(reason),
            status: reported,
        }) => BulkError::Rejected {
            status: reported.unwrap_or(status),
            kind: "unknown".to_string(),
            reason,
            cause: String::new(),
        },
        Err(_) => BulkError::Rejected {
            status,
            kind: "unknown".to_string(),
            reason: body.trim().to_string(),
            cause: String::new(),
        },
    }
}

/// 📬 Classify a transport response into a [`BatchOutcome`].
///
/// Returns `Err` only when there are no per-item results to report: the call was
/// refused, or the body was not a bulk response.
pub fn classify(status: u16, body: &str) -> BulkResult<BatchOutcome> {
    if !(200..=MAX_SUCCESS_STATUS).contains(&status) {
        return Err(rejection(status, body));
    }

    let response: BulkResponse = serde_json::from_str(body)
        .map_err(|err| BulkError::MalformedResponse(err.to_string()))?;

    let total = response.items.len();
    let mut items = Vec::with_capacity(total);
    let mut first_failure: Option<(usize, ItemFailure)> = None;

    for (position, wrapped) in response.items.into_iter().enumerate() {
        let Some((action, item)) = wrapped.into_iter().next() else {
            return Err(BulkError::MalformedResponse(format!(
                "item at position {position} carries no action"
            )));
        };

        let outcome = if item.status > MAX_SUCCESS_STATUS {
            let detail = item.error.clone().unwrap_or_default();
            let failure = ItemFailure {
                kind: detail.kind_or_unknown(),
                reason: detail
                    .reason
                    .clone()
                    .or_else(|| item.result.clone())
                    .unwrap_or_else(|| format!("status {}", item.status)),
                cause: detail.cause(),
            };
            warn!(
                "⚠️ bulk {} at position {} into {:?} failed with {}: [{}] {}",
                action,
                position,
                item.index.as_deref().unwrap_or("?"),
                item.status,
                failure.kind,
                failure.reason
            );
            if first_failure.is_none() {
                first_failure = Some((position, failure.clone()));
            }
            ItemStatus::Failed(failure)
        } else {
            trace!(
                "✅ bulk {} at position {} landed in {:?}",
                action,
                position,
                item.index.as_deref().unwrap_or("?")
            );
            ItemStatus::Succeeded {
                result: item.result.clone(),
            }
        };

        items.push(ItemOutcome {
            position,
            action,
            index: item.index,
            id: item.id,
            status: item.status,
            outcome,
        });
    }

    let failed = items.iter().filter(|item| !item.is_success()).count();
    let error = first_failure.map(|(position, failure)| BulkError::Item {
        position,
        failed,
        total,
        kind: failure.kind,
        reason: failure.reason,
        cause: failure.cause,
    });

    Ok(BatchOutcome {
        took_ms: response.took,
        items,
        error,
    })
}
