//! 📦 Common data structures: the things that ferry records from "loosely structured"
//! to "the bulk API will accept this".
//!
//! 🧠 Knowledge graph:
//! - [`Record`]: one ingested event, straight from the wild. Just a JSON object.
//! - [`BatchRequest`]: what a caller asks for (create many, update one, delete some).
//! - [`BatchAction`]: routing metadata only. Never carries a payload.
//! - [`BatchEntry`]: action + optional document. Delete has no document.
//! - [`BatchBuffer`]: the serialized NDJSON lines, in order, ready for `_bulk`.
//!
//! ⚠️ Order is load-bearing everywhere here. Entry N in the buffer is item N in the response.

use serde::Serialize;
use serde_json::Value;

/// 📥 One ingested event. Unordered field name → arbitrary JSON.
pub type Record = serde_json::Map<String, Value>;

/// 🎯 Bulk action metadata line. Serializes as `{"create":{"_index":"..."}}` and friends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchAction {
    Create {
        #[serde(rename = "_index")]
        destination: String,
    },
    Update {
        #[serde(rename = "_index")]
        destination: String,
        #[serde(rename = "_id")]
        id: String,
    },
    Delete {
        #[serde(rename = "_index")]
        destination: String,
        #[serde(rename = "_id")]
        id: String,
    },
}

impl BatchAction {
    /// 🏷️ The key the backend will use for this entry in its `items` array.
    pub fn name(&self) -> &'static str {
        match self {
            BatchAction::Create { .. } => "create",
            BatchAction::Update { .. } => "update",
            BatchAction::Delete { .. } => "delete",
        }
    }

    pub fn destination(&self) -> &str {
        match self {
            BatchAction::Create { destination }
            | BatchAction::Update { destination, .. }
            | BatchAction::Delete { destination, .. } => destination,
        }
    }
}

/// 🧩 One unit of work: the action line plus (for create/update) the document line.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub action: BatchAction,
    pub document: Option<Value>,
}

/// 🗑️ A (destination, id) pair to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTarget {
    pub destination: String,
    pub id: String,
}

impl DeleteTarget {
    pub fn new(destination: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            id: id.into(),
        }
    }
}

/// 📨 What a caller wants done. Destinations may be date templates; they get resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchRequest {
    /// Index new documents. Each record is flattened and timestamped.
    Create {
        destination: String,
        records: Vec<Record>,
    },
    /// Partial update of one document.
    Update {
        destination: String,
        id: String,
        document: Record,
    },
    /// Remove documents by id.
    Delete { targets: Vec<DeleteTarget> },
}

impl BatchRequest {
    pub fn mode(&self) -> &'static str {
        match self {
            BatchRequest::Create { .. } => "create",
            BatchRequest::Update { .. } => "update",
            BatchRequest::Delete { .. } => "delete",
        }
    }
}

/// 📜 The serialized batch: NDJSON lines in entry order.
///
/// Lines are stored without terminators; [`BatchBuffer::into_payload`] terminates every line
/// with `\n`, which is exactly what `_bulk` wants (the final newline included).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchBuffer {
    lines: Vec<String>,
    entries: usize,
}

impl BatchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// ➕ Append one entry's worth of lines. The caller guarantees each line is one JSON value.
    pub(crate) fn push_entry(&mut self, action_line: String, document_line: Option<String>) {
        self.lines.push(action_line);
        if let Some(document_line) = document_line {
            self.lines.push(document_line);
        }
        self.entries += 1;
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// 🔢 Entries, not lines. A create is one entry and two lines.
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// 📏 Size of the payload this buffer will become, in bytes.
    pub fn payload_len(&self) -> usize {
        self.lines.iter().map(|line| line.len() + 1).sum()
    }

    /// 🚀 Render the wire payload. Consumes the buffer.
    pub fn into_payload(self) -> String {
        let mut payload = String::with_capacity(self.payload_len());
        for line in &self.lines {
            payload.push_str(line);
            payload.push('\n');
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_actions_wear_the_right_envelope() -> serde_json::Result<()> {
        let create = BatchAction::Create {
            destination: "logs".into(),
        };
        let delete = BatchAction::Delete {
            destination: "logs".into(),
            id: "42".into(),
        };
        assert_eq!(serde_json::to_string(&create)?, r#"{"create":{"_index":"logs"}}"#);
        assert_eq!(
            serde_json::to_string(&delete)?,
            r#"{"delete":{"_index":"logs","_id":"42"}}"#
        );
        assert_eq!(delete.name(), "delete");
        assert_eq!(delete.destination(), "logs");
        Ok(())
    }

    #[test]
    fn the_one_where_every_line_gets_its_newline() {
        let mut buffer = BatchBuffer::new();
        buffer.push_entry("a".into(), Some("b".into()));
        buffer.push_entry("c".into(), None);
        assert_eq!(buffer.entry_count(), 2);
        assert_eq!(buffer.lines().len(), 3);
        assert_eq!(buffer.payload_len(), 6);
        assert_eq!(buffer.into_payload(), "a\nb\nc\n");
    }
}
