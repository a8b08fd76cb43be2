//! 📦 A transport that never forgets and never leaves the process.
//!
//! Every payload is kept for later inspection. Scripted responses are replayed in order;
//! once the script runs out, every entry in the payload is acknowledged as a success.
//! Handy for dry runs, and for tests that want to count how often the network was bothered.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use super::{BulkTransport, TransportResponse};

/// 🔒 Clone-able: clones share the same vault, so a test can keep a handle while the
/// worker owns another.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTransport {
    received: Arc<Mutex<Vec<String>>>,
    script: Arc<Mutex<VecDeque<Result<TransportResponse>>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🎬 Queue the next answer. Scripted answers are used before any synthesized ones.
    pub async fn script(&self, response: Result<TransportResponse>) {
        self.script.lock().await.push_back(response);
    }

    /// 📜 Every payload received so far, in arrival order.
    pub async fn received(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }

    pub async fn invocations(&self) -> usize {
        self.received.lock().await.len()
    }
}

#[async_trait]
impl BulkTransport for InMemoryTransport {
    async fn execute_bulk(&self, payload: String) -> Result<TransportResponse> {
        let scripted = self.script.lock().await.pop_front();
        let response = match scripted {
            Some(scripted) => scripted,
            None => Ok(acknowledge_everything(&payload)),
        };
        self.received.lock().await.push(payload);
        response
    }
}

/// ✅ Build a `_bulk` success body with one item per action line in `payload`.
fn acknowledge_everything(payload: &str) -> TransportResponse {
    let mut items = Vec::new();
    let mut lines = payload.lines().filter(|line| !line.trim().is_empty());
    while let Some(line) = lines.next() {
        let Ok(Value::Object(action)) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        let Some((name, meta)) = action.into_iter().next() else {
            continue;
        };
        let (status, result) = match name.as_str() {
            "create" | "index" => (201, "created"),
            "update" => (200, "updated"),
            "delete" => (200, "deleted"),
            _ => continue,
        };
        // -- 📄 create/index/update are followed by a document line; skip it
        if name != "delete" {
            lines.next();
        }
        let mut item = Map::new();
        item.insert("_index".into(), meta.get("_index").cloned().unwrap_or(Value::Null));
        item.insert("_id".into(), meta.get("_id").cloned().unwrap_or(Value::Null));
        item.insert("status".into(), json!(status));
        item.insert("result".into(), json!(result));
        let mut wrapped = Map::new();
        wrapped.insert(name, Value::Object(item));
        items.push(Value::Object(wrapped));
    }
    let body = json!({ "took": 0, "errors": false, "items": items });
    TransportResponse::new(200, body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[tokio::test]
    async fn the_one_where_every_action_gets_a_thumbs_up() -> Result<()> {
        let transport = InMemoryTransport::new();
        // -- 🪤 the document line looks like an action; it must still be skipped
        let payload = "{\"create\":{\"_index\":\"a\"}}\n{\"delete\":\"not really\"}\n\
                       {\"delete\":{\"_index\":\"a\",\"_id\":\"9\"}}\n";
        let response = transport.execute_bulk(payload.to_string()).await?;

        let body: Value = serde_json::from_str(&response.body)?;
        let items = body["items"].as_array().cloned().unwrap_or_default();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["create"]["status"], 201);
        assert_eq!(items[1]["delete"]["_id"], "9");
        assert_eq!(transport.received().await, vec![payload.to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_script_goes_first() -> Result<()> {
        let transport = InMemoryTransport::new();
        transport.script(Err(anyhow!("connection refused"))).await;
        transport
            .script(Ok(TransportResponse::new(500, "boom")))
            .await;

        assert!(transport.execute_bulk("x".into()).await.is_err());
        assert_eq!(transport.execute_bulk("y".into()).await?.status, 500);
        assert_eq!(transport.execute_bulk("z".into()).await?.status, 200);
        assert_eq!(transport.invocations().await, 3);
        Ok(())
    }
}
