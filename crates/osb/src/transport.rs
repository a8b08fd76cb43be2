//! 🔌 Transports: the thing that actually puts the NDJSON on the wire.
//!
//! 🚰 This layer is I/O only. It doesn't validate, encode, retry or classify. It takes a
//! payload, executes one `_bulk` call, and hands back the status and body. Whatever the
//! backend thinks of our documents is `outcome`'s problem.
//!
//! 🧠 Knowledge graph:
//! - Pattern: trait → concrete impls ([`ElasticsearchTransport`], [`InMemoryTransport`])
//!   → [`TransportBackend`] enum → `from_config` resolver. Same shape as the config enum.
//! - Exactly one owner at a time: the submission worker. No locking in here.
//! - Errors are `anyhow` with context. The worker wraps them in `BulkError::Transport`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

pub mod elasticsearch;
pub mod in_mem;

pub use elasticsearch::{ElasticsearchTransport, ElasticsearchTransportConfig};
pub use in_mem::InMemoryTransport;

/// 📬 Whatever the backend said, unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// 📡 Executes a single bulk call.
///
/// # Contract
/// - `Ok` means the backend answered, with any status. A 400 is still `Ok` here.
/// - `Err` means there is no answer: connection refused, timeout, TLS sulking.
/// - No retries. No timeouts beyond what the implementation's client enforces.
#[async_trait]
pub trait BulkTransport: std::fmt::Debug + Send + Sync {
    async fn execute_bulk(&self, payload: String) -> Result<TransportResponse>;
}

/// 🔧 Which transport to build. TOML: `[transport.Elasticsearch]` or `[transport.InMemory]`.
///
/// The lowercase aliases exist because figment lowercases environment variable keys.
#[derive(Debug, Deserialize, Clone)]
pub enum TransportConfig {
    #[serde(alias = "elasticsearch")]
    Elasticsearch(ElasticsearchTransportConfig),
    /// 🧪 Dry run. Nothing leaves the process; every entry is acknowledged.
    #[serde(alias = "inmemory")]
    InMemory(InMemoryTransportConfig),
}

/// 🧪 No knobs. The table just has to exist.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct InMemoryTransportConfig {}

/// 🎭 Enum dispatch over the concrete transports, so the worker never needs a `Box<dyn>`.
#[derive(Debug)]
pub enum TransportBackend {
    Elasticsearch(ElasticsearchTransport),
    InMemory(InMemoryTransport),
}

impl TransportBackend {
    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        Ok(match config {
            TransportConfig::Elasticsearch(es_config) => TransportBackend::Elasticsearch(
                ElasticsearchTransport::new(es_config.clone())
                    .context("💀 Could not stand up the Elasticsearch transport")?,
            ),
            TransportConfig::InMemory(_) => TransportBackend::InMemory(InMemoryTransport::new()),
        })
    }
}

#[async_trait]
impl BulkTransport for TransportBackend {
    async fn execute_bulk(&self, payload: String) -> Result<TransportResponse> {
        match self {
            TransportBackend::Elasticsearch(transport) => transport.execute_bulk(payload).await,
            TransportBackend::InMemory(transport) => transport.execute_bulk(payload).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_in_memory_config_resolves_to_in_memory() -> Result<()> {
        let backend = TransportBackend::from_config(&TransportConfig::InMemory(
            InMemoryTransportConfig::default(),
        ))?;
        assert!(matches!(backend, TransportBackend::InMemory(_)));
        Ok(())
    }

    #[test]
    fn the_one_where_es_config_resolves_to_es() -> Result<()> {
        let backend = TransportBackend::from_config(&TransportConfig::Elasticsearch(
            ElasticsearchTransportConfig {
                url: "http://localhost:9200".into(),
                username: None,
                password: None,
                api_key: None,
                connect_timeout_secs: 1,
                request_timeout_secs: 1,
            },
        ))?;
        assert!(matches!(backend, TransportBackend::Elasticsearch(_)));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_dispatch_reaches_the_inner_transport() -> Result<()> {
        let inner = InMemoryTransport::new();
        let backend = TransportBackend::InMemory(inner.clone());
        let response = backend
            .execute_bulk("{\"delete\":{\"_index\":\"x\",\"_id\":\"1\"}}\n".into())
            .await?;
        assert_eq!(response.status, 200);
        assert_eq!(inner.invocations().await, 1);
        Ok(())
    }
}
