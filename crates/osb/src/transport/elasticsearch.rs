//! 📡 The Elasticsearch / OpenSearch transport. One POST to `/_bulk`, no questions asked.
//!
//! 🎬 *[INT. SERVER ROOM. 3:47 AM. the cluster is yellow. the coffee is cold.]*
//! *["it's just one HTTP call," someone said. they were right. it's the rest that hurts.]*
//!
//! ⚠️ This transport does not retry, does not split, and does not read the body beyond
//! handing it back. Timeouts live on the `reqwest::Client`; this layer imposes none of its own.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, trace};

use super::{BulkTransport, TransportResponse};

/// 🔧 Where the cluster lives and how to get past the bouncer.
#[derive(Debug, Deserialize, Clone)]
pub struct ElasticsearchTransportConfig {
    /// 📡 Base URL, scheme and port included. `localhost` alone is a wish, not a URL.
    pub url: String,
    /// 🔒 Basic auth username. Optional, like flossing.
    #[serde(default)]
    pub username: Option<String>,
    /// 🔒 Basic auth password. If this is plaintext in a repo, we need to talk.
    #[serde(default)]
    pub password: Option<String>,
    /// 🔒 API key. Wins over basic auth when both are set.
    #[serde(default)]
    pub api_key: Option<String>,
    /// ⏱️ How long to wait for a TCP handshake.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// ⏱️ How long to wait for the whole bulk call. Bulk calls can be meaty.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// 📡 `reqwest`-backed bulk executor. The client is reused across calls.
#[derive(Debug)]
pub struct ElasticsearchTransport {
    client: reqwest::Client,
    config: ElasticsearchTransportConfig,
}

impl ElasticsearchTransport {
    pub fn new(config: ElasticsearchTransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. Probably TLS. It's usually TLS.")?;
        Ok(Self { client, config })
    }

    fn bulk_url(&self) -> String {
        format!("{}/_bulk", self.config.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl BulkTransport for ElasticsearchTransport {
    async fn execute_bulk(&self, payload: String) -> Result<TransportResponse> {
        let bulk_url = self.bulk_url();
        debug!("📡 POST {} with {} bytes of NDJSON", bulk_url, payload.len());

        // ⚠️ application/x-ndjson, not application/json. The cluster notices.
        let mut request = self
            .client
            .post(&bulk_url)
            .header("Content-Type", "application/x-ndjson");

        // -- 🔒 api_key beats basic auth in this club
        if let Some(ref api_key) = self.config.api_key {
            request = request.header("Authorization", format!("ApiKey {}", api_key));
        } else if let Some(ref username) = self.config.username {
            request = request.basic_auth(username, self.config.password.as_ref());
        }

        let response = request.body(payload).send().await.with_context(|| {
            format!(
                "💀 The bulk request never reached '{}'. Check connectivity, check timeouts, check the cluster is actually up.",
                bulk_url
            )
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("💀 The cluster answered, then trailed off mid-sentence. Could not read the response body.")?;
        trace!("📬 bulk call answered {} with {} bytes", status, body.len());

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> ElasticsearchTransportConfig {
        ElasticsearchTransportConfig {
            // -- 🪤 trailing slash on purpose; the URL builder has to cope
            url: format!("{}/", server.uri()),
            username: None,
            password: None,
            api_key: Some("c2VjcmV0".into()),
            connect_timeout_secs: 2,
            request_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn the_one_where_the_payload_lands_as_ndjson() -> Result<()> {
        let server = MockServer::start().await;
        let payload = "{\"create\":{\"_index\":\"logs\"}}\n{\"a\":1}\n";
        let canned = json!({
            "took": 3, "errors": false,
            "items": [ { "create": { "_index": "logs", "status": 201, "result": "created" } } ]
        });

        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .and(header("Content-Type", "application/x-ndjson"))
            .and(header("Authorization", "ApiKey c2VjcmV0"))
            .and(body_string(payload))
            .respond_with(ResponseTemplate::new(200).set_body_json(&canned))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ElasticsearchTransport::new(config_for(&server))?;
        let response = transport.execute_bulk(payload.to_string()).await?;

        assert_eq!(response.status, 200);
        let echoed: serde_json::Value = serde_json::from_str(&response.body)?;
        assert_eq!(echoed, canned);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_400_is_still_an_answer() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"error":{"type":"illegal_argument_exception","reason":"The bulk request must be terminated by a newline [\n]"},"status":400}"#,
            ))
            .mount(&server)
            .await;

        let transport = ElasticsearchTransport::new(config_for(&server))?;
        let response = transport.execute_bulk("{}".to_string()).await?;
        assert_eq!(response.status, 400);
        assert!(response.body.contains("illegal_argument_exception"));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_nobody_is_home() -> Result<()> {
        // -- 🕳️ port 1 on localhost: reserved, and nobody listens there
        let transport = ElasticsearchTransport::new(ElasticsearchTransportConfig {
            url: "http://127.0.0.1:1".into(),
            username: Some("elastic".into()),
            password: Some("changeme".into()),
            api_key: None,
            connect_timeout_secs: 1,
            request_timeout_secs: 1,
        })?;
        let result = transport.execute_bulk("{}\n".to_string()).await;
        assert!(result.is_err(), "a refused connection has no status to report");
        Ok(())
    }
}
