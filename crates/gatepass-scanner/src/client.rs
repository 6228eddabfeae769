//! HTTP client for the server's verify endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Header carrying the scanning operator.
const OPERATOR_HEADER: &str = "x-operator";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Api { status: u16, body: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyCall<'a> {
    payload: &'a str,
    attempt_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    registry_hint: Option<&'a str>,
}

/// Decision as returned by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReply {
    pub attempt_id: String,
    pub decision: String,
    #[serde(default)]
    pub reason_code: Option<String>,
    #[serde(default)]
    pub retryable: bool,
    #[serde(default)]
    pub record: Option<Value>,
    #[serde(default)]
    pub credential_id: Option<String>,
}

impl VerifyReply {
    pub fn is_granted(&self) -> bool {
        self.decision == "GRANTED"
    }

    pub fn display_name(&self) -> Option<&str> {
        self.record.as_ref()?.get("displayName")?.as_str()
    }

    /// One line for the station display.
    pub fn summary(&self) -> String {
        match (self.is_granted(), self.reason_code.as_deref()) {
            (true, _) => format!("GRANTED {}", self.display_name().unwrap_or("(unnamed)")),
            (false, Some(reason)) => format!("DENIED {reason}"),
            (false, None) => "DENIED".to_string(),
        }
    }
}

/// Where and how this station reports.
#[derive(Debug, Clone)]
pub struct StationConfig {
    pub server_url: String,
    pub operator: String,
    pub location: Option<String>,
    pub registry_hint: Option<String>,
    /// Attempts for a retryable denial, including the first.
    pub max_attempts: u32,
    pub backoff: Duration,
}

#[derive(Debug)]
pub struct VerifyClient {
    http: reqwest::Client,
    verify_url: String,
    config: StationConfig,
}

impl VerifyClient {
    pub fn new(config: StationConfig) -> Result<Self, ClientError> {
        // reqwest is built without a bundled crypto provider.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let verify_url = format!("{}/v1/verify", config.server_url.trim_end_matches('/'));
        Ok(Self {
            http,
            verify_url,
            config,
        })
    }

    /// Submit one scan. Retryable denials are retried with backoff under the
    /// same attempt id, so the server logs the attempt once.
    pub async fn verify(&self, payload: &str) -> Result<VerifyReply, ClientError> {
        let attempt_id = uuid::Uuid::new_v4().to_string();
        let mut delay = self.config.backoff;
        let mut attempt = 1;

        loop {
            let reply = self.send(payload, &attempt_id).await?;
            if !reply.retryable || attempt >= self.config.max_attempts {
                return Ok(reply);
            }
            warn!(
                attempt_id = %attempt_id,
                attempt,
                reason = reply.reason_code.as_deref().unwrap_or(""),
                "Retryable denial, backing off"
            );
            tokio::time::sleep(delay).await;
            delay *= 2;
            attempt += 1;
        }
    }

    async fn send(&self, payload: &str, attempt_id: &str) -> Result<VerifyReply, ClientError> {
        let body = VerifyCall {
            payload,
            attempt_id,
            location: self.config.location.as_deref(),
            registry_hint: self.config.registry_hint.as_deref(),
        };
        debug!(attempt_id, payload_len = payload.len(), "Submitting scan");

        let response = self
            .http
            .post(&self.verify_url)
            .header(OPERATOR_HEADER, &self.config.operator)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}
