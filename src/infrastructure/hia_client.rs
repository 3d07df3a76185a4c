use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

pub const ACCESS_KEY_HEADER: &str = "x-hia-access-key";

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn status_text(&self) -> &'static str {
        StatusCode::from_u16(self.status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("Unknown Status")
    }

    pub fn error_message(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|body| body.get("error"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
    }
}

#[async_trait]
pub trait HiaClient: Send + Sync {
    async fn fetch_status(&self, access_key: &str) -> Result<UpstreamResponse, InfraError>;

    async fn ingest(&self, access_key: &str, body: &Value) -> Result<UpstreamResponse, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestHiaClient {
    client: Client,
    status_url: String,
    ingest_url: String,
}

impl ReqwestHiaClient {
    pub fn new(status_url: impl Into<String>, ingest_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            status_url: status_url.into(),
            ingest_url: ingest_url.into(),
        }
    }

    async fn read_response(response: reqwest::Response) -> Result<UpstreamResponse, InfraError> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|error| {
            InfraError::Network(format!("failed reading upstream response: {error}"))
        })?;
        let body = if body.trim().is_empty() {
            None
        } else {
            serde_json::from_str::<Value>(&body).ok()
        };
        Ok(UpstreamResponse { status, body })
    }
}

#[async_trait]
impl HiaClient for ReqwestHiaClient {
    async fn fetch_status(&self, access_key: &str) -> Result<UpstreamResponse, InfraError> {
        let response = self
            .client
            .get(&self.status_url)
            .header(ACCESS_KEY_HEADER, access_key)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|error| InfraError::Network(format!("status request failed: {error}")))?;
        Self::read_response(response).await
    }

    async fn ingest(&self, access_key: &str, body: &Value) -> Result<UpstreamResponse, InfraError> {
        let response = self
            .client
            .post(&self.ingest_url)
            .header(ACCESS_KEY_HEADER, access_key)
            .json(body)
            .send()
            .await
            .map_err(|error| InfraError::Network(format!("ingest request failed: {error}")))?;
        Self::read_response(response).await
    }
}
