use crate::domain::events::{EventEnvelope, NextSessionPayload, SessionEvent};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

/// Status document as reported by the accountability service. Timestamps and
/// durations stay loosely typed so that one malformed field does not reject
/// the whole poll.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(default)]
    pub active_session: Option<ActiveSessionPayload>,
    #[serde(default)]
    pub active_break: Option<ActiveBreakPayload>,
    #[serde(default)]
    pub blocklist: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ActiveSessionPayload {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub started_at: Option<Value>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub planned_duration_sec: Option<Value>,
    #[serde(default)]
    pub blocklist: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ActiveBreakPayload {
    #[serde(default)]
    pub started_at: Option<Value>,
    #[serde(default)]
    pub duration_sec: Option<Value>,
    #[serde(default)]
    pub next_session: Option<NextSessionStatusPayload>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct NextSessionStatusPayload {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub planned_duration_sec: Option<Value>,
    #[serde(default)]
    pub blocklist: Option<Vec<String>>,
}

#[async_trait]
pub trait LockInRemote: Send + Sync {
    async fn fetch_status(&self) -> Result<StatusResponse, InfraError>;

    async fn post_event(&self, envelope: &EventEnvelope) -> Result<Value, InfraError>;

    async fn start_session(
        &self,
        subject: &str,
        duration_sec: u64,
        blocklist: &[String],
    ) -> Result<Value, InfraError> {
        self.post_event(&EventEnvelope::now(SessionEvent::SessionStart {
            subject: subject.to_string(),
            planned_duration_sec: duration_sec,
            blocklist: blocklist.to_vec(),
        }))
        .await
    }

    async fn stop_session(&self, blocklist: &[String], reason: &str) -> Result<Value, InfraError> {
        self.post_event(&EventEnvelope::now(SessionEvent::SessionStop {
            reason: reason.to_string(),
            blocklist: blocklist.to_vec(),
        }))
        .await
    }

    async fn start_break(
        &self,
        duration_sec: u64,
        next_session: NextSessionPayload,
    ) -> Result<Value, InfraError> {
        self.post_event(&EventEnvelope::now(SessionEvent::BreakStart {
            duration_sec,
            next_session,
        }))
        .await
    }

    async fn stop_break(&self, blocklist: &[String], reason: &str) -> Result<Value, InfraError> {
        self.post_event(&EventEnvelope::now(SessionEvent::BreakStop {
            reason: reason.to_string(),
            blocklist: blocklist.to_vec(),
        }))
        .await
    }

    async fn skip_break(&self, blocklist: &[String]) -> Result<Value, InfraError> {
        self.post_event(&EventEnvelope::now(SessionEvent::BreakSkip {
            blocklist: blocklist.to_vec(),
        }))
        .await
    }

    async fn sync_blocklist(&self, blocklist: &[String]) -> Result<Value, InfraError> {
        self.post_event(&EventEnvelope::now(SessionEvent::SyncBlocklist {
            blocklist: blocklist.to_vec(),
        }))
        .await
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestLockInRemote {
    client: Client,
    relay_url: String,
}

impl ReqwestLockInRemote {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            relay_url: relay_url.into(),
        }
    }

    fn status_text(status: StatusCode) -> &'static str {
        status.canonical_reason().unwrap_or("Unknown Status")
    }

    fn upstream_error(status: StatusCode, body: &str, action: &str) -> InfraError {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|value| value.get("error").and_then(Value::as_str).map(str::to_string))
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| format!("Failed to {action}: {}", Self::status_text(status)));
        InfraError::Upstream {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl LockInRemote for ReqwestLockInRemote {
    async fn fetch_status(&self) -> Result<StatusResponse, InfraError> {
        let response = self
            .client
            .get(&self.relay_url)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|error| InfraError::Network(format!("Failed to fetch status: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InfraError::Upstream {
                status: status.as_u16(),
                message: format!("Failed to fetch status: {}", Self::status_text(status)),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Network(format!("failed reading status response: {error}")))?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn post_event(&self, envelope: &EventEnvelope) -> Result<Value, InfraError> {
        let action = envelope.event_type().action_label();
        let response = self
            .client
            .post(&self.relay_url)
            .json(envelope)
            .send()
            .await
            .map_err(|error| InfraError::Network(format!("Failed to {action}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Network(format!("failed reading {action} response: {error}")))?;

        if !status.is_success() {
            return Err(Self::upstream_error(status, &body, action));
        }
        if body.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        Ok(serde_json::from_str(&body)?)
    }
}
