use crate::domain::events::{EventType, WebhookNotification, webhook_notification_for};
use crate::infrastructure::hia_client::HiaClient;
use crate::infrastructure::secondary_webhook::SecondaryWebhook;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub const MISSING_KEY_MESSAGE: &str = "Server configuration error: API key missing";

#[derive(Debug, Clone, PartialEq)]
pub struct RelayResponse {
    pub status: u16,
    pub body: Value,
}

impl RelayResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::new(status, json!({ "error": message.into() }))
    }
}

#[derive(Debug)]
pub struct RelayOutcome {
    pub response: RelayResponse,
    pub webhook: Option<JoinHandle<()>>,
}

impl From<RelayResponse> for RelayOutcome {
    fn from(response: RelayResponse) -> Self {
        Self {
            response,
            webhook: None,
        }
    }
}

pub struct RelayService<H, W>
where
    H: HiaClient,
    W: SecondaryWebhook + 'static,
{
    hia: Arc<H>,
    webhook: Arc<W>,
    access_key: Option<String>,
}

impl<H, W> RelayService<H, W>
where
    H: HiaClient,
    W: SecondaryWebhook + 'static,
{
    pub fn new(hia: Arc<H>, webhook: Arc<W>, access_key: Option<String>) -> Self {
        Self {
            hia,
            webhook,
            access_key: access_key.filter(|key| !key.trim().is_empty()),
        }
    }

    pub async fn status(&self) -> RelayResponse {
        let Some(access_key) = self.access_key.as_deref() else {
            warn!("status requested without an access key configured");
            return RelayResponse::error(500, MISSING_KEY_MESSAGE);
        };

        match self.hia.fetch_status(access_key).await {
            Ok(upstream) if upstream.is_success() => RelayResponse::new(
                upstream.status,
                upstream.body.unwrap_or_else(|| json!({})),
            ),
            Ok(upstream) => {
                warn!(status = upstream.status, "status upstream answered with an error");
                RelayResponse::error(
                    upstream.status,
                    format!("Upstream error: {}", upstream.status_text()),
                )
            }
            Err(error) => {
                warn!(%error, "status upstream unreachable");
                RelayResponse::error(500, error.to_string())
            }
        }
    }

    pub async fn handle_event(&self, body: Value) -> RelayOutcome {
        let Some(access_key) = self.access_key.as_deref() else {
            warn!("event received without an access key configured");
            return RelayResponse::error(500, MISSING_KEY_MESSAGE).into();
        };

        let event_type = body
            .get("event_type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let blocklist = blocklist_of(&body);

        if EventType::parse(&event_type) == Some(EventType::SyncBlocklist) {
            let notification = webhook_notification_for(&event_type, blocklist);
            notify(self.webhook.as_ref(), &notification).await;
            info!(event = %notification.event, "blocklist synced");
            return RelayResponse::new(
                200,
                json!({ "success": true, "processed_event": EventType::SyncBlocklist.as_str() }),
            )
            .into();
        }

        match self.hia.ingest(access_key, &body).await {
            Ok(upstream) if upstream.is_success() => {
                info!(event_type = %event_type, status = upstream.status, "event relayed");
                let notification = webhook_notification_for(&event_type, blocklist);
                let webhook = Arc::clone(&self.webhook);
                RelayOutcome {
                    response: RelayResponse::new(
                        upstream.status,
                        upstream.body.unwrap_or_else(|| json!({})),
                    ),
                    webhook: Some(tokio::spawn(async move {
                        notify(webhook.as_ref(), &notification).await;
                    })),
                }
            }
            Ok(upstream) => {
                let message = upstream
                    .error_message()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Upstream error: {}", upstream.status_text()));
                warn!(
                    event_type = %event_type,
                    status = upstream.status,
                    %message,
                    "upstream rejected event"
                );
                RelayResponse::error(upstream.status, message).into()
            }
            Err(error) => {
                // Unblocking must not depend on HIA being reachable.
                if EventType::parse(&event_type).is_some_and(EventType::is_stopping) {
                    let notification = webhook_notification_for(&event_type, blocklist);
                    notify(self.webhook.as_ref(), &notification).await;
                }
                warn!(event_type = %event_type, %error, "event could not be relayed");
                RelayResponse::error(500, error.to_string()).into()
            }
        }
    }
}

fn blocklist_of(body: &Value) -> Vec<String> {
    body.get("blocklist")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

async fn notify<W>(webhook: &W, notification: &WebhookNotification)
where
    W: SecondaryWebhook + ?Sized,
{
    if let Err(error) = webhook.notify(notification).await {
        warn!(event = %notification.event, %error, "secondary webhook failed");
    }
}
