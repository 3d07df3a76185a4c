use crate::domain::events::WebhookNotification;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;

#[async_trait]
pub trait SecondaryWebhook: Send + Sync {
    async fn notify(&self, notification: &WebhookNotification) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestSecondaryWebhook {
    client: Client,
    url: Option<String>,
}

impl ReqwestSecondaryWebhook {
    pub fn new(url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

#[async_trait]
impl SecondaryWebhook for ReqwestSecondaryWebhook {
    async fn notify(&self, notification: &WebhookNotification) -> Result<(), InfraError> {
        let Some(url) = self.url.as_deref() else {
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .json(notification)
            .send()
            .await
            .map_err(|error| InfraError::Network(format!("secondary webhook request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InfraError::Upstream {
                status: status.as_u16(),
                message: format!("secondary webhook answered http {}", status.as_u16()),
            });
        }
        Ok(())
    }
}
