use std::time::Duration;

use async_trait::async_trait;
use pricebot_core::{config::MessengerConfig, OutboundMessage};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("send api request failed: {0}")]
    Transport(String),
    #[error("send api rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("send api response could not be decoded: {0}")]
    Decode(String),
    #[error("send api call timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SendReceipt {
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
}

#[async_trait]
pub trait SendApi: Send + Sync {
    async fn send_message(&self, message: &OutboundMessage) -> Result<SendReceipt, DeliveryError>;

    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<SendReceipt, DeliveryError> {
        self.send_message(&OutboundMessage::text(recipient_id, text)).await
    }
}

pub struct GraphSendClient {
    client: Client,
    base_url: String,
    page_access_token: SecretString,
    timeout: Duration,
}

impl GraphSendClient {
    pub fn new(
        base_url: &str,
        page_access_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| DeliveryError::Transport(error.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            page_access_token,
            timeout,
        })
    }

    pub fn from_config(config: &MessengerConfig) -> Result<Self, DeliveryError> {
        Self::new(
            &config.graph_api_base_url,
            config.page_access_token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl SendApi for GraphSendClient {
    async fn send_message(&self, message: &OutboundMessage) -> Result<SendReceipt, DeliveryError> {
        let response = self
            .client
            .post(format!("{}/me/messages", self.base_url))
            .query(&[("access_token", self.page_access_token.expose_secret())])
            .json(message)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    DeliveryError::Timeout(self.timeout)
                } else {
                    // reqwest errors carry the URL, which includes the access token.
                    DeliveryError::Transport(error.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "egress.send_api.rejected",
                recipient_id = %message.recipient_id,
                status = status.as_u16(),
                body = %body,
                "send api rejected message"
            );
            return Err(DeliveryError::Rejected { status: status.as_u16(), body });
        }

        let receipt: SendReceipt =
            response.json().await.map_err(|error| DeliveryError::Decode(error.to_string()))?;
        match receipt.message_id.as_deref() {
            Some(message_id) => info!(
                event_name = "egress.send_api.delivered",
                recipient_id = %message.recipient_id,
                message_id,
                "sent message"
            ),
            None => info!(
                event_name = "egress.send_api.delivered",
                recipient_id = %message.recipient_id,
                "send api call succeeded without message id"
            ),
        }
        Ok(receipt)
    }
}
