use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

/// One email or SMS handed to the delivery provider
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub channel: &'static str, // "email" | "sms"
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutboundMessage {
    pub fn email(to: &str, subject: &str, body: &str) -> Self {
        Self {
            channel: "email",
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }

    pub fn sms(to: &str, subject: &str, body: &str) -> Self {
        Self {
            channel: "sms",
            to: to.to_string(),
            subject: subject.to_string(),
            body: format!("{}: {}", subject, body),
        }
    }
}

/// Posts email/SMS payloads to a delivery webhook. A no-op without a URL.
#[derive(Clone)]
pub struct NotificationDispatcher {
    client: Client,
    url: Option<String>,
}

impl NotificationDispatcher {
    pub fn new(client: Client, url: Option<String>) -> Self {
        Self { client, url }
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Deliver a message; returns whether the provider accepted it
    pub async fn dispatch(&self, message: &OutboundMessage) -> bool {
        let Some(url) = &self.url else {
            return false;
        };

        match self.client.post(url).json(message).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Dispatched {} to {}", message.channel, message.to);
                true
            }
            Ok(response) => {
                warn!(
                    "Delivery webhook rejected {} to {}: {}",
                    message.channel,
                    message.to,
                    response.status()
                );
                false
            }
            Err(e) => {
                warn!("Delivery webhook unreachable: {}", e);
                false
            }
        }
    }
}
