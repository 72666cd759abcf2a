//! Proxies for third-party APIs.
//!
//! Every client answers even when its provider is unconfigured or failing:
//! the fallback is deterministic mock data tagged `source: "mock"`.

pub mod comps;
pub mod esign;
pub mod geocoding;
pub mod webhook;

pub use comps::{ComparableSale, CompsClient, CompsResult};
pub use esign::{ESignatureClient, EnvelopeResult};
pub use geocoding::{GeocodeResult, GeocodingClient};
pub use webhook::{NotificationDispatcher, OutboundMessage};

use crate::config::{IntegrationsConfig, ProviderConfig};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Where an integration answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    Mock,
}

/// All third-party clients, built once at startup
pub struct Integrations {
    pub esign: Arc<ESignatureClient>,
    pub geocoding: Arc<GeocodingClient>,
    pub comps: Arc<CompsClient>,
    pub dispatcher: NotificationDispatcher,
}

impl Integrations {
    pub fn from_config(config: &IntegrationsConfig) -> Self {
        let client = http_client(config.timeout());
        Self {
            esign: Arc::new(ESignatureClient::new(client.clone(), config.esign.clone())),
            geocoding: Arc::new(GeocodingClient::new(client.clone(), config.geocoding.clone())),
            comps: Arc::new(CompsClient::new(client.clone(), config.comps.clone())),
            dispatcher: NotificationDispatcher::new(client, config.notify_webhook_url.clone()),
        }
    }
}

pub(crate) fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Attach the provider's API key, when it has one
pub(crate) fn with_api_key(request: RequestBuilder, provider: &ProviderConfig) -> RequestBuilder {
    match &provider.api_key {
        Some(key) => request.bearer_auth(key),
        None => request,
    }
}

/// Send a request and decode a JSON body, flattening every failure to a message
pub(crate) async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, String> {
    let response = request.send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("provider returned {}", status));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| format!("undecodable body: {}", e))
}

/// Stable 64-bit seed for mock data so the same input always yields the same answer
pub(crate) fn mock_seed(input: &str) -> u64 {
    let digest = Sha256::digest(input.trim().to_lowercase().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Map a seed onto `[low, high)`
pub(crate) fn seeded_range(seed: u64, low: f64, high: f64) -> f64 {
    let unit = (seed % 1_000_000) as f64 / 1_000_000.0;
    low + unit * (high - low)
}
