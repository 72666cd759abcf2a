use super::{fetch_json, mock_seed, seeded_range, with_api_key, DataSource};
use crate::config::ProviderConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
    pub source: DataSource,
}

#[derive(Debug, Deserialize)]
struct ProviderGeocode {
    latitude: f64,
    longitude: f64,
    formatted_address: Option<String>,
}

/// Address to coordinates lookup
pub struct GeocodingClient {
    client: Client,
    config: ProviderConfig,
}

impl GeocodingClient {
    pub fn new(client: Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }

    pub async fn geocode(&self, address: &str) -> GeocodeResult {
        let Some(base_url) = &self.config.base_url else {
            debug!("Geocoding provider not configured, using mock data");
            return mock_geocode(address);
        };

        let request = with_api_key(
            self.client
                .get(format!("{}/geocode", base_url))
                .query(&[("address", address)]),
            &self.config,
        );

        match fetch_json::<ProviderGeocode>(request).await {
            Ok(found) if valid_coordinates(found.latitude, found.longitude) => GeocodeResult {
                latitude: found.latitude,
                longitude: found.longitude,
                formatted_address: found
                    .formatted_address
                    .unwrap_or_else(|| address.trim().to_string()),
                source: DataSource::Live,
            },
            Ok(found) => {
                warn!(
                    "Geocoding returned out-of-range coordinates ({}, {}), using mock data",
                    found.latitude, found.longitude
                );
                mock_geocode(address)
            }
            Err(e) => {
                warn!("Geocoding request failed ({}), using mock data", e);
                mock_geocode(address)
            }
        }
    }
}

fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

/// A point inside the continental US derived from the address
fn mock_geocode(address: &str) -> GeocodeResult {
    let seed = mock_seed(address);
    GeocodeResult {
        latitude: round6(seeded_range(seed, 25.0, 49.0)),
        longitude: round6(seeded_range(seed.rotate_left(21), -124.0, -67.0)),
        formatted_address: address.trim().to_string(),
        source: DataSource::Mock,
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
