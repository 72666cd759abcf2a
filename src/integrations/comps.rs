use super::{fetch_json, mock_seed, seeded_range, with_api_key, DataSource};
use crate::config::ProviderConfig;
use chrono::{Duration, NaiveDate, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const MOCK_COMP_COUNT: u64 = 4;

/// A recently sold nearby property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparableSale {
    pub address: String,
    pub sale_price: Decimal,
    pub sale_date: NaiveDate,
    pub square_feet: Option<i32>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<Decimal>,
    pub distance_miles: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompsResult {
    pub subject_address: String,
    pub radius_miles: f64,
    pub comparables: Vec<ComparableSale>,
    pub source: DataSource,
}

impl CompsResult {
    /// Median sale price of the comparables, if any
    pub fn median_price(&self) -> Option<Decimal> {
        let mut prices: Vec<Decimal> = self.comparables.iter().map(|c| c.sale_price).collect();
        if prices.is_empty() {
            return None;
        }
        prices.sort();
        let mid = prices.len() / 2;
        if prices.len() % 2 == 0 {
            Some((prices[mid - 1] + prices[mid]) / Decimal::TWO)
        } else {
            Some(prices[mid])
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProviderComps {
    comparables: Vec<ComparableSale>,
}

/// Comparable-sales lookup
pub struct CompsClient {
    client: Client,
    config: ProviderConfig,
}

impl CompsClient {
    pub fn new(client: Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }

    pub async fn comparables(&self, address: &str, zip: &str, radius_miles: f64) -> CompsResult {
        let Some(base_url) = &self.config.base_url else {
            debug!("Comps provider not configured, using mock data");
            return mock_comps(address, zip, radius_miles);
        };

        let radius = radius_miles.to_string();
        let request = with_api_key(
            self.client.get(format!("{}/comparables", base_url)).query(&[
                ("address", address),
                ("zip", zip),
                ("radius_miles", radius.as_str()),
            ]),
            &self.config,
        );

        match fetch_json::<ProviderComps>(request).await {
            Ok(found) => CompsResult {
                subject_address: address.trim().to_string(),
                radius_miles,
                comparables: found.comparables,
                source: DataSource::Live,
            },
            Err(e) => {
                warn!("Comps request failed ({}), using mock data", e);
                mock_comps(address, zip, radius_miles)
            }
        }
    }
}

fn mock_comps(address: &str, zip: &str, radius_miles: f64) -> CompsResult {
    let seed = mock_seed(&format!("{}|{}", address, zip));
    let base_price = 150_000 + (seed % 350) as i64 * 1_000;
    let today = Utc::now().date_naive();

    let comparables = (0..MOCK_COMP_COUNT)
        .map(|i| {
            let step = seed.rotate_left((i * 13) as u32);
            let swing = (step % 41) as i64 - 20; // -20%..=20%
            let sale_price = Decimal::from(base_price + base_price * swing / 100).round_dp(0);
            ComparableSale {
                address: format!("{} Comparable Ave, {}", 100 + i * 12, zip.trim()),
                sale_price,
                sale_date: today - Duration::days(30 + (step % 150) as i64),
                square_feet: Some(1_100 + (step % 1_400) as i32),
                bedrooms: Some(2 + (step % 3) as i32),
                bathrooms: Some(Decimal::new(10 + (step % 3) as i64 * 5, 1)),
                distance_miles: (seeded_range(step, 0.1, radius_miles.max(0.2)) * 100.0).round()
                    / 100.0,
            }
        })
        .collect();

    CompsResult {
        subject_address: address.trim().to_string(),
        radius_miles,
        comparables,
        source: DataSource::Mock,
    }
}
