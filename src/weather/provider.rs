use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{config::WeatherConfig, error::ApiError};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// One normalized reading from the upstream provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderReading {
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
}

/// Outbound half of the ingestion gateway. Injected into `AppState` as a
/// trait object so tests can stub the provider.
#[async_trait]
pub trait WeatherClient: Send + Sync {
    async fn current(&self, city: &str) -> Result<ProviderReading, ApiError>;
}

/// OpenWeather-compatible HTTP client.
#[derive(Debug, Clone)]
pub struct OpenWeather {
    http: Client,
    base_url: String,
    api_key: String,
    units: String,
    lang: String,
}

impl OpenWeather {
    pub fn new(cfg: &WeatherConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            units: cfg.units.clone(),
            lang: cfg.lang.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    main: MainBlock,
    wind: Option<WindBlock>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct WindBlock {
    #[serde(default)]
    speed: f64,
}

/// Error body shape used by the provider, e.g. `{"cod":"404","message":"city not found"}`.
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: Option<String>,
}

#[async_trait]
impl WeatherClient for OpenWeather {
    async fn current(&self, city: &str) -> Result<ProviderReading, ApiError> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", self.units.as_str()),
                ("lang", self.lang.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // Pass the provider's message through where it gives one.
            let message = response
                .json::<ProviderErrorBody>()
                .await
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| format!("weather provider returned {}", status));
            return Err(ApiError::Upstream(message));
        }

        let body: ProviderResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;

        let reading = ProviderReading {
            temperature: body.main.temp,
            humidity: body.main.humidity,
            wind_speed: body.wind.map(|w| w.speed).unwrap_or(0.0),
        };
        debug!(%city, ?reading, "provider reading");
        Ok(reading)
    }
}
