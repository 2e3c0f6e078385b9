//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Which address-extraction strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractorKind {
    /// Deterministic Hebrew street-number-city pattern matching.
    #[default]
    Regex,
    /// Delegate to an LLM with a fixed extraction prompt.
    Llm,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind port.
    pub port: u16,
    /// Path to the local libSQL database file.
    pub db_path: String,
    /// Bing Maps REST API key (geocoding).
    pub bing_api_key: String,
    /// Geocoder endpoint base URL.
    pub geocoder_url: String,
    /// Carrier tracking endpoint base URL.
    pub carrier_url: String,
    /// Timeout applied to every upstream HTTP call.
    pub upstream_timeout: Duration,
    /// Extraction strategy.
    pub extractor: ExtractorKind,
    /// LLM model used when `extractor` is `Llm`.
    pub llm_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: "./data/parcel-track.db".to_string(),
            bing_api_key: String::new(),
            geocoder_url: "http://dev.virtualearth.net/REST/v1/Locations".to_string(),
            carrier_url: "https://global.cainiao.com/global/detail.json".to_string(),
            upstream_timeout: Duration::from_secs(10),
            extractor: ExtractorKind::Regex,
            llm_model: "claude-sonnet-4-20250514".to_string(),
        }
    }
}

impl Config {
    /// Read configuration from `PARCEL_TRACK_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match std::env::var("PARCEL_TRACK_PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PARCEL_TRACK_PORT".to_string(),
                message: format!("not a port number: {raw}"),
            })?,
            Err(_) => defaults.port,
        };

        let upstream_timeout = match std::env::var("PARCEL_TRACK_UPSTREAM_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "PARCEL_TRACK_UPSTREAM_TIMEOUT_SECS".to_string(),
                    message: format!("not a number of seconds: {raw}"),
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => defaults.upstream_timeout,
        };

        let extractor = match std::env::var("PARCEL_TRACK_EXTRACTOR").as_deref() {
            Ok("llm") => ExtractorKind::Llm,
            Ok("regex") | Err(_) => ExtractorKind::Regex,
            Ok(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "PARCEL_TRACK_EXTRACTOR".to_string(),
                    message: format!("expected \"regex\" or \"llm\", got {other:?}"),
                });
            }
        };

        Ok(Self {
            port,
            db_path: std::env::var("PARCEL_TRACK_DB_PATH").unwrap_or(defaults.db_path),
            bing_api_key: std::env::var("BING_MAP_API").unwrap_or_default(),
            geocoder_url: std::env::var("PARCEL_TRACK_GEOCODER_URL").unwrap_or(defaults.geocoder_url),
            carrier_url: std::env::var("PARCEL_TRACK_CARRIER_URL").unwrap_or(defaults.carrier_url),
            upstream_timeout,
            extractor,
            llm_model: std::env::var("PARCEL_TRACK_LLM_MODEL").unwrap_or(defaults.llm_model),
        })
    }
}
