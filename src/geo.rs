//! Geocoding of extracted addresses.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::GeocodingError;

/// Resolves an address string to a `[lat, lng]` pair.
///
/// An empty vector means "the provider knows no such place" and is a normal
/// outcome; errors are reserved for the call itself failing.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn locate(&self, address: &str) -> Result<Vec<f64>, GeocodingError>;
}

/// Geocoder backed by the Bing Maps (Virtual Earth) Locations REST API.
pub struct BingGeocoder {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl BingGeocoder {
    pub fn new(endpoint: String, api_key: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            endpoint,
            api_key,
        }
    }
}

// Bing Locations response, reduced to the fields we read.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationsResponse {
    #[serde(default)]
    resource_sets: Vec<ResourceSet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceSet {
    #[serde(default)]
    estimated_total: u64,
    #[serde(default)]
    resources: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    point: Point,
}

#[derive(Debug, Deserialize)]
struct Point {
    coordinates: Vec<f64>,
}

#[async_trait]
impl Geocoder for BingGeocoder {
    async fn locate(&self, address: &str) -> Result<Vec<f64>, GeocodingError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", address), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| GeocodingError::Upstream(e.to_string()))?;

        let body: LocationsResponse = response
            .json()
            .await
            .map_err(|e| GeocodingError::BadResponse(e.to_string()))?;

        let Some(set) = body.resource_sets.first() else {
            debug!(address, "Geocoder returned no resource sets");
            return Ok(Vec::new());
        };
        if set.estimated_total == 0 {
            debug!(address, "Geocoder found no matches");
            return Ok(Vec::new());
        }

        Ok(set
            .resources
            .first()
            .map(|r| r.point.coordinates.clone())
            .unwrap_or_default())
    }
}
