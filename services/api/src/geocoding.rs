//! Address to coordinates lookup
//!
//! The ownership core only accepts coordinates; resolving them is done here,
//! before a place is created.

use anyhow::Result;
use async_trait::async_trait;
use places::Coordinates;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

const GOOGLE_GEOCODING_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Geocoding failures
#[derive(Error, Debug)]
pub enum GeocodeError {
    /// The service answered but knows no such address
    #[error("Could not find location for the specified address.")]
    NoResults,

    /// The service could not be reached or answered garbage
    #[error("Geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service refused the request
    #[error("Geocoding service returned status {0}")]
    Status(String),
}

/// Resolves a postal address to coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn coordinates_for(&self, address: &str) -> Result<Coordinates, GeocodeError>;
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Coordinates,
}

fn first_location(response: GeocodeResponse) -> Result<Coordinates, GeocodeError> {
    match response.status.as_str() {
        "OK" => response
            .results
            .into_iter()
            .next()
            .map(|result| result.geometry.location)
            .ok_or(GeocodeError::NoResults),
        "ZERO_RESULTS" => Err(GeocodeError::NoResults),
        other => Err(GeocodeError::Status(other.to_string())),
    }
}

/// Google Maps Geocoding API client
#[derive(Clone)]
pub struct GoogleGeocoder {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: String, endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint,
        }
    }

    /// Create a new GoogleGeocoder from environment variables
    ///
    /// # Environment Variables
    /// - `GOOGLE_API_KEY`: Maps API key (required)
    /// - `GEOCODING_ENDPOINT`: override of the geocoding URL
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| anyhow::anyhow!("GOOGLE_API_KEY environment variable not set"))?;
        let endpoint = std::env::var("GEOCODING_ENDPOINT")
            .unwrap_or_else(|_| GOOGLE_GEOCODING_ENDPOINT.to_string());

        Ok(Self::new(api_key, endpoint))
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn coordinates_for(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        info!("Geocoding address: {}", address);

        let response: GeocodeResponse = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        first_location(response).inspect_err(|e| warn!("Geocoding '{}' failed: {}", address, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> GeocodeResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_first_location_of_ok_response() {
        let response = parse(
            r#"{
                "status": "OK",
                "results": [
                    {"geometry": {"location": {"lat": 40.7484405, "lng": -73.9878584}}},
                    {"geometry": {"location": {"lat": 0.0, "lng": 0.0}}}
                ]
            }"#,
        );

        let location = first_location(response).unwrap();
        assert_eq!(
            location,
            Coordinates {
                lat: 40.7484405,
                lng: -73.9878584
            }
        );
    }

    #[test]
    fn test_zero_results_is_no_results() {
        let response = parse(r#"{"status": "ZERO_RESULTS", "results": []}"#);
        assert!(matches!(first_location(response), Err(GeocodeError::NoResults)));
    }

    #[test]
    fn test_denied_request_keeps_status() {
        let response = parse(r#"{"status": "REQUEST_DENIED", "error_message": "bad key"}"#);
        match first_location(response) {
            Err(GeocodeError::Status(status)) => assert_eq!(status, "REQUEST_DENIED"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
