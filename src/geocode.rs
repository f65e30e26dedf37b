use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::models::Coordinates;

/// GeocodeError
///
/// The two failure shapes of the external capability: the provider answered but
/// found nothing, or the provider itself failed (network, HTTP error, malformed
/// body). Handlers map these to distinct user-facing statuses.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("no results for the supplied address")]
    Unresolvable,
    #[error("geocoding provider request failed: {0}")]
    Provider(String),
}

/// Geocoder
///
/// Address string in, coordinate pair out. This is the external capability
/// boundary: everything behind it (provider choice, wire format) is invisible to
/// the consistency logic.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError>;
}

/// GeocoderState
///
/// The concrete type used to share the geocoder across the application state.
pub type GeocoderState = Arc<dyn Geocoder>;

/// GeocodeHit
///
/// One result row from a Nominatim-style search response. The provider serializes
/// coordinates as strings, so parsing happens on our side.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeHit {
    pub lat: String,
    pub lon: String,
}

/// coordinates_from_hit
///
/// Converts a provider hit into a Coordinates pair. A coordinate the provider
/// emits but we cannot parse counts as a provider failure, not an unresolvable
/// address.
pub fn coordinates_from_hit(hit: GeocodeHit) -> Result<Coordinates, GeocodeError> {
    let lat = hit
        .lat
        .parse::<f64>()
        .map_err(|_| GeocodeError::Provider("malformed latitude in provider response".into()))?;
    let lng = hit
        .lon
        .parse::<f64>()
        .map_err(|_| GeocodeError::Provider("malformed longitude in provider response".into()))?;
    Ok(Coordinates { lat, lng })
}

// The Real Implementation (Nominatim-compatible HTTP provider)
/// NominatimGeocoder
///
/// Resolves addresses against a Nominatim-compatible search endpoint over HTTP.
/// The endpoint URL comes from configuration so local setups can point at a
/// self-hosted instance.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            // Nominatim's usage policy requires an identifying user agent.
            .header(reqwest::header::USER_AGENT, "roamer-api/0.1")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("geocoding request failed: {}", e);
                GeocodeError::Provider(e.to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::error!("geocoding provider answered an error status: {}", e);
                GeocodeError::Provider(e.to_string())
            })?;

        let hits: Vec<GeocodeHit> = response.json().await.map_err(|e| {
            tracing::error!("geocoding response body was not understood: {}", e);
            GeocodeError::Provider(e.to_string())
        })?;

        let hit = hits.into_iter().next().ok_or(GeocodeError::Unresolvable)?;
        coordinates_from_hit(hit)
    }
}

// The Mock Implementation (For Tests)
/// MockGeocoder
///
/// Returns a canned outcome without any network traffic.
pub struct MockGeocoder {
    outcome: MockOutcome,
}

enum MockOutcome {
    Resolved(Coordinates),
    Unresolvable,
    Unavailable,
}

impl MockGeocoder {
    /// Resolves every address to the given coordinates.
    pub fn resolving(coordinates: Coordinates) -> Self {
        Self {
            outcome: MockOutcome::Resolved(coordinates),
        }
    }

    /// Fails every address as unresolvable.
    pub fn unresolvable() -> Self {
        Self {
            outcome: MockOutcome::Unresolvable,
        }
    }

    /// Simulates a provider outage.
    pub fn unavailable() -> Self {
        Self {
            outcome: MockOutcome::Unavailable,
        }
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, _address: &str) -> Result<Coordinates, GeocodeError> {
        match &self.outcome {
            MockOutcome::Resolved(coordinates) => Ok(*coordinates),
            MockOutcome::Unresolvable => Err(GeocodeError::Unresolvable),
            MockOutcome::Unavailable => {
                Err(GeocodeError::Provider("simulated provider outage".into()))
            }
        }
    }
}
