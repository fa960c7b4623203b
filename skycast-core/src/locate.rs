//! Device position detection.
//!
//! The dashboard wants a starting position before the user types anything.
//! [`LocationSource`] is the seam; the default implementation asks an
//! IP-geolocation service, which needs no permissions or API key.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::LocateError;

pub const DEFAULT_ENDPOINT: &str = "http://ip-api.com/json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of the user's approximate position.
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Detect the current position as `(lat, lon)`.
    async fn locate(&self) -> Result<(f64, f64), LocateError>;
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

/// IP-based geolocation via the ip-api.com JSON endpoint.
#[derive(Debug)]
pub struct IpLocator {
    http: Client,
    endpoint: String,
}

impl IpLocator {
    pub fn new() -> Result<Self, LocateError> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Point the locator at a different endpoint. Used by tests.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, LocateError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LocateError::Other(e.to_string()))?;
        Ok(IpLocator { http, endpoint: endpoint.into() })
    }
}

#[async_trait]
impl LocationSource for IpLocator {
    async fn locate(&self) -> Result<(f64, f64), LocateError> {
        debug!("requesting IP geolocation");

        let response = self.http.get(&self.endpoint).send().await.map_err(|e| {
            if e.is_timeout() {
                LocateError::Timeout
            } else {
                LocateError::Unavailable
            }
        })?;

        if response.status() == StatusCode::FORBIDDEN {
            return Err(LocateError::Denied);
        }
        if !response.status().is_success() {
            return Err(LocateError::Unavailable);
        }

        let body: IpApiResponse = response
            .json()
            .await
            .map_err(|e| LocateError::Other(format!("malformed geolocation response: {e}")))?;

        if body.status != "success" {
            return Err(LocateError::Other(
                body.message.unwrap_or_else(|| "geolocation lookup failed".to_string()),
            ));
        }

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => {
                info!(lat, lon, "resolved device position");
                Ok((lat, lon))
            }
            _ => Err(LocateError::Other("geolocation response had no coordinates".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn locator_against(server: &MockServer) -> IpLocator {
        IpLocator::with_endpoint(server.uri()).expect("build locator")
    }

    #[tokio::test]
    async fn successful_lookup_returns_coordinates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success", "lat": 43.65, "lon": -79.38
            })))
            .mount(&server)
            .await;

        let coords = locator_against(&server).await.locate().await.expect("locate");
        assert_eq!(coords, (43.65, -79.38));
    }

    #[tokio::test]
    async fn forbidden_maps_to_denied() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = locator_against(&server).await.locate().await.unwrap_err();
        assert!(matches!(err, LocateError::Denied));
    }

    #[tokio::test]
    async fn service_level_failure_carries_the_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "fail", "message": "private range"
            })))
            .mount(&server)
            .await;

        let err = locator_against(&server).await.locate().await.unwrap_err();
        assert!(matches!(err, LocateError::Other(msg) if msg.contains("private range")));
    }

    #[tokio::test]
    async fn server_error_maps_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = locator_against(&server).await.locate().await.unwrap_err();
        assert!(matches!(err, LocateError::Unavailable));
    }
}
