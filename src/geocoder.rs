use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

/// Sentinel used when the service answered but had no usable display name.
pub const ADDRESS_NOT_AVAILABLE: &str = "Address not available";
/// Sentinel used when the lookup could not be completed (network failure,
/// unreadable response).
pub const ADDRESS_FETCH_FAILED: &str = "Unable to fetch address";

const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Best-effort reverse geocoding. Implementations never fail: any problem is
/// absorbed into a sentinel address so the recording pipeline can never block
/// or abort on a lookup.
pub trait Geocoder: Send + Sync {
    fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> impl Future<Output = String> + Send;
}

/// Reverse geocoder backed by the public Nominatim endpoint.
///
/// Callers are expected to issue at most one lookup per position update,
/// which keeps us well under the service's rate expectations.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: String,
}

impl NominatimGeocoder {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Point at a different service, mostly for tests.
    pub fn with_endpoint(endpoint: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("waypath/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(NominatimGeocoder {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

impl Geocoder for NominatimGeocoder {
    async fn reverse_geocode(&self, latitude: f64, longitude: f64) -> String {
        let url = format!(
            "{}/reverse?format=json&lat={latitude}&lon={longitude}",
            self.endpoint
        );
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("[geocoder] request failed: {e}");
                return ADDRESS_FETCH_FAILED.to_string();
            }
        };
        match response.bytes().await {
            Ok(body) => parse_display_name(&body),
            Err(e) => {
                warn!("[geocoder] failed to read response: {e}");
                ADDRESS_FETCH_FAILED.to_string()
            }
        }
    }
}

#[derive(Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

/// A body that is not JSON counts as a failed fetch; valid JSON without a
/// display name (e.g. Nominatim's `{"error": ...}` for an unmapped spot) is
/// merely an unavailable address.
fn parse_display_name(body: &[u8]) -> String {
    match serde_json::from_slice::<ReverseResponse>(body) {
        Ok(response) => match response.display_name {
            Some(name) if !name.is_empty() => name,
            _ => ADDRESS_NOT_AVAILABLE.to_string(),
        },
        Err(e) => {
            warn!("[geocoder] malformed response: {e}");
            ADDRESS_FETCH_FAILED.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_is_taken_from_response() {
        let body = br#"{"display_name": "MG Road, Bengaluru, Karnataka, India"}"#;
        assert_eq!(
            parse_display_name(body),
            "MG Road, Bengaluru, Karnataka, India"
        );
    }

    #[test]
    fn missing_display_name_yields_sentinel() {
        assert_eq!(
            parse_display_name(br#"{"error": "Unable to geocode"}"#),
            ADDRESS_NOT_AVAILABLE
        );
        assert_eq!(parse_display_name(br#"{"display_name": ""}"#), ADDRESS_NOT_AVAILABLE);
    }

    #[test]
    fn malformed_body_counts_as_fetch_failure() {
        assert_eq!(parse_display_name(b"<html>boom</html>"), ADDRESS_FETCH_FAILED);
    }

    #[tokio::test]
    async fn unreachable_service_yields_fetch_failure() {
        // Port 1 is essentially never listening; the connection is refused
        // immediately, no external network involved.
        let geocoder = NominatimGeocoder::with_endpoint("http://127.0.0.1:1").unwrap();
        assert_eq!(geocoder.reverse_geocode(12.97, 77.59).await, ADDRESS_FETCH_FAILED);
    }
}
