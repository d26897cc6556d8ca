use async_trait::async_trait;
use hotelbridge_core::search::{AutosuggestQuery, Hotel, HotelSearchCriteria, Suggestion};
use hotelbridge_core::supplier::{
    BookRequest, ConfirmationResponse, HoldResponse, PolicyRequest, PolicyResponse, PrebookRequest, SupplierClient,
};
use hotelbridge_core::{BookingError, BookingResult};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Envelope every supplier endpoint answers with.
#[derive(Debug, Deserialize)]
struct SupplierEnvelope<T> {
    status: SupplierStatus,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SupplierStatus {
    success: bool,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    hotels: Vec<Hotel>,
}

#[derive(Debug, Deserialize)]
struct AutosuggestResult {
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

/// JSON-over-HTTPS supplier client.
#[derive(Clone)]
pub struct HttpSupplierClient {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
}

impl HttpSupplierClient {
    /// `timeout_ms` bounds every request at the transport layer; the booking
    /// adapter applies its own per-operation deadlines on top.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout_ms: u64) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout_ms,
        })
    }

    fn transport_error(&self, operation: &'static str, e: reqwest::Error) -> BookingError {
        if e.is_timeout() {
            BookingError::SupplierTimeout { operation, timeout_ms: self.timeout_ms }
        } else if e.is_decode() {
            BookingError::supplier_unavailable(operation, format!("malformed response: {}", e))
        } else {
            BookingError::supplier_unavailable(operation, e.to_string())
        }
    }

    async fn call<B, T>(&self, operation: &'static str, path: &str, body: &B) -> BookingResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned + Send,
    {
        let started = std::time::Instant::now();
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .header("x-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(operation, e))?;

        let status = response.status();
        debug!("Supplier {} answered {} in {:?}", operation, status, started.elapsed());

        match status {
            s if s.is_success() => {}
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(BookingError::supplier_unavailable(operation, "rate limited"));
            }
            s if s.is_server_error() => {
                return Err(BookingError::supplier_unavailable(operation, format!("HTTP {}", s)));
            }
            s => {
                let body = response.text().await.unwrap_or_default();
                return Err(BookingError::supplier_rejected(operation, format!("HTTP {}: {}", s, body)));
            }
        }

        let envelope: SupplierEnvelope<T> = response
            .json()
            .await
            .map_err(|e| self.transport_error(operation, e))?;

        if !envelope.status.success {
            let message = envelope.status.message.unwrap_or_else(|| "declined".to_string());
            let code = envelope.status.code.unwrap_or_default();
            warn!("Supplier declined {} ({}): {}", operation, code, message);
            return Err(BookingError::supplier_rejected(operation, format!("{} {}", code, message).trim().to_string()));
        }

        envelope
            .result
            .ok_or_else(|| BookingError::supplier_unavailable(operation, "response carried no result"))
    }
}

#[async_trait]
impl SupplierClient for HttpSupplierClient {
    async fn search(&self, criteria: &HotelSearchCriteria) -> BookingResult<Vec<Hotel>> {
        let result: SearchResult = self.call("search", "hotels/search", criteria).await?;
        Ok(result.hotels)
    }

    async fn autosuggest(&self, query: &AutosuggestQuery) -> BookingResult<Vec<Suggestion>> {
        let result: AutosuggestResult = self.call("autosuggest", "hotels/autosuggest", query).await?;
        Ok(result.suggestions)
    }

    async fn booking_policy(&self, request: &PolicyRequest) -> BookingResult<PolicyResponse> {
        self.call("bookingpolicy", "hotels/bookingpolicy", request).await
    }

    async fn prebook(&self, request: &PrebookRequest) -> BookingResult<HoldResponse> {
        self.call("prebook", "hotels/prebook", request).await
    }

    async fn book(&self, request: &BookRequest) -> BookingResult<ConfirmationResponse> {
        self.call("book", "hotels/book", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_parsing() {
        let ok: SupplierEnvelope<SearchResult> = serde_json::from_str(
            r#"{"status":{"success":true},"result":{"hotels":[]}}"#,
        )
        .unwrap();
        assert!(ok.status.success);
        assert!(ok.result.unwrap().hotels.is_empty());

        let declined: SupplierEnvelope<HoldResponse> = serde_json::from_str(
            r#"{"status":{"success":false,"code":"E409","message":"Room sold out"}}"#,
        )
        .unwrap();
        assert!(!declined.status.success);
        assert!(declined.result.is_none());
        assert_eq!(declined.status.message.as_deref(), Some("Room sold out"));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = HttpSupplierClient::new("https://supplier.example.com/api/", "key", 1000).unwrap();
        assert_eq!(client.base_url, "https://supplier.example.com/api");
    }
}
