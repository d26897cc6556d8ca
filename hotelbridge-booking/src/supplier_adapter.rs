use async_trait::async_trait;
use hotelbridge_core::search::{AutosuggestQuery, Hotel, HotelSearchCriteria, Suggestion};
use hotelbridge_core::supplier::{
    BookRequest, ConfirmationResponse, HoldResponse, PolicyRequest, PolicyResponse, PrebookRequest, SupplierClient,
};
use hotelbridge_core::{BookingError, BookingResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

use crate::resiliency::CircuitBreaker;

#[derive(Debug, Clone)]
pub struct SupplierTimeouts {
    pub default: Duration,
    pub book: Duration,
}

impl Default for SupplierTimeouts {
    fn default() -> Self {
        Self { default: Duration::from_secs(8), book: Duration::from_secs(30) }
    }
}

/// Bounded-time, breaker-guarded view of the supplier.
///
/// Only transport failures and timeouts count against the breaker; a supplier
/// that answers "sold out" is healthy.
pub struct SupplierAdapter {
    inner: Arc<dyn SupplierClient>,
    breaker: Arc<CircuitBreaker>,
    timeouts: SupplierTimeouts,
}

impl SupplierAdapter {
    pub fn new(inner: Arc<dyn SupplierClient>, breaker: Arc<CircuitBreaker>, timeouts: SupplierTimeouts) -> Self {
        Self { inner, breaker, timeouts }
    }

    async fn guarded<T, F>(&self, operation: &'static str, limit: Duration, call: F) -> BookingResult<T>
    where
        F: Future<Output = BookingResult<T>> + Send,
    {
        if !self.breaker.check().await {
            return Err(BookingError::supplier_unavailable(
                operation,
                format!("circuit {} is open", self.breaker.name),
            ));
        }

        let result = match timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Supplier {} exceeded {:?}", operation, limit);
                Err(BookingError::SupplierTimeout { operation, timeout_ms: limit.as_millis() as u64 })
            }
        };

        match &result {
            Err(e) if e.is_retryable() => self.breaker.record_failure().await,
            _ => self.breaker.record_success().await,
        }
        result
    }
}

#[async_trait]
impl SupplierClient for SupplierAdapter {
    async fn search(&self, criteria: &HotelSearchCriteria) -> BookingResult<Vec<Hotel>> {
        self.guarded("search", self.timeouts.default, self.inner.search(criteria)).await
    }

    async fn autosuggest(&self, query: &AutosuggestQuery) -> BookingResult<Vec<Suggestion>> {
        self.guarded("autosuggest", self.timeouts.default, self.inner.autosuggest(query)).await
    }

    async fn booking_policy(&self, request: &PolicyRequest) -> BookingResult<PolicyResponse> {
        self.guarded("bookingpolicy", self.timeouts.default, self.inner.booking_policy(request)).await
    }

    async fn prebook(&self, request: &PrebookRequest) -> BookingResult<HoldResponse> {
        self.guarded("prebook", self.timeouts.default, self.inner.prebook(request)).await
    }

    async fn book(&self, request: &BookRequest) -> BookingResult<ConfirmationResponse> {
        self.guarded("book", self.timeouts.book, self.inner.book(request)).await
    }
}
