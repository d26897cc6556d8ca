use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::guest::{ContactDetail, Guest};
use crate::search::{AutosuggestQuery, Hotel, HotelSearchCriteria, RatePackage, Suggestion};
use crate::BookingResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRequest {
    pub booking_key: String,
    pub hotel_id: String,
    pub search: HotelSearchCriteria,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancellationPolicy {
    pub from: chrono::NaiveDate,
    pub charge: rust_decimal::Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyResponse {
    /// Absent when the supplier could not lock a policy for the package.
    pub policy_id: Option<String>,
    pub hotel: Hotel,
    pub package: RatePackage,
    #[serde(default)]
    pub cancellation_policies: Vec<CancellationPolicy>,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrebookRequest {
    pub policy_id: String,
    pub guests: Vec<Guest>,
    pub contact: ContactDetail,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HoldResponse {
    pub hold_id: String,
    pub status: String,
    #[serde(default)]
    pub raw: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookRequest {
    pub hold_id: String,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfirmationResponse {
    pub confirmation_number: String,
    pub status: String,
    #[serde(default)]
    pub raw: Value,
}

/// Remote hotel-inventory API.
///
/// Implementations report transport failures as `SupplierUnavailable`,
/// deadline overruns as `SupplierTimeout` and business declines as
/// `SupplierRejected`.
#[async_trait]
pub trait SupplierClient: Send + Sync {
    async fn search(&self, criteria: &HotelSearchCriteria) -> BookingResult<Vec<Hotel>>;

    async fn autosuggest(&self, query: &AutosuggestQuery) -> BookingResult<Vec<Suggestion>>;

    async fn booking_policy(&self, request: &PolicyRequest) -> BookingResult<PolicyResponse>;

    async fn prebook(&self, request: &PrebookRequest) -> BookingResult<HoldResponse>;

    async fn book(&self, request: &BookRequest) -> BookingResult<ConfirmationResponse>;
}
