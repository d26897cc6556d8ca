use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hotelbridge_shared::Masked;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::transaction::Transaction;
use crate::{BookingError, BookingResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LedgerEntryKind {
    Debit,
    Credit,
}

impl LedgerEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryKind::Debit => "debit",
            LedgerEntryKind::Credit => "credit",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerReceipt {
    pub entry_id: Uuid,
    pub agency_id: Uuid,
    pub kind: LedgerEntryKind,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

/// Prepaid agency wallet. The only component allowed to change a balance.
#[async_trait]
pub trait WalletLedger: Send + Sync {
    /// Atomically takes `amount` or fails with `InsufficientBalance` leaving the balance untouched.
    async fn debit(&self, agency_id: Uuid, amount: Decimal, reference: &str) -> BookingResult<LedgerReceipt>;

    async fn credit(
        &self,
        agency_id: Uuid,
        amount: Decimal,
        reference: &str,
        reason: &str,
    ) -> BookingResult<LedgerReceipt>;

    async fn balance(&self, agency_id: Uuid) -> BookingResult<Decimal>;
}

/// What the gateway is asked to collect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub billing_name: String,
    pub billing_email: Masked<String>,
    pub billing_phone: Masked<String>,
}

impl GatewayOrder {
    pub fn for_transaction(txn: &Transaction) -> Self {
        Self {
            reference: txn.id.to_string(),
            amount: txn.pricing.chargeable_rate,
            currency: txn.pricing.currency.clone(),
            billing_name: txn.contact.name.clone(),
            billing_email: txn.contact.email.clone(),
            billing_phone: txn.contact.phone.clone(),
        }
    }
}

/// Browser auto-submit form that hands the guest over to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedirectForm {
    pub action_url: String,
    pub method: String,
    pub fields: BTreeMap<String, String>,
}

/// Decrypted and signature-checked gateway result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayCallback {
    pub approved: bool,
    pub amount: Decimal,
    pub reference: String,
    #[serde(default)]
    pub gateway_txn_id: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

impl GatewayCallback {
    /// Rejects a callback that settles a different order or a different amount.
    pub fn ensure_matches(&self, reference: &str, amount: Decimal) -> BookingResult<()> {
        if self.reference != reference {
            return Err(BookingError::PaymentVerificationFailed(format!(
                "Callback reference {} does not match transaction {}",
                self.reference, reference
            )));
        }
        if self.amount != amount {
            return Err(BookingError::PaymentVerificationFailed(format!(
                "Callback amount {} does not match expected {}",
                self.amount, amount
            )));
        }
        Ok(())
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(&self, order: &GatewayOrder) -> BookingResult<RedirectForm>;

    /// Decrypts `raw_payload` and checks `signature` over it.
    /// Fails with `PaymentVerificationFailed` on any mismatch.
    fn verify_callback(&self, raw_payload: &str, signature: &str) -> BookingResult<GatewayCallback>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_callback_must_match_reference_and_amount() {
        let callback = GatewayCallback {
            approved: true,
            amount: dec!(4200),
            reference: "abc".to_string(),
            gateway_txn_id: Some("GW1".to_string()),
            status_message: None,
        };

        assert!(callback.ensure_matches("abc", dec!(4200)).is_ok());
        assert!(matches!(
            callback.ensure_matches("abc", dec!(4100)),
            Err(BookingError::PaymentVerificationFailed(_))
        ));
        assert!(matches!(
            callback.ensure_matches("xyz", dec!(4200)),
            Err(BookingError::PaymentVerificationFailed(_))
        ));
    }
}
