use chrono::Utc;
use hotelbridge_core::transaction::{CompensationRecord, Transaction};
use hotelbridge_core::{BookingError, MoneyDisposition};
use std::sync::Arc;
use tracing::{error, info};

use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::wallet::WalletAdapter;

/// Returns captured money to the agency wallet.
pub struct Compensator {
    wallet: Arc<WalletAdapter>,
    policy: RetryPolicy,
}

impl Compensator {
    pub fn new(wallet: Arc<WalletAdapter>, policy: RetryPolicy) -> Self {
        Self { wallet, policy }
    }

    pub fn refund_reference(txn: &Transaction) -> String {
        format!("refund:{}", txn.id)
    }

    /// Credits the captured amount back, retrying transient ledger failures.
    ///
    /// Never fails: an exhausted refund is raised as a critical alert and
    /// recorded as `RefundPending` for manual return.
    pub async fn refund(&self, txn: &Transaction, reason: &str) -> CompensationRecord {
        let amount = txn
            .payment
            .as_ref()
            .map(|p| p.amount)
            .unwrap_or(txn.pricing.chargeable_rate);
        let reference = Self::refund_reference(txn);

        let (result, attempts) = retry_with_backoff(&self.policy, BookingError::is_retryable, || {
            self.wallet.credit(txn.agency_id, amount, &reference, reason)
        })
        .await;

        match result {
            Ok(receipt) => {
                info!(
                    transaction_id = %txn.id,
                    "Refunded {} {} to agency {} wallet after {} attempt(s)",
                    amount, txn.pricing.currency, txn.agency_id, attempts
                );
                CompensationRecord {
                    amount,
                    reason: reason.to_string(),
                    attempts,
                    outcome: MoneyDisposition::RefundedToWallet,
                    ledger_reference: Some(receipt.entry_id.to_string()),
                    recorded_at: Utc::now(),
                }
            }
            Err(e) => {
                error!(
                    target: "critical",
                    transaction_id = %txn.id,
                    agency_id = %txn.agency_id,
                    "REFUND FAILED for {} {} after {} attempt(s): {}. Manual return required.",
                    amount, txn.pricing.currency, attempts, e
                );
                CompensationRecord {
                    amount,
                    reason: reason.to_string(),
                    attempts,
                    outcome: MoneyDisposition::RefundPending,
                    ledger_reference: None,
                    recorded_at: Utc::now(),
                }
            }
        }
    }
}
