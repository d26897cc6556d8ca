use dashmap::DashMap;
use hotelbridge_core::payment::{LedgerReceipt, WalletLedger};
use hotelbridge_core::{BookingError, BookingResult};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::info;
use uuid::Uuid;

/// Wallet payment adapter over the ledger service.
///
/// Debits for one agency are serialized by a per-agency lock that is held for
/// the ledger call only. Every call is bounded; an overrun is `LedgerUnavailable`.
pub struct WalletAdapter {
    ledger: Arc<dyn WalletLedger>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl WalletAdapter {
    pub fn new(ledger: Arc<dyn WalletLedger>, timeout: Duration) -> Self {
        Self { ledger, locks: DashMap::new(), timeout }
    }

    fn lock_for(&self, agency_id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(agency_id).or_default().value().clone()
    }

    async fn bounded<T>(&self, operation: &str, call: impl Future<Output = BookingResult<T>>) -> BookingResult<T> {
        match timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BookingError::LedgerUnavailable(format!(
                "{} timed out after {}ms",
                operation,
                self.timeout.as_millis()
            ))),
        }
    }

    pub async fn debit(&self, agency_id: Uuid, amount: Decimal, reference: &str) -> BookingResult<LedgerReceipt> {
        let lock = self.lock_for(agency_id);
        let result = {
            let _guard = lock.lock().await;
            self.bounded("debit", self.ledger.debit(agency_id, amount, reference)).await
        };
        drop(lock);
        // The map's own reference is the last one once no debit is queued.
        self.locks.remove_if(&agency_id, |_, lock| Arc::strong_count(lock) == 1);

        let receipt = result?;
        info!("Wallet debited {} for {} (agency {})", amount, reference, agency_id);
        Ok(receipt)
    }

    pub async fn credit(
        &self,
        agency_id: Uuid,
        amount: Decimal,
        reference: &str,
        reason: &str,
    ) -> BookingResult<LedgerReceipt> {
        self.bounded("credit", self.ledger.credit(agency_id, amount, reference, reason)).await
    }

    pub async fn balance(&self, agency_id: Uuid) -> BookingResult<Decimal> {
        self.bounded("balance", self.ledger.balance(agency_id)).await
    }
}
