use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::transaction::{CompensationRecord, Transaction, TransactionStatus};
use crate::BookingResult;

/// Durable store of reservation attempts, keyed by transaction id.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Stores a new transaction.
    ///
    /// With `dedup_since` set, the insert is refused with `Conflict` naming the
    /// existing id when a non-terminal transaction for the same intent was
    /// created after that instant. Check and insert are atomic.
    async fn insert(&self, txn: &Transaction, dedup_since: Option<DateTime<Utc>>) -> BookingResult<()>;

    async fn get(&self, id: Uuid) -> BookingResult<Option<Transaction>>;

    /// Writes `txn` only if the stored status is still `expected`.
    /// A stale writer gets `Conflict`.
    async fn save(&self, txn: &Transaction, expected: TransactionStatus) -> BookingResult<()>;

    /// Fills the compensation slot of a `booking_failed` transaction. The one
    /// write allowed on a terminal row; `Conflict` if the slot is already taken.
    async fn attach_compensation(&self, id: Uuid, record: &CompensationRecord) -> BookingResult<()>;
}

/// Message used for a refused duplicate so callers can find the live attempt.
pub fn duplicate_intent_message(existing: Uuid) -> String {
    format!("An in-flight booking attempt already exists: {}", existing)
}
