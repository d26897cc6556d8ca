//! In-process stores for tests and redis/postgres-less development
//! (`store.backend = "memory"`, `cache.backend = "memory"`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hotelbridge_catalog::{MarkupRepository, MarkupRule};
use hotelbridge_core::payment::{LedgerEntryKind, LedgerReceipt, WalletLedger};
use hotelbridge_core::repository::{duplicate_intent_message, TransactionRepository};
use hotelbridge_core::transaction::{CompensationRecord, Transaction, TransactionStatus};
use hotelbridge_core::{BookingError, BookingResult};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::cache::{CacheBackend, CacheError};

#[derive(Default)]
pub struct InMemoryTransactionRepository {
    transactions: RwLock<HashMap<Uuid, Transaction>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert(&self, txn: &Transaction, dedup_since: Option<DateTime<Utc>>) -> BookingResult<()> {
        let mut transactions = self.transactions.write().await;

        if transactions.contains_key(&txn.id) {
            return Err(BookingError::Conflict(format!("Transaction {} already exists", txn.id)));
        }

        if let Some(since) = dedup_since {
            let intent = txn.intent_key();
            let existing = transactions
                .values()
                .filter(|t| !t.status.is_terminal() && t.created_at > since && t.intent_key() == intent)
                .max_by_key(|t| t.created_at);
            if let Some(existing) = existing {
                return Err(BookingError::Conflict(duplicate_intent_message(existing.id)));
            }
        }

        transactions.insert(txn.id, txn.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> BookingResult<Option<Transaction>> {
        Ok(self.transactions.read().await.get(&id).cloned())
    }

    async fn save(&self, txn: &Transaction, expected: TransactionStatus) -> BookingResult<()> {
        if expected.is_terminal() {
            return Err(BookingError::Conflict(format!("Transaction {} is already {}", txn.id, expected)));
        }

        let mut transactions = self.transactions.write().await;
        match transactions.get_mut(&txn.id) {
            Some(stored) if stored.status == expected => {
                *stored = txn.clone();
                Ok(())
            }
            Some(_) => Err(BookingError::Conflict(format!("Transaction {} is no longer {}", txn.id, expected))),
            None => Err(BookingError::NotFound(format!("Transaction {}", txn.id))),
        }
    }

    async fn attach_compensation(&self, id: Uuid, record: &CompensationRecord) -> BookingResult<()> {
        let mut transactions = self.transactions.write().await;
        let stored = transactions
            .get_mut(&id)
            .ok_or_else(|| BookingError::NotFound(format!("Transaction {}", id)))?;

        if stored.status != TransactionStatus::BookingFailed {
            return Err(BookingError::Conflict(format!("Transaction {} is {}, not booking_failed", id, stored.status)));
        }
        stored.record_compensation(record.clone())?;
        stored.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMarkupRepository {
    rules: RwLock<HashMap<Uuid, MarkupRule>>,
}

impl InMemoryMarkupRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarkupRepository for InMemoryMarkupRepository {
    async fn active_rule(&self, agency_id: Uuid) -> BookingResult<Option<MarkupRule>> {
        Ok(self.rules.read().await.get(&agency_id).filter(|r| r.is_active).cloned())
    }

    async fn save_rule(&self, rule: &MarkupRule) -> BookingResult<()> {
        rule.validate()?;
        self.rules.write().await.insert(rule.agency_id, rule.clone());
        Ok(())
    }
}

struct Account {
    balance: Decimal,
    entries: HashMap<(String, LedgerEntryKind), LedgerReceipt>,
}

/// Wallet with one mutex per agency; different agencies never contend.
#[derive(Default)]
pub struct InMemoryLedger {
    accounts: DashMap<Uuid, Arc<Mutex<Account>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_account(&self, agency_id: Uuid, balance: Decimal) {
        self.accounts.insert(
            agency_id,
            Arc::new(Mutex::new(Account { balance, entries: HashMap::new() })),
        );
    }

    fn account(&self, agency_id: Uuid) -> BookingResult<Arc<Mutex<Account>>> {
        self.accounts
            .get(&agency_id)
            .map(|a| a.value().clone())
            .ok_or_else(|| BookingError::NotFound(format!("Wallet for agency {}", agency_id)))
    }

    fn apply(
        account: &mut Account,
        agency_id: Uuid,
        kind: LedgerEntryKind,
        amount: Decimal,
        reference: &str,
    ) -> LedgerReceipt {
        account.balance = match kind {
            LedgerEntryKind::Debit => account.balance - amount,
            LedgerEntryKind::Credit => account.balance + amount,
        };
        let receipt = LedgerReceipt {
            entry_id: Uuid::new_v4(),
            agency_id,
            kind,
            amount,
            balance_after: account.balance,
            reference: reference.to_string(),
            created_at: Utc::now(),
        };
        account.entries.insert((reference.to_string(), kind), receipt.clone());
        receipt
    }
}

#[async_trait]
impl WalletLedger for InMemoryLedger {
    async fn debit(&self, agency_id: Uuid, amount: Decimal, reference: &str) -> BookingResult<LedgerReceipt> {
        if amount <= Decimal::ZERO {
            return Err(BookingError::ValidationError(format!("Ledger amount must be positive, got {}", amount)));
        }
        let account = self.account(agency_id)?;
        let mut account = account.lock().await;

        if let Some(receipt) = account.entries.get(&(reference.to_string(), LedgerEntryKind::Debit)) {
            return Ok(receipt.clone());
        }
        if account.balance < amount {
            return Err(BookingError::InsufficientBalance { required: amount, available: account.balance });
        }
        Ok(Self::apply(&mut account, agency_id, LedgerEntryKind::Debit, amount, reference))
    }

    async fn credit(
        &self,
        agency_id: Uuid,
        amount: Decimal,
        reference: &str,
        _reason: &str,
    ) -> BookingResult<LedgerReceipt> {
        if amount <= Decimal::ZERO {
            return Err(BookingError::ValidationError(format!("Ledger amount must be positive, got {}", amount)));
        }
        let account = self.account(agency_id)?;
        let mut account = account.lock().await;

        if let Some(receipt) = account.entries.get(&(reference.to_string(), LedgerEntryKind::Credit)) {
            return Ok(receipt.clone());
        }
        Ok(Self::apply(&mut account, agency_id, LedgerEntryKind::Credit, amount, reference))
    }

    async fn balance(&self, agency_id: Uuid) -> BookingResult<Decimal> {
        let account = self.account(agency_id)?;
        let balance = account.lock().await.balance;
        Ok(balance)
    }
}

/// TTL map standing in for Redis.
#[derive(Default)]
pub struct InMemoryCache {
    entries: DashMap<String, (String, Instant)>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let hit = match self.entries.get(key) {
            Some(entry) if entry.1 > Instant::now() => Some(entry.0.clone()),
            Some(_) => None,
            None => return Ok(None),
        };
        if hit.is_none() {
            self.entries.remove(key);
        }
        Ok(hit)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        let now = Instant::now();
        // Expired entries are dropped on every write.
        self.entries.retain(|_, entry| entry.1 > now);
        let expires_at = now + Duration::from_secs(ttl_seconds);
        self.entries.insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }
}
