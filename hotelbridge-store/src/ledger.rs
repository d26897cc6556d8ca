use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hotelbridge_core::payment::{LedgerEntryKind, LedgerReceipt, WalletLedger};
use hotelbridge_core::{BookingError, BookingResult};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

/// Wallet balances in Postgres. Each call is one DB transaction; entries are
/// unique per `(reference, kind)` so a retried call replays the first receipt.
pub struct PgWalletLedger {
    pool: PgPool,
}

impl PgWalletLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn existing_entry(
        tx: &mut Transaction<'_, Postgres>,
        reference: &str,
        kind: LedgerEntryKind,
    ) -> Result<Option<LedgerReceipt>, sqlx::Error> {
        let row: Option<EntryRow> = sqlx::query_as(
            r#"
            SELECT id, agency_id, amount, balance_after, reference, created_at
            FROM wallet_entries
            WHERE reference = $1 AND kind = $2
            "#,
        )
        .bind(reference)
        .bind(kind.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(|r| r.into_receipt(kind)))
    }

    async fn record_entry(
        tx: &mut Transaction<'_, Postgres>,
        agency_id: Uuid,
        kind: LedgerEntryKind,
        amount: Decimal,
        balance_after: Decimal,
        reference: &str,
        reason: Option<&str>,
    ) -> Result<LedgerReceipt, sqlx::Error> {
        let receipt = LedgerReceipt {
            entry_id: Uuid::new_v4(),
            agency_id,
            kind,
            amount,
            balance_after,
            reference: reference.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO wallet_entries (id, agency_id, kind, amount, balance_after, reference, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(receipt.entry_id)
        .bind(agency_id)
        .bind(kind.as_str())
        .bind(amount)
        .bind(balance_after)
        .bind(reference)
        .bind(reason)
        .bind(receipt.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(receipt)
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: Uuid,
    agency_id: Uuid,
    amount: Decimal,
    balance_after: Decimal,
    reference: String,
    created_at: DateTime<Utc>,
}

impl EntryRow {
    fn into_receipt(self, kind: LedgerEntryKind) -> LedgerReceipt {
        LedgerReceipt {
            entry_id: self.id,
            agency_id: self.agency_id,
            kind,
            amount: self.amount,
            balance_after: self.balance_after,
            reference: self.reference,
            created_at: self.created_at,
        }
    }
}

fn unavailable(e: sqlx::Error) -> BookingError {
    BookingError::LedgerUnavailable(e.to_string())
}

fn ensure_positive(amount: Decimal) -> BookingResult<()> {
    if amount <= Decimal::ZERO {
        return Err(BookingError::ValidationError(format!("Ledger amount must be positive, got {}", amount)));
    }
    Ok(())
}

#[async_trait]
impl WalletLedger for PgWalletLedger {
    async fn debit(&self, agency_id: Uuid, amount: Decimal, reference: &str) -> BookingResult<LedgerReceipt> {
        ensure_positive(amount)?;
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        if let Some(receipt) = Self::existing_entry(&mut tx, reference, LedgerEntryKind::Debit)
            .await
            .map_err(unavailable)?
        {
            return Ok(receipt);
        }

        let updated: Option<(Decimal,)> = sqlx::query_as(
            r#"
            UPDATE wallet_accounts
            SET balance = balance - $2, updated_at = NOW()
            WHERE agency_id = $1 AND balance >= $2
            RETURNING balance
            "#,
        )
        .bind(agency_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unavailable)?;

        let Some((balance_after,)) = updated else {
            let available: Option<(Decimal,)> =
                sqlx::query_as("SELECT balance FROM wallet_accounts WHERE agency_id = $1")
                    .bind(agency_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(unavailable)?;
            return Err(BookingError::InsufficientBalance {
                required: amount,
                available: available.map(|(b,)| b).unwrap_or(Decimal::ZERO),
            });
        };

        let receipt = Self::record_entry(&mut tx, agency_id, LedgerEntryKind::Debit, amount, balance_after, reference, None)
            .await
            .map_err(unavailable)?;
        tx.commit().await.map_err(unavailable)?;

        info!("Wallet debit {} for agency {} ({}), balance now {}", amount, agency_id, reference, balance_after);
        Ok(receipt)
    }

    async fn credit(
        &self,
        agency_id: Uuid,
        amount: Decimal,
        reference: &str,
        reason: &str,
    ) -> BookingResult<LedgerReceipt> {
        ensure_positive(amount)?;
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        if let Some(receipt) = Self::existing_entry(&mut tx, reference, LedgerEntryKind::Credit)
            .await
            .map_err(unavailable)?
        {
            return Ok(receipt);
        }

        let updated: Option<(Decimal,)> = sqlx::query_as(
            r#"
            UPDATE wallet_accounts
            SET balance = balance + $2, updated_at = NOW()
            WHERE agency_id = $1
            RETURNING balance
            "#,
        )
        .bind(agency_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unavailable)?;

        let Some((balance_after,)) = updated else {
            return Err(BookingError::NotFound(format!("Wallet for agency {}", agency_id)));
        };

        let receipt = Self::record_entry(
            &mut tx,
            agency_id,
            LedgerEntryKind::Credit,
            amount,
            balance_after,
            reference,
            Some(reason),
        )
        .await
        .map_err(unavailable)?;
        tx.commit().await.map_err(unavailable)?;

        info!("Wallet credit {} for agency {} ({}): {}", amount, agency_id, reference, reason);
        Ok(receipt)
    }

    async fn balance(&self, agency_id: Uuid) -> BookingResult<Decimal> {
        let row: Option<(Decimal,)> = sqlx::query_as("SELECT balance FROM wallet_accounts WHERE agency_id = $1")
            .bind(agency_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        row.map(|(b,)| b)
            .ok_or_else(|| BookingError::NotFound(format!("Wallet for agency {}", agency_id)))
    }
}
