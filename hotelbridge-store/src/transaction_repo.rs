use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hotelbridge_core::repository::{duplicate_intent_message, TransactionRepository};
use hotelbridge_core::transaction::{CompensationRecord, Transaction, TransactionStatus};
use hotelbridge_core::{BookingError, BookingResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;

pub struct PgTransactionRepository {
    pool: PgPool,
}

impl PgTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    status: i16,
    document: serde_json::Value,
}

impl TransactionRow {
    fn into_transaction(self) -> Result<Transaction, StoreError> {
        let mut txn: Transaction = serde_json::from_value(self.document)?;
        // Column is authoritative; the document copy may lag on hand-edited rows.
        txn.status = TransactionStatus::from_code(self.status).ok_or(StoreError::UnknownStatus(self.status))?;
        Ok(txn)
    }
}

const TERMINAL: [TransactionStatus; 3] = [
    TransactionStatus::Confirmed,
    TransactionStatus::BookingFailed,
    TransactionStatus::PaymentFailed,
];

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    async fn insert(&self, txn: &Transaction, dedup_since: Option<DateTime<Utc>>) -> BookingResult<()> {
        let document = serde_json::to_value(txn).map_err(StoreError::from)?;
        let intent = txn.intent_key();

        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        if let Some(since) = dedup_since {
            let lock_key = format!(
                "{}:{}:{}:{}:{}",
                intent.owner_id, intent.hotel_id, intent.booking_key, intent.check_in, intent.check_out
            );
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind(&lock_key)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;

            let existing: Option<(Uuid,)> = sqlx::query_as(
                r#"
                SELECT id FROM transactions
                WHERE owner_id = $1 AND hotel_id = $2 AND booking_key = $3
                  AND check_in = $4 AND check_out = $5
                  AND created_at > $6
                  AND status NOT IN ($7, $8, $9)
                ORDER BY created_at DESC
                LIMIT 1
                "#,
            )
            .bind(intent.owner_id)
            .bind(&intent.hotel_id)
            .bind(&intent.booking_key)
            .bind(intent.check_in)
            .bind(intent.check_out)
            .bind(since)
            .bind(TERMINAL[0].code())
            .bind(TERMINAL[1].code())
            .bind(TERMINAL[2].code())
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::from)?;

            if let Some((existing_id,)) = existing {
                return Err(BookingError::Conflict(duplicate_intent_message(existing_id)));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, status, owner_type, owner_id, agency_id, hotel_id, booking_key,
                 check_in, check_out, chargeable_amount, currency, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(txn.id)
        .bind(txn.status.code())
        .bind(txn.owner_type.as_str())
        .bind(txn.owner_id)
        .bind(txn.agency_id)
        .bind(&intent.hotel_id)
        .bind(&intent.booking_key)
        .bind(intent.check_in)
        .bind(intent.check_out)
        .bind(txn.pricing.chargeable_rate)
        .bind(&txn.pricing.currency)
        .bind(document)
        .bind(txn.created_at)
        .bind(txn.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        tx.commit().await.map_err(StoreError::from)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> BookingResult<Option<Transaction>> {
        let row: Option<TransactionRow> = sqlx::query_as("SELECT status, document FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;

        match row {
            Some(row) => Ok(Some(row.into_transaction()?)),
            None => Ok(None),
        }
    }

    async fn save(&self, txn: &Transaction, expected: TransactionStatus) -> BookingResult<()> {
        if expected.is_terminal() {
            return Err(BookingError::Conflict(format!("Transaction {} is already {}", txn.id, expected)));
        }

        let document = serde_json::to_value(txn).map_err(StoreError::from)?;
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $2, document = $3, updated_at = $4
            WHERE id = $1 AND status = $5
            "#,
        )
        .bind(txn.id)
        .bind(txn.status.code())
        .bind(document)
        .bind(txn.updated_at)
        .bind(expected.code())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        if result.rows_affected() == 0 {
            return Err(BookingError::Conflict(format!(
                "Transaction {} is no longer {}",
                txn.id, expected
            )));
        }
        Ok(())
    }

    async fn attach_compensation(&self, id: Uuid, record: &CompensationRecord) -> BookingResult<()> {
        let value = serde_json::to_value(record).map_err(StoreError::from)?;
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET document = jsonb_set(document, '{compensation}', $2), updated_at = NOW()
            WHERE id = $1 AND status = $3
              AND COALESCE(document->'compensation', 'null'::jsonb) = 'null'::jsonb
            "#,
        )
        .bind(id)
        .bind(value)
        .bind(TransactionStatus::BookingFailed.code())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        if result.rows_affected() == 0 {
            return Err(BookingError::Conflict(format!(
                "Transaction {} is not awaiting a compensation record",
                id
            )));
        }
        Ok(())
    }
}
