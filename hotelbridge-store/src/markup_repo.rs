use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hotelbridge_catalog::{MarkupRepository, MarkupRule, MarkupType};
use hotelbridge_core::{BookingError, BookingResult};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;

pub struct PgMarkupRepository {
    pool: PgPool,
}

impl PgMarkupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MarkupRow {
    agency_id: Uuid,
    markup_type: String,
    value: Decimal,
    is_active: bool,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl MarkupRepository for PgMarkupRepository {
    async fn active_rule(&self, agency_id: Uuid) -> BookingResult<Option<MarkupRule>> {
        let row: Option<MarkupRow> = sqlx::query_as(
            r#"
            SELECT agency_id, markup_type, value, is_active, updated_at
            FROM markup_rules
            WHERE agency_id = $1 AND is_active
            "#,
        )
        .bind(agency_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };

        // Not validated here: pricing decides how to treat an out-of-range value.
        let markup_type: MarkupType = row
            .markup_type
            .parse()
            .map_err(|e: hotelbridge_catalog::PricingError| BookingError::Storage(e.to_string()))?;

        Ok(Some(MarkupRule {
            agency_id: row.agency_id,
            markup_type,
            value: row.value,
            is_active: row.is_active,
            updated_at: row.updated_at,
        }))
    }

    async fn save_rule(&self, rule: &MarkupRule) -> BookingResult<()> {
        rule.validate()?;

        sqlx::query(
            r#"
            INSERT INTO markup_rules (agency_id, markup_type, value, is_active, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (agency_id) DO UPDATE
            SET markup_type = EXCLUDED.markup_type,
                value = EXCLUDED.value,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(rule.agency_id)
        .bind(rule.markup_type.as_str())
        .bind(rule.value)
        .bind(rule.is_active)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }
}
