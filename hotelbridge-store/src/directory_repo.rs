use async_trait::async_trait;
use hotelbridge_core::identity::AgencyDirectory;
use hotelbridge_core::BookingResult;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;

/// Employee → agency mapping kept in sync by Identity & Access.
pub struct PgAgencyDirectory {
    pool: PgPool,
}

impl PgAgencyDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgencyDirectory for PgAgencyDirectory {
    async fn agency_of_employee(&self, employee_id: Uuid) -> BookingResult<Option<Uuid>> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT agency_id FROM agency_employees WHERE employee_id = $1 AND is_active")
                .bind(employee_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(StoreError::from)?;

        Ok(row.map(|(agency_id,)| agency_id))
    }
}
