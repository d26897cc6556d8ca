use serde::{Deserialize, Serialize};
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{BookingError, BookingResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrincipalKind {
    Agency,
    Employee,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::Agency => "AGENCY",
            PrincipalKind::Employee => "EMPLOYEE",
        }
    }
}

/// Caller identity as issued by Identity & Access. Trusted as given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub kind: PrincipalKind,
    /// Agency claimed by the token for employees; still checked against the directory.
    pub agency_id: Option<Uuid>,
}

impl Principal {
    pub fn agency(id: Uuid) -> Self {
        Self { id, kind: PrincipalKind::Agency, agency_id: None }
    }

    pub fn employee(id: Uuid, agency_id: Option<Uuid>) -> Self {
        Self { id, kind: PrincipalKind::Employee, agency_id }
    }
}

#[async_trait]
pub trait AgencyDirectory: Send + Sync {
    /// Agency an employee belongs to, if the employee is known and active.
    async fn agency_of_employee(&self, employee_id: Uuid) -> BookingResult<Option<Uuid>>;
}

/// Resolves the owning agency of a principal. Fails closed.
pub async fn resolve_agency(directory: &dyn AgencyDirectory, principal: &Principal) -> BookingResult<Uuid> {
    match principal.kind {
        PrincipalKind::Agency => Ok(principal.id),
        PrincipalKind::Employee => {
            let resolved = directory
                .agency_of_employee(principal.id)
                .await?
                .ok_or_else(|| BookingError::ValidationError(
                    format!("No agency found for employee {}", principal.id),
                ))?;

            if let Some(claimed) = principal.agency_id {
                if claimed != resolved {
                    tracing::warn!(
                        target: "security",
                        "Employee {} claimed agency {} but belongs to {}",
                        principal.id, claimed, resolved
                    );
                    return Err(BookingError::ValidationError(
                        "Employee does not belong to the claimed agency".to_string(),
                    ));
                }
            }

            Ok(resolved)
        }
    }
}

/// Directory backed by a fixed employee → agency map.
pub struct StaticAgencyDirectory {
    employees: HashMap<Uuid, Uuid>,
}

impl StaticAgencyDirectory {
    pub fn new(employees: HashMap<Uuid, Uuid>) -> Self {
        Self { employees }
    }
}

#[async_trait]
impl AgencyDirectory for StaticAgencyDirectory {
    async fn agency_of_employee(&self, employee_id: Uuid) -> BookingResult<Option<Uuid>> {
        Ok(self.employees.get(&employee_id).copied())
    }
}
