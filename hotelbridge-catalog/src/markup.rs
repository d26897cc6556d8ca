use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hotelbridge_core::BookingResult;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::pricing::PricingError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MarkupType {
    Percentage,
    Fixed,
}

impl MarkupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkupType::Percentage => "percentage",
            MarkupType::Fixed => "fixed",
        }
    }
}

impl FromStr for MarkupType {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(MarkupType::Percentage),
            "fixed" => Ok(MarkupType::Fixed),
            other => Err(PricingError::InvalidRule(format!("Unknown markup type: {}", other))),
        }
    }
}

/// An agency's markup. One row per agency, toggled through `is_active`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkupRule {
    pub agency_id: Uuid,
    pub markup_type: MarkupType,
    pub value: Decimal,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl MarkupRule {
    pub fn new(agency_id: Uuid, markup_type: MarkupType, value: Decimal, is_active: bool) -> Result<Self, PricingError> {
        let rule = Self {
            agency_id,
            markup_type,
            value,
            is_active,
            updated_at: Utc::now(),
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn percentage(agency_id: Uuid, value: Decimal) -> Result<Self, PricingError> {
        Self::new(agency_id, MarkupType::Percentage, value, true)
    }

    pub fn fixed(agency_id: Uuid, value: Decimal) -> Result<Self, PricingError> {
        Self::new(agency_id, MarkupType::Fixed, value, true)
    }

    pub fn validate(&self) -> Result<(), PricingError> {
        let ok = match self.markup_type {
            MarkupType::Percentage => self.value >= Decimal::ZERO && self.value <= Decimal::ONE_HUNDRED,
            MarkupType::Fixed => self.value >= Decimal::ZERO,
        };
        if !ok {
            return Err(PricingError::InvalidRule(format!(
                "{} markup of {} for agency {}",
                self.markup_type.as_str(),
                self.value,
                self.agency_id
            )));
        }
        Ok(())
    }

    /// Unrounded markup on `base`.
    pub fn markup_amount(&self, base: Decimal) -> Decimal {
        match self.markup_type {
            MarkupType::Percentage => base * self.value / Decimal::ONE_HUNDRED,
            MarkupType::Fixed => self.value,
        }
    }
}

#[async_trait]
pub trait MarkupRepository: Send + Sync {
    /// The agency's rule if one exists and is active.
    async fn active_rule(&self, agency_id: Uuid) -> BookingResult<Option<MarkupRule>>;

    /// Upsert keyed by agency.
    async fn save_rule(&self, rule: &MarkupRule) -> BookingResult<()>;
}
