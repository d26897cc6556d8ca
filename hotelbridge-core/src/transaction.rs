use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::guest::{ContactDetail, Guest};
use crate::search::{Hotel, HotelSearchCriteria, PriceBreakdown, RatePackage};
use crate::supplier::{ConfirmationResponse, HoldResponse};
use crate::{BookingError, BookingResult, MoneyDisposition, PrincipalKind};

/// Reservation status. Numeric codes are what the store persists.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Created,
    PolicyFetched,
    Held,
    PaymentPending,
    PaymentConfirmed,
    Confirmed,
    BookingFailed,
    PaymentFailed,
}

impl TransactionStatus {
    pub fn code(&self) -> i16 {
        match self {
            TransactionStatus::Created => 0,
            TransactionStatus::Confirmed => 1,
            TransactionStatus::Held => 2,
            TransactionStatus::PaymentPending => 3,
            TransactionStatus::PaymentConfirmed => 4,
            TransactionStatus::BookingFailed => 5,
            TransactionStatus::PaymentFailed => 6,
            TransactionStatus::PolicyFetched => 7,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(TransactionStatus::Created),
            1 => Some(TransactionStatus::Confirmed),
            2 => Some(TransactionStatus::Held),
            3 => Some(TransactionStatus::PaymentPending),
            4 => Some(TransactionStatus::PaymentConfirmed),
            5 => Some(TransactionStatus::BookingFailed),
            6 => Some(TransactionStatus::PaymentFailed),
            7 => Some(TransactionStatus::PolicyFetched),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Created => "created",
            TransactionStatus::PolicyFetched => "policy_fetched",
            TransactionStatus::Held => "held",
            TransactionStatus::PaymentPending => "payment_pending",
            TransactionStatus::PaymentConfirmed => "payment_confirmed",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::BookingFailed => "booking_failed",
            TransactionStatus::PaymentFailed => "payment_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Confirmed | TransactionStatus::BookingFailed | TransactionStatus::PaymentFailed
        )
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Created, PolicyFetched)
                | (Created, BookingFailed)
                | (PolicyFetched, Held)
                | (PolicyFetched, BookingFailed)
                | (Held, PaymentPending)
                | (Held, PaymentConfirmed)
                | (Held, BookingFailed)
                | (PaymentPending, PaymentConfirmed)
                | (PaymentPending, PaymentFailed)
                | (PaymentPending, BookingFailed)
                | (PaymentConfirmed, Confirmed)
                | (PaymentConfirmed, BookingFailed)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Wallet,
    Gateway,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRecord {
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub currency: String,
    /// Ledger entry id for wallet payments, gateway transaction id otherwise.
    pub reference: String,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompensationRecord {
    pub amount: Decimal,
    pub reason: String,
    pub attempts: u32,
    pub outcome: MoneyDisposition,
    #[serde(default)]
    pub ledger_reference: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// The "same booking" tuple used to detect duplicate in-flight attempts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct IntentKey {
    pub owner_id: Uuid,
    pub hotel_id: String,
    pub booking_key: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

/// Everything needed to open a transaction at hold time.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub owner_type: PrincipalKind,
    pub owner_id: Uuid,
    pub agency_id: Uuid,
    pub search_snapshot: HotelSearchCriteria,
    pub hotel_snapshot: Hotel,
    pub selected_package: RatePackage,
    pub pricing: PriceBreakdown,
    pub contact: ContactDetail,
    pub guests: Vec<Guest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub status: TransactionStatus,
    pub owner_type: PrincipalKind,
    pub owner_id: Uuid,
    /// Owning agency, resolved once at creation.
    pub agency_id: Uuid,
    pub search_snapshot: HotelSearchCriteria,
    pub hotel_snapshot: Hotel,
    pub selected_package: RatePackage,
    pub pricing: PriceBreakdown,
    pub contact: ContactDetail,
    pub guests: Vec<Guest>,
    pub policy_id: Option<String>,
    pub hold: Option<HoldResponse>,
    pub payment: Option<PaymentRecord>,
    pub confirmation: Option<ConfirmationResponse>,
    pub compensation: Option<CompensationRecord>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(draft: NewTransaction) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: TransactionStatus::Created,
            owner_type: draft.owner_type,
            owner_id: draft.owner_id,
            agency_id: draft.agency_id,
            search_snapshot: draft.search_snapshot,
            hotel_snapshot: draft.hotel_snapshot,
            selected_package: draft.selected_package,
            pricing: draft.pricing,
            contact: draft.contact,
            guests: draft.guests,
            policy_id: None,
            hold: None,
            payment: None,
            confirmation: None,
            compensation: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn intent_key(&self) -> IntentKey {
        IntentKey {
            owner_id: self.owner_id,
            hotel_id: self.hotel_snapshot.hotel_id.clone(),
            booking_key: self.selected_package.booking_key.clone(),
            check_in: self.search_snapshot.check_in,
            check_out: self.search_snapshot.check_out,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }

    /// Guard for every advancement past hold.
    pub fn ensure_active(&self, now: DateTime<Utc>, ttl: Duration) -> BookingResult<()> {
        if self.is_expired(now, ttl) {
            return Err(BookingError::SessionExpired(self.id));
        }
        Ok(())
    }

    pub fn transition_to(&mut self, next: TransactionStatus) -> BookingResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(BookingError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn record_policy(&mut self, policy_id: String) -> BookingResult<()> {
        set_once(&mut self.policy_id, policy_id, "policy_id")
    }

    pub fn record_hold(&mut self, hold: HoldResponse) -> BookingResult<()> {
        set_once(&mut self.hold, hold, "hold")
    }

    pub fn record_payment(&mut self, payment: PaymentRecord) -> BookingResult<()> {
        set_once(&mut self.payment, payment, "payment")
    }

    pub fn record_confirmation(&mut self, confirmation: ConfirmationResponse) -> BookingResult<()> {
        set_once(&mut self.confirmation, confirmation, "confirmation")
    }

    pub fn record_compensation(&mut self, compensation: CompensationRecord) -> BookingResult<()> {
        set_once(&mut self.compensation, compensation, "compensation")
    }

    /// Moves into a failure branch and keeps the first reason given.
    pub fn fail(&mut self, status: TransactionStatus, reason: impl Into<String>) -> BookingResult<()> {
        self.transition_to(status)?;
        if self.failure_reason.is_none() {
            self.failure_reason = Some(reason.into());
        }
        Ok(())
    }

    pub fn money_disposition(&self) -> MoneyDisposition {
        match (&self.payment, &self.compensation) {
            (None, _) => MoneyDisposition::NotCharged,
            (Some(_), Some(compensation)) => compensation.outcome,
            (Some(_), None) => MoneyDisposition::Charged,
        }
    }

    pub fn hold_id(&self) -> Option<&str> {
        self.hold.as_ref().map(|h| h.hold_id.as_str())
    }
}

fn set_once<T: PartialEq>(slot: &mut Option<T>, value: T, name: &str) -> BookingResult<()> {
    match slot {
        Some(existing) if *existing == value => Ok(()),
        Some(_) => Err(BookingError::Conflict(format!("{} is already recorded", name))),
        None => {
            *slot = Some(value);
            Ok(())
        }
    }
}
