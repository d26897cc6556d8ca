use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened to the guest's money when a booking attempt ended badly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MoneyDisposition {
    NotCharged,
    Charged,
    RefundedToWallet,
    RefundPending,
}

impl MoneyDisposition {
    pub fn describe(&self) -> &'static str {
        match self {
            MoneyDisposition::NotCharged => "No money was taken.",
            MoneyDisposition::Charged => "Payment was captured.",
            MoneyDisposition::RefundedToWallet => {
                "Payment was captured and has been returned to the agency wallet."
            }
            MoneyDisposition::RefundPending => {
                "Payment was captured; the automatic refund failed and has been escalated for manual return."
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Supplier unavailable during {operation}: {message}")]
    SupplierUnavailable { operation: &'static str, message: String },

    #[error("Supplier timed out during {operation} after {timeout_ms}ms")]
    SupplierTimeout { operation: &'static str, timeout_ms: u64 },

    #[error("Supplier rejected {operation}: {message}")]
    SupplierRejected { operation: &'static str, message: String },

    #[error("Insufficient wallet balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("Payment verification failed: {0}")]
    PaymentVerificationFailed(String),

    #[error("Session expired for transaction {0}")]
    SessionExpired(Uuid),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal service error: {0}")]
    Internal(String),

    #[error("Booking {transaction_id} failed: {cause}")]
    BookingFailed {
        transaction_id: Uuid,
        money: MoneyDisposition,
        #[source]
        cause: Box<BookingError>,
    },
}

impl BookingError {
    pub fn supplier_unavailable(operation: &'static str, message: impl Into<String>) -> Self {
        Self::SupplierUnavailable { operation, message: message.into() }
    }

    pub fn supplier_rejected(operation: &'static str, message: impl Into<String>) -> Self {
        Self::SupplierRejected { operation, message: message.into() }
    }

    /// Whether the caller may reasonably try the same request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            BookingError::SupplierUnavailable { .. }
            | BookingError::SupplierTimeout { .. }
            | BookingError::LedgerUnavailable(_)
            | BookingError::GatewayUnavailable(_)
            | BookingError::Storage(_) => true,
            _ => false,
        }
    }

    /// Amount missing from the wallet, when the error is a balance shortfall.
    pub fn shortfall(&self) -> Option<Decimal> {
        match self {
            BookingError::InsufficientBalance { required, available } => {
                Some(*required - *available)
            }
            _ => None,
        }
    }

    /// Stable machine-readable name used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::ValidationError(_) => "validation_error",
            BookingError::SupplierUnavailable { .. } => "supplier_unavailable",
            BookingError::SupplierTimeout { .. } => "supplier_timeout",
            BookingError::SupplierRejected { .. } => "supplier_rejected",
            BookingError::InsufficientBalance { .. } => "insufficient_balance",
            BookingError::PaymentVerificationFailed(_) => "payment_verification_failed",
            BookingError::SessionExpired(_) => "session_expired",
            BookingError::NotFound(_) => "not_found",
            BookingError::Conflict(_) => "conflict",
            BookingError::InvalidTransition { .. } => "invalid_transition",
            BookingError::LedgerUnavailable(_) => "ledger_unavailable",
            BookingError::GatewayUnavailable(_) => "gateway_unavailable",
            BookingError::Storage(_) => "storage_error",
            BookingError::Internal(_) => "internal_error",
            BookingError::BookingFailed { .. } => "booking_failed",
        }
    }

    pub fn failed(transaction_id: Uuid, money: MoneyDisposition, cause: BookingError) -> Self {
        Self::BookingFailed { transaction_id, money, cause: Box::new(cause) }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
