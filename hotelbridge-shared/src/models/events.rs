use rust_decimal::Decimal;
use uuid::Uuid;

use crate::pii::Masked;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    BookingConfirmed,
    BookingFailed,
    PaymentFailed,
    RefundIssued,
}

impl NotificationKind {
    pub fn topic_suffix(&self) -> &'static str {
        match self {
            NotificationKind::BookingConfirmed => "confirmed",
            NotificationKind::BookingFailed => "failed",
            NotificationKind::PaymentFailed => "payment_failed",
            NotificationKind::RefundIssued => "refund",
        }
    }
}

/// Payload handed to the SMS/e-mail service after a terminal transition.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingNotification {
    pub kind: NotificationKind,
    pub transaction_id: Uuid,
    pub agency_id: Uuid,
    pub hotel_name: String,
    pub check_in: chrono::NaiveDate,
    pub check_out: chrono::NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub confirmation_number: Option<String>,
    pub email: Masked<String>,
    pub phone: Masked<String>,
    pub timestamp: i64,
}
