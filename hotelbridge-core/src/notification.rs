use async_trait::async_trait;
use hotelbridge_shared::models::{BookingNotification, NotificationKind};

use crate::transaction::{Transaction, TransactionStatus};
use crate::BookingResult;

/// Best-effort guest messaging. Callers never let a failure here affect a booking.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &BookingNotification) -> BookingResult<()>;
}

/// Builds the notification for a transaction that just reached a terminal
/// state or was refunded.
pub fn notification_for(txn: &Transaction) -> Option<BookingNotification> {
    let kind = match (txn.status, &txn.compensation) {
        (TransactionStatus::Confirmed, _) => NotificationKind::BookingConfirmed,
        (TransactionStatus::BookingFailed, Some(_)) => NotificationKind::RefundIssued,
        (TransactionStatus::BookingFailed, None) => NotificationKind::BookingFailed,
        (TransactionStatus::PaymentFailed, _) => NotificationKind::PaymentFailed,
        _ => return None,
    };

    Some(BookingNotification {
        kind,
        transaction_id: txn.id,
        agency_id: txn.agency_id,
        hotel_name: txn.hotel_snapshot.name.clone(),
        check_in: txn.search_snapshot.check_in,
        check_out: txn.search_snapshot.check_out,
        amount: txn.pricing.chargeable_rate,
        currency: txn.pricing.currency.clone(),
        confirmation_number: txn.confirmation.as_ref().map(|c| c.confirmation_number.clone()),
        email: txn.contact.email.clone(),
        phone: txn.contact.phone.clone(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}
