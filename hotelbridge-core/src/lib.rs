pub mod error;
pub mod identity;
pub mod search;
pub mod guest;
pub mod supplier;
pub mod payment;
pub mod transaction;
pub mod repository;
pub mod notification;

pub use error::{BookingError, BookingResult, MoneyDisposition};
pub use identity::{Principal, PrincipalKind};
pub use transaction::{Transaction, TransactionStatus};

/// Hotel ids per supplier search call; the supplier rejects larger lists.
pub const HOTEL_ID_BATCH_SIZE: usize = 50;

/// Minutes a hold stays payable after its transaction is created.
pub const SESSION_TTL_MINUTES: i64 = 20;
