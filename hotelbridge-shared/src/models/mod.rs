pub mod events;

pub use events::{BookingNotification, NotificationKind};
