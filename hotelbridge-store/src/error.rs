use hotelbridge_core::BookingError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt stored document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown status code {0}")]
    UnknownStatus(i16),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        BookingError::Storage(err.to_string())
    }
}
