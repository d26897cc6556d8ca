use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hotelbridge_core::BookingError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),

    #[error(transparent)]
    Booking(#[from] BookingError),
}

pub fn status_for(err: &BookingError) -> StatusCode {
    match err {
        BookingError::ValidationError(_) | BookingError::PaymentVerificationFailed(_) => StatusCode::BAD_REQUEST,
        BookingError::NotFound(_) => StatusCode::NOT_FOUND,
        BookingError::Conflict(_) | BookingError::InvalidTransition { .. } => StatusCode::CONFLICT,
        BookingError::SessionExpired(_) => StatusCode::GONE,
        BookingError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
        BookingError::SupplierRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        BookingError::SupplierUnavailable { .. }
        | BookingError::SupplierTimeout { .. }
        | BookingError::LedgerUnavailable(_)
        | BookingError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        BookingError::BookingFailed { .. } => StatusCode::BAD_GATEWAY,
        BookingError::Storage(_) | BookingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = match self {
            AppError::AuthenticationError(msg) => {
                let body = Json(json!({ "error": msg, "kind": "unauthorized", "retryable": false }));
                return (StatusCode::UNAUTHORIZED, body).into_response();
            }
            AppError::Booking(err) => err,
        };

        let status = status_for(&err);
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal Server Error: {}", err);
            "Internal Server Error".to_string()
        } else {
            err.to_string()
        };

        let mut body = json!({
            "error": message,
            "kind": err.kind(),
            "retryable": err.is_retryable(),
        });
        match &err {
            BookingError::BookingFailed { transaction_id, money, .. } => {
                body["transaction_id"] = json!(transaction_id);
                body["money"] = json!(money);
                body["message"] = json!(money.describe());
            }
            BookingError::SessionExpired(transaction_id) => {
                body["transaction_id"] = json!(transaction_id);
            }
            BookingError::InsufficientBalance { required, available } => {
                body["required"] = json!(required);
                body["available"] = json!(available);
                body["shortfall"] = json!(err.shortfall());
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}
