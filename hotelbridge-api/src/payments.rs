use axum::{extract::State, routing::post, Form, Json, Router};
use hotelbridge_booking::BookingOutcome;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

/// Fields the gateway posts back after the guest pays.
#[derive(Debug, Deserialize)]
pub struct GatewayCallbackForm {
    pub enc_response: String,
    pub order_id: String,
    pub signature: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/payments/gateway/callback", post(gateway_callback))
}

/// POST /v1/payments/gateway/callback
/// No bearer token: the signature is the credential.
async fn gateway_callback(
    State(state): State<AppState>,
    Form(form): Form<GatewayCallbackForm>,
) -> Result<Json<BookingOutcome>, AppError> {
    tracing::info!("Received gateway callback for order {}", form.order_id);
    let outcome = state
        .orchestrator
        .handle_gateway_callback(&form.enc_response, &form.order_id, &form.signature)
        .await?;
    Ok(Json(outcome))
}
