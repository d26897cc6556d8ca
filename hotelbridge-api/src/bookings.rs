use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use hotelbridge_booking::{BookingOutcome, GatewayRedirect, HoldRequest, PolicyQuery, PolicyQuote, TransactionView};
use hotelbridge_core::Principal;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings/policy", post(fetch_policy))
        .route("/v1/bookings/hold", post(create_hold))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/pay/wallet", post(pay_with_wallet))
        .route("/v1/bookings/{id}/pay/gateway", post(start_gateway_payment))
        .route("/v1/bookings/{id}/confirm", post(confirm_booking))
}

/// POST /v1/bookings/policy
async fn fetch_policy(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(query): Json<PolicyQuery>,
) -> Result<Json<PolicyQuote>, AppError> {
    Ok(Json(state.orchestrator.fetch_policy(&principal, &query).await?))
}

/// POST /v1/bookings/hold
async fn create_hold(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<HoldRequest>,
) -> Result<(StatusCode, Json<TransactionView>), AppError> {
    let view = state.orchestrator.create_hold(&principal, request).await?;
    tracing::info!(transaction_id = %view.id, "Hold placed for principal {}", principal.id);
    Ok((StatusCode::CREATED, Json(view)))
}

/// POST /v1/bookings/{id}/pay/wallet
async fn pay_with_wallet(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingOutcome>, AppError> {
    Ok(Json(state.orchestrator.pay_with_wallet(&principal, id).await?))
}

/// POST /v1/bookings/{id}/pay/gateway
async fn start_gateway_payment(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<GatewayRedirect>, AppError> {
    Ok(Json(state.orchestrator.start_gateway_payment(&principal, id).await?))
}

/// POST /v1/bookings/{id}/confirm
async fn confirm_booking(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingOutcome>, AppError> {
    Ok(Json(state.orchestrator.confirm_booking(&principal, id).await?))
}

/// GET /v1/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionView>, AppError> {
    Ok(Json(state.orchestrator.get_transaction(&principal, id).await?))
}
