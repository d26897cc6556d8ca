use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use hotelbridge_core::{Principal, PrincipalKind};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PrincipalClaims {
    pub sub: Uuid,
    pub principal_type: PrincipalKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency_id: Option<Uuid>,
    pub exp: usize,
}

impl PrincipalClaims {
    pub fn principal(&self) -> Principal {
        match self.principal_type {
            PrincipalKind::Agency => Principal::agency(self.sub),
            PrincipalKind::Employee => Principal::employee(self.sub, self.agency_id),
        }
    }
}

/// Signs a token for `principal`. Identity & Access issues production tokens;
/// this is what local tooling and tests use.
pub fn issue_token(principal: &Principal, secret: &str, ttl_seconds: u64) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = chrono::Utc::now().timestamp() as usize + ttl_seconds as usize;
    let claims = PrincipalClaims {
        sub: principal.id,
        principal_type: principal.kind,
        agency_id: principal.agency_id,
        exp,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

/// Verifies the bearer token and injects the caller's `Principal`.
pub async fn principal_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    let token_data = decode::<PrincipalClaims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::AuthenticationError("Invalid or expired token".to_string())
    })?;

    req.extensions_mut().insert(token_data.claims.principal());

    Ok(next.run(req).await)
}
