use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use hotelbridge_booking::SearchResponse;
use hotelbridge_core::search::{AutosuggestQuery, HotelSearchCriteria, Suggestion};
use hotelbridge_core::Principal;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/hotels/search", post(search_hotels))
        .route("/v1/hotels/autosuggest", get(autosuggest))
}

/// POST /v1/hotels/search
async fn search_hotels(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(criteria): Json<HotelSearchCriteria>,
) -> Result<Json<SearchResponse>, AppError> {
    let response = state.search.search(&principal, &criteria).await?;
    Ok(Json(response))
}

/// GET /v1/hotels/autosuggest?term=
async fn autosuggest(
    State(state): State<AppState>,
    Query(query): Query<AutosuggestQuery>,
) -> Result<Json<Vec<Suggestion>>, AppError> {
    let suggestions = state.search.autosuggest(&query).await?;
    Ok(Json(suggestions))
}
