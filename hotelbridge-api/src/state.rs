use hotelbridge_booking::{BookingOrchestrator, SearchService};
use hotelbridge_store::RedisClient;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<BookingOrchestrator>,
    pub search: Arc<SearchService>,
    /// Per-IP limiter. Without Redis every request is let through.
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit_per_minute: i64,
    pub auth: AuthConfig,
}
