use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub supplier: SupplierConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,
    #[serde(default = "default_search_ttl")]
    pub search_cache_ttl_seconds: u64,
    #[serde(default = "default_autosuggest_ttl")]
    pub autosuggest_cache_ttl_seconds: u64,
    #[serde(default = "default_batch_size")]
    pub hotel_id_batch_size: usize,
    #[serde(default)]
    pub allow_duplicate_attempts: bool,
    #[serde(default = "default_compensation_retries")]
    pub compensation_max_retries: u32,
}

fn default_session_ttl() -> u64 { 1200 }
fn default_search_ttl() -> u64 { 300 }
fn default_autosuggest_ttl() -> u64 { 7200 }
fn default_batch_size() -> usize { 50 }
fn default_compensation_retries() -> u32 { 3 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            session_ttl_seconds: default_session_ttl(),
            search_cache_ttl_seconds: default_search_ttl(),
            autosuggest_cache_ttl_seconds: default_autosuggest_ttl(),
            hotel_id_batch_size: default_batch_size(),
            allow_duplicate_attempts: false,
            compensation_max_retries: default_compensation_retries(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_rate_limit() -> i64 { 120 }

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SupplierConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_supplier_timeout")]
    pub timeout_ms: u64,
    /// Longer deadline for `book`, which the supplier processes synchronously.
    #[serde(default = "default_book_timeout")]
    pub book_timeout_ms: u64,
    #[serde(default = "default_failure_threshold")]
    pub circuit_failure_threshold: usize,
    #[serde(default = "default_success_threshold")]
    pub circuit_success_threshold: usize,
    #[serde(default = "default_circuit_timeout")]
    pub circuit_timeout_seconds: u64,
}

fn default_supplier_timeout() -> u64 { 8000 }
fn default_book_timeout() -> u64 { 30000 }
fn default_failure_threshold() -> usize { 5 }
fn default_success_threshold() -> usize { 2 }
fn default_circuit_timeout() -> u64 { 30 }

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub merchant_id: String,
    pub access_code: String,
    pub working_key: String,
    pub action_url: String,
    pub redirect_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalletConfig {
    pub timeout_ms: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self { timeout_ms: 3000 }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Redis,
    Memory,
    None,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { backend: CacheBackendKind::Redis, timeout_ms: 250 }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationBackendKind {
    Kafka,
    Log,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    pub backend: NotificationBackendKind,
    pub topic: String,
    pub timeout_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            backend: NotificationBackendKind::Kafka,
            topic: "hotelbridge.notifications".to_string(),
            timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackendKind,
    /// Opening balances for the in-memory ledger. Ignored with Postgres.
    #[serde(default)]
    pub seed_wallets: Vec<SeedWallet>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedWallet {
    pub agency_id: uuid::Uuid,
    pub balance: rust_decimal::Decimal,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { backend: StoreBackendKind::Postgres, seed_wallets: Vec::new() }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `HOTELBRIDGE_SUPPLIER__API_KEY=...` sets `supplier.api_key`
            .add_source(config::Environment::with_prefix("HOTELBRIDGE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
