pub mod app_config;
pub mod cache;
pub mod database;
pub mod directory_repo;
pub mod error;
pub mod events;
pub mod ledger;
pub mod markup_repo;
pub mod memory;
pub mod redis_repo;
pub mod supplier_http;
pub mod transaction_repo;

pub use app_config::Config;
pub use cache::{CacheBackend, CacheError};
pub use database::DbClient;
pub use directory_repo::PgAgencyDirectory;
pub use error::StoreError;
pub use events::{EventProducer, KafkaNotifier, LogNotifier};
pub use ledger::PgWalletLedger;
pub use markup_repo::PgMarkupRepository;
pub use memory::{InMemoryCache, InMemoryLedger, InMemoryMarkupRepository, InMemoryTransactionRepository};
pub use redis_repo::RedisClient;
pub use supplier_http::HttpSupplierClient;
pub use transaction_repo::PgTransactionRepository;
