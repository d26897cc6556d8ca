use anyhow::Context;
use hotelbridge_api::{app, AppState, AuthConfig};
use hotelbridge_booking::{
    AesGatewayAdapter, BookingOrchestrator, CircuitBreaker, Compensator, GatewaySettings, NotificationDispatcher,
    OrchestratorDeps, OrchestratorSettings, ResultCache, RetryPolicy, SearchService, SearchSettings, SupplierAdapter,
    SupplierTimeouts, WalletAdapter,
};
use hotelbridge_catalog::{MarkupRepository, PricingEngine};
use hotelbridge_core::identity::{AgencyDirectory, StaticAgencyDirectory};
use hotelbridge_core::notification::Notifier;
use hotelbridge_core::payment::WalletLedger;
use hotelbridge_core::repository::TransactionRepository;
use hotelbridge_core::supplier::SupplierClient;
use hotelbridge_store::app_config::{CacheBackendKind, Config, NotificationBackendKind, StoreBackendKind};
use hotelbridge_store::{
    DbClient, EventProducer, HttpSupplierClient, InMemoryCache, InMemoryLedger, InMemoryMarkupRepository,
    InMemoryTransactionRepository, KafkaNotifier, LogNotifier, PgAgencyDirectory, PgMarkupRepository,
    PgTransactionRepository, PgWalletLedger, RedisClient,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Stores {
    transactions: Arc<dyn TransactionRepository>,
    markups: Arc<dyn MarkupRepository>,
    ledger: Arc<dyn WalletLedger>,
    directory: Arc<dyn AgencyDirectory>,
}

async fn build_stores(config: &Config) -> anyhow::Result<Stores> {
    match config.store.backend {
        StoreBackendKind::Postgres => {
            let db = DbClient::new(&config.database.url)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;

            Ok(Stores {
                transactions: Arc::new(PgTransactionRepository::new(db.pool.clone())),
                markups: Arc::new(PgMarkupRepository::new(db.pool.clone())),
                ledger: Arc::new(PgWalletLedger::new(db.pool.clone())),
                directory: Arc::new(PgAgencyDirectory::new(db.pool.clone())),
            })
        }
        StoreBackendKind::Memory => {
            tracing::warn!("Using in-memory stores; nothing survives a restart");
            let ledger = InMemoryLedger::new();
            for wallet in &config.store.seed_wallets {
                ledger.open_account(wallet.agency_id, wallet.balance);
            }

            Ok(Stores {
                transactions: Arc::new(InMemoryTransactionRepository::new()),
                markups: Arc::new(InMemoryMarkupRepository::new()),
                ledger: Arc::new(ledger),
                directory: Arc::new(StaticAgencyDirectory::new(HashMap::new())),
            })
        }
    }
}

fn build_cache(config: &Config, redis: Option<&Arc<RedisClient>>) -> ResultCache {
    let timeout = Duration::from_millis(config.cache.timeout_ms);
    match (config.cache.backend, redis) {
        (CacheBackendKind::Redis, Some(redis)) => ResultCache::new(redis.clone(), timeout),
        (CacheBackendKind::Redis, None) => {
            tracing::warn!("Redis unavailable, search results will not be cached");
            ResultCache::disabled()
        }
        (CacheBackendKind::Memory, _) => ResultCache::new(Arc::new(InMemoryCache::new()), timeout),
        (CacheBackendKind::None, _) => ResultCache::disabled(),
    }
}

fn build_notifier(config: &Config) -> anyhow::Result<Arc<dyn Notifier>> {
    match config.notifications.backend {
        NotificationBackendKind::Kafka => {
            let producer = EventProducer::new(&config.kafka.brokers).context("Failed to create Kafka producer")?;
            Ok(Arc::new(KafkaNotifier::new(producer, config.notifications.topic.clone())))
        }
        NotificationBackendKind::Log => Ok(Arc::new(LogNotifier)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "hotelbridge_api=debug,hotelbridge_booking=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting HotelBridge API on port {}", config.server.port);

    let stores = build_stores(&config).await?;

    // Redis backs the result cache and the rate limiter; both degrade without it.
    let redis = match config.cache.backend {
        CacheBackendKind::Redis => match RedisClient::new(&config.redis.url).await {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!("Redis client could not be created: {}", e);
                None
            }
        },
        _ => None,
    };
    let cache = build_cache(&config, redis.as_ref());

    let http_supplier = HttpSupplierClient::new(
        config.supplier.base_url.clone(),
        config.supplier.api_key.clone(),
        config.supplier.book_timeout_ms,
    )
    .context("Failed to build supplier HTTP client")?;
    let breaker = Arc::new(CircuitBreaker::new(
        "supplier",
        config.supplier.circuit_failure_threshold,
        config.supplier.circuit_success_threshold,
        Duration::from_secs(config.supplier.circuit_timeout_seconds),
    ));
    let supplier: Arc<dyn SupplierClient> = Arc::new(SupplierAdapter::new(
        Arc::new(http_supplier),
        breaker,
        SupplierTimeouts {
            default: Duration::from_millis(config.supplier.timeout_ms),
            book: Duration::from_millis(config.supplier.book_timeout_ms),
        },
    ));

    let gateway = AesGatewayAdapter::new(GatewaySettings {
        merchant_id: config.gateway.merchant_id.clone(),
        access_code: config.gateway.access_code.clone(),
        working_key: config.gateway.working_key.clone(),
        action_url: config.gateway.action_url.clone(),
        redirect_url: config.gateway.redirect_url.clone(),
    })?;

    let rules = &config.business_rules;
    let pricing = Arc::new(PricingEngine::new(stores.markups));
    let wallet = Arc::new(WalletAdapter::new(stores.ledger, Duration::from_millis(config.wallet.timeout_ms)));
    let notifications = NotificationDispatcher::new(
        build_notifier(&config)?,
        Duration::from_millis(config.notifications.timeout_ms),
    );

    let orchestrator = BookingOrchestrator::new(
        OrchestratorDeps {
            supplier: supplier.clone(),
            pricing: pricing.clone(),
            directory: stores.directory.clone(),
            transactions: stores.transactions,
            wallet: wallet.clone(),
            gateway: Arc::new(gateway),
            compensator: Compensator::new(wallet, RetryPolicy::with_max_retries(rules.compensation_max_retries)),
            notifications,
        },
        OrchestratorSettings {
            session_ttl: chrono::Duration::seconds(rules.session_ttl_seconds as i64),
            allow_duplicate_attempts: rules.allow_duplicate_attempts,
        },
    );

    let search = SearchService::new(
        supplier,
        pricing,
        stores.directory,
        cache,
        SearchSettings {
            search_ttl: Duration::from_secs(rules.search_cache_ttl_seconds),
            autosuggest_ttl: Duration::from_secs(rules.autosuggest_cache_ttl_seconds),
            batch_size: rules.hotel_id_batch_size,
        },
    );

    let app_state = AppState {
        orchestrator: Arc::new(orchestrator),
        search: Arc::new(search),
        redis,
        rate_limit_per_minute: config.server.rate_limit_per_minute,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
