pub mod cache;
pub mod compensation;
pub mod gateway;
pub mod notify;
pub mod orchestrator;
pub mod resiliency;
pub mod retry;
pub mod search;
pub mod supplier_adapter;
pub mod wallet;

pub use cache::ResultCache;
pub use compensation::Compensator;
pub use gateway::{AesGatewayAdapter, GatewayResult, GatewaySettings};
pub use notify::NotificationDispatcher;
pub use orchestrator::{
    BookingOrchestrator, BookingOutcome, GatewayRedirect, HoldRequest, OrchestratorDeps, OrchestratorSettings,
    PolicyQuery, PolicyQuote, TransactionView,
};
pub use resiliency::{CircuitBreaker, CircuitState};
pub use retry::RetryPolicy;
pub use search::{SearchResponse, SearchService, SearchSettings};
pub use supplier_adapter::{SupplierAdapter, SupplierTimeouts};
pub use wallet::WalletAdapter;
