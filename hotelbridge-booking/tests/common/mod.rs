#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use hotelbridge_booking::{
    AesGatewayAdapter, BookingOrchestrator, CircuitBreaker, Compensator, GatewaySettings, HoldRequest,
    NotificationDispatcher, OrchestratorDeps, OrchestratorSettings, ResultCache, RetryPolicy, SearchService,
    SearchSettings, SupplierAdapter, SupplierTimeouts, WalletAdapter,
};
use hotelbridge_catalog::PricingEngine;
use hotelbridge_core::guest::{ContactDetail, Guest, GuestType};
use hotelbridge_core::identity::StaticAgencyDirectory;
use hotelbridge_core::notification::Notifier;
use hotelbridge_core::repository::TransactionRepository;
use hotelbridge_core::search::{AutosuggestQuery, Hotel, HotelSearchCriteria, RatePackage, RoomOccupancy, Suggestion};
use hotelbridge_core::supplier::{
    BookRequest, ConfirmationResponse, HoldResponse, PolicyRequest, PolicyResponse, PrebookRequest, SupplierClient,
};
use hotelbridge_core::transaction::CompensationRecord;
use hotelbridge_core::{BookingError, BookingResult, Principal, Transaction, TransactionStatus};
use hotelbridge_shared::models::{BookingNotification, NotificationKind};
use hotelbridge_shared::Masked;
use hotelbridge_store::{InMemoryCache, InMemoryLedger, InMemoryMarkupRepository, InMemoryTransactionRepository};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub const HOTEL_ID: &str = "MUM-001";
pub const BOOKING_KEY: &str = "BK-DELUXE";

pub fn mumbai_package() -> RatePackage {
    RatePackage {
        booking_key: BOOKING_KEY.to_string(),
        room_type: "Deluxe King".to_string(),
        board: Some("Breakfast".to_string()),
        base_rate: Some(dec!(4000)),
        room_rate: dec!(4000),
        discount: dec!(0),
        service_component: dec!(0),
        tax: dec!(200),
        commission: dec!(150),
        currency: "INR".to_string(),
        refundable: true,
    }
}

pub fn hotel(hotel_id: &str, package: RatePackage) -> Hotel {
    Hotel {
        hotel_id: hotel_id.to_string(),
        name: format!("Harbour Residency {}", hotel_id),
        city: "Mumbai".to_string(),
        star_rating: Some(4),
        address: Some("Colaba, Mumbai".to_string()),
        packages: vec![package],
    }
}

pub fn mumbai_search() -> HotelSearchCriteria {
    HotelSearchCriteria {
        city_code: "BOM".to_string(),
        check_in: NaiveDate::from_ymd_opt(2026, 12, 20).unwrap(),
        check_out: NaiveDate::from_ymd_opt(2026, 12, 22).unwrap(),
        rooms: vec![RoomOccupancy { adults: 2, children: 0, child_ages: vec![] }],
        nationality: "IN".to_string(),
        currency: "INR".to_string(),
        hotel_ids: vec![],
        transaction_id: None,
    }
}

pub fn hold_request() -> HoldRequest {
    HoldRequest {
        hotel_id: HOTEL_ID.to_string(),
        booking_key: BOOKING_KEY.to_string(),
        search: mumbai_search(),
        guests: vec![
            Guest {
                title: "Ms".to_string(),
                first_name: "Asha".to_string(),
                last_name: "Rao".to_string(),
                guest_type: GuestType::Adult,
                age: None,
                room_index: 0,
                lead: true,
            },
            Guest {
                title: "Mr".to_string(),
                first_name: "Vikram".to_string(),
                last_name: "Rao".to_string(),
                guest_type: GuestType::Adult,
                age: None,
                room_index: 0,
                lead: false,
            },
        ],
        contact: ContactDetail {
            name: "Asha Rao".to_string(),
            email: Masked::new("asha@example.com".to_string()),
            phone: Masked::new("+91 98200 12345".to_string()),
        },
        expected_amount: None,
    }
}

/// Scriptable supplier that counts calls.
pub struct FakeSupplier {
    pub search_calls: AtomicUsize,
    pub autosuggest_calls: AtomicUsize,
    pub book_calls: AtomicUsize,
    pub fail_book: AtomicBool,
    pub reject_prebook: AtomicBool,
    pub omit_policy_id: AtomicBool,
    pub failing_batches: Mutex<Vec<String>>,
    pub package: Mutex<RatePackage>,
}

impl FakeSupplier {
    pub fn new() -> Self {
        Self {
            search_calls: AtomicUsize::new(0),
            autosuggest_calls: AtomicUsize::new(0),
            book_calls: AtomicUsize::new(0),
            fail_book: AtomicBool::new(false),
            reject_prebook: AtomicBool::new(false),
            omit_policy_id: AtomicBool::new(false),
            failing_batches: Mutex::new(Vec::new()),
            package: Mutex::new(mumbai_package()),
        }
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn books(&self) -> usize {
        self.book_calls.load(Ordering::SeqCst)
    }

    /// Any batch containing `hotel_id` fails at the transport layer.
    pub fn fail_batch_containing(&self, hotel_id: &str) {
        self.failing_batches.lock().unwrap().push(hotel_id.to_string());
    }
}

#[async_trait]
impl SupplierClient for FakeSupplier {
    async fn search(&self, criteria: &HotelSearchCriteria) -> BookingResult<Vec<Hotel>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_batches.lock().unwrap().clone();
        if criteria.hotel_ids.iter().any(|id| failing.contains(id)) {
            return Err(BookingError::supplier_unavailable("search", "connection reset"));
        }

        let package = self.package.lock().unwrap().clone();
        if criteria.hotel_ids.is_empty() {
            return Ok(vec![hotel(HOTEL_ID, package)]);
        }
        Ok(criteria.hotel_ids.iter().map(|id| hotel(id, package.clone())).collect())
    }

    async fn autosuggest(&self, query: &AutosuggestQuery) -> BookingResult<Vec<Suggestion>> {
        self.autosuggest_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Suggestion {
            code: "BOM".to_string(),
            name: format!("Mumbai ({})", query.term),
            kind: "city".to_string(),
            country: Some("IN".to_string()),
        }])
    }

    async fn booking_policy(&self, request: &PolicyRequest) -> BookingResult<PolicyResponse> {
        let policy_id = if self.omit_policy_id.load(Ordering::SeqCst) {
            None
        } else {
            Some(format!("POL-{}", request.booking_key))
        };
        let package = self.package.lock().unwrap().clone();
        Ok(PolicyResponse {
            policy_id,
            hotel: hotel(&request.hotel_id, package.clone()),
            package,
            cancellation_policies: vec![],
            remarks: None,
        })
    }

    async fn prebook(&self, request: &PrebookRequest) -> BookingResult<HoldResponse> {
        if self.reject_prebook.load(Ordering::SeqCst) {
            return Err(BookingError::supplier_rejected("prebook", "room sold out"));
        }
        Ok(HoldResponse {
            hold_id: format!("HOLD-{}", request.transaction_id),
            status: "held".to_string(),
            raw: serde_json::Value::Null,
        })
    }

    async fn book(&self, request: &BookRequest) -> BookingResult<ConfirmationResponse> {
        self.book_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_book.load(Ordering::SeqCst) {
            return Err(BookingError::supplier_rejected("book", "hold no longer valid"));
        }
        Ok(ConfirmationResponse {
            confirmation_number: format!("CNF-{}", request.transaction_id),
            status: "confirmed".to_string(),
            raw: serde_json::Value::Null,
        })
    }
}

/// In-memory repository whose next write into a chosen status can be made to fail.
#[derive(Default)]
pub struct FlakyTransactions {
    pub inner: InMemoryTransactionRepository,
    pub fail_next_save_to: Mutex<Option<TransactionStatus>>,
}

impl FlakyTransactions {
    pub fn fail_next_save_to(&self, status: TransactionStatus) {
        *self.fail_next_save_to.lock().unwrap() = Some(status);
    }
}

#[async_trait]
impl TransactionRepository for FlakyTransactions {
    async fn insert(&self, txn: &Transaction, dedup_since: Option<DateTime<Utc>>) -> BookingResult<()> {
        self.inner.insert(txn, dedup_since).await
    }

    async fn get(&self, id: Uuid) -> BookingResult<Option<Transaction>> {
        self.inner.get(id).await
    }

    async fn save(&self, txn: &Transaction, expected: TransactionStatus) -> BookingResult<()> {
        {
            let mut failing = self.fail_next_save_to.lock().unwrap();
            if *failing == Some(txn.status) {
                *failing = None;
                return Err(BookingError::Storage("connection lost".to_string()));
            }
        }
        self.inner.save(txn, expected).await
    }

    async fn attach_compensation(&self, id: Uuid, record: &CompensationRecord) -> BookingResult<()> {
        self.inner.attach_compensation(id, record).await
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<NotificationKind>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &BookingNotification) -> BookingResult<()> {
        self.sent.lock().unwrap().push(notification.kind);
        Ok(())
    }
}

pub struct Harness {
    pub orchestrator: BookingOrchestrator,
    pub search: SearchService,
    pub supplier: Arc<FakeSupplier>,
    pub ledger: Arc<InMemoryLedger>,
    pub transactions: Arc<FlakyTransactions>,
    pub markups: Arc<InMemoryMarkupRepository>,
    pub gateway: Arc<AesGatewayAdapter>,
    pub notifier: Arc<RecordingNotifier>,
    pub agency: Uuid,
    pub principal: Principal,
}

pub fn gateway_settings() -> GatewaySettings {
    GatewaySettings {
        merchant_id: "MERCHANT-1".to_string(),
        access_code: "ACCESS-1".to_string(),
        working_key: "test-working-key".to_string(),
        action_url: "https://pay.example.com/transaction".to_string(),
        redirect_url: "https://hotelbridge.example.com/v1/payments/gateway/callback".to_string(),
    }
}

impl Harness {
    pub fn new(opening_balance: Decimal) -> Self {
        Self::with_settings(opening_balance, OrchestratorSettings::default())
    }

    pub fn with_settings(opening_balance: Decimal, settings: OrchestratorSettings) -> Self {
        let agency = Uuid::new_v4();
        let supplier = Arc::new(FakeSupplier::new());
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.open_account(agency, opening_balance);
        let transactions = Arc::new(FlakyTransactions::default());
        let markups = Arc::new(InMemoryMarkupRepository::new());
        let gateway = Arc::new(AesGatewayAdapter::new(gateway_settings()).unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let directory = Arc::new(StaticAgencyDirectory::new(HashMap::new()));

        let breaker = Arc::new(CircuitBreaker::new("supplier", 5, 1, Duration::from_secs(30)));
        let adapter: Arc<dyn SupplierClient> =
            Arc::new(SupplierAdapter::new(supplier.clone(), breaker, SupplierTimeouts::default()));
        let pricing = Arc::new(PricingEngine::new(markups.clone()));
        let wallet = Arc::new(WalletAdapter::new(ledger.clone(), Duration::from_secs(1)));
        let retry = RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        };

        let orchestrator = BookingOrchestrator::new(
            OrchestratorDeps {
                supplier: adapter.clone(),
                pricing: pricing.clone(),
                directory: directory.clone(),
                transactions: transactions.clone(),
                wallet: wallet.clone(),
                gateway: gateway.clone(),
                compensator: Compensator::new(wallet, retry),
                notifications: NotificationDispatcher::new(notifier.clone(), Duration::from_millis(200)),
            },
            settings,
        );

        let search = SearchService::new(
            adapter,
            pricing,
            directory,
            ResultCache::new(Arc::new(InMemoryCache::new()), Duration::from_millis(100)),
            SearchSettings::default(),
        );

        Self {
            orchestrator,
            search,
            supplier,
            ledger,
            transactions,
            markups,
            gateway,
            notifier,
            agency,
            principal: Principal::agency(agency),
        }
    }

    /// Moves a stored transaction's clock back by `minutes`.
    pub async fn age_transaction(&self, id: Uuid, minutes: i64) {
        let mut txn = self.transactions.get(id).await.unwrap().unwrap();
        txn.created_at -= chrono::Duration::minutes(minutes);
        let status = txn.status;
        self.transactions.save(&txn, status).await.unwrap();
    }

    pub async fn wait_for_notification(&self, kind: NotificationKind) -> bool {
        for _ in 0..50 {
            if self.notifier.sent.lock().unwrap().contains(&kind) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}
