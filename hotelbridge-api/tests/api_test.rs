use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use hotelbridge_api::middleware::issue_token;
use hotelbridge_api::{app, AppState, AuthConfig};
use hotelbridge_booking::{
    AesGatewayAdapter, BookingOrchestrator, Compensator, GatewayResult, GatewaySettings, NotificationDispatcher,
    OrchestratorDeps, OrchestratorSettings, ResultCache, RetryPolicy, SearchService, SearchSettings, WalletAdapter,
};
use hotelbridge_catalog::PricingEngine;
use hotelbridge_core::identity::StaticAgencyDirectory;
use hotelbridge_core::search::{AutosuggestQuery, Hotel, HotelSearchCriteria, RatePackage, Suggestion};
use hotelbridge_core::supplier::{
    BookRequest, ConfirmationResponse, HoldResponse, PolicyRequest, PolicyResponse, PrebookRequest, SupplierClient,
};
use hotelbridge_core::{BookingResult, Principal};
use hotelbridge_store::{InMemoryCache, InMemoryLedger, InMemoryMarkupRepository, InMemoryTransactionRepository, LogNotifier};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "api-test-secret";

fn package() -> RatePackage {
    RatePackage {
        booking_key: "BK-1".to_string(),
        room_type: "Standard Twin".to_string(),
        board: None,
        base_rate: Some(dec!(3000)),
        room_rate: dec!(3000),
        discount: dec!(0),
        service_component: dec!(0),
        tax: dec!(150),
        commission: dec!(0),
        currency: "INR".to_string(),
        refundable: false,
    }
}

fn hotel(id: &str) -> Hotel {
    Hotel {
        hotel_id: id.to_string(),
        name: "Seaview Inn".to_string(),
        city: "Goa".to_string(),
        star_rating: Some(3),
        address: None,
        packages: vec![package()],
    }
}

struct StubSupplier;

#[async_trait]
impl SupplierClient for StubSupplier {
    async fn search(&self, _criteria: &HotelSearchCriteria) -> BookingResult<Vec<Hotel>> {
        Ok(vec![hotel("GOI-7")])
    }

    async fn autosuggest(&self, _query: &AutosuggestQuery) -> BookingResult<Vec<Suggestion>> {
        Ok(vec![])
    }

    async fn booking_policy(&self, request: &PolicyRequest) -> BookingResult<PolicyResponse> {
        Ok(PolicyResponse {
            policy_id: Some("POL-1".to_string()),
            hotel: hotel(&request.hotel_id),
            package: package(),
            cancellation_policies: vec![],
            remarks: None,
        })
    }

    async fn prebook(&self, request: &PrebookRequest) -> BookingResult<HoldResponse> {
        Ok(HoldResponse {
            hold_id: format!("HOLD-{}", request.transaction_id),
            status: "held".to_string(),
            raw: Value::Null,
        })
    }

    async fn book(&self, request: &BookRequest) -> BookingResult<ConfirmationResponse> {
        Ok(ConfirmationResponse {
            confirmation_number: format!("CNF-{}", request.transaction_id),
            status: "confirmed".to_string(),
            raw: Value::Null,
        })
    }
}

struct TestApp {
    router: Router,
    gateway: Arc<AesGatewayAdapter>,
    token: String,
}

fn test_app() -> TestApp {
    let agency = Uuid::new_v4();
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.open_account(agency, dec!(10000));

    let supplier: Arc<dyn SupplierClient> = Arc::new(StubSupplier);
    let directory = Arc::new(StaticAgencyDirectory::new(HashMap::new()));
    let pricing = Arc::new(PricingEngine::new(Arc::new(InMemoryMarkupRepository::new())));
    let wallet = Arc::new(WalletAdapter::new(ledger, Duration::from_secs(1)));
    let gateway = Arc::new(
        AesGatewayAdapter::new(GatewaySettings {
            merchant_id: "M1".to_string(),
            access_code: "AC1".to_string(),
            working_key: "api-test-key".to_string(),
            action_url: "https://pay.example.com/transaction".to_string(),
            redirect_url: "https://hotelbridge.example.com/v1/payments/gateway/callback".to_string(),
        })
        .unwrap(),
    );

    let orchestrator = BookingOrchestrator::new(
        OrchestratorDeps {
            supplier: supplier.clone(),
            pricing: pricing.clone(),
            directory: directory.clone(),
            transactions: Arc::new(InMemoryTransactionRepository::new()),
            wallet: wallet.clone(),
            gateway: gateway.clone(),
            compensator: Compensator::new(wallet, RetryPolicy::with_max_retries(1)),
            notifications: NotificationDispatcher::new(Arc::new(LogNotifier), Duration::from_millis(100)),
        },
        OrchestratorSettings::default(),
    );
    let search = SearchService::new(
        supplier,
        pricing,
        directory,
        ResultCache::new(Arc::new(InMemoryCache::new()), Duration::from_millis(100)),
        SearchSettings::default(),
    );

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        search: Arc::new(search),
        redis: None,
        rate_limit_per_minute: 120,
        auth: AuthConfig { secret: SECRET.to_string(), expiration: 3600 },
    };

    TestApp {
        router: app(state),
        gateway,
        token: issue_token(&Principal::agency(agency), SECRET, 3600).unwrap(),
    }
}

fn search_body() -> Value {
    json!({
        "city_code": "GOI",
        "check_in": "2026-12-20",
        "check_out": "2026-12-21",
        "rooms": [{ "adults": 2, "children": 0, "child_ages": [] }],
        "nationality": "IN",
        "currency": "INR",
        "hotel_ids": []
    })
}

fn hold_body() -> Value {
    json!({
        "hotel_id": "GOI-7",
        "booking_key": "BK-1",
        "search": search_body(),
        "guests": [
            { "title": "Mr", "first_name": "Rohan", "last_name": "Iyer", "guest_type": "adult", "room_index": 0, "lead": true },
            { "title": "Ms", "first_name": "Meera", "last_name": "Iyer", "guest_type": "adult", "room_index": 0 }
        ],
        "contact": { "name": "Rohan Iyer", "email": "rohan@example.com", "phone": "+91 99000 11223" }
    })
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn authed_post(uri: &str, token: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let app = test_app();
    let (status, body) = send(&app.router, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_search_requires_token() {
    let app = test_app();
    let request = Request::post("/v1/hotels/search")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(search_body().to_string()))
        .unwrap();

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthorized");

    let (status, _) = send(&app.router, authed_post("/v1/hotels/search", "not-a-jwt", &search_body())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_search_returns_priced_hotels() {
    let app = test_app();
    let (status, body) = send(&app.router, authed_post("/v1/hotels/search", &app.token, &search_body())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["from_cache"], false);
    assert_eq!(body["hotels"][0]["hotel_id"], "GOI-7");
}

#[tokio::test]
async fn test_invalid_search_is_bad_request() {
    let app = test_app();
    let mut criteria = search_body();
    criteria["check_out"] = json!("2026-12-19");

    let (status, body) = send(&app.router, authed_post("/v1/hotels/search", &app.token, &criteria)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn test_hold_then_wallet_payment_confirms() {
    let app = test_app();
    let (status, view) = send(&app.router, authed_post("/v1/bookings/hold", &app.token, &hold_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(view["status"], "held");

    let id = view["id"].as_str().unwrap().to_string();
    let (status, outcome) = send(
        &app.router,
        authed_post(&format!("/v1/bookings/{}/pay/wallet", id), &app.token, &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "confirmed");
    assert_eq!(outcome["confirmation_number"], format!("CNF-{}", id));

    let request = Request::get(format!("/v1/bookings/{}", id))
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token))
        .body(Body::empty())
        .unwrap();
    let (status, view) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "confirmed");
}

#[tokio::test]
async fn test_unknown_booking_is_not_found() {
    let app = test_app();
    let request = Request::get(format!("/v1/bookings/{}", Uuid::new_v4()))
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token))
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_tampered_gateway_callback_is_rejected() {
    let app = test_app();
    let (_, view) = send(&app.router, authed_post("/v1/bookings/hold", &app.token, &hold_body())).await;
    let id = view["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app.router,
        authed_post(&format!("/v1/bookings/{}/pay/gateway", id), &app.token, &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (payload, signature) = app
        .gateway
        .seal_result(&GatewayResult {
            order_id: id.clone(),
            amount: dec!(3150),
            order_status: "Success".to_string(),
            tracking_id: Some("TRK-1".to_string()),
            status_message: None,
        })
        .unwrap();
    let forged = "0".repeat(signature.len());

    let form = format!(
        "enc_response={}&order_id={}&signature={}",
        urlencode(&payload),
        id,
        forged
    );
    let request = Request::post("/v1/payments/gateway/callback")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap();

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "payment_verification_failed");
}

/// Base64 carries `+`, `/` and `=`, which a form body must escape.
fn urlencode(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '+' => "%2B".to_string(),
            '/' => "%2F".to_string(),
            '=' => "%3D".to_string(),
            c => c.to_string(),
        })
        .collect()
}
