//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::config::Config;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Currency, Money};
use ledger::{InMemoryIdempotencyStore, InMemoryLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    AgentCommissionService, CheckoutServices, ConfirmBehavior, InMemoryCancellationService,
    InMemoryPaymentGateway,
};
use search::{InMemorySupplier, Occupancy, SupplierClient, SupplierQuote};
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    ledger: InMemoryLedger,
    gateway: InMemoryPaymentGateway,
    supplier: InMemorySupplier,
}

fn setup() -> TestApp {
    let ledger = InMemoryLedger::new();
    let gateway = InMemoryPaymentGateway::new();
    let supplier = InMemorySupplier::with_quotes(
        "alpha",
        vec![quote("H-100", "Creek Palace", 46_000), quote("H-200", "Marina Bay", 30_000)],
    );

    let config = Config::default();
    let services = CheckoutServices {
        gateway: Arc::new(gateway.clone()),
        financial: Arc::new(AgentCommissionService::new(config.agent_commission_bps)),
        cancellations: Arc::new(InMemoryCancellationService::new()),
        idempotency: Arc::new(InMemoryIdempotencyStore::new()),
    };
    let suppliers: Vec<Arc<dyn SupplierClient>> = vec![Arc::new(supplier.clone())];
    let state = api::create_state(&config, Arc::new(ledger.clone()), services, suppliers);

    TestApp {
        app: api::create_app(state, get_metrics_handle()),
        ledger,
        gateway,
        supplier,
    }
}

fn quote(hotel_id: &str, hotel_name: &str, per_night: i64) -> SupplierQuote {
    SupplierQuote {
        supplier_id: "alpha".to_string(),
        hotel_id: hotel_id.to_string(),
        hotel_name: hotel_name.to_string(),
        room_id: "DBL".to_string(),
        option_id: "OPT-1".to_string(),
        currency: Currency::parse("AED").unwrap(),
        base_price_per_night: Money::from_minor(per_night - 6_000),
        markup_price_per_night: Money::from_minor(per_night),
        quantity: 1,
        cancellation_allowed: false,
        board_type: "BB".to_string(),
        occupancy: Occupancy {
            adults: 2,
            children: 0,
            child_ages: vec![],
        },
        rating: 4,
        amenities: vec!["pool".to_string()],
        tax: None,
    }
}

fn search_context() -> Value {
    json!({
        "destination": "Dubai",
        "checkin": "2026-11-02",
        "checkout": "2026-11-05",
        "rooms": 1,
        "adults": 2,
        "nationality": "AE",
        "currency": "AED"
    })
}

fn reserve_body(session_id: &str) -> Value {
    json!({
        "session_id": session_id,
        "selection": { "supplier_id": "alpha", "hotel_id": "H-100", "option_id": "OPT-1" },
        "travellers": [
            { "type": "adult", "first_name": "Layla", "last_name": "Haddad" },
            { "type": "adult", "first_name": "Omar", "last_name": "Haddad" }
        ],
        "payer": { "email": "layla@example.com", "user_id": "u-42" }
    })
}

fn card_body() -> Value {
    json!({
        "card": { "token": "tok_visa" },
        "billing_details": { "name": "Layla Haddad", "email": "layla@example.com" }
    })
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_as(uri: &str, role: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-caller-role", role)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn search_session(app: &axum::Router) -> String {
    let (status, json) = send(app, post("/search", json!({ "context": search_context() }))).await;
    assert_eq!(status, StatusCode::OK);
    json["session_id"].as_str().unwrap().to_string()
}

async fn reserve(app: &axum::Router, booking_ref: &str) {
    let session_id = search_session(app).await;
    let (status, _) = send(
        app,
        post(
            &format!("/checkouts/{booking_ref}/reserve"),
            reserve_body(&session_id),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_health_check() {
    let t = setup();

    let (status, json) = send(&t.app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup();
    reserve(&t.app, "TT-9000").await;

    let response = t.app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("checkout_reservations_total"));
}

#[tokio::test]
async fn test_search_then_view_and_load_more() {
    let t = setup();
    t.supplier
        .set_page(2, vec![quote("H-300", "Atlantis", 90_000)]);

    let (status, json) = send(&t.app, post("/search", json!({ "context": search_context() }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["quotes"].as_array().unwrap().len(), 2);
    let session_id = json["session_id"].as_str().unwrap().to_string();

    let (status, json) = send(
        &t.app,
        post(
            &format!("/search/{session_id}/view"),
            json!({ "sort": "price_low" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["quotes"][0]["hotel_name"], "Marina Bay");

    let (status, json) = send(&t.app, post(&format!("/search/{session_id}/more"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["added"], 1);
    assert_eq!(json["quotes"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_invalid_search_is_bad_request() {
    let t = setup();
    let mut context = search_context();
    context["checkout"] = json!("2026-11-01");

    let (status, json) = send(&t.app, post("/search", json!({ "context": context }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("checkout"));
}

#[tokio::test]
async fn test_unknown_search_session_is_not_found() {
    let t = setup();
    let uri = "/search/00000000-0000-0000-0000-000000000000/more";

    let (status, _) = send(&t.app, post(uri, json!({}))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reserve_twice_is_deduplicated() {
    let t = setup();

    reserve(&t.app, "TT-1001").await;
    let session_id = search_session(&t.app).await;
    let (status, json) = send(
        &t.app,
        post("/checkouts/TT-1001/reserve", reserve_body(&session_id)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deduplicated"], true);

    let (status, json) = send(&t.app, get("/bookings/TT-1001")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "pending");
    assert_eq!(json["financials"]["price_markup"], 138_000);
    assert_eq!(json["payment_gateway"], "stripe");
}

#[tokio::test]
async fn test_reserve_with_wrong_traveller_count_is_unprocessable() {
    let t = setup();
    let session_id = search_session(&t.app).await;
    let mut body = reserve_body(&session_id);
    body["travellers"].as_array_mut().unwrap().pop();

    let (status, _) = send(&t.app, post("/checkouts/TT-1002/reserve", body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(t.ledger.entry_count().await, 0);
}

#[tokio::test]
async fn test_reserve_prices_from_the_search_session() {
    let t = setup();
    let session_id = search_session(&t.app).await;
    let mut body = reserve_body(&session_id);
    body["quote"] = json!(quote("H-100", "Creek Palace", 1));
    body["markup_price_per_night"] = json!(1);

    let (status, _) = send(&t.app, post("/checkouts/TT-1005/reserve", body)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, json) = send(&t.app, get("/bookings/TT-1005")).await;
    assert_eq!(json["financials"]["price_markup"], 138_000);
    assert_eq!(json["stay"]["checkin"], "2026-11-02");
}

#[tokio::test]
async fn test_reserve_rejects_quote_not_in_session() {
    let t = setup();
    let session_id = search_session(&t.app).await;

    let mut body = reserve_body(&session_id);
    body["selection"]["option_id"] = json!("OPT-CHEAP");
    let (status, _) = send(&t.app, post("/checkouts/TT-1006/reserve", body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let body = reserve_body("00000000-0000-0000-0000-000000000000");
    let (status, _) = send(&t.app, post("/checkouts/TT-1006/reserve", body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(t.ledger.entry_count().await, 0);
}

#[tokio::test]
async fn test_invalid_booking_ref_is_bad_request() {
    let t = setup();

    let (status, _) = send(&t.app, get("/bookings/not%20a%20ref")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_financials_are_agent_only() {
    let t = setup();
    reserve(&t.app, "TT-1003").await;

    let (status, _) = send(&t.app, post("/checkouts/TT-1003/financials", json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(
        &t.app,
        post_as("/checkouts/TT-1003/financials", "agent", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["financials"]["agent_fee"], 6_900);
}

#[tokio::test]
async fn test_unknown_caller_role_is_bad_request() {
    let t = setup();
    reserve(&t.app, "TT-1004").await;

    let (status, _) = send(
        &t.app,
        post_as("/checkouts/TT-1004/financials", "admin", json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pay_confirms_and_hands_off() {
    let t = setup();
    reserve(&t.app, "TT-2001").await;

    let (status, json) = send(&t.app, post("/checkouts/TT-2001/pay", card_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "confirmed");
    assert_eq!(t.gateway.charges().len(), 1);

    let redirect_url = json["redirect_url"].as_str().unwrap();
    let (_, token) = redirect_url.split_once("?token=").unwrap();
    let (status, json) = send(&t.app, get(&format!("/handoff/{token}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["booking_ref"], "TT-2001");
    assert_eq!(json["price"], 138_000);
    assert_eq!(json["client_email"], "layla@example.com");

    let (_, json) = send(&t.app, get("/bookings/TT-2001")).await;
    assert_eq!(json["status"], "paid");

    let (status, json) = send(&t.app, get("/checkouts/TT-2001")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["finalized"], true);
    assert_eq!(json["attempts"], 1);
}

#[tokio::test]
async fn test_pay_without_reservation_conflicts() {
    let t = setup();

    let (status, json) = send(&t.app, post("/checkouts/TT-2002/pay", card_body())).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["booking_ref"], "TT-2002");
    assert!(t.gateway.charges().is_empty());
}

#[tokio::test]
async fn test_tampered_handoff_token_is_rejected() {
    let t = setup();

    let (status, _) = send(&t.app, get("/handoff/bm90LWE.dG9rZW4")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_declined_card_answers_payment_required() {
    let t = setup();
    reserve(&t.app, "TT-2003").await;
    t.gateway
        .set_confirm_behavior(ConfirmBehavior::Decline("Your card was declined.".to_string()));

    let (status, json) = send(&t.app, post("/checkouts/TT-2003/pay", card_body())).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json["outcome"], "declined");
    assert_eq!(json["message"], "Your card was declined.");

    t.gateway.set_confirm_behavior(ConfirmBehavior::Succeed);
    let (status, json) = send(&t.app, post("/checkouts/TT-2003/pay", card_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "confirmed");
}

#[tokio::test]
async fn test_abandon_with_nothing_pending() {
    let t = setup();
    reserve(&t.app, "TT-2004").await;

    let (status, json) = send(&t.app, post("/checkouts/TT-2004/abandon", json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["abandoned"], false);
}

#[tokio::test]
async fn test_paid_but_unpersisted_booking_is_reconciled_by_operator() {
    let t = setup();
    reserve(&t.app, "TT-3001").await;
    t.ledger.fail_appends_for("Booking", true).await;

    let (status, json) = send(&t.app, post("/checkouts/TT-3001/pay", card_body())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "paid_pending_reconciliation");
    assert!(json["warning"].as_str().unwrap().contains("TT-3001"));
    assert!(json["redirect_url"].is_string());

    let (status, _) = send(&t.app, get("/reconciliations")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = Request::builder()
        .uri("/reconciliations")
        .header("x-caller-role", "operator")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["booking_ref"], "TT-3001");

    t.ledger.fail_appends_for("Booking", false).await;
    let (status, json) = send(
        &t.app,
        post_as("/reconciliations/TT-3001", "operator", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "confirmed");
    assert_eq!(t.gateway.charges().len(), 1);

    let (_, json) = send(&t.app, get("/bookings/TT-3001")).await;
    assert_eq!(json["status"], "paid");
}

#[tokio::test]
async fn test_missing_booking_names_the_reference() {
    let t = setup();

    let (status, json) = send(&t.app, get("/bookings/TT-4040")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["booking_ref"], "TT-4040");
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_non_refundable_booking_cannot_be_cancelled() {
    let t = setup();
    reserve(&t.app, "TT-5001").await;
    let (status, _) = send(&t.app, post("/checkouts/TT-5001/pay", card_body())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(
        &t.app,
        post("/bookings/TT-5001/cancel", json!({ "reason": "change of plans" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["booking_ref"], "TT-5001");

    let (_, json) = send(&t.app, get("/bookings/TT-5001")).await;
    assert_eq!(json["status"], "paid");
}

#[tokio::test]
async fn test_booking_history_lists_entries_in_order() {
    let t = setup();
    reserve(&t.app, "TT-6001").await;
    send(&t.app, post("/checkouts/TT-6001/pay", card_body())).await;

    let (status, json) = send(&t.app, get("/bookings/TT-6001/events")).await;
    assert_eq!(status, StatusCode::OK);

    let entries = json.as_array().unwrap();
    assert_eq!(entries[0]["entry_type"], "DraftReserved");
    assert_eq!(entries.last().unwrap()["entry_type"], "BookingFinalized");
    let versions: Vec<i64> = entries
        .iter()
        .map(|e| e["version"].as_i64().unwrap())
        .collect();
    assert!(versions.windows(2).all(|w| w[0] < w[1]));
}
