use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use qris_gateway::{
    app::{build_router, AppState},
    error::ProviderError,
    models::{Profile, UpstreamDeposit, UpstreamStatus},
    services::*,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

/// Provider double whose status answer can be changed mid-test.
struct FakeProvider {
    status: Mutex<UpstreamStatus>,
    created: AtomicUsize,
    checks: AtomicUsize,
}

impl FakeProvider {
    fn new() -> Self {
        Self {
            status: Mutex::new(UpstreamStatus::Pending),
            created: AtomicUsize::new(0),
            checks: AtomicUsize::new(0),
        }
    }

    fn answer(&self, status: UpstreamStatus) {
        *self.status.lock().unwrap() = status;
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn create_deposit(&self, ref_id: &str, amount: i64) -> Result<UpstreamDeposit, ProviderError> {
        if amount < 1_000 {
            return Err(ProviderError::Rejected {
                status: 422,
                message: "Minimum deposit is 1000".to_string(),
            });
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(UpstreamDeposit {
            ref_id: ref_id.to_string(),
            amount: amount + 123,
            qr_string: "00020101021126570011ID".to_string(),
            qr_image: "https://qr.example/deposit.png".to_string(),
            date: None,
            status: Some("unpaid".to_string()),
        })
    }

    async fn check_status(&self, _ref_id: &str) -> Result<UpstreamStatus, ProviderError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(*self.status.lock().unwrap())
    }
}

struct Harness {
    app: Router,
    store: Arc<MemoryStore>,
    provider: Arc<FakeProvider>,
}

async fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    for (user, id, key) in [("user-a", "id-a", "key-a"), ("user-b", "id-b", "key-b")] {
        store
            .upsert_profile(&Profile {
                user_id: user.to_string(),
                api_id: id.to_string(),
                api_key: key.to_string(),
                balance: 0,
            })
            .await
            .unwrap();
    }

    let provider = Arc::new(FakeProvider::new());
    let analytics = Arc::new(Analytics::new());
    let state = AppState {
        deposits: Arc::new(DepositService::new(
            store.clone(),
            provider.clone(),
            analytics.clone(),
        )),
        credentials: Arc::new(CredentialValidator::new(store.clone(), Duration::from_secs(30))),
        store: store.clone(),
        analytics,
    };

    Harness {
        app: build_router(state),
        store,
        provider,
    }
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    creds: Option<(&str, &str)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, key)) = creds {
        builder = builder.header("x-api-id", id).header("x-api-key", key);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

const A: Option<(&str, &str)> = Some(("id-a", "key-a"));
const B: Option<(&str, &str)> = Some(("id-b", "key-b"));

async fn create(h: &Harness, amount: i64) -> Value {
    let (status, body) = call(
        &h.app,
        Method::POST,
        "/api/v1/deposits",
        A,
        Some(json!({ "amount": amount })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

#[tokio::test]
async fn create_returns_unpaid_deposit_with_three_hour_window() {
    let h = harness().await;

    let (status, body) = call(
        &h.app,
        Method::POST,
        "/api/v1/deposits",
        A,
        Some(json!({ "amount": 50000 })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    let data = &body["data"];
    assert_eq!(data["status"], "unpaid");
    assert_eq!(data["amount"], 50000);
    assert_eq!(data["final_amount"], 50123);
    assert!(data["paid_at"].is_null());
    assert!(data["ref_id"].as_str().unwrap().starts_with("USR_user-a_"));

    let created: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(data["created_at"].clone()).unwrap();
    let expires: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(data["expires_at"].clone()).unwrap();
    assert_eq!(expires - created, chrono::Duration::hours(3));
}

#[tokio::test]
async fn invalid_amounts_are_bad_requests_and_persist_nothing() {
    let h = harness().await;

    for amount in [json!(0), json!(-100), json!(10.5), json!("abc"), json!(null)] {
        let (status, body) = call(
            &h.app,
            Method::POST,
            "/api/v1/deposits",
            A,
            Some(json!({ "amount": amount })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Amount must be positive");
    }

    assert_eq!(h.provider.created.load(Ordering::SeqCst), 0);
    assert!(h.store.list_deposits("user-a", None, 50).await.unwrap().is_empty());
}

#[tokio::test]
async fn upstream_rejection_is_passed_through() {
    let h = harness().await;

    let (status, body) = call(
        &h.app,
        Method::POST,
        "/api/v1/deposits",
        A,
        Some(json!({ "amount": 500 })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "Minimum deposit is 1000");
}

#[tokio::test]
async fn credentials_are_required_everywhere() {
    let h = harness().await;
    let ref_id = create(&h, 10_000).await["ref_id"].as_str().unwrap().to_string();
    h.provider.answer(UpstreamStatus::Paid);

    let cases = [
        (Method::POST, "/api/v1/deposits".to_string(), None),
        (Method::GET, format!("/api/v1/deposits?ref_id={ref_id}"), None),
        (
            Method::GET,
            format!("/api/v1/deposits?ref_id={ref_id}"),
            Some(("id-a", "wrong")),
        ),
        (Method::GET, "/api/v1/profile".to_string(), Some(("nope", "key-a"))),
    ];

    for (method, uri, creds) in cases {
        let (status, body) = call(&h.app, method, &uri, creds, Some(json!({ "amount": 1000 }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["status"], "error");
    }

    // Nothing moved.
    assert_eq!(h.provider.checks.load(Ordering::SeqCst), 0);
    let stored = h.store.find_deposit("user-a", &ref_id).await.unwrap().unwrap();
    assert_eq!(stored.status.as_str(), "unpaid");
    assert_eq!(h.store.get_profile("user-a").await.unwrap().unwrap().balance, 0);
}

#[tokio::test]
async fn lookup_settles_paid_deposit_once() {
    let h = harness().await;
    let ref_id = create(&h, 50_000).await["ref_id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/deposits?ref_id={ref_id}");

    let (status, body) = call(&h.app, Method::GET, &uri, A, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "unpaid");

    h.provider.answer(UpstreamStatus::Paid);
    let (_, body) = call(&h.app, Method::GET, &uri, A, None).await;
    assert_eq!(body["data"]["status"], "paid");
    assert!(body["data"]["paid_at"].is_string());

    let checks = h.provider.checks.load(Ordering::SeqCst);
    let (_, again) = call(&h.app, Method::GET, &uri, A, None).await;
    assert_eq!(again["data"], body["data"]);
    assert_eq!(h.provider.checks.load(Ordering::SeqCst), checks);

    let (_, profile) = call(&h.app, Method::GET, "/api/v1/profile", A, None).await;
    assert_eq!(profile["data"]["balance"], 50_123);
}

#[tokio::test]
async fn concurrent_lookups_credit_balance_once() {
    let h = harness().await;
    let ref_id = create(&h, 10_000).await["ref_id"].as_str().unwrap().to_string();
    h.provider.answer(UpstreamStatus::Paid);

    let uri = format!("/api/v1/deposits?ref_id={ref_id}");
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let app = h.app.clone();
            let uri = uri.clone();
            tokio::spawn(async move { call(&app, Method::GET, &uri, A, None).await })
        })
        .collect();

    for handle in handles {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "paid");
    }

    assert_eq!(h.store.get_profile("user-a").await.unwrap().unwrap().balance, 10_123);
}

#[tokio::test]
async fn gone_upstream_expires_deposit() {
    let h = harness().await;
    let ref_id = create(&h, 10_000).await["ref_id"].as_str().unwrap().to_string();
    h.provider.answer(UpstreamStatus::Gone);

    let (_, body) = call(
        &h.app,
        Method::GET,
        &format!("/api/v1/deposits?ref_id={ref_id}"),
        A,
        None,
    )
    .await;

    assert_eq!(body["data"]["status"], "expired");
    assert!(body["data"]["paid_at"].is_null());
}

#[tokio::test]
async fn other_users_deposits_are_not_found() {
    let h = harness().await;
    let ref_id = create(&h, 10_000).await["ref_id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &h.app,
        Method::GET,
        &format!("/api/v1/deposits?ref_id={ref_id}"),
        B,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Deposit not found");
}

#[tokio::test]
async fn listing_filters_orders_and_caps() {
    let h = harness().await;
    let mut refs = Vec::new();
    for amount in [1_000, 2_000, 3_000, 4_000] {
        refs.push(create(&h, amount).await["ref_id"].as_str().unwrap().to_string());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    for ref_id in [&refs[0], &refs[2]] {
        h.store
            .settle_paid("user-a", ref_id, chrono::Utc::now())
            .await
            .unwrap();
    }

    let (status, body) = call(&h.app, Method::GET, "/api/v1/deposits?status=paid", A, None).await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["ref_id"].as_str().unwrap())
        .collect();
    assert_eq!(listed, vec![refs[2].as_str(), refs[0].as_str()]);

    let (_, body) = call(&h.app, Method::GET, "/api/v1/deposits?limit=3", A, None).await;
    let listed: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["ref_id"].as_str().unwrap())
        .collect();
    assert_eq!(listed, vec![refs[3].as_str(), refs[2].as_str(), refs[1].as_str()]);

    // Listing never polls the provider.
    assert_eq!(h.provider.checks.load(Ordering::SeqCst), 0);

    let (_, other) = call(&h.app, Method::GET, "/api/v1/deposits", B, None).await;
    assert!(other["data"].as_array().unwrap().is_empty());

    let (status, _) = call(&h.app, Method::GET, "/api/v1/deposits?status=refunded", A, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rotated_credentials_replace_old_pair() {
    let h = harness().await;

    let (status, body) = call(&h.app, Method::POST, "/api/v1/profile/credentials", A, None).await;
    assert_eq!(status, StatusCode::OK);
    let api_id = body["data"]["api_id"].as_str().unwrap().to_string();
    let api_key = body["data"]["api_key"].as_str().unwrap().to_string();

    let (status, _) = call(&h.app, Method::GET, "/api/v1/profile", A, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, profile) = call(
        &h.app,
        Method::GET,
        "/api/v1/profile",
        Some((&api_id, &api_key)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["data"]["user_id"], "user-a");
    assert!(profile["data"].get("api_key").is_none());
}

#[tokio::test]
async fn preflight_is_open() {
    let h = harness().await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/deposits")
        .header(header::ORIGIN, "https://dashboard.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-api-id,x-api-key,content-type")
        .body(Body::empty())
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());

    // Plain OPTIONS without CORS headers is answered too.
    let (status, body) = call(&h.app, Method::OPTIONS, "/api/v1/deposits", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());
}

#[tokio::test]
async fn health_and_stats_report() {
    let h = harness().await;
    create(&h, 10_000).await;

    let (status, health) = call(&h.app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["storage"], true);

    let (_, stats) = call(&h.app, Method::GET, "/stats", None, None).await;
    assert_eq!(stats["deposits_created"], 1);
    assert_eq!(stats["deposits_paid"], 0);
}
