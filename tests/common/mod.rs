#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::{json, Value};

use cloudlens_edge::config::Config;
use cloudlens_edge::models::session::StoredSession;
use cloudlens_edge::models::user::UserProfile;

pub const USER_ID: &str = "user-1";
pub const TENANT_ID: &str = "tenant-1";
pub const GOOD_PASSWORD: &str = "Correct1Horse";
pub const ENCRYPTION_KEY: &str = "cloudlens-test-key";

pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// Unsigned JWT with the given payload. Nothing in the edge verifies signatures.
pub fn jwt(payload: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.c2lnbmF0dXJl", header, body)
}

pub fn access_token(expires_in: i64) -> String {
    jwt(json!({ "sub": USER_ID, "tenant_id": TENANT_ID, "exp": now() + expires_in }))
}

pub fn refresh_token(expires_in: i64) -> String {
    jwt(json!({ "sub": USER_ID, "type": "refresh", "exp": now() + expires_in }))
}

pub fn profile(onboarding_completed: bool) -> UserProfile {
    UserProfile {
        id: USER_ID.to_string(),
        email: Some("ops@example.com".to_string()),
        onboarding_completed,
        tenant_id: Some(TENANT_ID.to_string()),
        is_active: true,
        ..Default::default()
    }
}

pub fn session(access_expires_in: i64) -> StoredSession {
    StoredSession {
        access_token: access_token(access_expires_in),
        refresh_token: refresh_token(30 * 86400),
        user: Some(profile(true)),
    }
}

/// Call counters and knobs of a stub backend.
#[derive(Default)]
pub struct StubState {
    pub refresh_calls: AtomicUsize,
    pub refresh_rejects: AtomicBool,
    pub refresh_delay_ms: AtomicU64,
    pub scans_calls: AtomicUsize,
    /// How many `/api/scan/scans` calls answer 401 before one succeeds.
    pub unauthorized_remaining: AtomicUsize,
    pub scan_submissions: Mutex<Vec<Value>>,
    pub last_scans_headers: Mutex<Option<HeaderMap>>,
    pub logout_calls: AtomicUsize,
    pub last_logout_headers: Mutex<Option<HeaderMap>>,
    /// Refresh answers with an access token that is not a JWT.
    pub refresh_returns_garbage: AtomicBool,
    /// What `/auth/onboarding/status` reports.
    pub onboarding_completed: AtomicBool,
    pub password_changes: Mutex<Vec<Value>>,
    pub region_paths: Mutex<Vec<String>>,
    issued: AtomicUsize,
}

impl StubState {
    fn issue_pair(&self) -> Value {
        let serial = self.issued.fetch_add(1, Ordering::SeqCst);
        json!({
            "access_token": jwt(json!({
                "sub": USER_ID,
                "tenantId": TENANT_ID,
                "exp": now() + 3600,
                "jti": serial,
            })),
            "refresh_token": jwt(json!({
                "sub": USER_ID,
                "type": "refresh",
                "exp": now() + 30 * 86400,
                "jti": serial,
            })),
            "token_type": "bearer",
            "user": {
                "id": USER_ID,
                "email": "ops@example.com",
                "firstName": "Ada",
                "lastName": "Lovelace",
                "onboardingCompleted": true,
                "tenantId": TENANT_ID,
                "isActive": true,
            },
        })
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn scans_calls(&self) -> usize {
        self.scans_calls.load(Ordering::SeqCst)
    }
}

pub struct StubBackend {
    pub base_url: String,
    pub state: Arc<StubState>,
}

impl StubBackend {
    pub async fn start() -> Self {
        let state = Arc::new(StubState::default());

        let app = Router::new()
            .route("/auth/refresh", post(refresh))
            .route("/auth/signin", post(sign_in))
            .route("/auth/logout", post(logout))
            .route("/auth/me", get(me))
            .route("/auth/onboarding/status", get(onboarding_status))
            .route("/auth/change-password", post(change_password))
            .route("/api/regions/", get(all_regions))
            .route("/api/regions/{provider}", get(provider_regions))
            .route("/api/scan/scans", post(scans))
            .route("/api/scan/aws-cloud-scan", post(submit_scan))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn config(&self) -> Config {
        Config::for_backend(&self.base_url, Some(ENCRYPTION_KEY)).unwrap()
    }
}

/// A base URL nothing listens on.
pub async fn dead_backend_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn refresh(State(state): State<Arc<StubState>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if state.refresh_rejects.load(Ordering::SeqCst) || body.get("refresh_token").is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Invalid refresh token" })),
        );
    }

    let mut pair = state.issue_pair();
    if state.refresh_returns_garbage.load(Ordering::SeqCst) {
        pair["access_token"] = json!("not-a-jwt");
    }
    (StatusCode::OK, Json(pair))
}

async fn sign_in(State(state): State<Arc<StubState>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body.get("password").and_then(Value::as_str) != Some(GOOD_PASSWORD) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Incorrect email or password" })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Signed in",
            "data": state.issue_pair(),
        })),
    )
}

async fn logout(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Json<Value> {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_logout_headers.lock().unwrap() = Some(headers);
    Json(json!({ "success": true }))
}

async fn me(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !headers.contains_key("authorization") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Not authenticated" })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "user_id": USER_ID,
            "email": "renamed@example.com",
            "onboarding_completed": true,
            "organization_id": TENANT_ID,
        })),
    )
}

async fn scans(State(state): State<Arc<StubState>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    state.scans_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_scans_headers.lock().unwrap() = Some(headers);

    let remaining = state.unauthorized_remaining.load(Ordering::SeqCst);
    if remaining > 0 {
        state.unauthorized_remaining.store(remaining - 1, Ordering::SeqCst);
        return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Token expired" })));
    }

    (StatusCode::OK, Json(json!({ "scans": [], "total": 0 })))
}

async fn submit_scan(State(state): State<Arc<StubState>>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if !headers.contains_key("authorization") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Not authenticated" })));
    }
    state.scan_submissions.lock().unwrap().push(body);
    (
        StatusCode::OK,
        Json(json!({ "scan_id": "scan-1", "status": "queued" })),
    )
}

async fn onboarding_status(State(state): State<Arc<StubState>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !headers.contains_key("authorization") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Not authenticated" })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Onboarding status retrieved",
            "onboarding_completed": state.onboarding_completed.load(Ordering::SeqCst),
        })),
    )
}

async fn change_password(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !headers.contains_key("authorization") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Not authenticated" })));
    }
    if body.get("current_password").and_then(Value::as_str) != Some(GOOD_PASSWORD) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Current password is incorrect" })),
        );
    }
    state.password_changes.lock().unwrap().push(body);
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Password changed successfully" })),
    )
}

fn region(id: &str, provider: &str) -> Value {
    json!({
        "id": id,
        "name": id,
        "cloud_provider": provider,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
    })
}

async fn all_regions(State(state): State<Arc<StubState>>) -> Json<Value> {
    state.region_paths.lock().unwrap().push("/api/regions/".to_string());
    Json(json!([region("us-east-1", "AWS"), region("eastus", "AZURE")]))
}

async fn provider_regions(State(state): State<Arc<StubState>>, Path(provider): Path<String>) -> Json<Value> {
    state
        .region_paths
        .lock()
        .unwrap()
        .push(format!("/api/regions/{}", provider));
    Json(json!([region("us-east-1", &provider), region("eu-west-1", &provider)]))
}
