//! Tenant-scoped backend client.
//!
//! Attaches the stored access token and identity headers to every call,
//! refreshes a stale token before sending, and retries once after a 401.
//! Results are [`ApiResponse`] values; transport and upstream failures never
//! surface as `Err`.

use std::sync::Arc;

use reqwest::{header, Method, StatusCode};
use serde::{Deserialize, Serialize};
use sonic_rs::JsonValueTrait;
use tokio::sync::watch;

use crate::config::Config;
use crate::crypto::credentials::CipherService;
use crate::error::{AppError, Result};
use crate::models::claims;
use crate::models::scan::{DashboardQuery, ScanListQuery, ScanRequest, ScanSubmission};
use crate::models::session::{AuthEnvelope, StoredSession};
use crate::models::user::UserProfile;
use crate::services::refresh::{parked_ttl_for, SessionRefresher};
use crate::services::session_store::SessionStore;
use crate::validation::auth::{ChangePasswordRequest, SignInRequest, SignUpRequest};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

/// Error of a call refused locally because no session is stored.
pub const AUTH_REQUIRED: &str = "Authentication required";

/// Per-call options.
#[derive(Debug, Clone, Copy)]
pub struct RequestOptions {
    /// Fail without a network call when no session is stored.
    pub require_auth: bool,
}

impl RequestOptions {
    pub const AUTHENTICATED: Self = Self { require_auth: true };
    pub const PUBLIC: Self = Self { require_auth: false };
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::AUTHENTICATED
    }
}

/// Outcome of a backend call.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    /// HTTP status, absent when no response was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// The backend's JSON body, when it had one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<sonic_rs::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    fn failure(status: Option<u16>, error: impl Into<String>, data: Option<sonic_rs::Value>) -> Self {
        Self {
            success: false,
            status,
            data,
            error: Some(error.into()),
        }
    }

    /// Converts into the crate's error discipline, for callers that prefer `?`.
    pub fn into_result(self) -> Result<Option<sonic_rs::Value>> {
        if self.success {
            return Ok(self.data);
        }
        if self.is_auth_required() {
            return Err(AppError::Unauthenticated);
        }
        let message = self.error.unwrap_or_default();
        Err(match self.status {
            Some(401) => AppError::Unauthenticated,
            Some(status) => AppError::Upstream { status, message },
            None => AppError::Upstream { status: 502, message },
        })
    }

    /// True when the call was refused locally for lack of a session.
    pub fn is_auth_required(&self) -> bool {
        !self.success && self.status.is_none() && self.error.as_deref() == Some(AUTH_REQUIRED)
    }

    /// Deserializes `data` into `T`.
    pub fn parse_data<T: for<'de> Deserialize<'de>>(&self) -> Option<T> {
        let data = self.data.as_ref()?;
        let json = sonic_rs::to_string(data).ok()?;
        sonic_rs::from_str(&json).ok()
    }
}

/// Backend client bound to one identity store.
pub struct TenantApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn SessionStore>,
    refresher: SessionRefresher,
    sign_in_required: watch::Sender<bool>,
}

impl TenantApiClient {
    /// Creates a new `TenantApiClient`.
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the backend URL.
    /// * `http` - The HTTP client (carries the request timeout).
    /// * `store` - Where tokens and the cached profile live.
    /// * `refresher` - Shared refresh protocol.
    pub fn new(
        config: &Config,
        http: reqwest::Client,
        store: Arc<dyn SessionStore>,
        refresher: SessionRefresher,
    ) -> Self {
        let (sign_in_required, _) = watch::channel(false);
        Self {
            http,
            base_url: config.api_base_url.clone(),
            store,
            refresher,
            sign_in_required,
        }
    }

    /// Builds a standalone client with its own HTTP client and refresher.
    pub fn from_config(config: &Config, store: Arc<dyn SessionStore>) -> Result<Self> {
        let http = crate::state::build_http_client(config)?;
        let refresher = SessionRefresher::new(http.clone(), &config.api_base_url)
            .with_parked_ttl(parked_ttl_for(config.refresh_threshold_secs));
        Ok(Self::new(config, http, store, refresher))
    }

    /// Flips to `true` whenever authentication is lost and the user must sign in again.
    pub fn sign_in_required(&self) -> watch::Receiver<bool> {
        self.sign_in_required.subscribe()
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Sends one logical request.
    ///
    /// # Arguments
    ///
    /// * `method` - HTTP method.
    /// * `path` - Backend path, starting with `/`.
    /// * `body` - Optional JSON body.
    /// * `options` - See [`RequestOptions`].
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> ApiResponse {
        let mut session = if is_session_free_endpoint(path) {
            None
        } else {
            self.store.load()
        };

        if options.require_auth && session.is_none() {
            tracing::debug!("🔐 {} {} skipped: no session", method, path);
            return ApiResponse::failure(None, AUTH_REQUIRED, None);
        }

        let now = chrono::Utc::now().timestamp();
        if let Some(current) = session.clone() {
            if !claims::is_token_live(Some(&current.access_token), now) {
                tracing::debug!("🔄 Access token stale, refreshing before {} {}", method, path);
                session = match self.refresher.refresh(&current.refresh_token).await {
                    Some(pair) => {
                        let rotated = current.rotated(pair);
                        self.persist(&rotated);
                        Some(rotated)
                    }
                    None => {
                        self.clear_identity();
                        None
                    }
                };
            }
        }

        let first = self.send(&method, path, body, session.as_ref()).await;

        match first {
            Ok(response)
                if response.status() == StatusCode::UNAUTHORIZED && !is_session_free_endpoint(path) =>
            {
                self.retry_after_unauthorized(&method, path, body, session, response).await
            }
            Ok(response) => into_api_response(response).await,
            Err(e) => {
                tracing::warn!("❌ {} {} failed: {}", method, path, e);
                ApiResponse::failure(None, format!("Network error: {}", e), None)
            }
        }
    }

    async fn retry_after_unauthorized<B: Serialize + ?Sized>(
        &self,
        method: &Method,
        path: &str,
        body: Option<&B>,
        session: Option<StoredSession>,
        unauthorized: reqwest::Response,
    ) -> ApiResponse {
        let Some(current) = session else {
            self.lose_identity();
            return into_api_response(unauthorized).await;
        };

        tracing::info!("🔄 {} {} returned 401, refreshing once", method, path);
        let Some(pair) = self.refresher.refresh(&current.refresh_token).await else {
            self.lose_identity();
            return into_api_response(unauthorized).await;
        };

        let rotated = current.rotated(pair);
        self.persist(&rotated);

        match self.send(method, path, body, Some(&rotated)).await {
            Ok(response) if response.status() == StatusCode::UNAUTHORIZED => {
                tracing::warn!("❌ {} {} still unauthorized after refresh", method, path);
                self.lose_identity();
                into_api_response(response).await
            }
            Ok(response) => into_api_response(response).await,
            Err(e) => ApiResponse::failure(None, format!("Network error: {}", e), None),
        }
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: &Method,
        path: &str,
        body: Option<&B>,
        session: Option<&StoredSession>,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let mut builder = self
            .http
            .request(method.clone(), format!("{}{}", self.base_url, path))
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(session) = session {
            builder = builder.bearer_auth(&session.access_token);
            if let Some(user) = &session.user {
                builder = builder.header(USER_ID_HEADER, &user.id);
                if let Some(tenant_id) = &user.tenant_id {
                    builder = builder.header(TENANT_ID_HEADER, tenant_id);
                }
            }
        }

        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder.send().await
    }

    fn persist(&self, session: &StoredSession) {
        if let Err(e) = self.store.save(session) {
            tracing::error!("❌ Could not persist refreshed session: {}", e);
        }
    }

    fn clear_identity(&self) {
        if let Err(e) = self.store.clear() {
            tracing::error!("❌ Could not clear session store: {}", e);
        }
    }

    fn lose_identity(&self) {
        self.clear_identity();
        self.sign_in_required.send_replace(true);
        tracing::info!("👋 Identity cleared, sign-in required");
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> ApiResponse {
        self.request::<()>(Method::GET, path, None, options).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B, options: RequestOptions) -> ApiResponse {
        self.request(Method::POST, path, Some(body), options).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B, options: RequestOptions) -> ApiResponse {
        self.request(Method::PUT, path, Some(body), options).await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B, options: RequestOptions) -> ApiResponse {
        self.request(Method::PATCH, path, Some(body), options).await
    }

    pub async fn delete(&self, path: &str, options: RequestOptions) -> ApiResponse {
        self.request::<()>(Method::DELETE, path, None, options).await
    }

    pub async fn tenant_get(&self, path: &str) -> ApiResponse {
        self.get(path, RequestOptions::AUTHENTICATED).await
    }

    pub async fn tenant_post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResponse {
        self.post(path, body, RequestOptions::AUTHENTICATED).await
    }

    pub async fn tenant_put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResponse {
        self.put(path, body, RequestOptions::AUTHENTICATED).await
    }

    pub async fn tenant_patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResponse {
        self.patch(path, body, RequestOptions::AUTHENTICATED).await
    }

    pub async fn tenant_delete(&self, path: &str) -> ApiResponse {
        self.delete(path, RequestOptions::AUTHENTICATED).await
    }

    /// `POST /auth/signin`; stores the session on success.
    pub async fn sign_in(&self, form: &SignInRequest) -> ApiResponse {
        let response = self.post("/auth/signin", form, RequestOptions::PUBLIC).await;
        self.adopt_auth_envelope(response)
    }

    /// `POST /auth/signup`; stores the session on success.
    pub async fn sign_up(&self, form: &SignUpRequest) -> ApiResponse {
        let response = self.post("/auth/signup", form, RequestOptions::PUBLIC).await;
        self.adopt_auth_envelope(response)
    }

    fn adopt_auth_envelope(&self, response: ApiResponse) -> ApiResponse {
        if !response.success {
            return response;
        }

        let Some(session) = response
            .parse_data::<AuthEnvelope>()
            .and_then(|envelope| envelope.data)
        else {
            return ApiResponse::failure(response.status, "Malformed authentication response", response.data);
        };

        let pair = session.into_pair();
        let stored = StoredSession {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            user: pair.user,
        };

        if let Err(e) = self.store.save(&stored) {
            return ApiResponse::failure(response.status, format!("Could not store session: {}", e), None);
        }
        self.sign_in_required.send_replace(false);
        tracing::info!("✅ Signed in as {}", stored.user.as_ref().map(|u| u.id.as_str()).unwrap_or("<unknown>"));

        response
    }

    /// Best-effort `POST /auth/logout`, then clears the store.
    pub async fn sign_out(&self) -> ApiResponse {
        let response = self.post("/auth/logout", &(), RequestOptions::PUBLIC).await;
        self.clear_identity();
        response
    }

    /// `GET /auth/me`; refreshes the cached profile on success.
    pub async fn me(&self) -> ApiResponse {
        let response = self.tenant_get("/auth/me").await;
        if response.success {
            if let Some(profile) = response.data.as_ref().and_then(UserProfile::from_backend) {
                self.update_profile(|user| *user = Some(profile));
            }
        }
        response
    }

    /// `POST /auth/onboarding/complete`; marks the cached profile onboarded.
    pub async fn complete_onboarding<B: Serialize + ?Sized>(&self, details: &B) -> ApiResponse {
        let response = self.tenant_post("/auth/onboarding/complete", details).await;
        let completed = response
            .data
            .as_ref()
            .and_then(|d| d.get("onboarding_completed"))
            .and_then(|v| v.as_bool())
            .unwrap_or(response.success);
        if response.success && completed {
            self.update_profile(|user| {
                if let Some(user) = user {
                    user.onboarding_completed = true;
                }
            });
        }
        response
    }

    /// `GET /auth/onboarding/status`; copies the backend's flag into the cached profile.
    ///
    /// The flag is written both ways, so a profile cached as onboarded is
    /// corrected when the backend says otherwise.
    pub async fn onboarding_status(&self) -> ApiResponse {
        let response = self.tenant_get("/auth/onboarding/status").await;
        let completed = response
            .data
            .as_ref()
            .and_then(|d| d.get("onboarding_completed"))
            .and_then(|v| v.as_bool());
        if let (true, Some(completed)) = (response.success, completed) {
            self.update_profile(|user| {
                if let Some(user) = user {
                    user.onboarding_completed = completed;
                }
            });
        }
        response
    }

    /// `POST /auth/change-password`. The stored tokens stay as they are.
    pub async fn change_password(&self, form: &ChangePasswordRequest) -> ApiResponse {
        self.tenant_post("/auth/change-password", form).await
    }

    /// Lists cloud provider regions, optionally for one provider.
    ///
    /// The backend serves these without authentication, so a missing session
    /// does not stop the call.
    pub async fn regions(&self, cloud_provider: Option<&str>) -> ApiResponse {
        let path = match cloud_provider {
            Some(provider) => format!("/api/regions/{}", provider.to_ascii_uppercase()),
            None => "/api/regions/".to_string(),
        };
        self.get(&path, RequestOptions::PUBLIC).await
    }

    fn update_profile(&self, apply: impl FnOnce(&mut Option<UserProfile>)) {
        if let Some(mut session) = self.store.load() {
            apply(&mut session.user);
            self.persist(&session);
        }
    }

    /// Encrypts the credentials and submits a scan.
    ///
    /// # Returns
    ///
    /// `Err` when the form is invalid or encryption fails; the submission must
    /// not proceed in either case. Backend outcomes are in the `ApiResponse`.
    pub async fn start_scan(&self, cipher: &CipherService, request: &ScanRequest) -> Result<ApiResponse> {
        let submission = build_scan_submission(cipher, request)?;
        Ok(self.tenant_post("/api/scan/aws-cloud-scan", &submission).await)
    }

    pub async fn list_scans(&self, query: &ScanListQuery) -> ApiResponse {
        self.tenant_post("/api/scan/scans", query).await
    }

    pub async fn scan_detail(&self, scan_id: &str) -> ApiResponse {
        self.tenant_get(&format!("/api/scan/scan-status/{}", scan_id)).await
    }

    pub async fn dashboard_metrics(&self, query: &DashboardQuery) -> ApiResponse {
        self.tenant_post("/api/dashboard/metrics", query).await
    }
}

/// Validates a scan form and encrypts its credentials.
pub fn build_scan_submission(cipher: &CipherService, request: &ScanRequest) -> Result<ScanSubmission> {
    use garde::Validate;

    request.validate()?;

    let credentials = cipher
        .encrypt_credential_bundle(
            request.aws_access_key.trim(),
            request.aws_secret_key.trim(),
            request
                .aws_session_token
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty()),
        )
        .map_err(|e| match e {
            AppError::Configuration(_) => e,
            other => AppError::Encryption(other.to_string()),
        })?;

    Ok(ScanSubmission {
        credentials,
        excluded_regions: request.excluded_regions.clone(),
        scan_options: request.scan_options,
    })
}

/// Sent without the stored session: no pre-flight refresh, no bearer token,
/// no retry. A 401 from these means wrong credentials, not a stale token.
fn is_session_free_endpoint(path: &str) -> bool {
    matches!(path, "/auth/signin" | "/auth/signup" | "/auth/refresh" | "/auth/logout")
}

async fn into_api_response(response: reqwest::Response) -> ApiResponse {
    let status = response.status();
    let bytes = match response.bytes().await {
        Ok(b) => b,
        Err(e) => {
            return ApiResponse::failure(Some(status.as_u16()), format!("Could not read response: {}", e), None);
        }
    };

    let data: Option<sonic_rs::Value> = if bytes.is_empty() {
        None
    } else {
        sonic_rs::from_slice(&bytes).ok()
    };

    if status.is_success() {
        return ApiResponse {
            success: true,
            status: Some(status.as_u16()),
            data,
            error: None,
        };
    }

    let message = data
        .as_ref()
        .and_then(upstream_message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    ApiResponse::failure(Some(status.as_u16()), message, data)
}

/// FastAPI puts the reason in `detail`; other handlers use `message` or `error`.
fn upstream_message(body: &sonic_rs::Value) -> Option<String> {
    ["detail", "message", "error"].iter().find_map(|key| {
        let value = body.get(*key)?;
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None if value.is_null() => None,
            None => sonic_rs::to_string(value).ok(),
        }
    })
}
