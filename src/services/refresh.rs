//! Refresh-token exchange against `POST /auth/refresh`.
//!
//! Concurrent callers holding the same refresh token share a single in-flight
//! exchange. Background refreshes park their result so a later request that
//! still carries the old refresh token can pick up the new pair.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::session::{BackendSession, TokenPair};

/// Shortest time a background refresh result waits to be collected.
pub const MIN_PARKED_RESULT_TTL: Duration = Duration::from_secs(60);

/// Retention for parked pairs given the near-expiry threshold.
///
/// A background refresh fires once the access token has less than
/// `refresh_threshold_secs` left, and the rotated refresh token is already
/// spent at the backend by then. The new pair must stay collectable until the
/// old access token runs out.
pub fn parked_ttl_for(refresh_threshold_secs: i64) -> Duration {
    let threshold = Duration::from_secs(refresh_threshold_secs.max(0).unsigned_abs());
    threshold.max(MIN_PARKED_RESULT_TTL)
}

type InFlight = Shared<BoxFuture<'static, Option<TokenPair>>>;

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Exchanges refresh tokens for new token pairs.
#[derive(Clone)]
pub struct SessionRefresher {
    http: reqwest::Client,
    endpoint: String,
    in_flight: Arc<Mutex<HashMap<String, InFlight>>>,
    parked: Arc<Mutex<HashMap<String, (TokenPair, Instant)>>>,
    parked_ttl: Duration,
}

impl SessionRefresher {
    /// Creates a new `SessionRefresher`.
    ///
    /// # Arguments
    ///
    /// * `http` - The HTTP client (carries the request timeout).
    /// * `api_base_url` - Backend base URL without trailing slash.
    pub fn new(http: reqwest::Client, api_base_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/auth/refresh", api_base_url),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            parked: Arc::new(Mutex::new(HashMap::new())),
            parked_ttl: MIN_PARKED_RESULT_TTL,
        }
    }

    /// Keeps parked background results for `ttl` instead of the minimum.
    pub fn with_parked_ttl(mut self, ttl: Duration) -> Self {
        self.parked_ttl = ttl;
        self
    }

    pub fn parked_ttl(&self) -> Duration {
        self.parked_ttl
    }

    /// Exchanges `refresh_token` for a new pair.
    ///
    /// Never fails: a rejected token, a non-2xx answer, a timeout or a network
    /// error all yield `None`.
    pub async fn refresh(&self, refresh_token: &str) -> Option<TokenPair> {
        let shared = {
            let Ok(mut in_flight) = self.in_flight.lock() else {
                tracing::error!("❌ Refresh registry lock poisoned");
                return None;
            };
            in_flight
                .entry(refresh_token.to_string())
                .or_insert_with(|| {
                    let http = self.http.clone();
                    let endpoint = self.endpoint.clone();
                    let token = refresh_token.to_string();
                    async move {
                        match exchange(&http, &endpoint, &token).await {
                            Ok(pair) => {
                                tracing::info!("✅ Session refreshed");
                                Some(pair)
                            }
                            Err(e) => {
                                tracing::warn!("❌ Session refresh failed: {}", e);
                                None
                            }
                        }
                    }
                    .boxed()
                    .shared()
                })
                .clone()
        };

        let result = shared.clone().await;

        // A newer exchange may already sit under this token; only drop our own.
        if let Ok(mut in_flight) = self.in_flight.lock() {
            if in_flight
                .get(refresh_token)
                .is_some_and(|current| current.ptr_eq(&shared))
            {
                in_flight.remove(refresh_token);
            }
        }

        result
    }

    /// Starts a refresh without waiting for it.
    ///
    /// Best effort: failures are logged and otherwise dropped. A successful
    /// result is parked for [`Self::parked_ttl`] under the old refresh token.
    pub fn refresh_in_background(&self, refresh_token: &str) {
        let refresher = self.clone();
        let token = refresh_token.to_string();
        tokio::spawn(async move {
            tracing::debug!("🔄 Background refresh started");
            if let Some(pair) = refresher.refresh(&token).await {
                refresher.park(token, pair);
            }
        });
    }

    /// Takes a parked background result for `refresh_token`, if one is fresh.
    pub fn take_parked(&self, refresh_token: &str) -> Option<TokenPair> {
        let mut parked = self.parked.lock().ok()?;
        let ttl = self.parked_ttl;
        parked.retain(|_, (_, at)| at.elapsed() < ttl);
        parked.remove(refresh_token).map(|(pair, _)| pair)
    }

    fn park(&self, refresh_token: String, pair: TokenPair) {
        if let Ok(mut parked) = self.parked.lock() {
            parked.insert(refresh_token, (pair, Instant::now()));
        }
    }
}

async fn exchange(http: &reqwest::Client, endpoint: &str, refresh_token: &str) -> Result<TokenPair> {
    let response = http
        .post(endpoint)
        .json(&RefreshRequest { refresh_token })
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        tracing::debug!("🔍 Refresh endpoint answered {}", status);
        return Err(AppError::RefreshFailed);
    }

    let body = response.bytes().await?;
    let session: BackendSession = sonic_rs::from_slice(&body)
        .map_err(|e| AppError::Internal(format!("Invalid refresh response: {}", e)))?;

    Ok(session.into_pair())
}
