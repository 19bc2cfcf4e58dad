//! Glue between edge API handlers and the tenant-scoped client.
//!
//! Each request gets a client over an in-memory store seeded from the
//! identity cookies; whatever the client leaves in the store is mirrored back
//! into the cookies when the handler is done.

use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tower_cookies::Cookies;

use crate::{
    models::session::StoredSession,
    services::api_client::{ApiResponse, TenantApiClient},
    services::identity_cookies,
    services::session_store::{MemorySessionStore, SessionStore},
    state::AppState,
};

/// A tenant client bound to one request's cookies.
pub struct EdgeSession {
    client: TenantApiClient,
    store: Arc<MemorySessionStore>,
    initial: Option<StoredSession>,
}

impl EdgeSession {
    /// Seeds a client from the request's identity cookies.
    pub fn open(state: &AppState, cookies: &Cookies) -> Self {
        let initial = identity_cookies::read_identity(cookies).to_stored();
        let store = Arc::new(match initial.clone() {
            Some(session) => MemorySessionStore::with_session(session),
            None => MemorySessionStore::new(),
        });
        let client = TenantApiClient::new(
            &state.config,
            state.http.clone(),
            store.clone(),
            state.refresher.clone(),
        );

        Self {
            client,
            store,
            initial,
        }
    }

    pub fn client(&self) -> &TenantApiClient {
        &self.client
    }

    /// Writes the store back to the cookie channel, all three values together.
    pub fn sync(self, state: &AppState, cookies: &Cookies) {
        match self.store.load() {
            Some(current) if self.initial.as_ref() != Some(&current) => {
                identity_cookies::write_session(cookies, &state.config, &current);
            }
            Some(_) => {}
            None if self.initial.is_some() => identity_cookies::clear_session(cookies),
            None => {}
        }
    }
}

/// Turns a client result into an HTTP response.
///
/// Success passes the backend's JSON through unchanged; failures keep the
/// backend status and carry the structured result.
pub fn respond(response: ApiResponse) -> Response {
    let status = match response.status.and_then(|s| StatusCode::from_u16(s).ok()) {
        Some(status) => status,
        None if response.is_auth_required() => StatusCode::UNAUTHORIZED,
        None => StatusCode::BAD_GATEWAY,
    };

    let body = if response.success {
        match &response.data {
            Some(data) => sonic_rs::to_string(data),
            None => sonic_rs::to_string(&sonic_rs::json!({ "success": true })),
        }
    } else {
        sonic_rs::to_string(&response)
    };

    let body = body.unwrap_or_else(|e| {
        tracing::error!("❌ Could not encode response: {}", e);
        r#"{"success":false,"error":"Internal server error"}"#.to_string()
    });

    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}
