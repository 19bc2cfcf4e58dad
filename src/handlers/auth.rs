use axum::{extract::State, response::Response, Json};
use garde::Validate;
use tower_cookies::Cookies;

use crate::{
    error::Result,
    handlers::client::{respond, EdgeSession},
    services::identity_cookies,
    state::AppState,
    validation::auth::{ChangePasswordRequest, SignInRequest, SignUpRequest},
};

/// Handles sign-in.
///
/// On success all three identity cookies are written.
#[axum::debug_handler]
pub async fn sign_in(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<SignInRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Sign-in attempt for {}", payload.email);
    payload.validate()?;

    let session = EdgeSession::open(&state, &cookies);
    let response = session.client().sign_in(&payload).await;
    if !response.success {
        tracing::warn!("❌ Sign-in rejected for {}: {:?}", payload.email, response.error);
    }
    session.sync(&state, &cookies);

    Ok(respond(response))
}

/// Handles sign-up.
#[axum::debug_handler]
pub async fn sign_up(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<SignUpRequest>,
) -> Result<Response> {
    tracing::info!("📝 Sign-up attempt for {}", payload.email);
    payload.validate()?;

    let session = EdgeSession::open(&state, &cookies);
    let response = session.client().sign_up(&payload).await;
    session.sync(&state, &cookies);

    Ok(respond(response))
}

/// Handles sign-out. The cookies are cleared even when the backend call fails.
#[axum::debug_handler]
pub async fn sign_out(State(state): State<AppState>, cookies: Cookies) -> Response {
    let session = EdgeSession::open(&state, &cookies);
    let response = session.client().sign_out().await;
    if !response.success {
        tracing::debug!("🔍 Backend logout failed: {:?}", response.error);
    }
    identity_cookies::clear_session(&cookies);
    tracing::info!("👋 Signed out");

    respond(response)
}

/// Returns the current user's profile and refreshes the profile cookie.
#[axum::debug_handler]
pub async fn me(State(state): State<AppState>, cookies: Cookies) -> Response {
    let session = EdgeSession::open(&state, &cookies);
    let response = session.client().me().await;
    session.sync(&state, &cookies);

    respond(response)
}

/// Completes onboarding and marks the cached profile.
#[axum::debug_handler]
pub async fn complete_onboarding(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(details): Json<sonic_rs::Value>,
) -> Response {
    let session = EdgeSession::open(&state, &cookies);
    let response = session.client().complete_onboarding(&details).await;
    if response.success {
        tracing::info!("✅ Onboarding completed");
    }
    session.sync(&state, &cookies);

    respond(response)
}

/// Reads the onboarding flag from the backend and rewrites the profile cookie.
#[axum::debug_handler]
pub async fn onboarding_status(State(state): State<AppState>, cookies: Cookies) -> Response {
    let session = EdgeSession::open(&state, &cookies);
    let response = session.client().onboarding_status().await;
    session.sync(&state, &cookies);

    respond(response)
}

/// Changes the signed-in user's password.
#[axum::debug_handler]
pub async fn change_password(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Response> {
    payload.validate()?;

    let session = EdgeSession::open(&state, &cookies);
    let response = session.client().change_password(&payload).await;
    if response.success {
        tracing::info!("🔑 Password changed");
    } else {
        tracing::warn!("❌ Password change rejected: {:?}", response.error);
    }
    session.sync(&state, &cookies);

    Ok(respond(response))
}
