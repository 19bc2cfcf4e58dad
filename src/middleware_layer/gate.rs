//! The per-request edge gate.
//!
//! Decides, before any page handler runs, whether the visitor continues,
//! gets a refreshed session, or is redirected. Token expiry is handled first,
//! route redirects second, identity header injection last.

use std::panic::AssertUnwindSafe;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use futures::FutureExt;
use tower_cookies::Cookies;

use crate::{
    error::{AppError, Result},
    middleware_layer::routes::{RouteKind, DASHBOARD_PATH, ONBOARDING_PATH, SIGN_IN_PATH},
    models::claims::{self, Claims},
    models::session::{StoredSession, TokenPair},
    services::api_client::{TENANT_ID_HEADER, USER_ID_HEADER},
    services::identity_cookies::{self, CookieIdentity},
    state::AppState,
};

/// Identity the gate vouches for, available to handlers as a request extension.
#[derive(Debug, Clone, PartialEq)]
pub struct GateIdentity {
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
    pub onboarding_completed: bool,
}

#[derive(Debug)]
enum Decision {
    Continue(Option<GateIdentity>),
    Redirect(&'static str),
}

/// A middleware that enforces sign-in, refresh and onboarding redirects.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The downstream `Response`, or a redirect.
pub async fn edge_gate(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let kind = RouteKind::classify(request.uri().path());
    if kind == RouteKind::Skip {
        return next.run(request).await;
    }

    // identity headers are only ever set here
    request.headers_mut().remove(USER_ID_HEADER);
    request.headers_mut().remove(TENANT_ID_HEADER);

    let outcome = AssertUnwindSafe(decide(&state, &cookies, kind))
        .catch_unwind()
        .await;

    let decision = match outcome {
        Ok(Ok(decision)) => decision,
        Ok(Err(e)) => {
            tracing::warn!("❌ Edge gate failed for {}: {}", request.uri().path(), e);
            identity_cookies::clear_session(&cookies);
            return Redirect::to(SIGN_IN_PATH).into_response();
        }
        Err(_) => {
            tracing::error!("❌ Edge gate panicked for {}", request.uri().path());
            identity_cookies::clear_session(&cookies);
            return Redirect::to(SIGN_IN_PATH).into_response();
        }
    };

    match decision {
        Decision::Redirect(target) => {
            tracing::debug!("↪️  {} -> {}", request.uri().path(), target);
            Redirect::to(target).into_response()
        }
        Decision::Continue(identity) => {
            if let Some(identity) = identity {
                inject_identity_headers(&mut request, &identity);
                request.extensions_mut().insert(identity);
            }
            next.run(request).await
        }
    }
}

async fn decide(state: &AppState, cookies: &Cookies, kind: RouteKind) -> Result<Decision> {
    let now = chrono::Utc::now().timestamp();
    let mut identity = identity_cookies::read_identity(cookies);

    // a background refresh from an earlier request may have finished
    if let Some(pair) = identity
        .refresh_token
        .as_deref()
        .and_then(|token| state.refresher.take_parked(token))
    {
        tracing::debug!("🔄 Adopting background refresh result");
        identity = adopt(state, cookies, &identity, pair);
    }

    let live_access = identity
        .access_token
        .as_deref()
        .and_then(claims::decode_token)
        .filter(|c| !c.is_expired(now));

    let mut refreshed = false;
    let access_claims: Claims = match live_access {
        Some(c) => c,
        None if refresh_is_valid(&identity, now) => {
            let refresh_token = identity.refresh_token.clone().unwrap_or_default();
            match state.refresher.refresh(&refresh_token).await {
                Some(pair) => {
                    identity = adopt(state, cookies, &identity, pair);
                    refreshed = true;
                    identity
                        .access_token
                        .as_deref()
                        .and_then(claims::decode_token)
                        .ok_or(AppError::MalformedToken)?
                }
                None => {
                    identity_cookies::clear_session(cookies);
                    return Ok(Decision::Redirect(SIGN_IN_PATH));
                }
            }
        }
        None => {
            if !identity.is_empty() {
                identity_cookies::clear_session(cookies);
            }
            if kind.allows_anonymous() {
                return Ok(Decision::Continue(None));
            }
            return Ok(Decision::Redirect(SIGN_IN_PATH));
        }
    };

    let onboarded = identity
        .user
        .as_ref()
        .is_some_and(|u| u.onboarding_completed);

    match kind {
        RouteKind::AuthOnly if onboarded => return Ok(Decision::Redirect(DASHBOARD_PATH)),
        RouteKind::AuthOnly => return Ok(Decision::Redirect(ONBOARDING_PATH)),
        RouteKind::Onboarding if onboarded => return Ok(Decision::Redirect(DASHBOARD_PATH)),
        RouteKind::Protected if !onboarded => return Ok(Decision::Redirect(ONBOARDING_PATH)),
        _ => {}
    }

    if !refreshed
        && access_claims.is_near_expiry(now, state.config.refresh_threshold_secs)
        && refresh_is_valid(&identity, now)
    {
        if let Some(token) = identity.refresh_token.as_deref() {
            state.refresher.refresh_in_background(token);
        }
    }

    let user = identity.user.as_ref();
    Ok(Decision::Continue(Some(GateIdentity {
        user_id: user.map(|u| u.id.clone()).or(access_claims.sub),
        tenant_id: user
            .and_then(|u| u.tenant_id.clone())
            .or(access_claims.tenant_id),
        onboarding_completed: onboarded,
    })))
}

fn refresh_is_valid(identity: &CookieIdentity, now: i64) -> bool {
    identity
        .refresh_token
        .as_deref()
        .and_then(claims::decode_token)
        .is_some_and(|c| !c.is_expired(now))
}

/// Writes a new pair to all three cookies and returns the identity as it now stands.
fn adopt(state: &AppState, cookies: &Cookies, current: &CookieIdentity, pair: TokenPair) -> CookieIdentity {
    let session = StoredSession {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        user: pair.user.or_else(|| current.user.clone()),
    };
    identity_cookies::write_session(cookies, &state.config, &session);

    CookieIdentity {
        access_token: Some(session.access_token),
        refresh_token: Some(session.refresh_token),
        user: session.user,
    }
}

fn inject_identity_headers(request: &mut Request<Body>, identity: &GateIdentity) {
    for (name, value) in [
        (USER_ID_HEADER, identity.user_id.as_deref()),
        (TENANT_ID_HEADER, identity.tenant_id.as_deref()),
    ] {
        let Some(value) = value else { continue };
        match HeaderValue::from_str(value) {
            Ok(header) => {
                request.headers_mut().insert(name, header);
            }
            Err(_) => tracing::warn!("⚠️  Skipping unrepresentable {} header", name),
        }
    }
}
