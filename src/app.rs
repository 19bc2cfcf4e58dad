use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::{handlers, middleware_layer, state::AppState};

/// Edge API routes. The gate skips the `/api` prefix, so these authenticate
/// through the cookies themselves.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/signin", post(handlers::auth::sign_in))
        .route("/api/auth/signup", post(handlers::auth::sign_up))
        .route("/api/auth/signout", post(handlers::auth::sign_out))
        .route("/api/auth/me", get(handlers::auth::me))
        .route(
            "/api/auth/onboarding/complete",
            post(handlers::auth::complete_onboarding),
        )
        .route(
            "/api/auth/onboarding/status",
            get(handlers::auth::onboarding_status),
        )
        .route("/api/auth/change-password", post(handlers::auth::change_password))
        .route("/api/scan/start", post(handlers::scan::start_scan))
        .route("/api/scan/list", get(handlers::scan::list_scans))
        .route("/api/scan/{scan_id}", get(handlers::scan::scan_detail))
        .route("/api/dashboard/metrics", get(handlers::scan::dashboard_metrics))
        .route("/api/regions", get(handlers::scan::regions))
        .route("/api/regions/{cloud_provider}", get(handlers::scan::provider_regions))
        .with_state(state)
}

/// Assembles the edge application.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `downstream` - Serves every non-API path once the gate lets it through.
///
/// # Returns
///
/// The `Router`, without the CORS layer.
pub fn router(state: AppState, downstream: Router) -> Router {
    Router::new()
        .merge(api_routes(state.clone()))
        .merge(downstream)
        .layer(from_fn_with_state(
            state,
            middleware_layer::gate::edge_gate,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
}

/// The default downstream: the page shell for every path.
pub fn page_shell() -> Router {
    Router::new().fallback(handlers::pages::page_shell)
}
