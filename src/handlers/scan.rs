use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use tower_cookies::Cookies;

use crate::{
    error::{AppError, Result},
    handlers::client::{respond, EdgeSession},
    models::scan::{DashboardQuery, RegionQuery, ScanListQuery, ScanRequest},
    state::AppState,
};

/// Encrypts the submitted AWS credentials and starts a scan.
///
/// A missing key, an invalid form or a cipher failure ends the request with
/// an error before anything is sent to the backend.
#[axum::debug_handler]
pub async fn start_scan(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<ScanRequest>,
) -> Result<Response> {
    tracing::info!("🛰️  Scan submission: {:?}", payload);
    let cipher = state.cipher()?;

    let session = EdgeSession::open(&state, &cookies);
    let response = session.client().start_scan(&cipher, &payload).await?;
    if response.success {
        tracing::info!("✅ Scan accepted by backend");
    } else {
        tracing::warn!("❌ Scan rejected: {:?}", response.error);
    }
    session.sync(&state, &cookies);

    Ok(respond(response))
}

/// Lists the tenant's scans.
#[axum::debug_handler]
pub async fn list_scans(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<ScanListQuery>,
) -> Response {
    let session = EdgeSession::open(&state, &cookies);
    let response = session.client().list_scans(&query).await;
    session.sync(&state, &cookies);

    respond(response)
}

#[axum::debug_handler]
pub async fn scan_detail(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(scan_id): Path<String>,
) -> Result<Response> {
    check_segment(&scan_id, "scan id")?;

    let session = EdgeSession::open(&state, &cookies);
    let response = session.client().scan_detail(&scan_id).await;
    session.sync(&state, &cookies);

    Ok(respond(response))
}

#[axum::debug_handler]
pub async fn dashboard_metrics(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let session = EdgeSession::open(&state, &cookies);
    let response = session.client().dashboard_metrics(&query).await;
    session.sync(&state, &cookies);

    respond(response)
}

/// Lists regions, all providers or the one named by `?cloud_provider=`.
#[axum::debug_handler]
pub async fn regions(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<RegionQuery>,
) -> Result<Response> {
    let provider = query.cloud_provider.as_deref().filter(|p| !p.is_empty());
    if let Some(provider) = provider {
        check_segment(provider, "cloud provider")?;
    }

    let session = EdgeSession::open(&state, &cookies);
    let response = session.client().regions(provider).await;
    session.sync(&state, &cookies);

    Ok(respond(response))
}

#[axum::debug_handler]
pub async fn provider_regions(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(cloud_provider): Path<String>,
) -> Result<Response> {
    check_segment(&cloud_provider, "cloud provider")?;

    let session = EdgeSession::open(&state, &cookies);
    let response = session.client().regions(Some(&cloud_provider)).await;
    session.sync(&state, &cookies);

    Ok(respond(response))
}

/// Values spliced into backend paths must be a single plain segment.
fn check_segment(value: &str, what: &str) -> Result<()> {
    if value.is_empty()
        || !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::Validation(format!("Invalid {}", what)));
    }
    Ok(())
}
