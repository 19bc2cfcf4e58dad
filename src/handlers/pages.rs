use axum::{
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
};

use crate::services::api_client::{TENANT_ID_HEADER, USER_ID_HEADER};

/// Minimal page shell behind the gate.
///
/// Reports the rendered path and the identity headers the gate injected.
pub async fn page_shell(uri: Uri, headers: HeaderMap) -> Response {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let body = sonic_rs::to_string(&sonic_rs::json!({
        "path": uri.path(),
        "user_id": header_value(USER_ID_HEADER),
        "tenant_id": header_value(TENANT_ID_HEADER),
    }))
    .unwrap_or_else(|_| "{}".to_string());

    (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}
