use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::database::AppState;

/// Middleware to check the shared gateway secret
///
/// When `API_SECRET` is configured, every request must carry an
/// `Authorization` header with exactly that value. When it is not
/// configured, the check is skipped.
pub async fn require_api_secret(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    if let Some(secret) = state.config.api_secret.as_deref() {
        let unauthorized_response = || {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Invalid or missing authorization header",
                    "code": "unauthorized"
                })),
            )
                .into_response()
        };

        match headers.get("Authorization").map(|v| v.to_str()) {
            Some(Ok(header_str)) if header_str == secret => {}
            _ => {
                tracing::debug!(uri = %request.uri(), "rejected request without gateway secret");
                return Err(unauthorized_response());
            }
        }
    }

    Ok(next.run(request).await)
}
