use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine as _;

use crate::state::AppState;

/// Axum middleware that requires a valid `Authorization` header, either
/// `Bearer <token>` or HTTP Basic with the token as the password (the form
/// sent by clients that only speak Basic auth, such as Terraform's HTTP
/// state backend).
///
/// Returns 401 for missing, malformed, or incorrect tokens.
/// Applied to all routes — no public endpoints.
pub async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let header = request.headers().get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());

    let authorized = match header {
        Some(value) => match value.strip_prefix("Bearer ") {
            Some(token) => token == state.auth_token.as_str(),
            None => match value.strip_prefix("Basic ").and_then(|b64| base64::engine::general_purpose::STANDARD.decode(b64).ok()) {
                Some(decoded) => String::from_utf8(decoded)
                    .ok()
                    .and_then(|creds| creds.split_once(':').map(|(_, password)| password == state.auth_token.as_str()))
                    .unwrap_or(false),
                None => false,
            },
        },
        None => false,
    };

    if authorized {
        next.run(request).await
    } else {
        (StatusCode::UNAUTHORIZED, "Unauthorized\n").into_response()
    }
}
