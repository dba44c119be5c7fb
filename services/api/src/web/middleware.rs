//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for the admin surface.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::web::state::AppState;

/// The shared-secret header the admin UI presents on every call. This stands
/// in for the host platform's own privilege and request-forgery checks.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Middleware that validates the admin token header.
///
/// If the header is missing or does not match the configured secret, the
/// request is rejected with 401 Unauthorized.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !token_matches(presented, &state.config.admin_token) {
        warn!("rejected admin request with a bad token");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}

/// Length-guarded byte-wise comparison that always scans the full token, so
/// a mismatch position cannot leak through response timing.
fn token_matches(presented: &str, expected: &str) -> bool {
    let presented = presented.as_bytes();
    let expected = expected.as_bytes();
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}
