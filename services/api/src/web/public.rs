//! services/api/src/web/public.rs
//!
//! The unauthenticated surface: the challenge-token callback the remote
//! verifier fetches during registration, and the widget bootstrap endpoint
//! that hands the browser bundle its configuration and session cookie.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Days, NaiveTime, Utc};
use serde::Serialize;
use sitechat_core::domain::{ChatPosition, ChatbotSettings};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::web::state::AppState;

/// The anonymous visitor cookie the widget uses to correlate conversation
/// turns. Not validated server-side beyond presence.
pub const SESSION_COOKIE: &str = "aichat_session_id";

//=========================================================================================
// Challenge-Token Callback
//=========================================================================================

#[derive(Serialize)]
struct ChallengeResponse {
    token: String,
}

/// Returns the transiently stored registration challenge token.
///
/// The remote node calls this during step three of the handshake to prove the
/// registrant controls this domain. Outside of an in-flight registration the
/// slot is empty and the endpoint answers 404.
pub async fn challenge_token_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match app_state.settings.challenge_token().await {
        Ok(Some(token)) => Ok(Json(ChallengeResponse { token })),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            "No registration challenge is in progress.".to_string(),
        )),
        Err(e) => {
            error!("failed to read challenge token: {e}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read the challenge token.".to_string(),
            ))
        }
    }
}

//=========================================================================================
// Widget Bootstrap
//=========================================================================================

/// The inline configuration handed to the prebuilt chat bundle.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WidgetConfig {
    enabled: bool,
    chatbot_title: String,
    chat_position: ChatPosition,
    query_url: &'static str,
    messages_url: &'static str,
    nonce: String,
    session_id: String,
}

impl WidgetConfig {
    fn from_settings(settings: &ChatbotSettings, session_id: String) -> Self {
        Self {
            enabled: settings.enabled,
            chatbot_title: settings.chatbot_title.clone(),
            chat_position: settings.chat_position,
            query_url: "/chat/query",
            messages_url: "/chat/messages",
            nonce: Uuid::new_v4().to_string(),
            session_id,
        }
    }
}

/// Serves the widget bootstrap configuration, minting the visitor session
/// cookie on the first request that arrives without one.
pub async fn widget_config_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, String)> {
    let settings = app_state.settings.load_settings().await.map_err(|e| {
        error!("failed to load settings for the widget: {e}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load the widget configuration.".to_string(),
        )
    })?;

    let existing = session_id_from_headers(&headers);
    let (session_id, fresh_cookie) = match existing {
        Some(id) => (id, None),
        None => {
            let id = new_session_id();
            let cookie = session_cookie(&id, Utc::now());
            (id, Some(cookie))
        }
    };

    let mut response = Json(WidgetConfig::from_settings(&settings, session_id)).into_response();
    if let Some(cookie) = fresh_cookie {
        let value: axum::http::HeaderValue = cookie.parse().map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to build the session cookie.".to_string(),
            )
        })?;
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    Ok(response)
}

//=========================================================================================
// Session Cookie Helpers
//=========================================================================================

fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|c| {
        c.trim()
            .strip_prefix(&format!("{SESSION_COOKIE}="))
            .map(|v| v.to_string())
    })
}

/// Mints a fresh session id: an anonymous user component plus a short random
/// component.
fn new_session_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("session_0_{}", &random[..10])
}

/// Builds the Set-Cookie value. The session expires at the next midnight UTC,
/// so a visitor gets at most one session id per day.
fn session_cookie(session_id: &str, now: DateTime<Utc>) -> String {
    let midnight = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap_or_else(|| now.date_naive())
        .and_time(NaiveTime::MIN);
    format!(
        "{SESSION_COOKIE}={session_id}; Path=/; Expires={}; SameSite=Lax",
        midnight.format("%a, %d %b %Y %H:%M:%S GMT")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn session_ids_carry_the_anonymous_prefix_and_random_tail() {
        let id = new_session_id();
        assert!(id.starts_with("session_0_"));
        assert_eq!(id.len(), "session_0_".len() + 10);
        assert_ne!(id, new_session_id());
    }

    #[test]
    fn session_cookie_expires_at_the_next_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 15, 30, 0).unwrap();
        let cookie = session_cookie("session_0_abcdef1234", now);
        assert!(cookie.starts_with("aichat_session_id=session_0_abcdef1234;"));
        assert!(cookie.contains("Expires=Sun, 10 Mar 2024 00:00:00 GMT"));
    }

    #[test]
    fn cookie_header_parsing_finds_the_session_id() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "theme=dark; aichat_session_id=session_0_aaaa111122; other=1"
                .parse()
                .unwrap(),
        );
        assert_eq!(
            session_id_from_headers(&headers).as_deref(),
            Some("session_0_aaaa111122")
        );
        assert!(session_id_from_headers(&HeaderMap::new()).is_none());
    }
}
