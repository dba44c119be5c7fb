//! services/api/src/web/chat.rs
//!
//! The message relay between the embedded browser widget and the remote
//! node's chat endpoints. Payload shapes are owned by the remote service and
//! pass through here untouched.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::Value;
use sitechat_core::ports::{RelayError, RelayResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use crate::web::state::AppState;

const CHAT_TIMEOUT: Duration = Duration::from_secs(30);

//=========================================================================================
// The Proxy
//=========================================================================================

/// Forwards chat traffic to `{base}/api/chat/*` on the remote node.
#[derive(Clone)]
pub struct ChatProxy {
    http: reqwest::Client,
    base_url: String,
}

impl ChatProxy {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Relays a chat message; the body is opaque to this service.
    pub async fn query(&self, body: Value) -> RelayResult<(u16, Value)> {
        let response = self
            .http
            .post(self.endpoint("api/chat/query"))
            .timeout(CHAT_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .json::<Value>()
            .await
            .unwrap_or(Value::Null);
        Ok((status, body))
    }

    /// Fetches the conversation history for a widget session.
    pub async fn messages(&self, params: &HashMap<String, String>) -> RelayResult<(u16, Value)> {
        let response = self
            .http
            .get(self.endpoint("api/chat/messages"))
            .timeout(CHAT_TIMEOUT)
            .query(params)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .json::<Value>()
            .await
            .unwrap_or(Value::Null);
        Ok((status, body))
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

fn passthrough(result: RelayResult<(u16, Value)>) -> Result<impl IntoResponse, (StatusCode, String)> {
    match result {
        Ok((status, body)) => {
            let status =
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            Ok((status, Json(body)))
        }
        Err(e) => {
            error!("chat relay failed: {e}");
            Err((StatusCode::BAD_GATEWAY, "Chat service is unavailable.".to_string()))
        }
    }
}

/// Relay a chat message from the widget to the remote node.
pub async fn chat_query_handler(
    State(app_state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    passthrough(app_state.chat.query(body).await)
}

/// Relay a conversation-history fetch from the widget to the remote node.
pub async fn chat_messages_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    passthrough(app_state.chat.messages(&params).await)
}
