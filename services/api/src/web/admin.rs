//! services/api/src/web/admin.rs
//!
//! Contains the Axum handlers for the admin actions (register, save
//! settings, send keys, push content) and the master definition for the
//! OpenAPI specification.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sitechat_core::domain::{
    sanitize_page_ids, AiKeys, ChatPosition, ChatbotSettings, ContentCategory, ProviderConfig,
    RegistrationState, DEFAULT_CHATBOT_TITLE,
};
use sitechat_core::flows;
use sitechat_core::ports::RelayError;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        register_handler,
        push_data_handler,
    ),
    components(
        schemas(RegisterResponse, PushDataResponse)
    ),
    tags(
        (name = "SiteChat Relay Admin", description = "Admin actions that register this site with the RAG node and push content for indexing.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The response payload sent after a successful site registration. The issued
/// apiKey deliberately never travels back to the browser.
#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    message: String,
    site_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct PushDataResponse {
    message: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    registration: RegistrationState,
    settings: ChatbotSettings,
    commerce_active: bool,
}

#[derive(Serialize)]
pub struct KeysResponse {
    message: String,
    keys_sent_at: Option<DateTime<Utc>>,
}

/// Partial settings update; absent fields keep their stored values. Every
/// present field passes through its sanitizer before the record is written.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsForm {
    pub enabled: Option<bool>,
    pub chatbot_title: Option<String>,
    pub chat_position: Option<String>,
    pub active_provider: Option<String>,
    pub openai_model: Option<String>,
    pub gemini_model: Option<String>,
    /// Accepted loosely (numbers or strings) so a sloppy admin client cannot
    /// poison the stored record; invalid entries are dropped.
    pub policy_page_ids: Option<Vec<Value>>,
    pub push_categories: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct KeysForm {
    pub openai_key: Option<String>,
    pub gemini_key: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct PushForm {
    pub categories: Vec<String>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub s: Option<String>,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn relay_error_response(error: RelayError) -> (StatusCode, String) {
    let status = match &error {
        RelayError::PreconditionFailed(_) | RelayError::ValidationFailed(_) => {
            StatusCode::BAD_REQUEST
        }
        RelayError::Transport(_) | RelayError::RemoteRejected { .. } => StatusCode::BAD_GATEWAY,
        RelayError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error.to_string())
}

//=========================================================================================
// Sanitization Helpers
//=========================================================================================

/// Coerces a loosely-typed id list (JSON numbers or numeric strings) into
/// candidate ids for `sanitize_page_ids`.
fn coerce_page_ids(values: &[Value]) -> Vec<i64> {
    values
        .iter()
        .filter_map(|value| match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        })
        .collect()
}

/// Applies a partial form onto the stored settings record, field by field,
/// through the domain sanitizers.
fn apply_settings_form(mut settings: ChatbotSettings, form: SettingsForm) -> ChatbotSettings {
    if let Some(enabled) = form.enabled {
        settings.enabled = enabled;
    }
    if let Some(title) = form.chatbot_title {
        let title = title.trim();
        settings.chatbot_title = if title.is_empty() {
            DEFAULT_CHATBOT_TITLE.to_string()
        } else {
            title.to_string()
        };
    }
    if let Some(position) = form.chat_position {
        settings.chat_position = ChatPosition::sanitize(&position);
    }

    let active_provider = form
        .active_provider
        .unwrap_or_else(|| settings.provider.active_provider.as_str().to_string());
    let openai_model = form
        .openai_model
        .unwrap_or_else(|| settings.provider.openai_model.clone());
    let gemini_model = form
        .gemini_model
        .unwrap_or_else(|| settings.provider.gemini_model.clone());
    settings.provider = ProviderConfig::sanitize(&active_provider, &openai_model, &gemini_model);

    if let Some(ids) = form.policy_page_ids {
        settings.policy_page_ids = sanitize_page_ids(&coerce_page_ids(&ids));
    }
    if let Some(categories) = form.push_categories {
        settings.push_categories = ContentCategory::sanitize_list(&categories);
    }
    settings
}

//=========================================================================================
// Admin Handlers
//=========================================================================================

/// Reports where this site sits in the register → keys → index chain,
/// together with the current settings record.
pub async fn status_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let settings = app_state
        .settings
        .load_settings()
        .await
        .map_err(relay_error_response)?;
    let identity = app_state
        .settings
        .site_identity()
        .await
        .map_err(relay_error_response)?;
    let registered_at = app_state
        .settings
        .registered_at()
        .await
        .map_err(relay_error_response)?;
    let keys_sent_at = app_state
        .settings
        .keys_sent_at()
        .await
        .map_err(relay_error_response)?;

    Ok(Json(StatusResponse {
        registration: RegistrationState {
            registered: identity.is_some(),
            site_id: identity.map(|i| i.site_id),
            registered_at,
            keys_sent_at,
        },
        settings,
        commerce_active: app_state.content.commerce_active(),
    }))
}

/// Register this site with the RAG node.
///
/// Runs the three-step challenge-response handshake. The node fetches this
/// service's public challenge-token endpoint before issuing credentials.
#[utoipa::path(
    post,
    path = "/admin/register",
    responses(
        (status = 200, description = "Site registered and credentials stored", body = RegisterResponse),
        (status = 502, description = "The RAG node was unreachable or rejected the registration"),
        (status = 401, description = "Missing or invalid admin token")
    )
)]
pub async fn register_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let result = flows::register_site(
        app_state.node.as_ref(),
        app_state.settings.as_ref(),
        &app_state.config.site,
        &app_state.config.challenge_verification_url(),
    )
    .await;

    match result {
        Ok(identity) => {
            info!(site_id = %identity.site_id, "site registered with the RAG node");
            Ok(Json(RegisterResponse {
                message: "Site registered successfully!".to_string(),
                site_id: identity.site_id,
            }))
        }
        Err(e) => {
            error!("site registration failed: {e}");
            Err(relay_error_response(e))
        }
    }
}

/// Revoke the stored site credential; the site returns to the unregistered
/// state and later pushes fail their precondition until re-registration.
pub async fn revoke_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .settings
        .revoke_site_identity()
        .await
        .map_err(relay_error_response)?;
    info!("site credential revoked");
    Ok(StatusCode::NO_CONTENT)
}

/// Save the chatbot settings record. Returns the sanitized record as stored.
pub async fn save_settings_handler(
    State(app_state): State<Arc<AppState>>,
    Json(form): Json<SettingsForm>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let current = app_state
        .settings
        .load_settings()
        .await
        .map_err(relay_error_response)?;
    let updated = apply_settings_form(current, form);
    app_state
        .settings
        .save_settings(&updated)
        .await
        .map_err(relay_error_response)?;
    Ok(Json(updated))
}

/// Forward the provider keys and model configuration to the RAG node. Keys
/// exist only in the outbound request; nothing is persisted locally.
pub async fn send_keys_handler(
    State(app_state): State<Arc<AppState>>,
    Json(form): Json<KeysForm>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let keys = AiKeys {
        openai_api_key: form.openai_key.unwrap_or_default(),
        gemini_api_key: form.gemini_key.unwrap_or_default(),
    };

    let result = flows::push_ai_keys(app_state.node.as_ref(), app_state.settings.as_ref(), keys).await;
    match result {
        Ok(message) => {
            let keys_sent_at = app_state
                .settings
                .keys_sent_at()
                .await
                .map_err(relay_error_response)?;
            Ok(Json(KeysResponse {
                message,
                keys_sent_at,
            }))
        }
        Err(e) => {
            error!("AI key push failed: {e}");
            Err(relay_error_response(e))
        }
    }
}

/// Index the selected content categories.
///
/// Extracts every selected category and uploads the bundle to the RAG node.
/// Unknown category tags are dropped before the push runs.
#[utoipa::path(
    post,
    path = "/admin/push-data",
    responses(
        (status = 200, description = "Content uploaded for indexing", body = PushDataResponse),
        (status = 400, description = "No valid category selected, or the site is not registered"),
        (status = 502, description = "The RAG node was unreachable or rejected the upload"),
        (status = 401, description = "Missing or invalid admin token")
    )
)]
pub async fn push_data_handler(
    State(app_state): State<Arc<AppState>>,
    Json(form): Json<PushForm>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let selection = ContentCategory::sanitize_list(&form.categories);

    let result = flows::push_content(
        app_state.node.as_ref(),
        app_state.settings.as_ref(),
        app_state.content.as_ref(),
        &selection,
    )
    .await;

    match result {
        Ok(message) => {
            info!(categories = ?selection, "content pushed to the RAG node");
            Ok(Json(PushDataResponse { message }))
        }
        Err(e) => {
            error!("content push failed: {e}");
            Err(relay_error_response(e))
        }
    }
}

/// Title search over published pages for the policy-page picker.
pub async fn search_pages_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let term = params.s.unwrap_or_default();
    let hits = app_state
        .content
        .search_pages(&term)
        .await
        .map_err(relay_error_response)?;
    Ok(Json(hits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sitechat_core::domain::AiProvider;

    #[test]
    fn loose_page_id_input_keeps_only_valid_unique_ids() {
        let raw = vec![json!(3), json!(-1), json!("abc"), json!(3)];
        let ids = sanitize_page_ids(&coerce_page_ids(&raw));
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn numeric_strings_are_accepted_as_page_ids() {
        let raw = vec![json!("7"), json!(" 9 "), json!(true)];
        assert_eq!(coerce_page_ids(&raw), vec![7, 9]);
    }

    #[test]
    fn invalid_provider_in_the_form_stores_the_default() {
        let form = SettingsForm {
            active_provider: Some("invalid".to_string()),
            ..Default::default()
        };
        let updated = apply_settings_form(ChatbotSettings::default(), form);
        assert_eq!(updated.provider.active_provider, AiProvider::Gemini);
    }

    #[test]
    fn absent_form_fields_keep_stored_values() {
        let mut stored = ChatbotSettings::default();
        stored.enabled = true;
        stored.provider.openai_model = "o3".to_string();

        let form = SettingsForm {
            chatbot_title: Some("Support Bot".to_string()),
            ..Default::default()
        };
        let updated = apply_settings_form(stored, form);
        assert!(updated.enabled);
        assert_eq!(updated.provider.openai_model, "o3");
        assert_eq!(updated.chatbot_title, "Support Bot");
    }

    #[test]
    fn unknown_categories_are_dropped_from_the_form() {
        let form = SettingsForm {
            push_categories: Some(vec!["faqs".into(), "everything".into()]),
            ..Default::default()
        };
        let updated = apply_settings_form(ChatbotSettings::default(), form);
        assert_eq!(updated.push_categories, vec![ContentCategory::Faqs]);
    }
}
