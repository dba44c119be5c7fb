//! crates/sitechat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the relay.
//! These structs are independent of any database or HTTP framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Site Identity & Registration
//=========================================================================================

/// The (siteId, apiKey) pair proving this installation is a registered tenant
/// of the remote RAG node. Both fields are set together by a successful
/// registration; absence of the whole record means "unregistered".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteIdentity {
    pub site_id: String,
    pub api_key: String,
}

/// The public-facing facts about this site that the registration handshake
/// sends to the remote node.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub site_name: String,
    pub site_url: String,
    pub owner_email: String,
    pub owner_name: String,
}

/// The full registration payload for step three of the handshake, including
/// the challenge token and the public URL the remote verifier calls back.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub site_name: String,
    pub site_url: String,
    pub owner_email: String,
    pub owner_name: String,
    pub token: String,
    pub challenge_verification_url: String,
}

//=========================================================================================
// Provider Configuration
//=========================================================================================

/// Which hosted model family the remote node should answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Gemini,
    OpenAi,
}

impl AiProvider {
    pub const DEFAULT_OPENAI_MODEL: &'static str = "gpt-4-turbo";
    pub const DEFAULT_GEMINI_MODEL: &'static str = "gemini-2.5-flash";

    /// Parses an admin-supplied provider tag. Unknown values fall back to the
    /// default provider rather than being rejected.
    pub fn sanitize(value: &str) -> Self {
        match value {
            "openai" => AiProvider::OpenAi,
            "gemini" => AiProvider::Gemini,
            _ => AiProvider::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::Gemini => "gemini",
            AiProvider::OpenAi => "openai",
        }
    }
}

/// The model configuration forwarded verbatim to the remote node. Model names
/// are opaque strings; any non-empty value is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub active_provider: AiProvider,
    pub openai_model: String,
    pub gemini_model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            active_provider: AiProvider::default(),
            openai_model: AiProvider::DEFAULT_OPENAI_MODEL.to_string(),
            gemini_model: AiProvider::DEFAULT_GEMINI_MODEL.to_string(),
        }
    }
}

impl ProviderConfig {
    /// Builds a config from raw admin input, substituting defaults for
    /// unknown providers and empty model names.
    pub fn sanitize(active_provider: &str, openai_model: &str, gemini_model: &str) -> Self {
        let non_empty = |value: &str, fallback: &str| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                fallback.to_string()
            } else {
                trimmed.to_string()
            }
        };
        Self {
            active_provider: AiProvider::sanitize(active_provider),
            openai_model: non_empty(openai_model, AiProvider::DEFAULT_OPENAI_MODEL),
            gemini_model: non_empty(gemini_model, AiProvider::DEFAULT_GEMINI_MODEL),
        }
    }
}

/// Caller-supplied provider keys for a key push. A blank key means "leave the
/// value already stored on the remote node untouched"; keys are never
/// persisted locally.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AiKeys {
    #[serde(rename = "OPENAI_API_KEY")]
    pub openai_api_key: String,
    #[serde(rename = "GEMINI_API_KEY")]
    pub gemini_api_key: String,
}

/// The body of the key-configuration call, minus the siteId the client
/// adapter injects from the Site Identity.
#[derive(Debug, Clone, Serialize)]
pub struct KeyConfigPayload {
    pub keys: AiKeys,
    pub config: ProviderConfig,
}

//=========================================================================================
// Content Categories & Records
//=========================================================================================

/// The content categories an admin can select for indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Faqs,
    Pages,
    Posts,
    Policies,
    Products,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Faqs => "faqs",
            ContentCategory::Pages => "pages",
            ContentCategory::Posts => "posts",
            ContentCategory::Policies => "policies",
            ContentCategory::Products => "products",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "faqs" => Some(ContentCategory::Faqs),
            "pages" => Some(ContentCategory::Pages),
            "posts" => Some(ContentCategory::Posts),
            "policies" => Some(ContentCategory::Policies),
            "products" => Some(ContentCategory::Products),
            _ => None,
        }
    }

    /// Sanitizes an admin-supplied category list: unknown tags and duplicates
    /// are silently dropped, first-seen order is kept.
    pub fn sanitize_list(values: &[String]) -> Vec<Self> {
        let mut seen = Vec::new();
        for value in values {
            if let Some(category) = Self::parse(value) {
                if !seen.contains(&category) {
                    seen.push(category);
                }
            }
        }
        seen
    }
}

/// A normalized unit of site content ready for remote indexing.
/// Produced fresh on every data push; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentRecord {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub content: String,
    pub url: String,
}

/// The richer record shape used for commerce products.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub short_description: String,
    pub price: String,
    pub sku: String,
    pub attributes: String,
    /// Formatted "width x height x length", empty when unset.
    pub dimensions: String,
    pub url: String,
    pub image_url: String,
    pub images_gallery: Vec<String>,
}

/// The full upload bundle for the remote indexing endpoint. Every category is
/// always present so the remote side keeps a stable payload shape; unselected
/// categories stay empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentBundle {
    pub faqs: Vec<ContentRecord>,
    pub pages: Vec<ContentRecord>,
    pub posts: Vec<ContentRecord>,
    pub products: Vec<ProductRecord>,
    pub policies: Vec<ContentRecord>,
}

/// A page search hit for the admin policy-page picker.
#[derive(Debug, Clone, Serialize)]
pub struct PageSummary {
    pub id: i64,
    pub title: String,
}

//=========================================================================================
// Chatbot Settings
//=========================================================================================

/// Which side of the viewport the floating widget docks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatPosition {
    Left,
    #[default]
    Right,
}

impl ChatPosition {
    /// Unknown values fall back to the default position.
    pub fn sanitize(value: &str) -> Self {
        match value {
            "left" => ChatPosition::Left,
            "right" => ChatPosition::Right,
            _ => ChatPosition::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatPosition::Left => "left",
            ChatPosition::Right => "right",
        }
    }
}

pub const DEFAULT_CHATBOT_TITLE: &str = "AI Chatbot";

/// The single typed configuration record for the whole widget. Persisted as
/// one row; every field passes through its sanitizer before a write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatbotSettings {
    pub enabled: bool,
    pub chatbot_title: String,
    pub chat_position: ChatPosition,
    pub provider: ProviderConfig,
    pub policy_page_ids: Vec<i64>,
    pub push_categories: Vec<ContentCategory>,
}

impl Default for ChatbotSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            chatbot_title: DEFAULT_CHATBOT_TITLE.to_string(),
            chat_position: ChatPosition::default(),
            provider: ProviderConfig::default(),
            policy_page_ids: Vec::new(),
            push_categories: Vec::new(),
        }
    }
}

/// Filters a raw policy-page ID list: non-positive entries and duplicates are
/// dropped, first-seen order is kept. The 100-page ceiling is documentation,
/// not enforced here.
pub fn sanitize_page_ids(ids: &[i64]) -> Vec<i64> {
    let mut kept = Vec::new();
    for &id in ids {
        if id > 0 && !kept.contains(&id) {
            kept.push(id);
        }
    }
    kept
}

//=========================================================================================
// Registration State (for the admin status view)
//=========================================================================================

/// A snapshot of where this site sits in the register → keys → index chain.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationState {
    pub registered: bool,
    pub site_id: Option<String>,
    pub registered_at: Option<DateTime<Utc>>,
    pub keys_sent_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_falls_back_to_gemini() {
        assert_eq!(AiProvider::sanitize("invalid"), AiProvider::Gemini);
        assert_eq!(AiProvider::sanitize("openai"), AiProvider::OpenAi);
    }

    #[test]
    fn empty_model_names_get_defaults() {
        let config = ProviderConfig::sanitize("openai", "  ", "custom-model");
        assert_eq!(config.active_provider, AiProvider::OpenAi);
        assert_eq!(config.openai_model, AiProvider::DEFAULT_OPENAI_MODEL);
        assert_eq!(config.gemini_model, "custom-model");
    }

    #[test]
    fn page_ids_drop_non_positive_and_duplicates() {
        assert_eq!(sanitize_page_ids(&[3, -1, 0, 3]), vec![3]);
        assert_eq!(sanitize_page_ids(&[7, 2, 7, 9]), vec![7, 2, 9]);
    }

    #[test]
    fn category_list_drops_unknown_tags() {
        let raw = vec![
            "faqs".to_string(),
            "bogus".to_string(),
            "products".to_string(),
            "faqs".to_string(),
        ];
        assert_eq!(
            ContentCategory::sanitize_list(&raw),
            vec![ContentCategory::Faqs, ContentCategory::Products]
        );
    }

    #[test]
    fn unknown_position_falls_back_to_right() {
        assert_eq!(ChatPosition::sanitize("center"), ChatPosition::Right);
        assert_eq!(ChatPosition::sanitize("left"), ChatPosition::Left);
    }

    #[test]
    fn bundle_always_serializes_every_category() {
        let bundle = ContentBundle::default();
        let json = serde_json::to_value(&bundle).unwrap();
        for key in ["faqs", "pages", "posts", "products", "policies"] {
            assert!(json.get(key).unwrap().as_array().unwrap().is_empty());
        }
    }

    #[test]
    fn product_records_carry_the_media_and_dimension_fields() {
        let product = ProductRecord {
            id: 9,
            title: "Widget".into(),
            description: "A widget".into(),
            short_description: String::new(),
            price: "9.99".into(),
            sku: "W-9".into(),
            attributes: "color: red".into(),
            dimensions: "10 x 4 x 2".into(),
            url: "https://example.com/shop/widget".into(),
            image_url: "https://example.com/img/widget.jpg".into(),
            images_gallery: vec!["https://example.com/img/widget-2.jpg".into()],
        };
        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["dimensions"], "10 x 4 x 2");
        assert_eq!(json["image_url"], "https://example.com/img/widget.jpg");
        assert_eq!(json["images_gallery"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn ai_keys_serialize_with_remote_field_names() {
        let keys = AiKeys {
            openai_api_key: "sk-1".into(),
            gemini_api_key: String::new(),
        };
        let json = serde_json::to_value(&keys).unwrap();
        assert_eq!(json["OPENAI_API_KEY"], "sk-1");
        assert_eq!(json["GEMINI_API_KEY"], "");
    }
}
