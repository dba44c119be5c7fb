//! crates/sitechat_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the relay's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! flows to be independent of the concrete database and HTTP implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    ChatbotSettings, ContentBundle, ContentRecord, KeyConfigPayload, PageSummary, ProductRecord,
    Registration, SiteIdentity,
};

//=========================================================================================
// Relay Error and Result Types
//=========================================================================================

/// The error taxonomy shared by every relay operation.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The remote node was unreachable or the call timed out.
    #[error("Remote service unreachable: {0}")]
    Transport(String),
    /// The remote node answered, but not with a usable success response.
    #[error("{}", RelayError::describe_rejection(.status, .message))]
    RemoteRejected {
        status: u16,
        message: Option<String>,
    },
    /// A required earlier step has not completed (e.g. push before register).
    #[error("{0}")]
    PreconditionFailed(&'static str),
    /// Malformed input that survived the web boundary.
    #[error("Invalid input: {0}")]
    ValidationFailed(String),
    /// The local persistence layer failed.
    #[error("Settings store error: {0}")]
    Store(String),
}

impl RelayError {
    fn describe_rejection(status: &u16, message: &Option<String>) -> String {
        match message {
            Some(message) => message.clone(),
            None => format!("Request failed with status code: {status}"),
        }
    }
}

/// A convenience type alias for `Result<T, RelayError>`.
pub type RelayResult<T> = Result<T, RelayError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The typed client for the remote RAG node. These four calls are its entire
/// public surface; everything else the node does is opaque to this crate.
#[async_trait]
pub trait RagNodeClient: Send + Sync {
    /// Step one of the handshake: exchange the site URL for a challenge token.
    async fn request_token(&self, site_url: &str) -> RelayResult<String>;

    /// Step three of the handshake: submit the registration payload. The node
    /// calls the challenge-verification URL before answering, so this call
    /// runs with an extended timeout.
    async fn register_site(&self, registration: &Registration) -> RelayResult<SiteIdentity>;

    /// Sends provider keys plus model configuration, authenticated by the
    /// issued site key. Returns the remote acknowledgement message.
    async fn configure_ai_keys(
        &self,
        identity: &SiteIdentity,
        payload: &KeyConfigPayload,
    ) -> RelayResult<String>;

    /// Uploads a content bundle for indexing. Returns the remote message.
    async fn push_data(
        &self,
        identity: &SiteIdentity,
        bundle: &ContentBundle,
    ) -> RelayResult<String>;
}

/// Persistence for the typed settings record, the Site Identity, and the
/// single transient challenge-token slot.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load_settings(&self) -> RelayResult<ChatbotSettings>;
    async fn save_settings(&self, settings: &ChatbotSettings) -> RelayResult<()>;

    // --- Site Identity ---
    async fn site_identity(&self) -> RelayResult<Option<SiteIdentity>>;
    /// Persists both halves of the identity in one write.
    async fn store_site_identity(&self, identity: &SiteIdentity) -> RelayResult<()>;
    /// Revokes the credential; the site returns to the unregistered state.
    async fn revoke_site_identity(&self) -> RelayResult<()>;
    async fn registered_at(&self) -> RelayResult<Option<DateTime<Utc>>>;

    // --- Key push bookkeeping ---
    async fn mark_keys_sent(&self, at: DateTime<Utc>) -> RelayResult<()>;
    async fn keys_sent_at(&self) -> RelayResult<Option<DateTime<Utc>>>;

    // --- Transient challenge token (one slot, cleared after every attempt) ---
    async fn store_challenge_token(&self, token: &str) -> RelayResult<()>;
    async fn challenge_token(&self) -> RelayResult<Option<String>>;
    async fn clear_challenge_token(&self) -> RelayResult<()>;
}

/// Read-only extraction over the site's content storage. Every routine
/// returns normalized records with markup already stripped.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Published FAQ entries; title is the question, content the answer.
    async fn faqs(&self) -> RelayResult<Vec<ContentRecord>>;

    /// Published pages, excluding policy-looking pages.
    async fn pages(&self) -> RelayResult<Vec<ContentRecord>>;

    /// Published posts explicitly tagged for chatbot indexing, word-limited.
    async fn tagged_posts(&self) -> RelayResult<Vec<ContentRecord>>;

    /// Policy pages: the explicit ID list when non-empty, otherwise the
    /// well-known slug fallback. Word-limited.
    async fn policy_pages(&self, selected_ids: &[i64]) -> RelayResult<Vec<ContentRecord>>;

    /// Published commerce products. Only meaningful when commerce is active.
    async fn products(&self) -> RelayResult<Vec<ProductRecord>>;

    /// Whether the commerce extension is installed on this site.
    fn commerce_active(&self) -> bool;

    /// Title substring search over published pages for the admin picker.
    async fn search_pages(&self, term: &str) -> RelayResult<Vec<PageSummary>>;
}
