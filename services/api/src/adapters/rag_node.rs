//! services/api/src/adapters/rag_node.rs
//!
//! The typed HTTP client for the remote RAG node. It implements the
//! `RagNodeClient` port from the `core` crate: four JSON-over-HTTPS calls,
//! fixed per-call timeouts, no retries. Credentials and outbound payloads are
//! never copied into error messages.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use sitechat_core::domain::{ContentBundle, KeyConfigPayload, Registration, SiteIdentity};
use sitechat_core::ports::{RagNodeClient, RelayError, RelayResult};
use std::time::Duration;
use tracing::debug;

/// The shared-secret header carrying the issued site key.
const SITE_KEY_HEADER: &str = "x-site-key";

/// Timeout for the token, registration, and key calls. Registration is slow
/// because the node fetches the verification URL before answering.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for content uploads, which can carry hundreds of records.
const DATA_PUSH_TIMEOUT: Duration = Duration::from_secs(90);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that speaks the remote node's site API over `reqwest`.
#[derive(Clone)]
pub struct RagNodeAdapter {
    http: reqwest::Client,
    base_url: String,
}

impl RagNodeAdapter {
    /// Creates a new `RagNodeAdapter` for the given node base URL.
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Maps a failed (non-200) response into `RemoteRejected`, keeping the
    /// remote's own message when the body carries one.
    async fn reject(response: Response) -> RelayError {
        let status = response.status().as_u16();
        let message = response
            .json::<AckResponse>()
            .await
            .ok()
            .and_then(|body| body.message);
        RelayError::RemoteRejected { status, message }
    }

    fn transport(error: reqwest::Error) -> RelayError {
        RelayError::Transport(error.to_string())
    }
}

//=========================================================================================
// Wire Response Structs
//=========================================================================================

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    site_id: Option<String>,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct AckResponse {
    message: Option<String>,
}

//=========================================================================================
// Wire Response Decoding
//=========================================================================================

/// A 200 token response without a usable token is still a failure.
fn decode_token(body: TokenResponse) -> RelayResult<String> {
    match body.token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(RelayError::RemoteRejected {
            status: 200,
            message: Some("Failed to get a challenge token from the node server.".to_string()),
        }),
    }
}

/// A 200 registration response without both halves of the identity is still a
/// failure; a partial credential must never be persisted.
fn decode_identity(body: RegisterResponse) -> RelayResult<SiteIdentity> {
    match (body.site_id, body.api_key) {
        (Some(site_id), Some(api_key)) if !site_id.is_empty() && !api_key.is_empty() => {
            Ok(SiteIdentity { site_id, api_key })
        }
        _ => Err(RelayError::RemoteRejected {
            status: 200,
            message: Some("Registration response was missing the site credentials.".to_string()),
        }),
    }
}

//=========================================================================================
// `RagNodeClient` Trait Implementation
//=========================================================================================

#[async_trait]
impl RagNodeClient for RagNodeAdapter {
    async fn request_token(&self, site_url: &str) -> RelayResult<String> {
        let response = self
            .http
            .post(self.endpoint("api/site/request-token"))
            .timeout(HANDSHAKE_TIMEOUT)
            .json(&json!({ "siteUrl": site_url }))
            .send()
            .await
            .map_err(Self::transport)?;

        if response.status() != StatusCode::OK {
            return Err(Self::reject(response).await);
        }

        let body = response
            .json::<TokenResponse>()
            .await
            .map_err(Self::transport)?;
        decode_token(body)
    }

    async fn register_site(&self, registration: &Registration) -> RelayResult<SiteIdentity> {
        debug!(site_url = %registration.site_url, "submitting site registration");
        let response = self
            .http
            .post(self.endpoint("api/site/register"))
            .timeout(HANDSHAKE_TIMEOUT)
            .json(registration)
            .send()
            .await
            .map_err(Self::transport)?;

        if response.status() != StatusCode::OK {
            return Err(Self::reject(response).await);
        }

        let body = response
            .json::<RegisterResponse>()
            .await
            .map_err(Self::transport)?;
        decode_identity(body)
    }

    async fn configure_ai_keys(
        &self,
        identity: &SiteIdentity,
        payload: &KeyConfigPayload,
    ) -> RelayResult<String> {
        let body = json!({
            "siteId": identity.site_id,
            "keys": payload.keys,
            "config": payload.config,
        });

        let response = self
            .http
            .post(self.endpoint("api/site/configure-ai-keys"))
            .timeout(HANDSHAKE_TIMEOUT)
            .header(SITE_KEY_HEADER, &identity.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::transport)?;

        if response.status() != StatusCode::OK {
            return Err(Self::reject(response).await);
        }

        let ack = response
            .json::<AckResponse>()
            .await
            .unwrap_or(AckResponse { message: None });
        Ok(ack
            .message
            .unwrap_or_else(|| "AI keys and configuration sent successfully.".to_string()))
    }

    async fn push_data(
        &self,
        identity: &SiteIdentity,
        bundle: &ContentBundle,
    ) -> RelayResult<String> {
        debug!(
            faqs = bundle.faqs.len(),
            pages = bundle.pages.len(),
            posts = bundle.posts.len(),
            products = bundle.products.len(),
            policies = bundle.policies.len(),
            "uploading content bundle"
        );
        let response = self
            .http
            .post(self.endpoint("api/site/push-data"))
            .timeout(DATA_PUSH_TIMEOUT)
            .header(SITE_KEY_HEADER, &identity.api_key)
            .json(bundle)
            .send()
            .await
            .map_err(Self::transport)?;

        if response.status() != StatusCode::OK {
            return Err(Self::reject(response).await);
        }

        let ack = response
            .json::<AckResponse>()
            .await
            .unwrap_or(AckResponse { message: None });
        Ok(ack
            .message
            .unwrap_or_else(|| "Content successfully pushed to the RAG node.".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn register_body(value: serde_json::Value) -> RegisterResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn ok_response_missing_the_api_key_is_a_rejection() {
        let err = decode_identity(register_body(json!({ "siteId": "s1" }))).unwrap_err();
        assert!(matches!(
            err,
            RelayError::RemoteRejected { status: 200, .. }
        ));
    }

    #[test]
    fn ok_response_with_empty_credentials_is_a_rejection() {
        let err =
            decode_identity(register_body(json!({ "siteId": "", "apiKey": "k1" }))).unwrap_err();
        assert!(matches!(
            err,
            RelayError::RemoteRejected { status: 200, .. }
        ));
    }

    #[test]
    fn complete_credentials_decode_to_an_identity() {
        let identity =
            decode_identity(register_body(json!({ "siteId": "s1", "apiKey": "k1" }))).unwrap();
        assert_eq!(identity.site_id, "s1");
        assert_eq!(identity.api_key, "k1");
    }

    #[test]
    fn ok_token_response_without_a_token_is_a_rejection() {
        for body in [json!({}), json!({ "token": "" })] {
            let err = decode_token(serde_json::from_value(body).unwrap()).unwrap_err();
            assert!(matches!(
                err,
                RelayError::RemoteRejected { status: 200, .. }
            ));
        }
        assert_eq!(
            decode_token(serde_json::from_value(json!({ "token": "t1" })).unwrap()).unwrap(),
            "t1"
        );
    }
}
