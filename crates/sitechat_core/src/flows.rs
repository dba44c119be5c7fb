//! crates/sitechat_core/src/flows.rs
//!
//! The relay's three admin-triggered operations, written against the port
//! traits only: the challenge-response registration handshake, the AI
//! key/config push, and the content push. Each one runs to completion inside
//! a single request; there are no retries and no background work.

use chrono::Utc;

use crate::domain::{
    AiKeys, ContentBundle, ContentCategory, KeyConfigPayload, Registration, SiteIdentity,
    SiteProfile,
};
use crate::ports::{ContentSource, RagNodeClient, RelayError, RelayResult, SettingsStore};

//=========================================================================================
// Registration Handshake
//=========================================================================================

/// Runs the three-step site registration against the remote node.
///
/// 1. Requests a challenge token for the site URL.
/// 2. Parks the token in the store's single transient slot so the public
///    challenge-token endpoint can echo it when the remote verifier calls in.
/// 3. Submits the registration payload; the remote side fetches the
///    verification URL before answering.
///
/// The transient token never survives an attempt: it is cleared on every exit
/// path after step one, success or failure.
pub async fn register_site(
    node: &dyn RagNodeClient,
    store: &dyn SettingsStore,
    profile: &SiteProfile,
    challenge_verification_url: &str,
) -> RelayResult<SiteIdentity> {
    let token = node.request_token(&profile.site_url).await?;
    store.store_challenge_token(&token).await?;

    let registration = Registration {
        site_name: profile.site_name.clone(),
        site_url: profile.site_url.clone(),
        owner_email: profile.owner_email.clone(),
        owner_name: profile.owner_name.clone(),
        token,
        challenge_verification_url: challenge_verification_url.to_string(),
    };

    let outcome = node.register_site(&registration).await;
    let cleanup = store.clear_challenge_token().await;

    // Remotely issued credentials outrank the best-effort token delete:
    // persist them before reporting a cleanup failure.
    let identity = outcome?;
    store.store_site_identity(&identity).await?;
    cleanup?;

    Ok(identity)
}

//=========================================================================================
// Key / Config Push
//=========================================================================================

/// Forwards caller-supplied provider keys plus the stored model configuration
/// to the remote node. The keys only ever exist in the outbound request body;
/// a blank key tells the remote side to keep its current value.
pub async fn push_ai_keys(
    node: &dyn RagNodeClient,
    store: &dyn SettingsStore,
    keys: AiKeys,
) -> RelayResult<String> {
    let identity = store.site_identity().await?.ok_or(RelayError::PreconditionFailed(
        "Site registration is incomplete. Cannot send AI keys.",
    ))?;

    let settings = store.load_settings().await?;
    let payload = KeyConfigPayload {
        keys,
        config: settings.provider,
    };

    let message = node.configure_ai_keys(&identity, &payload).await?;
    store.mark_keys_sent(Utc::now()).await?;
    Ok(message)
}

//=========================================================================================
// Content Push
//=========================================================================================

/// Extracts every selected category and uploads the bundle to the remote
/// indexing endpoint. Unselected categories stay as empty arrays so the
/// payload shape is stable. Products require both the selection and an active
/// commerce extension; otherwise they are silently omitted.
pub async fn push_content(
    node: &dyn RagNodeClient,
    store: &dyn SettingsStore,
    source: &dyn ContentSource,
    selection: &[ContentCategory],
) -> RelayResult<String> {
    let identity = store.site_identity().await?.ok_or(RelayError::PreconditionFailed(
        "Please complete site registration first.",
    ))?;
    if selection.is_empty() {
        return Err(RelayError::PreconditionFailed(
            "Select at least one content category to index.",
        ));
    }

    // Remember the selection for the next visit to the settings screen.
    let mut settings = store.load_settings().await?;
    settings.push_categories = selection.to_vec();
    store.save_settings(&settings).await?;

    let mut bundle = ContentBundle::default();
    for category in selection {
        match category {
            ContentCategory::Faqs => bundle.faqs = source.faqs().await?,
            ContentCategory::Pages => bundle.pages = source.pages().await?,
            ContentCategory::Posts => bundle.posts = source.tagged_posts().await?,
            ContentCategory::Policies => {
                bundle.policies = source.policy_pages(&settings.policy_page_ids).await?
            }
            ContentCategory::Products => {
                if source.commerce_active() {
                    bundle.products = source.products().await?;
                }
            }
        }
    }

    node.push_data(&identity, &bundle).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatbotSettings, ContentRecord, PageSummary, ProductRecord};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    //-------------------------------------------------------------------------------------
    // In-memory test doubles for the three ports
    //-------------------------------------------------------------------------------------

    #[derive(Default)]
    struct MemoryStore {
        settings: Mutex<ChatbotSettings>,
        identity: Mutex<Option<SiteIdentity>>,
        keys_sent: Mutex<Option<DateTime<Utc>>>,
        token: Mutex<Option<String>>,
        fail_token_clear: bool,
    }

    #[async_trait]
    impl SettingsStore for MemoryStore {
        async fn load_settings(&self) -> RelayResult<ChatbotSettings> {
            Ok(self.settings.lock().unwrap().clone())
        }
        async fn save_settings(&self, settings: &ChatbotSettings) -> RelayResult<()> {
            *self.settings.lock().unwrap() = settings.clone();
            Ok(())
        }
        async fn site_identity(&self) -> RelayResult<Option<SiteIdentity>> {
            Ok(self.identity.lock().unwrap().clone())
        }
        async fn store_site_identity(&self, identity: &SiteIdentity) -> RelayResult<()> {
            *self.identity.lock().unwrap() = Some(identity.clone());
            Ok(())
        }
        async fn revoke_site_identity(&self) -> RelayResult<()> {
            *self.identity.lock().unwrap() = None;
            Ok(())
        }
        async fn registered_at(&self) -> RelayResult<Option<DateTime<Utc>>> {
            Ok(None)
        }
        async fn mark_keys_sent(&self, at: DateTime<Utc>) -> RelayResult<()> {
            *self.keys_sent.lock().unwrap() = Some(at);
            Ok(())
        }
        async fn keys_sent_at(&self) -> RelayResult<Option<DateTime<Utc>>> {
            Ok(*self.keys_sent.lock().unwrap())
        }
        async fn store_challenge_token(&self, token: &str) -> RelayResult<()> {
            *self.token.lock().unwrap() = Some(token.to_string());
            Ok(())
        }
        async fn challenge_token(&self) -> RelayResult<Option<String>> {
            Ok(self.token.lock().unwrap().clone())
        }
        async fn clear_challenge_token(&self) -> RelayResult<()> {
            if self.fail_token_clear {
                return Err(RelayError::Store("token delete failed".into()));
            }
            *self.token.lock().unwrap() = None;
            Ok(())
        }
    }

    /// A scripted node client. Each call either succeeds with the configured
    /// value or fails with the configured error; call counts are recorded.
    #[derive(Default)]
    struct ScriptedNode {
        token_unreachable: bool,
        reject_registration: bool,
        calls: AtomicUsize,
        pushed_bundle: Mutex<Option<ContentBundle>>,
        pushed_keys: Mutex<Option<String>>,
    }

    #[async_trait]
    impl RagNodeClient for ScriptedNode {
        async fn request_token(&self, _site_url: &str) -> RelayResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.token_unreachable {
                return Err(RelayError::Transport("connection refused".into()));
            }
            Ok("challenge-abc".to_string())
        }

        async fn register_site(&self, registration: &Registration) -> RelayResult<SiteIdentity> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(registration.token, "challenge-abc");
            if self.reject_registration {
                return Err(RelayError::RemoteRejected {
                    status: 200,
                    message: Some("verification callback failed".into()),
                });
            }
            Ok(SiteIdentity {
                site_id: "s1".into(),
                api_key: "k1".into(),
            })
        }

        async fn configure_ai_keys(
            &self,
            identity: &SiteIdentity,
            payload: &KeyConfigPayload,
        ) -> RelayResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(identity.api_key, "k1");
            *self.pushed_keys.lock().unwrap() = Some(payload.keys.openai_api_key.clone());
            Ok("AI keys and configuration sent successfully.".to_string())
        }

        async fn push_data(
            &self,
            _identity: &SiteIdentity,
            bundle: &ContentBundle,
        ) -> RelayResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.pushed_bundle.lock().unwrap() = Some(bundle.clone());
            Ok("Content successfully pushed to the RAG node.".to_string())
        }
    }

    struct StubSource {
        commerce: bool,
        extractor_calls: AtomicUsize,
    }

    impl StubSource {
        fn new(commerce: bool) -> Self {
            Self {
                commerce,
                extractor_calls: AtomicUsize::new(0),
            }
        }

        fn record(&self, kind: &str) -> ContentRecord {
            self.extractor_calls.fetch_add(1, Ordering::SeqCst);
            ContentRecord {
                id: 1,
                kind: kind.to_string(),
                title: format!("{kind} title"),
                content: "body".to_string(),
                url: format!("https://example.com/{kind}"),
            }
        }
    }

    #[async_trait]
    impl ContentSource for StubSource {
        async fn faqs(&self) -> RelayResult<Vec<ContentRecord>> {
            Ok(vec![self.record("faq")])
        }
        async fn pages(&self) -> RelayResult<Vec<ContentRecord>> {
            Ok(vec![self.record("page")])
        }
        async fn tagged_posts(&self) -> RelayResult<Vec<ContentRecord>> {
            Ok(vec![self.record("post")])
        }
        async fn policy_pages(&self, selected_ids: &[i64]) -> RelayResult<Vec<ContentRecord>> {
            assert!(selected_ids.iter().all(|&id| id > 0));
            Ok(vec![self.record("page")])
        }
        async fn products(&self) -> RelayResult<Vec<ProductRecord>> {
            self.extractor_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![ProductRecord {
                id: 9,
                title: "Widget".into(),
                description: "A widget".into(),
                short_description: String::new(),
                price: "9.99".into(),
                sku: "W-9".into(),
                attributes: String::new(),
                dimensions: String::new(),
                url: "https://example.com/shop/widget".into(),
                image_url: String::new(),
                images_gallery: Vec::new(),
            }])
        }
        fn commerce_active(&self) -> bool {
            self.commerce
        }
        async fn search_pages(&self, _term: &str) -> RelayResult<Vec<PageSummary>> {
            Ok(Vec::new())
        }
    }

    fn profile() -> SiteProfile {
        SiteProfile {
            site_name: "Example Shop".into(),
            site_url: "https://example.com".into(),
            owner_email: "admin@example.com".into(),
            owner_name: "Site Admin".into(),
        }
    }

    const VERIFY_URL: &str = "https://example.com/challenge-token";

    //-------------------------------------------------------------------------------------
    // Registration
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn unreachable_token_endpoint_leaves_no_state_behind() {
        let node = ScriptedNode {
            token_unreachable: true,
            ..Default::default()
        };
        let store = MemoryStore::default();

        let err = register_site(&node, &store, &profile(), VERIFY_URL)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Transport(_)));
        assert!(store.site_identity().await.unwrap().is_none());
        assert!(store.challenge_token().await.unwrap().is_none());
        // Only the token request went out.
        assert_eq!(node.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_registration_clears_token_and_keeps_site_unregistered() {
        let node = ScriptedNode {
            reject_registration: true,
            ..Default::default()
        };
        let store = MemoryStore::default();

        let err = register_site(&node, &store, &profile(), VERIFY_URL)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "verification callback failed");
        assert!(store.site_identity().await.unwrap().is_none());
        assert!(store.challenge_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn successful_registration_persists_identity_exactly_as_received() {
        let node = ScriptedNode::default();
        let store = MemoryStore::default();

        let identity = register_site(&node, &store, &profile(), VERIFY_URL)
            .await
            .unwrap();
        assert_eq!(identity.site_id, "s1");
        assert_eq!(identity.api_key, "k1");

        let stored = store.site_identity().await.unwrap().unwrap();
        assert_eq!(stored, identity);
        assert!(store.challenge_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_token_cleanup_still_persists_the_issued_credentials() {
        let node = ScriptedNode::default();
        let store = MemoryStore {
            fail_token_clear: true,
            ..Default::default()
        };

        let err = register_site(&node, &store, &profile(), VERIFY_URL)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Store(_)));
        // The remote side issued credentials; losing them over a local token
        // delete would strand the site.
        let stored = store.site_identity().await.unwrap().unwrap();
        assert_eq!(stored.site_id, "s1");
    }

    //-------------------------------------------------------------------------------------
    // Key push
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn key_push_before_registration_makes_no_outbound_call() {
        let node = ScriptedNode::default();
        let store = MemoryStore::default();

        let err = push_ai_keys(&node, &store, AiKeys::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::PreconditionFailed(_)));
        assert_eq!(node.calls.load(Ordering::SeqCst), 0);
        assert!(store.keys_sent_at().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn key_push_records_timestamp_and_forwards_blank_keys_verbatim() {
        let node = ScriptedNode::default();
        let store = MemoryStore::default();
        store
            .store_site_identity(&SiteIdentity {
                site_id: "s1".into(),
                api_key: "k1".into(),
            })
            .await
            .unwrap();

        let keys = AiKeys {
            openai_api_key: String::new(),
            gemini_api_key: "g-key".into(),
        };
        let message = push_ai_keys(&node, &store, keys).await.unwrap();
        assert_eq!(message, "AI keys and configuration sent successfully.");
        assert!(store.keys_sent_at().await.unwrap().is_some());
        // A blank key goes out as-is; the remote side treats it as "keep".
        assert_eq!(node.pushed_keys.lock().unwrap().as_deref(), Some(""));
    }

    //-------------------------------------------------------------------------------------
    // Content push
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn empty_selection_fails_before_any_extractor_runs() {
        let node = ScriptedNode::default();
        let store = MemoryStore::default();
        let source = StubSource::new(true);
        store
            .store_site_identity(&SiteIdentity {
                site_id: "s1".into(),
                api_key: "k1".into(),
            })
            .await
            .unwrap();

        let err = push_content(&node, &store, &source, &[]).await.unwrap_err();
        assert!(matches!(err, RelayError::PreconditionFailed(_)));
        assert_eq!(source.extractor_calls.load(Ordering::SeqCst), 0);
        assert_eq!(node.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn products_without_commerce_upload_an_empty_array_not_an_error() {
        let node = ScriptedNode::default();
        let store = MemoryStore::default();
        let source = StubSource::new(false);
        store
            .store_site_identity(&SiteIdentity {
                site_id: "s1".into(),
                api_key: "k1".into(),
            })
            .await
            .unwrap();

        push_content(&node, &store, &source, &[ContentCategory::Products])
            .await
            .unwrap();
        let bundle = node.pushed_bundle.lock().unwrap().take().unwrap();
        assert!(bundle.products.is_empty());
        assert!(bundle.faqs.is_empty());
    }

    #[tokio::test]
    async fn selected_categories_fill_their_arrays_and_persist_the_selection() {
        let node = ScriptedNode::default();
        let store = MemoryStore::default();
        let source = StubSource::new(true);
        store
            .store_site_identity(&SiteIdentity {
                site_id: "s1".into(),
                api_key: "k1".into(),
            })
            .await
            .unwrap();

        let selection = [ContentCategory::Faqs, ContentCategory::Products];
        push_content(&node, &store, &source, &selection).await.unwrap();

        let bundle = node.pushed_bundle.lock().unwrap().take().unwrap();
        assert_eq!(bundle.faqs.len(), 1);
        assert_eq!(bundle.products.len(), 1);
        assert!(bundle.pages.is_empty());
        assert!(bundle.posts.is_empty());
        assert!(bundle.policies.is_empty());

        let settings = store.load_settings().await.unwrap();
        assert_eq!(settings.push_categories, selection.to_vec());
    }
}
