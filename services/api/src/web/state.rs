//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::chat::ChatProxy;
use sitechat_core::ports::{ContentSource, RagNodeClient, SettingsStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub settings: Arc<dyn SettingsStore>,
    pub content: Arc<dyn ContentSource>,
    pub node: Arc<dyn RagNodeClient>,
    pub chat: ChatProxy,
}
