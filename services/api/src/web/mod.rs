pub mod admin;
pub mod chat;
pub mod middleware;
pub mod public;
pub mod state;

// Re-export the handlers the binary wires into the router.
pub use admin::{
    push_data_handler, register_handler, revoke_handler, save_settings_handler,
    search_pages_handler, send_keys_handler, status_handler,
};
pub use chat::{chat_messages_handler, chat_query_handler};
pub use middleware::require_admin;
pub use public::{challenge_token_handler, widget_config_handler};
