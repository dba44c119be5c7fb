//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{PgContentSource, PgSettingsStore, RagNodeAdapter},
    config::Config,
    error::ApiError,
    web::{
        admin::ApiDoc, challenge_token_handler, chat::ChatProxy, chat_messages_handler,
        chat_query_handler, push_data_handler, register_handler, require_admin, revoke_handler,
        save_settings_handler, search_pages_handler, send_keys_handler, state::AppState,
        status_handler, widget_config_handler,
    },
};
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let settings_store = Arc::new(PgSettingsStore::new(db_pool.clone()));
    info!("Running database migrations...");
    settings_store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Adapters ---
    let content_source = Arc::new(PgContentSource::new(
        db_pool.clone(),
        config.commerce_enabled,
    ));
    let node_client = Arc::new(RagNodeAdapter::new(config.node_url.clone()));
    let chat_proxy = ChatProxy::new(config.node_url.clone());

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        settings: settings_store,
        content: content_source,
        node: node_client,
        chat: chat_proxy,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static("x-admin-token"),
        ]);

    // --- 5. Create the Web Router ---
    // Public routes (the remote verifier and the browser widget)
    let public_routes = Router::new()
        .route("/challenge-token", get(challenge_token_handler))
        .route("/widget/config", get(widget_config_handler))
        .route("/chat/query", post(chat_query_handler))
        .route("/chat/messages", get(chat_messages_handler));

    // Admin routes (shared-secret protected)
    let admin_routes = Router::new()
        .route("/admin/status", get(status_handler))
        .route("/admin/register", post(register_handler))
        .route("/admin/registration", delete(revoke_handler))
        .route("/admin/settings", post(save_settings_handler))
        .route("/admin/ai-keys", post(send_keys_handler))
        .route("/admin/push-data", post(push_data_handler))
        .route("/admin/pages/search", get(search_pages_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_admin,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
