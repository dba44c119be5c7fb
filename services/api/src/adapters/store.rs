//! services/api/src/adapters/store.rs
//!
//! Postgres-backed implementation of the `SettingsStore` port. The settings
//! live in a single typed row serialized as JSONB; the Site Identity and the
//! transient challenge token each occupy one singleton row of their own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sitechat_core::domain::{ChatbotSettings, SiteIdentity};
use sitechat_core::ports::{RelayError, RelayResult, SettingsStore};
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A settings adapter that implements the `SettingsStore` port.
#[derive(Clone)]
pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    /// Creates a new `PgSettingsStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    fn store_err(error: sqlx::Error) -> RelayError {
        RelayError::Store(error.to_string())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct IdentityRecord {
    site_id: String,
    api_key: String,
}

impl IdentityRecord {
    fn to_domain(self) -> SiteIdentity {
        SiteIdentity {
            site_id: self.site_id,
            api_key: self.api_key,
        }
    }
}

//=========================================================================================
// `SettingsStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn load_settings(&self) -> RelayResult<ChatbotSettings> {
        let row: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT data FROM chatbot_settings WHERE singleton")
                .fetch_optional(&self.pool)
                .await
                .map_err(Self::store_err)?;

        match row {
            Some(data) => serde_json::from_value(data)
                .map_err(|e| RelayError::ValidationFailed(format!("stored settings: {e}"))),
            None => Ok(ChatbotSettings::default()),
        }
    }

    async fn save_settings(&self, settings: &ChatbotSettings) -> RelayResult<()> {
        let data = serde_json::to_value(settings)
            .map_err(|e| RelayError::ValidationFailed(e.to_string()))?;
        sqlx::query(
            "INSERT INTO chatbot_settings (singleton, data) VALUES (TRUE, $1)
             ON CONFLICT (singleton) DO UPDATE SET data = EXCLUDED.data, updated_at = now()",
        )
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(Self::store_err)?;
        Ok(())
    }

    async fn site_identity(&self) -> RelayResult<Option<SiteIdentity>> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            "SELECT site_id, api_key FROM site_identity WHERE singleton",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::store_err)?;
        Ok(record.map(IdentityRecord::to_domain))
    }

    async fn store_site_identity(&self, identity: &SiteIdentity) -> RelayResult<()> {
        // Both halves land in one statement; re-registering resets the
        // keys-sent marker since the remote side starts from a clean slate.
        sqlx::query(
            "INSERT INTO site_identity (singleton, site_id, api_key) VALUES (TRUE, $1, $2)
             ON CONFLICT (singleton) DO UPDATE
             SET site_id = EXCLUDED.site_id,
                 api_key = EXCLUDED.api_key,
                 registered_at = now(),
                 keys_sent_at = NULL",
        )
        .bind(&identity.site_id)
        .bind(&identity.api_key)
        .execute(&self.pool)
        .await
        .map_err(Self::store_err)?;
        Ok(())
    }

    async fn revoke_site_identity(&self) -> RelayResult<()> {
        sqlx::query("DELETE FROM site_identity")
            .execute(&self.pool)
            .await
            .map_err(Self::store_err)?;
        Ok(())
    }

    async fn registered_at(&self) -> RelayResult<Option<DateTime<Utc>>> {
        let at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT registered_at FROM site_identity WHERE singleton")
                .fetch_optional(&self.pool)
                .await
                .map_err(Self::store_err)?;
        Ok(at)
    }

    async fn mark_keys_sent(&self, at: DateTime<Utc>) -> RelayResult<()> {
        sqlx::query("UPDATE site_identity SET keys_sent_at = $1 WHERE singleton")
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(Self::store_err)?;
        Ok(())
    }

    async fn keys_sent_at(&self) -> RelayResult<Option<DateTime<Utc>>> {
        let at: Option<Option<DateTime<Utc>>> =
            sqlx::query_scalar("SELECT keys_sent_at FROM site_identity WHERE singleton")
                .fetch_optional(&self.pool)
                .await
                .map_err(Self::store_err)?;
        Ok(at.flatten())
    }

    async fn store_challenge_token(&self, token: &str) -> RelayResult<()> {
        sqlx::query(
            "INSERT INTO challenge_token (singleton, token) VALUES (TRUE, $1)
             ON CONFLICT (singleton) DO UPDATE SET token = EXCLUDED.token, created_at = now()",
        )
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(Self::store_err)?;
        Ok(())
    }

    async fn challenge_token(&self) -> RelayResult<Option<String>> {
        let token: Option<String> =
            sqlx::query_scalar("SELECT token FROM challenge_token WHERE singleton")
                .fetch_optional(&self.pool)
                .await
                .map_err(Self::store_err)?;
        Ok(token)
    }

    async fn clear_challenge_token(&self) -> RelayResult<()> {
        sqlx::query("DELETE FROM challenge_token")
            .execute(&self.pool)
            .await
            .map_err(Self::store_err)?;
        Ok(())
    }
}
