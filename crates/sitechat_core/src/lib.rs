pub mod domain;
pub mod flows;
pub mod ports;
pub mod text;

pub use domain::{
    AiKeys, AiProvider, ChatPosition, ChatbotSettings, ContentBundle, ContentCategory,
    ContentRecord, KeyConfigPayload, PageSummary, ProductRecord, ProviderConfig, Registration,
    RegistrationState, SiteIdentity, SiteProfile,
};
pub use ports::{ContentSource, RagNodeClient, RelayError, RelayResult, SettingsStore};
