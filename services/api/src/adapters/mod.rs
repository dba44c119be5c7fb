pub mod content;
pub mod rag_node;
pub mod store;

pub use content::PgContentSource;
pub use rag_node::RagNodeAdapter;
pub use store::PgSettingsStore;
