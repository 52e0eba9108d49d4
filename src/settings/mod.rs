//! Persisted, user-editable settings: Azure credentials, chunking threshold, and the prompts and
//! sampling parameters of each agent.

mod defaults;
mod store;
pub mod types;

pub use store::SettingsStore;
pub use types::{
    AGENT_MAX_TOKENS_RANGE, AgentField, AgentRole, AgentSettings, AzureSettings,
    MAX_CHUNK_TOKENS_RANGE, ProcessingSettings, Settings, SettingsError, SettingsUpdate,
    TEMPERATURE_RANGE,
};
