//! File-backed settings store.
//!
//! The document is read once when the store opens and rewritten after every accepted edit. Writes
//! go to a sibling temporary file that is renamed over the original, so a crash mid-write leaves
//! the previous version intact.

use super::defaults::default_settings;
use super::types::{
    AgentField, AgentRole, AgentSettings, AzureSettings, ProcessingSettings, Settings,
    SettingsError, SettingsUpdate,
};
use crate::config::AzureOverrides;
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted nested configuration: Azure credentials, chunking threshold, and agent tunables.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Open the store at `path`, writing the default document when the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let settings = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| SettingsError::Malformed {
                path: path.clone(),
                source,
            })?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "Settings file missing; writing defaults");
                let defaults = default_settings();
                write_atomically(&path, &defaults)?;
                defaults
            }
            Err(source) => return Err(SettingsError::Io { path, source }),
        };
        Ok(Self { path, settings })
    }

    /// Build a store around an in-memory document, persisting it to `path` on edits only.
    pub fn with_settings(path: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            path: path.into(),
            settings,
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Borrow the full settings document.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Chunking settings.
    pub fn processing(&self) -> ProcessingSettings {
        self.settings.document_processing
    }

    /// Settings of one agent.
    pub fn agent(&self, role: AgentRole) -> AgentSettings {
        self.settings.agent(role).clone()
    }

    /// Stored Azure settings, without environment overrides.
    pub fn azure(&self) -> AzureSettings {
        self.settings.azure.clone()
    }

    /// Azure settings with environment overrides layered on top.
    pub fn effective_azure(&self, overrides: &AzureOverrides) -> AzureSettings {
        let stored = &self.settings.azure;
        AzureSettings {
            api_key: overrides
                .api_key
                .clone()
                .unwrap_or_else(|| stored.api_key.clone()),
            api_version: overrides
                .api_version
                .clone()
                .unwrap_or_else(|| stored.api_version.clone()),
            azure_endpoint: overrides
                .azure_endpoint
                .clone()
                .unwrap_or_else(|| stored.azure_endpoint.clone()),
            deployment_name: overrides
                .deployment_name
                .clone()
                .unwrap_or_else(|| stored.deployment_name.clone()),
        }
    }

    /// Validate and apply an edit, then rewrite the backing file.
    ///
    /// Nothing is changed, in memory or on disk, when validation or the write fails.
    pub fn apply(&mut self, update: SettingsUpdate) -> Result<(), SettingsError> {
        update.validate()?;
        let mut next = self.settings.clone();
        match update {
            SettingsUpdate::MaxChunkTokens(value) => {
                next.document_processing.max_chunk_tokens = value;
            }
            SettingsUpdate::Agent { role, field } => {
                let agent = next.agent_mut(role);
                match field {
                    AgentField::SystemPrompt(text) => agent.system_prompt = text,
                    AgentField::ModelPrompt(text) => agent.model_prompt = text,
                    AgentField::Temperature(value) => agent.temperature = value,
                    AgentField::MaxTokens(value) => agent.max_tokens = value,
                }
            }
        }
        write_atomically(&self.path, &next)?;
        self.settings = next;
        tracing::debug!(path = %self.path.display(), "Settings persisted");
        Ok(())
    }
}

fn write_atomically(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let io_error = |source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let body = serde_json::to_vec_pretty(settings).map_err(|source| SettingsError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);
    fs::write(&staging, body).map_err(io_error)?;
    fs::rename(&staging, path).map_err(io_error)
}
