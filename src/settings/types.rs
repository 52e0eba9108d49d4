//! Shapes of the persisted settings document and typed edits against it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use thiserror::Error;

/// Accepted range for the chunking threshold.
pub const MAX_CHUNK_TOKENS_RANGE: RangeInclusive<usize> = 1_000..=200_000;
/// Accepted range for an agent's response budget.
pub const AGENT_MAX_TOKENS_RANGE: RangeInclusive<u32> = 100..=2_000;
/// Accepted range for an agent's sampling temperature.
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=1.0;

/// Errors raised while loading, editing, or persisting settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Settings file could not be read or written.
    #[error("settings file {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Settings file contents were not a valid settings document.
    #[error("settings file {path} is malformed: {source}")]
    Malformed {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// Edit targeted a section or key that does not exist.
    #[error("unknown setting '{section}.{key}'")]
    UnknownField {
        /// Requested section.
        section: String,
        /// Requested key.
        key: String,
    },
    /// Edit carried a value of the wrong JSON type.
    #[error("setting '{field}' expects {expected}")]
    InvalidType {
        /// Dotted field name.
        field: String,
        /// Human readable type description.
        expected: &'static str,
    },
    /// Edit carried a value outside the accepted bounds.
    #[error("setting '{field}' must be between {min} and {max}, got {value}")]
    OutOfRange {
        /// Dotted field name.
        field: String,
        /// Lower bound (inclusive).
        min: String,
        /// Upper bound (inclusive).
        max: String,
        /// Rejected value.
        value: String,
    },
}

/// Model call roles, each with its own prompts and sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Summarizes every document chunk at upload time.
    DocumentAnalysis,
    /// Scores summaries against a question.
    Researcher,
    /// Answers a question from the selected document.
    Reply,
}

impl AgentRole {
    /// All roles in pipeline order.
    pub const ALL: [AgentRole; 3] = [
        AgentRole::DocumentAnalysis,
        AgentRole::Researcher,
        AgentRole::Reply,
    ];

    /// Section key used in the settings document.
    pub fn section(self) -> &'static str {
        match self {
            AgentRole::DocumentAnalysis => "document_analysis_agent",
            AgentRole::Researcher => "researcher_agent",
            AgentRole::Reply => "reply_agent",
        }
    }

    /// Resolve a settings section key back into a role.
    pub fn from_section(section: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.section() == section)
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.section())
    }
}

/// Prompts and sampling parameters for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    /// System message defining the agent's role.
    pub system_prompt: String,
    /// Prefix of the user message; call-specific content is appended to it.
    pub model_prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Response token budget.
    pub max_tokens: u32,
}

/// Document chunking settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSettings {
    /// Documents above this many tokens are split into chunks of at most this size.
    pub max_chunk_tokens: usize,
}

/// Azure OpenAI connection details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureSettings {
    /// Key sent in the `api-key` header.
    pub api_key: String,
    /// `api-version` query parameter.
    pub api_version: String,
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub azure_endpoint: String,
    /// Chat model deployment.
    pub deployment_name: String,
}

/// The whole persisted settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Model connection.
    pub azure: AzureSettings,
    /// Chunking threshold.
    pub document_processing: ProcessingSettings,
    /// Summarization agent.
    pub document_analysis_agent: AgentSettings,
    /// Relevance scoring agent.
    pub researcher_agent: AgentSettings,
    /// Answering agent.
    pub reply_agent: AgentSettings,
}

impl Settings {
    /// Borrow the settings of one agent.
    pub fn agent(&self, role: AgentRole) -> &AgentSettings {
        match role {
            AgentRole::DocumentAnalysis => &self.document_analysis_agent,
            AgentRole::Researcher => &self.researcher_agent,
            AgentRole::Reply => &self.reply_agent,
        }
    }

    pub(crate) fn agent_mut(&mut self, role: AgentRole) -> &mut AgentSettings {
        match role {
            AgentRole::DocumentAnalysis => &mut self.document_analysis_agent,
            AgentRole::Researcher => &mut self.researcher_agent,
            AgentRole::Reply => &mut self.reply_agent,
        }
    }
}

/// One field of an agent's settings with its new value.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentField {
    /// Replace the system prompt.
    SystemPrompt(String),
    /// Replace the model prompt prefix.
    ModelPrompt(String),
    /// Replace the temperature.
    Temperature(f32),
    /// Replace the response token budget.
    MaxTokens(u32),
}

impl AgentField {
    /// Key of this field inside an agent section.
    pub fn key(&self) -> &'static str {
        match self {
            AgentField::SystemPrompt(_) => "system_prompt",
            AgentField::ModelPrompt(_) => "model_prompt",
            AgentField::Temperature(_) => "temperature",
            AgentField::MaxTokens(_) => "max_tokens",
        }
    }
}

/// A single validated-on-apply edit to the settings document.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsUpdate {
    /// Change the chunking threshold.
    MaxChunkTokens(usize),
    /// Change one field of one agent.
    Agent {
        /// Agent being edited.
        role: AgentRole,
        /// Field and value.
        field: AgentField,
    },
}

impl SettingsUpdate {
    /// Build an edit from the `(section, key, value)` triple used on the wire.
    pub fn from_parts(section: &str, key: &str, value: &Value) -> Result<Self, SettingsError> {
        let unknown = || SettingsError::UnknownField {
            section: section.to_string(),
            key: key.to_string(),
        };
        let field_name = format!("{section}.{key}");

        if section == "document_processing" {
            return match key {
                "max_chunk_tokens" => value
                    .as_u64()
                    .and_then(|raw| usize::try_from(raw).ok())
                    .map(SettingsUpdate::MaxChunkTokens)
                    .ok_or(SettingsError::InvalidType {
                        field: field_name,
                        expected: "a non-negative integer",
                    }),
                _ => Err(unknown()),
            };
        }

        let role = AgentRole::from_section(section).ok_or_else(unknown)?;
        let field = match key {
            "system_prompt" | "model_prompt" => {
                let text = value
                    .as_str()
                    .ok_or(SettingsError::InvalidType {
                        field: field_name,
                        expected: "a string",
                    })?
                    .to_string();
                if key == "system_prompt" {
                    AgentField::SystemPrompt(text)
                } else {
                    AgentField::ModelPrompt(text)
                }
            }
            "temperature" => AgentField::Temperature(value.as_f64().ok_or(
                SettingsError::InvalidType {
                    field: field_name,
                    expected: "a number",
                },
            )? as f32),
            "max_tokens" => AgentField::MaxTokens(
                value
                    .as_u64()
                    .and_then(|raw| u32::try_from(raw).ok())
                    .ok_or(SettingsError::InvalidType {
                        field: field_name,
                        expected: "a non-negative integer",
                    })?,
            ),
            _ => return Err(unknown()),
        };
        Ok(SettingsUpdate::Agent { role, field })
    }

    /// Reject values outside the accepted bounds.
    pub(crate) fn validate(&self) -> Result<(), SettingsError> {
        match self {
            SettingsUpdate::MaxChunkTokens(value) => {
                check_range("document_processing.max_chunk_tokens", *value, &MAX_CHUNK_TOKENS_RANGE)
            }
            SettingsUpdate::Agent { role, field } => {
                let name = format!("{}.{}", role.section(), field.key());
                match field {
                    AgentField::Temperature(value) if value.is_nan() => {
                        Err(SettingsError::InvalidType {
                            field: name,
                            expected: "a number",
                        })
                    }
                    AgentField::Temperature(value) => {
                        check_range(&name, *value, &TEMPERATURE_RANGE)
                    }
                    AgentField::MaxTokens(value) => {
                        check_range(&name, *value, &AGENT_MAX_TOKENS_RANGE)
                    }
                    AgentField::SystemPrompt(_) | AgentField::ModelPrompt(_) => Ok(()),
                }
            }
        }
    }
}

fn check_range<T>(field: &str, value: T, range: &RangeInclusive<T>) -> Result<(), SettingsError>
where
    T: PartialOrd + fmt::Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange {
            field: field.to_string(),
            min: range.start().to_string(),
            max: range.end().to_string(),
            value: value.to_string(),
        })
    }
}
