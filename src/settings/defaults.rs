use super::types::{AgentSettings, AzureSettings, ProcessingSettings, Settings};

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a document analysis assistant. You read documents \
and write faithful, compact summaries that capture their subject, key facts, names, dates, and \
figures. Never invent information that is not in the document.";

const ANALYSIS_MODEL_PROMPT: &str = "Summarize the following document so that the summary can be \
used to decide whether the document answers a user's question. List the main topics and any \
specific entities it covers.\n\nDocument:\n";

const RESEARCHER_SYSTEM_PROMPT: &str = "You are a research assistant who decides which document \
is most likely to contain the answer to a question. You respond with JSON only.";

const RESEARCHER_MODEL_PROMPT: &str = "Rate how relevant each document below is to the question \
on a scale from 0 to 100. Respond with a single JSON object mapping each document name exactly \
as written to its numeric score, for example {\"report.pdf\": 85, \"notes.pdf\": 10}. Do not add \
any other text.";

const REPLY_SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions using only \
the document provided as context. If the document does not contain the answer, say so plainly.";

const REPLY_MODEL_PROMPT: &str = "Answer the following question based on the document context.\n\n\
Question: ";

/// Settings written the first time the store is opened.
pub(crate) fn default_settings() -> Settings {
    Settings {
        azure: AzureSettings {
            api_key: String::new(),
            api_version: "2024-02-01".into(),
            azure_endpoint: String::new(),
            deployment_name: "gpt-35-turbo".into(),
        },
        document_processing: ProcessingSettings {
            max_chunk_tokens: 8_000,
        },
        document_analysis_agent: AgentSettings {
            system_prompt: ANALYSIS_SYSTEM_PROMPT.into(),
            model_prompt: ANALYSIS_MODEL_PROMPT.into(),
            temperature: 0.3,
            max_tokens: 500,
        },
        researcher_agent: AgentSettings {
            system_prompt: RESEARCHER_SYSTEM_PROMPT.into(),
            model_prompt: RESEARCHER_MODEL_PROMPT.into(),
            temperature: 0.0,
            max_tokens: 300,
        },
        reply_agent: AgentSettings {
            system_prompt: REPLY_SYSTEM_PROMPT.into(),
            model_prompt: REPLY_MODEL_PROMPT.into(),
            temperature: 0.5,
            max_tokens: 1_000,
        },
    }
}

impl Default for Settings {
    fn default() -> Self {
        default_settings()
    }
}
