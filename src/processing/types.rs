//! Core data types and error definitions for the question-answering pipeline.

use crate::extraction::ExtractionError;
use crate::llm::ChatClientError;
use crate::settings::SettingsError;
use anyhow::Error as TokenizerError;
use serde::Serialize;
use thiserror::Error;

/// Errors produced while turning extracted text into token-bounded chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Chunking configured a token budget too small to split on character boundaries.
    #[error("chunk size must be at least {min} tokens")]
    InvalidChunkSize {
        /// Smallest accepted budget.
        min: usize,
    },
    /// Tokenizer resources were unavailable for the configured model.
    #[error("failed to initialize tokenizer for model '{model}': {source}")]
    Tokenizer {
        /// Model or encoding we attempted to load.
        model: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
    /// A token window could not be decoded back into text.
    #[error("failed to decode token window: {source}")]
    Decode {
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Errors raised while ingesting a single uploaded file.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Text could not be extracted from the upload.
    #[error("{0}")]
    Extraction(#[from] ExtractionError),
    /// Extracted text could not be chunked.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// The planned chunks clash with stored ones.
    #[error("{0}")]
    Session(#[from] SessionError),
    /// The document analysis agent failed to summarize a chunk.
    #[error("Failed to summarize '{chunk}': {source}")]
    Summarization {
        /// Chunk being summarized.
        chunk: String,
        /// Model call failure.
        #[source]
        source: ChatClientError,
    },
}

/// Errors raised while answering a question.
#[derive(Debug, Error)]
pub enum AskError {
    /// Question was empty or whitespace.
    #[error("question must not be empty")]
    EmptyQuestion,
    /// No document has been uploaded yet.
    #[error("no documents have been uploaded")]
    NoDocuments,
    /// The researcher agent call failed.
    #[error("Failed to score document relevance: {0}")]
    Relevance(#[source] ChatClientError),
    /// The reply agent call failed.
    #[error("Failed to generate answer: {0}")]
    Reply(#[source] ChatClientError),
}

/// Errors raised by the in-memory document session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No chunk with this name exists.
    #[error("unknown document '{0}'")]
    UnknownDocument(String),
    /// A file with this name was already processed.
    #[error("file '{0}' was already processed")]
    FileAlreadyStored(String),
    /// A chunk with this name is already stored under another file.
    #[error("chunk name '{0}' already exists")]
    ChunkNameTaken(String),
}

/// Umbrella error for service operations outside ingest and ask.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Session lookup or edit failed.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Settings edit failed.
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// A token-bounded slice of one uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    /// File name, or `"{file} (Part i/n)"` when the file was split.
    pub name: String,
    /// Extracted text of this slice.
    pub text: String,
    /// Tokens in `text`.
    pub token_count: usize,
}

/// One uploaded file handed to the pipeline.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Original file name.
    pub file_name: String,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

/// Name and size of one stored chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkInfo {
    /// Chunk name.
    pub name: String,
    /// Tokens in the chunk.
    pub token_count: usize,
}

/// Result of ingesting one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// File was extracted, chunked, summarized, and stored.
    Processed {
        /// Stored chunks in order.
        chunks: Vec<ChunkInfo>,
        /// Sum of chunk token counts.
        total_tokens: usize,
    },
    /// A file with this name was already ingested in this session.
    Skipped,
    /// Ingestion failed; nothing from this file was stored.
    Failed {
        /// User-facing error message.
        error: String,
    },
}

/// Per-file report returned for an upload batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    /// Uploaded file name.
    pub file_name: String,
    /// What happened to it.
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// Relevance score of one chunk for the current question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    /// Chunk name.
    pub document: String,
    /// Model-assigned score, nominally 0-100.
    pub score: f64,
}

/// Answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerOutcome {
    /// Chunk used as context.
    pub source: String,
    /// Tokens in the source chunk.
    pub token_count: usize,
    /// Relevance score of the source chunk.
    pub relevance_score: f64,
    /// All scores, highest first.
    pub scores: Vec<ScoredDocument>,
    /// Generated answer.
    pub answer: String,
    /// Whether relevance parsing failed and the first document was used.
    pub fallback: bool,
}

/// A stored chunk as listed to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentView {
    /// Chunk name.
    pub name: String,
    /// File the chunk came from.
    pub source_file: String,
    /// Current (possibly edited) summary.
    pub summary: String,
    /// Tokens in the chunk.
    pub token_count: usize,
    /// RFC3339 time the chunk was stored.
    pub processed_at: String,
}

/// System status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Number of stored chunks.
    pub documents_loaded: usize,
    /// Chat deployment answering questions.
    pub model: String,
    /// Sum of token counts across all chunks.
    pub total_tokens: usize,
}

/// Settings as shown to users: the Azure key is never echoed back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsView {
    /// Chunking settings.
    pub document_processing: crate::settings::ProcessingSettings,
    /// Summarization agent.
    pub document_analysis_agent: crate::settings::AgentSettings,
    /// Relevance agent.
    pub researcher_agent: crate::settings::AgentSettings,
    /// Answering agent.
    pub reply_agent: crate::settings::AgentSettings,
    /// Model connection details.
    pub model: ModelInfo,
}

/// Non-secret model connection details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    /// Chat deployment.
    pub deployment_name: String,
    /// API version.
    pub api_version: String,
    /// Resource endpoint.
    pub azure_endpoint: String,
    /// Whether an API key is configured.
    pub api_key_configured: bool,
}

/// Errors raised while assembling the service at start-up.
#[derive(Debug, Error)]
pub enum InitError {
    /// Settings store could not be opened.
    #[error("Failed to open settings: {0}")]
    Settings(#[from] SettingsError),
    /// Tokenizer could not be built.
    #[error("Failed to build tokenizer: {0}")]
    Tokenizer(#[from] ChunkingError),
    /// Chat client could not be built.
    #[error("Failed to build language model client: {0}")]
    Client(#[from] ChatClientError),
}
