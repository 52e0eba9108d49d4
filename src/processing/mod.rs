//! Document pipeline: token-bounded chunking, per-chunk summarization, the in-memory session,
//! and question answering over stored chunks.

pub(crate) mod chunking;
pub mod session;
mod service;
pub mod tokenizer;
pub mod types;

pub use service::{QnaApi, QnaService};
pub use session::DocumentSession;
pub use tokenizer::Tokenizer;
pub use types::{
    AnswerOutcome, AskError, ChunkInfo, ChunkingError, DocumentChunk, DocumentView, FileOutcome,
    FileReport, IngestError, InitError, ModelInfo, ScoredDocument, ServiceError, SessionError,
    SettingsView, StatusSnapshot, Upload,
};
