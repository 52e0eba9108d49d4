#![deny(missing_docs)]

//! Core library for the docqna PDF question-answering server.

/// Agent prompt assembly and relevance parsing.
pub mod agents;
/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// PDF text extraction.
pub mod extraction;
/// Chat-completion client for the hosted language model.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Upload and question metrics helpers.
pub mod metrics;
/// Document pipeline, session store, and question answering.
pub mod processing;
/// Persisted, user-editable settings.
pub mod settings;
