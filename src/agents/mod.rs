//! Agent prompts and response handling for the analysis, researcher, and reply roles.

pub mod prompts;
pub mod relevance;

pub use prompts::{analysis_request, relevance_request, reply_request};
pub use relevance::{RelevanceSelection, parse_relevance};
