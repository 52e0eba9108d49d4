//! Token counting and fixed-size token splitting over a `tiktoken-rs` encoding table.

use super::types::ChunkingError;
use anyhow::Error as TokenizerError;
use tiktoken_rs::{
    CoreBPE, Rank, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, p50k_edit, r50k_base,
};

/// How far a window edge may move back to land on a character boundary. A UTF-8 character spans
/// at most four bytes, so at most three tokens can hold a partial character.
const MAX_BOUNDARY_BACKOFF: usize = 3;

/// Smallest window `split` accepts; anything shorter could back off to nothing.
pub const MIN_SPLIT_TOKENS: usize = MAX_BOUNDARY_BACKOFF + 1;

/// Counts and splits text with one fixed encoding.
pub struct Tokenizer {
    encoding: CoreBPE,
    name: String,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer").field("name", &self.name).finish()
    }
}

impl Tokenizer {
    /// Resolve the encoding for a model name (e.g. `gpt-3.5-turbo`) or an encoding name
    /// (e.g. `cl100k_base`). Unknown names fall back to `cl100k_base`.
    pub fn for_model(model: &str) -> Result<Self, ChunkingError> {
        let normalized = model.trim();
        let target = if normalized.is_empty() {
            "cl100k_base"
        } else {
            normalized
        };
        let encoding = resolve_encoding(target).map_err(|source| ChunkingError::Tokenizer {
            model: target.to_string(),
            source,
        })?;
        Ok(Self {
            encoding,
            name: target.to_string(),
        })
    }

    /// Model or encoding name this tokenizer was built for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of tokens in `text`.
    pub fn count(&self, text: &str) -> usize {
        self.encoding.encode_ordinary(text).len()
    }

    /// Split `text` into consecutive, non-overlapping windows of at most `max_tokens` tokens.
    ///
    /// The last window holds the remainder. A window whose edge would cut a multi-byte character
    /// is shortened until it decodes and the displaced tokens open the next window. Budgets below
    /// [`MIN_SPLIT_TOKENS`] are rejected.
    pub fn split(&self, text: &str, max_tokens: usize) -> Result<Vec<String>, ChunkingError> {
        Ok(self
            .split_windows(text, max_tokens)?
            .into_iter()
            .map(|(chunk, _)| chunk)
            .collect())
    }

    /// Decoded windows paired with the number of tokens each one consumed.
    fn split_windows(
        &self,
        text: &str,
        max_tokens: usize,
    ) -> Result<Vec<(String, usize)>, ChunkingError> {
        if max_tokens < MIN_SPLIT_TOKENS {
            return Err(ChunkingError::InvalidChunkSize {
                min: MIN_SPLIT_TOKENS,
            });
        }
        let tokens = self.encoding.encode_ordinary(text);
        let mut windows = Vec::with_capacity(tokens.len().div_ceil(max_tokens));
        let mut start = 0;

        while start < tokens.len() {
            let end = (start + max_tokens).min(tokens.len());
            let (chunk, next) = self.decode_window(&tokens, start, end)?;
            windows.push((chunk, next - start));
            start = next;
        }

        Ok(windows)
    }

    /// Decode `tokens[start..end]`, moving `end` back to the nearest character boundary. Returns
    /// the text and the index where the next window starts.
    fn decode_window(
        &self,
        tokens: &[Rank],
        start: usize,
        end: usize,
    ) -> Result<(String, usize), ChunkingError> {
        let backoff = MAX_BOUNDARY_BACKOFF.min(end - start - 1);

        let mut last_error = None;
        for candidate in (0..=backoff).map(|step| end - step) {
            match self.encoding.decode(tokens[start..candidate].to_vec()) {
                Ok(text) => return Ok((text, candidate)),
                Err(error) => last_error = Some(error),
            }
        }
        Err(ChunkingError::Decode {
            source: last_error.unwrap_or_else(|| anyhow::anyhow!("empty token window")),
        })
    }
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    match get_bpe_from_model(model) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::debug!(
                model,
                error = %model_err,
                "Tokenizer model lookup failed; trying encoding name"
            );
            match encoding_from_name(model) {
                Some(candidate) => candidate,
                None => {
                    tracing::warn!(
                        model,
                        "Falling back to 'cl100k_base' encoding for token counting"
                    );
                    cl100k_base()
                }
            }
        }
    }
}

fn encoding_from_name(name: &str) -> Option<Result<CoreBPE, TokenizerError>> {
    match name {
        "cl100k_base" => Some(cl100k_base()),
        "o200k_base" => Some(o200k_base()),
        "p50k_base" => Some(p50k_base()),
        "p50k_edit" => Some(p50k_edit()),
        "r50k_base" | "gpt2" => Some(r50k_base()),
        _ => None,
    }
}
