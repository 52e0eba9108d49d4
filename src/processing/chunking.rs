//! Threshold-gated chunk planning for extracted documents.
//!
//! A document at or under the threshold stays whole and keeps its file name. A larger one is
//! split into fixed token windows named `"{file} (Part i/n)"`. Token counts are re-measured on
//! the decoded text, so they can differ from the window size through decode-time rounding.

use super::tokenizer::{MIN_SPLIT_TOKENS, Tokenizer};
use super::types::{ChunkingError, DocumentChunk};

/// Plan the chunks stored for one extracted document.
pub(crate) fn plan_chunks(
    file_name: &str,
    text: &str,
    tokenizer: &Tokenizer,
    max_chunk_tokens: usize,
) -> Result<Vec<DocumentChunk>, ChunkingError> {
    if max_chunk_tokens < MIN_SPLIT_TOKENS {
        return Err(ChunkingError::InvalidChunkSize {
            min: MIN_SPLIT_TOKENS,
        });
    }

    let total_tokens = tokenizer.count(text);
    if total_tokens <= max_chunk_tokens {
        return Ok(vec![DocumentChunk {
            name: file_name.to_string(),
            text: text.to_string(),
            token_count: total_tokens,
        }]);
    }

    let pieces = tokenizer.split(text, max_chunk_tokens)?;
    let part_count = pieces.len();
    tracing::debug!(
        file = file_name,
        total_tokens,
        max_chunk_tokens,
        parts = part_count,
        "Splitting document"
    );

    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(index, piece)| DocumentChunk {
            name: part_name(file_name, index + 1, part_count),
            token_count: tokenizer.count(&piece),
            text: piece,
        })
        .collect())
}

fn part_name(file_name: &str, part: usize, of: usize) -> String {
    format!("{file_name} (Part {part}/{of})")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> Tokenizer {
        Tokenizer::for_model("gpt-3.5-turbo").expect("tokenizer")
    }

    #[test]
    fn document_under_threshold_yields_one_chunk_named_after_file() {
        let tokenizer = tokenizer();
        let text = "A short memo about quarterly revenue.";

        let chunks = plan_chunks("memo.pdf", text, &tokenizer, 1_000).expect("plan");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name, "memo.pdf");
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].token_count, tokenizer.count(text));
    }

    #[test]
    fn document_exactly_at_threshold_is_not_split() {
        let tokenizer = tokenizer();
        let text = "alpha beta gamma delta";
        let exact = tokenizer.count(text);

        let chunks = plan_chunks("exact.pdf", text, &tokenizer, exact).expect("plan");

        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn document_over_threshold_splits_into_named_parts_within_budget() {
        let tokenizer = tokenizer();
        let text = "Section one covers the budget. Section two covers hiring. ".repeat(30);

        let chunks = plan_chunks("plan.pdf", &text, &tokenizer, 50).expect("plan");

        let total = chunks.len();
        assert!(total > 1);
        for (index, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.name, format!("plan.pdf (Part {}/{total})", index + 1));
            assert!(chunk.token_count <= 50, "{} has {} tokens", chunk.name, chunk.token_count);
            assert_eq!(chunk.token_count, tokenizer.count(&chunk.text));
        }
        let rebuilt: String = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn empty_text_stays_a_single_empty_chunk() {
        let chunks = plan_chunks("blank.pdf", "", &tokenizer(), 1_000).expect("plan");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].token_count, 0);
    }
}
