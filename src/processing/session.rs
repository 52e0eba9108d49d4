//! In-memory document session.
//!
//! Each stored chunk carries its text, summary, and token count in one record, so a chunk can
//! never exist without the other two. Records keep upload order, which is also the order used for
//! relevance prompts and for the parse-failure fallback.

use super::types::{ChunkInfo, DocumentChunk, DocumentView, SessionError};
use std::collections::{HashMap, HashSet};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

#[derive(Debug, Clone)]
struct ChunkRecord {
    name: String,
    source_file: String,
    text: String,
    summary: String,
    token_count: usize,
    processed_at: String,
}

/// Documents, summaries, and token counts uploaded during this process's lifetime.
#[derive(Debug, Default)]
pub struct DocumentSession {
    records: Vec<ChunkRecord>,
    by_name: HashMap<String, usize>,
    files: HashSet<String>,
}

impl DocumentSession {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an upload with this file name has already been stored.
    pub fn is_processed(&self, file_name: &str) -> bool {
        self.files.contains(file_name) || self.by_name.contains_key(file_name)
    }

    /// First of `names` already used by a stored chunk.
    pub fn first_taken_name<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Option<&'a str> {
        names
            .into_iter()
            .find(|name| self.by_name.contains_key(*name))
    }

    /// Store every chunk of one file with its summary.
    ///
    /// Nothing is stored when the file was already processed or any chunk name is taken.
    pub fn insert_file(
        &mut self,
        file_name: &str,
        chunks: Vec<(DocumentChunk, String)>,
    ) -> Result<(), SessionError> {
        if self.is_processed(file_name) {
            return Err(SessionError::FileAlreadyStored(file_name.to_string()));
        }
        if let Some(taken) =
            self.first_taken_name(chunks.iter().map(|(chunk, _)| chunk.name.as_str()))
        {
            return Err(SessionError::ChunkNameTaken(taken.to_string()));
        }

        let processed_at = current_timestamp_rfc3339();
        for (chunk, summary) in chunks {
            self.by_name.insert(chunk.name.clone(), self.records.len());
            self.records.push(ChunkRecord {
                name: chunk.name,
                source_file: file_name.to_string(),
                text: chunk.text,
                summary,
                token_count: chunk.token_count,
                processed_at: processed_at.clone(),
            });
        }
        self.files.insert(file_name.to_string());
        Ok(())
    }

    /// Overwrite the summary of a chunk.
    pub fn update_summary(&mut self, name: &str, summary: String) -> Result<(), SessionError> {
        let index = *self
            .by_name
            .get(name)
            .ok_or_else(|| SessionError::UnknownDocument(name.to_string()))?;
        self.records[index].summary = summary;
        Ok(())
    }

    /// `(name, summary)` pairs in upload order.
    pub fn summaries(&self) -> Vec<(String, String)> {
        self.records
            .iter()
            .map(|record| (record.name.clone(), record.summary.clone()))
            .collect()
    }

    /// Chunk names in upload order.
    pub fn names(&self) -> Vec<String> {
        self.records.iter().map(|record| record.name.clone()).collect()
    }

    /// Full text of a chunk.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.record(name).map(|record| record.text.as_str())
    }

    /// Name and token count of a chunk.
    pub fn info(&self, name: &str) -> Option<ChunkInfo> {
        self.record(name).map(|record| ChunkInfo {
            name: record.name.clone(),
            token_count: record.token_count,
        })
    }

    /// Every chunk as shown to users, in upload order.
    pub fn list(&self) -> Vec<DocumentView> {
        self.records
            .iter()
            .map(|record| DocumentView {
                name: record.name.clone(),
                source_file: record.source_file.clone(),
                summary: record.summary.clone(),
                token_count: record.token_count,
                processed_at: record.processed_at.clone(),
            })
            .collect()
    }

    /// Sum of token counts across all chunks.
    pub fn total_tokens(&self) -> usize {
        self.records.iter().map(|record| record.token_count).sum()
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been uploaded yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn record(&self, name: &str) -> Option<&ChunkRecord> {
        self.by_name.get(name).map(|&index| &self.records[index])
    }
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(name: &str, text: &str, token_count: usize) -> DocumentChunk {
        DocumentChunk {
            name: name.into(),
            text: text.into(),
            token_count,
        }
    }

    #[test]
    fn stores_chunks_with_summaries_in_upload_order() {
        let mut session = DocumentSession::new();
        session
            .insert_file(
                "big.pdf",
                vec![
                    (chunk("big.pdf (Part 1/2)", "first", 10), "s1".into()),
                    (chunk("big.pdf (Part 2/2)", "second", 4), "s2".into()),
                ],
            )
            .expect("insert big.pdf");
        session
            .insert_file("small.pdf", vec![(chunk("small.pdf", "tiny", 1), "s3".into())])
            .expect("insert small.pdf");

        assert_eq!(
            session.names(),
            vec!["big.pdf (Part 1/2)", "big.pdf (Part 2/2)", "small.pdf"]
        );
        assert_eq!(session.total_tokens(), 15);
        assert_eq!(session.text("big.pdf (Part 2/2)"), Some("second"));
        assert_eq!(session.list()[0].source_file, "big.pdf");
        assert_eq!(session.summaries()[2], ("small.pdf".into(), "s3".into()));
    }

    #[test]
    fn split_files_are_recognized_as_processed() {
        let mut session = DocumentSession::new();
        session
            .insert_file(
                "big.pdf",
                vec![(chunk("big.pdf (Part 1/1)", "text", 3), "summary".into())],
            )
            .expect("insert");

        assert!(session.is_processed("big.pdf"));
        let error = session
            .insert_file("big.pdf", vec![(chunk("big.pdf", "again", 1), "x".into())])
            .unwrap_err();
        assert!(matches!(error, SessionError::FileAlreadyStored(name) if name == "big.pdf"));
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn colliding_chunk_names_reject_the_whole_file() {
        let mut session = DocumentSession::new();
        session
            .insert_file("a.pdf", vec![(chunk("a.pdf", "text", 1), "s".into())])
            .expect("insert");

        let error = session
            .insert_file(
                "other.pdf",
                vec![
                    (chunk("other.pdf (Part 1/2)", "x", 1), "s".into()),
                    (chunk("a.pdf", "clash", 1), "s".into()),
                ],
            )
            .unwrap_err();

        assert!(matches!(error, SessionError::ChunkNameTaken(name) if name == "a.pdf"));
        assert_eq!(session.len(), 1);
        assert!(!session.is_processed("other.pdf"));
        assert_eq!(
            session.first_taken_name(["other.pdf (Part 1/2)", "a.pdf"]),
            Some("a.pdf")
        );
        assert_eq!(session.first_taken_name(["fresh.pdf"]), None);
    }

    #[test]
    fn summary_edits_overwrite() {
        let mut session = DocumentSession::new();
        session
            .insert_file("a.pdf", vec![(chunk("a.pdf", "text", 1), "old".into())])
            .expect("insert");

        session
            .update_summary("a.pdf", "new".into())
            .expect("known document");
        assert_eq!(session.list()[0].summary, "new");

        let error = session.update_summary("missing.pdf", "x".into()).unwrap_err();
        assert!(matches!(error, SessionError::UnknownDocument(name) if name == "missing.pdf"));
    }
}
