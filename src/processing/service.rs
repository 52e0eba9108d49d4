//! Question-answering service coordinating extraction, chunking, agent calls, and the session.

use crate::{
    agents::{analysis_request, parse_relevance, relevance_request, reply_request},
    config::{AzureOverrides, Config},
    extraction::{ExtractionError, extract_pdf_text},
    llm::{AzureOpenAiClient, ChatClient},
    metrics::{MetricsSnapshot, QnaMetrics},
    processing::{
        chunking::plan_chunks,
        session::DocumentSession,
        tokenizer::Tokenizer,
        types::{
            AnswerOutcome, AskError, ChunkInfo, DocumentChunk, DocumentView, FileOutcome,
            FileReport, IngestError, InitError, ModelInfo, ServiceError, SessionError,
            SettingsView, StatusSnapshot, Upload,
        },
    },
    settings::{AgentRole, SettingsStore, SettingsUpdate},
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Owns the settings store, tokenizer, model client, and document session for one process.
///
/// Uploads and questions are handled one model call at a time; nothing is batched or run
/// concurrently. Construct the service once near process start and share it through an `Arc`.
pub struct QnaService {
    settings: RwLock<SettingsStore>,
    azure_overrides: AzureOverrides,
    tokenizer: Tokenizer,
    chat: Arc<dyn ChatClient>,
    session: RwLock<DocumentSession>,
    metrics: QnaMetrics,
}

/// Abstraction over the service used by the HTTP surface.
#[async_trait]
pub trait QnaApi: Send + Sync {
    /// Extract, chunk, summarize, and store each upload; failures are reported per file.
    async fn ingest_files(&self, uploads: Vec<Upload>) -> Vec<FileReport>;

    /// Answer a question from the most relevant stored chunk.
    async fn ask(&self, question: &str) -> Result<AnswerOutcome, AskError>;

    /// Stored chunks with summaries and token counts, in upload order.
    async fn documents(&self) -> Vec<DocumentView>;

    /// Overwrite a chunk's summary.
    async fn update_summary(&self, name: &str, summary: String) -> Result<(), ServiceError>;

    /// Documents loaded, model, and token totals.
    async fn status(&self) -> StatusSnapshot;

    /// Current settings with the API key redacted.
    async fn settings_view(&self) -> SettingsView;

    /// Apply and persist one settings edit, returning the new view.
    async fn update_settings(&self, update: SettingsUpdate) -> Result<SettingsView, ServiceError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl QnaService {
    /// Build the service from process configuration: open the settings store, resolve the
    /// tokenizer, and connect the Azure OpenAI client.
    pub fn new(config: &Config) -> Result<Self, InitError> {
        let store = SettingsStore::open(&config.settings_path)?;
        tracing::info!(path = %store.path().display(), "Settings loaded");
        let tokenizer = Tokenizer::for_model(&config.tokenizer_model)?;
        let azure = store.effective_azure(&config.azure_overrides);
        let chat = AzureOpenAiClient::new(&azure)?;
        tracing::info!(
            deployment = %azure.deployment_name,
            endpoint = %azure.azure_endpoint,
            api_version = %azure.api_version,
            "Language model client initialized"
        );

        let mut service = Self::with_components(store, tokenizer, Arc::new(chat));
        service.azure_overrides = config.azure_overrides.clone();
        Ok(service)
    }

    /// Assemble a service from prepared parts.
    pub fn with_components(
        store: SettingsStore,
        tokenizer: Tokenizer,
        chat: Arc<dyn ChatClient>,
    ) -> Self {
        Self {
            settings: RwLock::new(store),
            azure_overrides: AzureOverrides::default(),
            tokenizer,
            chat,
            session: RwLock::new(DocumentSession::new()),
            metrics: QnaMetrics::new(),
        }
    }

    /// Ingest a batch of uploads in order. A failing file never stops the rest of the batch.
    pub async fn ingest_files(&self, uploads: Vec<Upload>) -> Vec<FileReport> {
        let mut reports = Vec::with_capacity(uploads.len());
        for upload in uploads {
            reports.push(self.ingest_file(upload).await);
        }
        reports
    }

    /// Ingest one upload, skipping file names already stored in this session.
    pub async fn ingest_file(&self, upload: Upload) -> FileReport {
        let file_name = upload.file_name.clone();
        if self.session.read().await.is_processed(&file_name) {
            tracing::info!(file = %file_name, "File already processed; skipping");
            self.metrics.record_skip();
            return FileReport {
                file_name,
                outcome: FileOutcome::Skipped,
            };
        }

        tracing::info!(file = %file_name, bytes = upload.bytes.len(), "Processing document");
        let outcome = match self.summarize_upload(upload).await {
            Ok(chunks) => self.store_chunks(&file_name, chunks).await,
            Err(error) => {
                tracing::warn!(file = %file_name, error = %error, "Document processing failed");
                self.metrics.record_failure();
                FileOutcome::Failed {
                    error: error.to_string(),
                }
            }
        };
        FileReport { file_name, outcome }
    }

    async fn summarize_upload(
        &self,
        upload: Upload,
    ) -> Result<Vec<(DocumentChunk, String)>, IngestError> {
        let Upload { file_name, bytes } = upload;
        let text = tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
            .await
            .map_err(|error| ExtractionError::Parse(format!("PDF parser aborted: {error}")))??;

        let (max_chunk_tokens, agent) = {
            let settings = self.settings.read().await;
            (
                settings.processing().max_chunk_tokens,
                settings.agent(AgentRole::DocumentAnalysis),
            )
        };
        let chunks = plan_chunks(&file_name, &text, &self.tokenizer, max_chunk_tokens)?;
        if let Some(taken) = self
            .session
            .read()
            .await
            .first_taken_name(chunks.iter().map(|chunk| chunk.name.as_str()))
        {
            return Err(SessionError::ChunkNameTaken(taken.to_string()).into());
        }
        if chunks.len() > 1 {
            tracing::info!(
                file = %file_name,
                total_tokens = chunks.iter().map(|chunk| chunk.token_count).sum::<usize>(),
                parts = chunks.len(),
                "Large document will be summarized in parts"
            );
        }

        let mut summarized = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let summary = self
                .chat
                .complete(analysis_request(&agent, &chunk.text))
                .await
                .map_err(|source| IngestError::Summarization {
                    chunk: chunk.name.clone(),
                    source,
                })?;
            tracing::debug!(chunk = %chunk.name, tokens = chunk.token_count, "Chunk summarized");
            summarized.push((chunk, summary));
        }
        Ok(summarized)
    }

    async fn store_chunks(
        &self,
        file_name: &str,
        chunks: Vec<(DocumentChunk, String)>,
    ) -> FileOutcome {
        let infos: Vec<ChunkInfo> = chunks
            .iter()
            .map(|(chunk, _)| ChunkInfo {
                name: chunk.name.clone(),
                token_count: chunk.token_count,
            })
            .collect();
        let total_tokens = infos.iter().map(|info| info.token_count).sum();

        if let Err(error) = self.session.write().await.insert_file(file_name, chunks) {
            return match error {
                SessionError::FileAlreadyStored(_) => {
                    tracing::info!(file = file_name, "File stored concurrently; discarding duplicate");
                    self.metrics.record_skip();
                    FileOutcome::Skipped
                }
                other => {
                    tracing::warn!(file = file_name, error = %other, "Document could not be stored");
                    self.metrics.record_failure();
                    FileOutcome::Failed {
                        error: other.to_string(),
                    }
                }
            };
        }

        self.metrics.record_file(infos.len() as u64);
        tracing::info!(
            file = file_name,
            chunks = infos.len(),
            total_tokens,
            "Document stored"
        );
        FileOutcome::Processed {
            chunks: infos,
            total_tokens,
        }
    }

    /// Score every summary against the question, then answer from the top-scored chunk.
    pub async fn ask(&self, question: &str) -> Result<AnswerOutcome, AskError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::EmptyQuestion);
        }
        let summaries = self.session.read().await.summaries();
        if summaries.is_empty() {
            return Err(AskError::NoDocuments);
        }
        let names: Vec<String> = summaries.iter().map(|(name, _)| name.clone()).collect();

        let (researcher, reply) = {
            let settings = self.settings.read().await;
            (
                settings.agent(AgentRole::Researcher),
                settings.agent(AgentRole::Reply),
            )
        };

        let response = self
            .chat
            .complete(relevance_request(&researcher, question, &summaries))
            .await
            .map_err(AskError::Relevance)?;
        tracing::info!(response = %response, "Relevance scores received");

        let selection = parse_relevance(&response, &names).ok_or(AskError::NoDocuments)?;
        let (document_text, info) = {
            let session = self.session.read().await;
            let text = session.text(&selection.selected).map(str::to_owned);
            (text, session.info(&selection.selected))
        };
        let (Some(document_text), Some(info)) = (document_text, info) else {
            return Err(AskError::NoDocuments);
        };

        let answer = self
            .chat
            .complete(reply_request(&reply, question, &document_text))
            .await
            .map_err(AskError::Reply)?;

        self.metrics.record_question(selection.fallback);
        let relevance_score = selection.selected_score();
        tracing::info!(
            source = %selection.selected,
            relevance_score,
            fallback = selection.fallback,
            "Question answered"
        );

        Ok(AnswerOutcome {
            source: selection.selected,
            token_count: info.token_count,
            relevance_score,
            scores: selection.scores,
            answer,
            fallback: selection.fallback,
        })
    }

    /// Stored chunks in upload order.
    pub async fn documents(&self) -> Vec<DocumentView> {
        self.session.read().await.list()
    }

    /// Overwrite a chunk's summary; later questions score against the edited text.
    pub async fn update_summary(&self, name: &str, summary: String) -> Result<(), ServiceError> {
        self.session.write().await.update_summary(name, summary)?;
        tracing::info!(document = name, "Summary edited");
        Ok(())
    }

    /// Documents loaded, model, and token totals.
    pub async fn status(&self) -> StatusSnapshot {
        let session = self.session.read().await;
        StatusSnapshot {
            documents_loaded: session.len(),
            model: self.chat.model_name().to_string(),
            total_tokens: session.total_tokens(),
        }
    }

    /// Current settings with the API key redacted.
    pub async fn settings_view(&self) -> SettingsView {
        let store = self.settings.read().await;
        self.view_of(&store)
    }

    /// Apply and persist one settings edit.
    ///
    /// A new chunk threshold applies to later uploads only; stored chunks are not re-split.
    pub async fn update_settings(
        &self,
        update: SettingsUpdate,
    ) -> Result<SettingsView, ServiceError> {
        let mut store = self.settings.write().await;
        store.apply(update)?;
        Ok(self.view_of(&store))
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn view_of(&self, store: &SettingsStore) -> SettingsView {
        let settings = store.settings();
        let azure = store.effective_azure(&self.azure_overrides);
        SettingsView {
            document_processing: settings.document_processing,
            document_analysis_agent: settings.document_analysis_agent.clone(),
            researcher_agent: settings.researcher_agent.clone(),
            reply_agent: settings.reply_agent.clone(),
            model: ModelInfo {
                deployment_name: azure.deployment_name,
                api_version: azure.api_version,
                azure_endpoint: azure.azure_endpoint,
                api_key_configured: !azure.api_key.is_empty(),
            },
        }
    }
}

#[async_trait]
impl QnaApi for QnaService {
    async fn ingest_files(&self, uploads: Vec<Upload>) -> Vec<FileReport> {
        QnaService::ingest_files(self, uploads).await
    }

    async fn ask(&self, question: &str) -> Result<AnswerOutcome, AskError> {
        QnaService::ask(self, question).await
    }

    async fn documents(&self) -> Vec<DocumentView> {
        QnaService::documents(self).await
    }

    async fn update_summary(&self, name: &str, summary: String) -> Result<(), ServiceError> {
        QnaService::update_summary(self, name, summary).await
    }

    async fn status(&self) -> StatusSnapshot {
        QnaService::status(self).await
    }

    async fn settings_view(&self) -> SettingsView {
        QnaService::settings_view(self).await
    }

    async fn update_settings(&self, update: SettingsUpdate) -> Result<SettingsView, ServiceError> {
        QnaService::update_settings(self, update).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        QnaService::metrics_snapshot(self)
    }
}
