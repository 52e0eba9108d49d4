use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "docqna-cli",
    about = "Upload PDFs to a running docqna server and ask questions about them"
)]
struct Cli {
    /// Base URL of the docqna server.
    #[arg(long, env = "DOCQNA_URL", default_value = "http://127.0.0.1:8500")]
    server: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload PDF files; directories are searched recursively.
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Ask a question about the uploaded documents.
    Ask { question: String },
    /// List stored documents with their summaries.
    Documents,
    /// Edit one setting, e.g. `set reply_agent temperature 0.2`.
    Set {
        section: String,
        key: String,
        /// Parsed as JSON when possible, otherwise sent as a string.
        value: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new(&cli.server);
    match cli.command {
        Command::Upload { paths } => upload(&client, &paths).await,
        Command::Ask { question } => ask(&client, &question).await,
        Command::Documents => documents(&client).await,
        Command::Set {
            section,
            key,
            value,
        } => set(&client, &section, &key, &value).await,
    }
}

struct Client {
    http: reqwest::Client,
    base: String,
}

impl Client {
    fn new(base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|value| value.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            bail!("server returned {status}: {message}");
        }
        response
            .json()
            .await
            .context("failed to decode server response")
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    files: Vec<FileReport>,
}

#[derive(Deserialize)]
struct FileReport {
    file_name: String,
    status: String,
    #[serde(default)]
    chunks: Vec<ChunkInfo>,
    #[serde(default)]
    total_tokens: usize,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkInfo {
    name: String,
    token_count: usize,
}

async fn upload(client: &Client, paths: &[PathBuf]) -> Result<()> {
    let files = collect_pdfs(paths)?;
    if files.is_empty() {
        bail!("no PDF files found");
    }

    let mut form = Form::new();
    for path in &files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", path.display()))?;
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        form = form.part("file", part);
    }
    println!("Uploading {} file(s)...", files.len());

    let response = client
        .http
        .post(client.url("/documents"))
        .multipart(form)
        .send()
        .await
        .context("failed to reach docqna server")?;
    let report: UploadResponse = Client::read(response).await?;

    for file in report.files {
        match file.status.as_str() {
            "processed" => {
                println!(
                    "{}: processed ({} tokens, {} chunk(s))",
                    file.file_name,
                    file.total_tokens,
                    file.chunks.len()
                );
                if file.chunks.len() > 1 {
                    for chunk in file.chunks {
                        println!("  {} ({} tokens)", chunk.name, chunk.token_count);
                    }
                }
            }
            "skipped" => println!("{}: already processed, skipped", file.file_name),
            _ => println!(
                "{}: failed: {}",
                file.file_name,
                file.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    Ok(())
}

fn collect_pdfs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry =
                    entry.with_context(|| format!("failed to walk {}", path.display()))?;
                if entry.file_type().is_file() && is_pdf(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            bail!("{} does not exist", path.display());
        }
    }
    Ok(files)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

#[derive(Deserialize)]
struct AnswerResponse {
    source: String,
    token_count: usize,
    relevance_score: f64,
    scores: Vec<ScoredDocument>,
    answer: String,
    fallback: bool,
}

#[derive(Deserialize)]
struct ScoredDocument {
    document: String,
    score: f64,
}

async fn ask(client: &Client, question: &str) -> Result<()> {
    let response = client
        .http
        .post(client.url("/ask"))
        .json(&json!({ "question": question }))
        .send()
        .await
        .context("failed to reach docqna server")?;
    let answer: AnswerResponse = Client::read(response).await?;

    println!(
        "Source: {} ({} tokens, relevance {:.0})",
        answer.source, answer.token_count, answer.relevance_score
    );
    if answer.fallback {
        println!("Relevance scores could not be parsed; used the first document.");
    }
    println!("Scores:");
    for scored in &answer.scores {
        println!("  {:>5.1}  {}", scored.score, scored.document);
    }
    println!();
    println!("{}", answer.answer);
    Ok(())
}

#[derive(Deserialize)]
struct DocumentsResponse {
    documents: Vec<DocumentView>,
    total_tokens: usize,
}

#[derive(Deserialize)]
struct DocumentView {
    name: String,
    summary: String,
    token_count: usize,
}

async fn documents(client: &Client) -> Result<()> {
    let response = client
        .http
        .get(client.url("/documents"))
        .send()
        .await
        .context("failed to reach docqna server")?;
    let listing: DocumentsResponse = Client::read(response).await?;

    if listing.documents.is_empty() {
        println!("No documents uploaded.");
        return Ok(());
    }
    for document in &listing.documents {
        println!("{} ({} tokens)", document.name, document.token_count);
        println!("  {}", document.summary.replace('\n', "\n  "));
    }
    println!(
        "{} document(s), {} tokens total",
        listing.documents.len(),
        listing.total_tokens
    );
    Ok(())
}

async fn set(client: &Client, section: &str, key: &str, value: &str) -> Result<()> {
    let value: Value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    let response = client
        .http
        .patch(client.url("/settings"))
        .json(&json!({ "section": section, "key": key, "value": value }))
        .send()
        .await
        .context("failed to reach docqna server")?;
    let _: Value = Client::read(response).await?;
    println!("Updated {section}.{key}");
    Ok(())
}
