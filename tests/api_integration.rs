use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use docqna::{
    api::create_router,
    llm::AzureOpenAiClient,
    processing::{QnaService, Tokenizer},
    settings::{Settings, SettingsStore},
};
use httpmock::{Method::POST, Mock, MockServer};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use serde_json::{Value, json};
use tower::ServiceExt;

const BOUNDARY: &str = "docqna-integration-boundary";
const DEPLOYMENT: &str = "test-deploy";
const COMPLETIONS_PATH: &str = "/openai/deployments/test-deploy/chat/completions";

struct Harness {
    server: MockServer,
    app: Router,
    settings_path: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

impl Harness {
    async fn new() -> Self {
        let server = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let settings_path = dir.path().join("docqna.json");

        let mut settings = Settings::default();
        settings.azure.azure_endpoint = server.base_url();
        settings.azure.api_key = "test-key".into();
        settings.azure.deployment_name = DEPLOYMENT.into();
        let store = SettingsStore::with_settings(&settings_path, settings);

        let chat = AzureOpenAiClient::new(&store.azure()).expect("chat client");
        let tokenizer = Tokenizer::for_model("gpt-3.5-turbo").expect("tokenizer");
        let service = QnaService::with_components(store, tokenizer, Arc::new(chat));

        Self {
            server,
            app: create_router(Arc::new(service)),
            settings_path,
            _dir: dir,
        }
    }

    /// Mock a completion for requests whose body contains every fragment.
    async fn completion(&self, fragments: &[&str], content: &str) -> Mock<'_> {
        let fragments: Vec<String> = fragments.iter().map(|f| f.to_string()).collect();
        let content = content.to_string();
        self.server
            .mock_async(move |when, then| {
                let mut when = when
                    .method(POST)
                    .path(COMPLETIONS_PATH)
                    .query_param("api-version", "2024-02-01")
                    .header("api-key", "test-key");
                for fragment in &fragments {
                    when = when.body_contains(fragment.as_str());
                }
                then.status(200).json_body(json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": content } }
                    ]
                }));
            })
            .await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("json body")
        };
        (status, json)
    }

    async fn upload(&self, files: &[(&str, Vec<u8>)]) -> (StatusCode, Value) {
        let mut body = Vec::new();
        for (file_name, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        self.send(
            Request::builder()
                .method(Method::POST)
                .uri("/documents")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .expect("request"),
        )
        .await
    }

    async fn json(&self, method: Method, uri: &str, payload: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .expect("request"),
        )
        .await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
    }
}

/// Single-page PDF carrying one line of Courier text.
fn pdf(line: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(line)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("encode content"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize pdf");
    bytes
}

#[tokio::test]
async fn upload_then_ask_routes_to_most_relevant_document() {
    let harness = Harness::new().await;
    let solar_summary = harness
        .completion(
            &["Summarize the following document", "Solar panels convert sunlight"],
            "Overview of solar energy.",
        )
        .await;
    let tax_summary = harness
        .completion(
            &["Summarize the following document", "Tax returns are due in April"],
            "Tax filing deadlines.",
        )
        .await;
    let relevance = harness
        .completion(
            &["Relevance scores:", "Overview of solar energy.", "Tax filing deadlines."],
            r#"{"solar.pdf": 92, "taxes.pdf": 4}"#,
        )
        .await;
    let reply = harness
        .completion(
            &["Document Context:", "Solar panels convert sunlight", "How do solar panels work?"],
            "They convert sunlight into electricity.",
        )
        .await;

    let (status, upload) = harness
        .upload(&[
            ("solar.pdf", pdf("Solar panels convert sunlight into electricity")),
            ("taxes.pdf", pdf("Tax returns are due in April")),
        ])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(upload["files"][0]["status"], "processed");
    assert_eq!(upload["files"][1]["status"], "processed");
    solar_summary.assert_hits_async(1).await;
    tax_summary.assert_hits_async(1).await;

    let (status, answer) = harness
        .json(
            Method::POST,
            "/ask",
            json!({ "question": "How do solar panels work?" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answer["source"], "solar.pdf");
    assert_eq!(answer["relevance_score"], 92.0);
    assert_eq!(answer["answer"], "They convert sunlight into electricity.");
    assert_eq!(answer["fallback"], false);
    relevance.assert_hits_async(1).await;
    reply.assert_hits_async(1).await;

    let (_, status) = harness.get("/status").await;
    assert_eq!(status["documents_loaded"], 2);
    assert_eq!(status["model"], DEPLOYMENT);

    let (_, metrics) = harness.get("/metrics").await;
    assert_eq!(metrics["files_processed"], 2);
    assert_eq!(metrics["questions_answered"], 1);
}

#[tokio::test]
async fn reupload_is_skipped_and_bad_file_does_not_block_batch() {
    let harness = Harness::new().await;
    let summary = harness
        .completion(&["Summarize the following document"], "A memo.")
        .await;

    let (status, first) = harness.upload(&[("memo.pdf", pdf("Team memo"))]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["files"][0]["status"], "processed");

    let (status, second) = harness
        .upload(&[
            ("broken.pdf", b"definitely not a pdf".to_vec()),
            ("memo.pdf", pdf("Team memo")),
        ])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["files"][0]["status"], "failed");
    assert!(second["files"][0]["error"].is_string());
    assert_eq!(second["files"][1]["status"], "skipped");
    summary.assert_hits_async(1).await;

    let (_, documents) = harness.get("/documents").await;
    assert_eq!(documents["documents"].as_array().map(Vec::len), Some(1));
    assert_eq!(documents["documents"][0]["summary"], "A memo.");
}

#[tokio::test]
async fn model_failure_during_ask_maps_to_bad_gateway() {
    let harness = Harness::new().await;
    harness
        .completion(&["Summarize the following document"], "Notes.")
        .await;
    harness
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path(COMPLETIONS_PATH)
                .body_contains("Relevance scores:");
            then.status(500).body("upstream exploded");
        })
        .await;

    harness.upload(&[("notes.pdf", pdf("Meeting notes"))]).await;
    let (status, body) = harness
        .json(Method::POST, "/ask", json!({ "question": "What happened?" }))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap_or_default().contains("500"));
}

#[tokio::test]
async fn ask_before_upload_is_rejected() {
    let harness = Harness::new().await;

    let (status, body) = harness
        .json(Method::POST, "/ask", json!({ "question": "Anything?" }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn settings_edits_are_validated_and_persisted() {
    let harness = Harness::new().await;

    let (status, view) = harness
        .json(
            Method::PATCH,
            "/settings",
            json!({ "section": "document_processing", "key": "max_chunk_tokens", "value": 4000 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["document_processing"]["max_chunk_tokens"], 4000);
    assert!(view["model"].get("api_key").is_none());
    assert_eq!(view["model"]["api_key_configured"], true);

    let (status, _) = harness
        .json(
            Method::PATCH,
            "/settings",
            json!({ "section": "reply_agent", "key": "temperature", "value": 1.5 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let reopened = SettingsStore::open(&harness.settings_path).expect("reopen settings");
    assert_eq!(reopened.processing().max_chunk_tokens, 4000);
    assert_eq!(reopened.settings().reply_agent.temperature, 0.5);
}
