//! HTTP providers wired into the service against a mock server

mod common;

use common::{test_service, words};
use folio::completion::{build_transcriber, GeminiCompleter};
use folio::config::{Config, ConfigValidator};
use folio::embedding::OpenAiEmbedder;
use folio::error::FolioError;
use folio::storage::{NewNote, ProcessingStatus};
use mockito::Matcher;
use std::sync::Arc;
use std::time::Duration;

const EMBEDDING_BODY: &str = r#"{"data":[{"embedding":[0.1,0.2,0.3],"index":0}]}"#;

fn embedder(url: &str, key: Option<&str>) -> OpenAiEmbedder {
    OpenAiEmbedder::new(
        key.map(String::from),
        "FOLIO_TEST_EMBED_KEY",
        url,
        "text-embedding-test",
        3,
        Duration::from_secs(5),
    )
    .unwrap()
}

fn gemini(url: &str) -> GeminiCompleter {
    GeminiCompleter::new(
        Some("gem-secret".to_string()),
        "FOLIO_TEST_GEMINI_KEY",
        url,
        "gemini-test",
        "gemini-audio-test",
        Duration::from_secs(5),
    )
    .unwrap()
}

#[test]
fn test_ingest_and_ask_over_http() {
    let mut server = mockito::Server::new();
    let embeddings = server
        .mock("POST", "/embeddings")
        .match_header("authorization", "Bearer embed-secret")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(EMBEDDING_BODY)
        .expect(4)
        .create();
    let completion = server
        .mock("POST", "/models/gemini-test:generateContent")
        .match_query(Matcher::UrlEncoded("key".into(), "gem-secret".into()))
        .match_body(Matcher::Regex("Please answer the question: When is the demo\\?".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"Thursday."}]}}]}"#)
        .create();

    let (_temp, service) = test_service(
        Arc::new(embedder(&server.url(), Some("embed-secret"))),
        Arc::new(gemini(&server.url())),
        false,
    );
    let folder = service.notes().create_folder("Demos", 1).unwrap();
    let note = service
        .notes()
        .create_note(NewNote {
            title: "Demo prep".to_string(),
            folder_id: Some(folder.id),
        })
        .unwrap();

    let report = service.ingest_transcript(note.id, &words(650), None).unwrap();
    assert_eq!(report.stored, 3);

    let grounded = service
        .ask_with_sources(folder.id, "When is the demo?")
        .unwrap();
    assert_eq!(grounded.answer, "Thursday.");
    assert_eq!(grounded.sources.len(), 3);

    embeddings.assert();
    completion.assert();
}

#[test]
fn test_embedding_outage_fails_ingestion() {
    let mut server = mockito::Server::new();
    let _embeddings = server
        .mock("POST", "/embeddings")
        .with_status(503)
        .with_body("overloaded")
        .create();

    let (_temp, service) = test_service(
        Arc::new(embedder(&server.url(), Some("embed-secret"))),
        Arc::new(gemini(&server.url())),
        false,
    );
    let note = service
        .notes()
        .create_note(NewNote {
            title: "Unlucky".to_string(),
            folder_id: None,
        })
        .unwrap();

    let err = service
        .ingest_transcript(note.id, &words(40), None)
        .unwrap_err();
    assert!(err.is_provider());
    assert!(err.to_string().contains("503"));
    assert_eq!(
        service.notes().require_note(note.id).unwrap().processing_status,
        ProcessingStatus::Failed
    );
}

#[test]
fn test_missing_key_fails_without_calling_out() {
    let mut server = mockito::Server::new();
    let embeddings = server.mock("POST", "/embeddings").expect(0).create();

    let (_temp, service) = test_service(
        Arc::new(embedder(&server.url(), None)),
        Arc::new(gemini(&server.url())),
        false,
    );
    let folder = service.notes().create_folder("Anything", 1).unwrap();

    let err = service.ask(folder.id, "Is the key set?").unwrap_err();
    match err {
        FolioError::Embedding { source, .. } => {
            assert!(source.to_string().contains("FOLIO_TEST_EMBED_KEY"));
        }
        other => panic!("unexpected error: {}", other),
    }

    embeddings.assert();
}

#[test]
fn test_transcription_stays_on_gemini_when_answers_use_openai() {
    let mut server = mockito::Server::new();
    let transcription = server
        .mock("POST", "/models/gemini-audio-test:generateContent")
        .match_query(Matcher::UrlEncoded("key".into(), "transcribe-secret".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"hello ##**## greeting"}]}}]}"#)
        .create();
    let leaked = server
        .mock("POST", Matcher::Any)
        .match_header("authorization", Matcher::Regex("Bearer .*".into()))
        .expect(0)
        .create();

    std::env::set_var("FOLIO_TEST_TRANSCRIBE_KEY", "transcribe-secret");
    let mut config = Config::default();
    config.llm.switch_provider("openai");
    config.transcription.model = "gemini-audio-test".to_string();
    config.transcription.api_key_env = "FOLIO_TEST_TRANSCRIBE_KEY".to_string();
    config.transcription.base_url = server.url();
    assert!(ConfigValidator::validate(&config).is_ok());

    let temp = tempfile::TempDir::new().unwrap();
    let audio = temp.path().join("memo.mp3");
    std::fs::write(&audio, b"ID3 not really audio").unwrap();

    let transcriber = build_transcriber(&config.transcription).unwrap();
    let reply = transcriber.transcribe_audio(&audio, "Transcribe this").unwrap();
    assert_eq!(reply, "hello ##**## greeting");

    transcription.assert();
    leaked.assert();
}
