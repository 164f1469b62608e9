//! Exercises the concrete HTTP backends against a local mock server.

use std::sync::Arc;

use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use url::Url;

use memesmith::captions::{CaptionGenerator, GeneratedCaptions, OpenAiBackend};
use memesmith::catalog::{ExampleText, MemeTemplate, TemplateCatalog};
use memesmith::error::MemeError;
use memesmith::render::{HttpImageFetcher, ImageAssembler, ImageStore};
use memesmith::schema::CaptionSchema;

fn template() -> MemeTemplate {
    MemeTemplate {
        id: "solo".to_string(),
        name: "One Does Not Simply".to_string(),
        example: ExampleText {
            text: vec!["original".to_string()],
        },
    }
}

fn generator(server: &MockServer) -> CaptionGenerator {
    let backend = OpenAiBackend::new(
        reqwest::Client::new(),
        Url::parse(&server.base_url()).unwrap(),
        "test-key".to_string(),
    );
    CaptionGenerator::new(Arc::new(backend), "test-model".to_string())
}

#[tokio::test]
async fn caption_generation_round_trips_through_the_completions_endpoint() {
    let server = MockServer::start_async().await;
    let body = serde_json::json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "function_call": {
                    "name": "generate_meme_captions",
                    "arguments": "{\"caption\":\"JustAda\"}"
                }
            },
            "finish_reason": "function_call"
        }]
    })
    .to_string();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .body_contains("Ada")
            .body_contains("test-model");
        then.status(200)
            .header("content-type", "application/json")
            .body(body);
    });

    let schema = CaptionSchema::build(1).unwrap();
    let captions = generator(&server)
        .generate(&template(), &schema, "Ada")
        .await
        .expect("captions");

    mock.assert();
    assert_eq!(captions.get("caption"), Some("JustAda"));
}

#[tokio::test]
async fn completion_error_status_is_a_generation_error() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(500).body("upstream on fire");
    });

    let schema = CaptionSchema::build(1).unwrap();
    let err = generator(&server)
        .generate(&template(), &schema, "Ada")
        .await
        .expect_err("must fail");
    assert!(matches!(err, MemeError::Generation(_)));
}

#[tokio::test]
async fn unparseable_completion_body_is_malformed() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200).body("definitely not json");
    });

    let schema = CaptionSchema::build(1).unwrap();
    let err = generator(&server)
        .generate(&template(), &schema, "Ada")
        .await
        .expect_err("must fail");
    assert!(matches!(err, MemeError::MalformedResponse(_)));
}

#[tokio::test]
async fn rendered_image_is_fetched_and_stored() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(GET).path("/images/solo/JustAda/.jpg");
        then.status(200)
            .header("content-type", "image/jpeg")
            .body("jpeg bytes");
    });

    let dir = tempfile::tempdir().unwrap();
    let assembler = ImageAssembler::new(
        Arc::new(HttpImageFetcher::new(reqwest::Client::new())),
        ImageStore::new(dir.path().to_path_buf()),
        Url::parse(&server.base_url()).unwrap(),
    );
    let schema = CaptionSchema::build(1).unwrap();
    let captions = GeneratedCaptions::from_arguments(&schema, r#"{"caption":"JustAda"}"#).unwrap();

    let meme = assembler
        .render("solo", &captions, "Ada")
        .await
        .expect("meme");

    mock.assert();
    assert_eq!(meme.file_name, "solo-Ada.jpg");
    assert_eq!(meme.image_url, "/images/solo-Ada.jpg");
    let stored = std::fs::read(dir.path().join("solo-Ada.jpg")).unwrap();
    assert_eq!(stored, b"jpeg bytes");
}

#[tokio::test]
async fn render_error_status_writes_nothing() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/images/solo/JustAda/.jpg");
        then.status(404).body("no such template");
    });

    let dir = tempfile::tempdir().unwrap();
    let assembler = ImageAssembler::new(
        Arc::new(HttpImageFetcher::new(reqwest::Client::new())),
        ImageStore::new(dir.path().to_path_buf()),
        Url::parse(&server.base_url()).unwrap(),
    );
    let schema = CaptionSchema::build(1).unwrap();
    let captions = GeneratedCaptions::from_arguments(&schema, r#"{"caption":"JustAda"}"#).unwrap();

    let err = assembler
        .render("solo", &captions, "Ada")
        .await
        .expect_err("must fail");
    assert!(matches!(err, MemeError::RenderFetch(_)));
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn catalog_fetch_persists_a_snapshot_for_the_next_start() {
    let server = MockServer::start_async().await;
    let listing = serde_json::json!([{
        "id": "ds",
        "name": "Distracted Boyfriend",
        "blank": "https://img.example/images/ds.png",
        "example": {"text": ["a", "b", "c"], "url": "https://img.example/images/ds/a/b/c.png"}
    }])
    .to_string();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/templates")
            .query_param("animated", "false");
        then.status(200)
            .header("content-type", "application/json")
            .body(listing);
    });

    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("memes.json");
    let catalog = TemplateCatalog::load(
        &snapshot,
        &reqwest::Client::new(),
        &Url::parse(&server.base_url()).unwrap(),
    )
    .await
    .expect("catalog");

    mock.assert();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.pick_random().unwrap().id, "ds");

    // The fetched listing is reused on the next start without a network call.
    let persisted: Vec<MemeTemplate> =
        serde_json::from_slice(&std::fs::read(&snapshot).unwrap()).unwrap();
    assert_eq!(persisted[0].slot_count(), 3);
}
