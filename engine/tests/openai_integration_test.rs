//! Integration tests for the OpenAI-compatible backend against a mock
//! chat-completions server, plus an end-to-end run from a config file.

mod common;

use common::NoopLoader;
use futures::StreamExt;
use sdk::errors::EngineError;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use troupe_engine::config::{LlmOptions, WorkflowConfig};
use troupe_engine::engine::Engine;
use troupe_engine::llm::{LanguageModel, Message, ModelFactory, OpenAiCompatibleModel};

fn options() -> LlmOptions {
    LlmOptions {
        model: "gpt-4o-mini".to_string(),
        temperature: Some(0.3),
    }
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

#[tokio::test]
async fn test_invoke_sends_conversation_and_reads_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "temperature": 0.3,
            "messages": [
                {"role": "system", "content": "You plan."},
                {"role": "user", "content": "make a plan"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("the plan")))
        .mount(&server)
        .await;

    let model =
        OpenAiCompatibleModel::new(server.uri(), Some("sk-test".to_string()), &options());
    let completion = model
        .invoke(&[Message::system("You plan."), Message::user("make a plan")])
        .await
        .unwrap();
    assert_eq!(completion.content, "the plan");
}

#[tokio::test]
async fn test_invoke_without_key_omits_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
        .mount(&server)
        .await;

    let model = OpenAiCompatibleModel::new(server.uri(), None, &options());
    let completion = model.invoke(&[Message::user("hi")]).await.unwrap();
    assert_eq!(completion.content, "ok");

    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_backend_error_status_is_llm_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let model = OpenAiCompatibleModel::new(server.uri(), None, &options());
    let err = model.invoke(&[Message::user("hi")]).await.unwrap_err();
    assert!(matches!(err, EngineError::Llm(message) if message.contains("401")));
}

#[tokio::test]
async fn test_missing_content_is_llm_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let model = OpenAiCompatibleModel::new(server.uri(), None, &options());
    let err = model.invoke(&[Message::user("hi")]).await.unwrap_err();
    assert!(matches!(err, EngineError::Llm(_)));
}

#[tokio::test]
async fn test_stream_yields_one_chunk_then_ends() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("chunked")))
        .mount(&server)
        .await;

    let model = OpenAiCompatibleModel::new(server.uri(), None, &options());
    let mut stream = model.stream(&[Message::user("hi")]).await.unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.content, "chunked");
    assert!(stream.next().await.is_none());
}

/// Factory pinning the backend to a mock server; the binary's default
/// factory does the same through environment variables.
struct PinnedFactory {
    base_url: String,
}

impl ModelFactory for PinnedFactory {
    fn build(
        &self,
        options: &LlmOptions,
    ) -> Result<Arc<dyn LanguageModel>, EngineError> {
        Ok(Arc::new(OpenAiCompatibleModel::new(
            self.base_url.clone(),
            None,
            options,
        )))
    }
}

#[tokio::test]
async fn test_end_to_end_run_from_config_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            r#"{"content":"triaged","next":null,"actions":[]}"#,
        )))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("workflow.toml");
    std::fs::write(
        &config_path,
        r#"
            name = "triage"
            version = "1"

            [llm]
            model = "gpt-4o-mini"

            [[members]]
            name = "m1"
            role = "You triage reports."

            [workflow]
            entry = "m1"
        "#,
    )
    .unwrap();

    let config = WorkflowConfig::from_path(&config_path).unwrap();
    assert_eq!(config.base_dir, dir.path());

    let mut engine = Engine::new(
        config,
        Arc::new(PinnedFactory {
            base_url: server.uri(),
        }),
        Arc::new(NoopLoader),
    )
    .unwrap();

    let record = engine.run_once("crash on save").await.unwrap();
    assert_eq!(record.workflow, "triage");
    assert_eq!(record.final_node.as_deref(), Some("m1"));
    match record.final_result().unwrap() {
        troupe_engine::engine::NodeResult::Member { output, .. } => {
            assert_eq!(output.content, "triaged")
        }
        other => panic!("expected member result, got {other:?}"),
    }
}
