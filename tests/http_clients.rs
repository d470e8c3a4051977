//! OpenAI-compatible HTTP clients against a mock server

use conversation_memory::context::{
    ContextPayload, LLMSummarizer, Summarizer, SummarizerConfig, SummarizerError, Summary,
    WordBasedEstimator,
};
use conversation_memory::memory::{MemoryStore, NewMessage};
use conversation_memory::model::{ModelClient, ModelConfig, ModelError, OpenAiChatClient};
use mockito::Matcher;
use secrecy::SecretString;
use serde_json::json;
use std::sync::Arc;

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

fn model_config(server_url: &str, max_retries: usize) -> ModelConfig {
    ModelConfig {
        endpoint: format!("{}{}", server_url, COMPLETIONS_PATH),
        api_key: Some(SecretString::new("sk-test".to_string())),
        model: "gpt-test".to_string(),
        timeout_ms: 2_000,
        max_retries,
        ..ModelConfig::default()
    }
}

fn summarizer_config(server_url: &str, max_retries: usize) -> SummarizerConfig {
    SummarizerConfig {
        endpoint: format!("{}{}", server_url, COMPLETIONS_PATH),
        model: "gpt-summary".to_string(),
        timeout_ms: 2_000,
        max_retries,
        ..SummarizerConfig::default()
    }
}

fn sample_store() -> MemoryStore {
    let store = MemoryStore::new("http", Arc::new(WordBasedEstimator::default()));
    store.append(NewMessage::user("I want to visit Lisbon"));
    store.append(NewMessage::assistant("Great choice! When are you going?"));
    store
}

fn completion_body(content: &str) -> String {
    json!({
        "choices": [{"message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 42, "completion_tokens": 7, "total_tokens": 49}
    })
    .to_string()
}

#[tokio::test]
async fn chat_client_renders_payload_and_reads_usage() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", COMPLETIONS_PATH)
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({"model": "gpt-test"})),
            Matcher::Regex("Summary of the conversation so far:".to_string()),
            Matcher::Regex("I want to visit Lisbon".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body("In May, probably."))
        .create_async()
        .await;

    let store = sample_store();
    let summary = Summary::empty().advance("User is planning travel.".to_string(), 0, 4);
    let payload = ContextPayload::with_summary(&summary, store.all());

    let client = OpenAiChatClient::new(model_config(&server.url(), 1)).unwrap();
    let reply = client.complete(&payload).await.unwrap();

    mock.assert_async().await;
    assert_eq!(reply.content, "In May, probably.");
    let usage = reply.usage.unwrap();
    assert_eq!(usage.prompt_tokens, 42);
    assert_eq!(usage.total_tokens, 49);
}

#[tokio::test]
async fn chat_client_retries_server_errors() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", COMPLETIONS_PATH)
        .with_status(503)
        .with_body("overloaded")
        .expect(2)
        .create_async()
        .await;

    let client = OpenAiChatClient::new(model_config(&server.url(), 2)).unwrap();
    let err = client
        .complete(&ContextPayload::from_messages(sample_store().all()))
        .await
        .unwrap_err();

    mock.assert_async().await;
    match err {
        ModelError::ApiError(message) => assert!(message.contains("503")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn chat_client_does_not_retry_client_errors() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", COMPLETIONS_PATH)
        .with_status(401)
        .with_body("bad key")
        .expect(1)
        .create_async()
        .await;

    let client = OpenAiChatClient::new(model_config(&server.url(), 3)).unwrap();
    let err = client
        .complete(&ContextPayload::from_messages(sample_store().all()))
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, ModelError::ApiError(_)));
}

#[tokio::test]
async fn chat_client_rejects_empty_choices() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", COMPLETIONS_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": []}"#)
        .create_async()
        .await;

    let client = OpenAiChatClient::new(model_config(&server.url(), 1)).unwrap();
    let err = client
        .complete(&ContextPayload::from_messages(sample_store().all()))
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::EmptyResponse));
}

#[test]
fn summarizer_sends_prior_summary_and_transcript() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", COMPLETIONS_PATH)
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({"model": "gpt-summary", "max_tokens": 1200})),
            Matcher::Regex("No previous summary".to_string()),
            Matcher::Regex("assistant: Great choice!".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion_body("User plans a Lisbon trip."))
        .create();

    let summarizer = LLMSummarizer::new(summarizer_config(&server.url(), 1)).unwrap();
    let messages = sample_store().all();
    let summary = tokio_test::block_on(summarizer.summarize("", &messages)).unwrap();

    mock.assert();
    assert_eq!(summary, "User plans a Lisbon trip.");
}

#[test]
fn summarizer_skips_call_without_new_messages() {
    let summarizer = LLMSummarizer::new(summarizer_config("http://127.0.0.1:9", 1)).unwrap();
    let summary = tokio_test::block_on(summarizer.summarize("kept as is", &[])).unwrap();
    assert_eq!(summary, "kept as is");
}

#[tokio::test]
async fn summarizer_maps_provider_errors() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", COMPLETIONS_PATH)
        .with_status(500)
        .create_async()
        .await;

    let summarizer = LLMSummarizer::new(summarizer_config(&server.url(), 1)).unwrap();
    let err = summarizer
        .summarize("prior", &sample_store().all())
        .await
        .unwrap_err();
    assert!(matches!(err, SummarizerError::ApiError(_)));
}
