//! HTTP-level tests for the remote embedding and completion clients.

use clausesmith::{
    CompletionProvider, EmbeddingProvider, PolicyError, RemoteCompletionClient,
    RemoteEmbeddingClient,
};
use httpmock::prelude::*;
use serde_json::json;
use url::Url;

fn endpoint(server: &MockServer, path: &str) -> Url {
    Url::parse(&server.url(path)).unwrap()
}

#[tokio::test]
async fn embed_batch_posts_inputs_and_returns_vectors() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/embed").json_body(json!({
                "model": "test-embedder",
                "input": ["first clause", "second clause"],
            }));
            then.status(200).json_body(json!({
                "embeddings": [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]],
            }));
        })
        .await;

    let client = RemoteEmbeddingClient::new(
        reqwest::Client::new(),
        endpoint(&server, "/embed"),
        "test-embedder",
    );
    let vectors = client
        .embed_batch(&["first clause".to_string(), "second clause".to_string()])
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[0], vec![0.1, 0.2, 0.3]);
    assert_eq!(client.model_name(), "test-embedder");
}

#[tokio::test]
async fn embed_batch_skips_the_wire_for_empty_input() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/embed");
            then.status(500);
        })
        .await;

    let client = RemoteEmbeddingClient::new(
        reqwest::Client::new(),
        endpoint(&server, "/embed"),
        "test-embedder",
    );
    assert!(client.embed_batch(&[]).await.unwrap().is_empty());
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn mismatched_vector_count_is_an_external_service_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embed");
            then.status(200)
                .json_body(json!({"embeddings": [[0.1, 0.2]]}));
        })
        .await;

    let client = RemoteEmbeddingClient::new(
        reqwest::Client::new(),
        endpoint(&server, "/embed"),
        "test-embedder",
    );
    let err = client
        .embed_batch(&["one".to_string(), "two".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, PolicyError::ExternalService(_)));
}

#[tokio::test]
async fn server_error_status_maps_to_external_service() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embed");
            then.status(503);
        })
        .await;

    let client = RemoteEmbeddingClient::new(
        reqwest::Client::new(),
        endpoint(&server, "/embed"),
        "test-embedder",
    );
    let err = client.embed_batch(&["one".to_string()]).await.unwrap_err();
    assert!(matches!(err, PolicyError::ExternalService(_)));
}

#[tokio::test]
async fn complete_posts_prompt_and_returns_text() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/complete").json_body(json!({
                "model": "test-reasoner",
                "prompt": "Is knee surgery covered?",
            }));
            then.status(200)
                .json_body(json!({"text": "{\"decision\": \"Approved\"}"}));
        })
        .await;

    let client = RemoteCompletionClient::new(
        reqwest::Client::new(),
        endpoint(&server, "/complete"),
        "test-reasoner",
    );
    let text = client.complete("Is knee surgery covered?").await.unwrap();

    mock.assert_async().await;
    assert_eq!(text, "{\"decision\": \"Approved\"}");
}

#[tokio::test]
async fn malformed_completion_body_is_an_external_service_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/complete");
            then.status(200).json_body(json!({"output": "wrong key"}));
        })
        .await;

    let client = RemoteCompletionClient::new(
        reqwest::Client::new(),
        endpoint(&server, "/complete"),
        "test-reasoner",
    );
    let err = client.complete("anything").await.unwrap_err();
    assert!(matches!(err, PolicyError::ExternalService(_)));
}
