use super::*;
use crate::conversation::Role;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> OpenAiClient {
    let config = OpenAiConfig {
        base_url: server.uri(),
        batch_size: 2,
        retry_attempts: 2,
        retry_backoff_ms: 1,
        ..OpenAiConfig::default()
    };
    OpenAiClient::with_api_key(&config, "sk-test".to_string()).expect("client")
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[tokio::test]
async fn embeddings_are_batched_and_ordered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "text-embedding-ada-002",
            "input": ["first", "second"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "index": 1, "embedding": [0.0, 2.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_partial_json(json!({ "input": ["third"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [3.0, 3.0] }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vectors = client(&server)
        .embed_documents(&texts(&["first", "second", "third"]))
        .await
        .expect("embeddings");
    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 2.0], vec![3.0, 3.0]]);
}

#[tokio::test]
async fn embed_query_returns_single_vector() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [0.25, 0.75] }]
        })))
        .mount(&server)
        .await;

    let vector = client(&server)
        .embed_query("How can I install PS11752778?")
        .await
        .expect("query embedding");
    assert_eq!(vector, vec![0.25, 0.75]);
}

#[tokio::test]
async fn no_texts_means_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let vectors = client(&server).embed_documents(&[]).await.expect("empty");
    assert!(vectors.is_empty());
}

#[tokio::test]
async fn dimension_mismatch_is_an_embedding_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [0.1, 0.2, 0.3] }]
        })))
        .mount(&server)
        .await;

    let result = client(&server)
        .with_dimension(1536)
        .embed_documents(&texts(&["chunk"]))
        .await;
    assert!(matches!(result, Err(AssistantError::Embedding(_))));
}

#[tokio::test]
async fn chat_sends_transcript_and_returns_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "messages": [
                { "role": "system", "content": "persona" },
                { "role": "user", "content": "question" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "answer" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let turns = vec![
        Turn::new(Role::System, "persona"),
        Turn::new(Role::User, "question"),
    ];
    let reply = client(&server).complete(&turns).await.expect("completion");
    assert_eq!(reply, "answer");
}

#[tokio::test]
async fn chat_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "second try" } }]
        })))
        .mount(&server)
        .await;

    let reply = client(&server)
        .complete(&[Turn::new(Role::User, "hi")])
        .await
        .expect("completion after retry");
    assert_eq!(reply, "second try");
}

#[tokio::test]
async fn chat_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server).complete(&[Turn::new(Role::User, "hi")]).await;
    assert!(matches!(result, Err(AssistantError::Completion(_))));
}

#[tokio::test]
async fn empty_choices_are_a_completion_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let result = client(&server).complete(&[Turn::new(Role::User, "hi")]).await;
    assert!(matches!(result, Err(AssistantError::Completion(_))));
}
