use super::*;
use crate::config::OllamaConfig;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> OllamaConfig {
    let url = Url::parse(&server.uri()).expect("mock server uri should parse");
    OllamaConfig {
        protocol: "http".to_string(),
        host: url.host_str().unwrap_or("127.0.0.1").to_string(),
        port: url.port().unwrap_or(80),
        model: "embed-model".to_string(),
        generation_model: "answer-model".to_string(),
        batch_size: 2,
        embedding_dimension: 64,
    }
}

fn client_for(server: &MockServer) -> OllamaClient {
    OllamaClient::new(&config_for(server))
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(5))
        .with_retry_attempts(1)
}

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        generation_model: "test-generator".to_string(),
        batch_size: 128,
        embedding_dimension: 768,
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.generation_model, "test-generator");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url().host_str(), Some("test-host"));
    assert_eq!(client.base_url().port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let config = OllamaConfig::default();
    let client = OllamaClient::new(&config)
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);
    assert_eq!(client.retry_attempts, 5);

    let client = client.with_retry_attempts(0);
    assert_eq!(client.retry_attempts, 1);
}

#[tokio::test]
async fn embed_batches_requests() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({
            "model": "embed-model",
            "input": ["one", "two"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0], [0.0, 1.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({
            "model": "embed-model",
            "input": ["three"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.5, 0.5]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
    let vectors = client.embed(&texts).await.expect("embedding should succeed");

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]);
}

#[tokio::test]
async fn embed_empty_input_skips_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let vectors = client.embed(&[]).await.expect("empty input should succeed");
    assert!(vectors.is_empty());
}

#[tokio::test]
async fn embed_rejects_count_mismatch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0]]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let texts = vec!["one".to_string(), "two".to_string()];
    let error = client
        .embed(&texts)
        .await
        .expect_err("mismatched counts should fail");

    assert!(matches!(error, RagError::Embedding(_)));
    assert!(error.to_string().contains("Mismatch"));
}

#[tokio::test]
async fn embed_server_error_maps_to_embedding_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = client
        .embed(&["hello".to_string()])
        .await
        .expect_err("server error should fail");

    assert!(matches!(error, RagError::Embedding(_)));
}

#[tokio::test]
async fn generate_uses_generation_model_without_streaming() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "answer-model",
            "prompt": "Question: why?\nAnswer: ",
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "answer-model",
            "response": "Because.",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let answer = client
        .generate("Question: why?\nAnswer: ")
        .await
        .expect("generation should succeed");

    assert_eq!(answer, "Because.");
}

#[tokio::test]
async fn generate_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server))
        .expect("Failed to create client")
        .with_retry_attempts(3);

    let error = client
        .generate("anything")
        .await
        .expect_err("missing model should fail");

    assert!(matches!(error, RagError::Generation(_)));
}

#[tokio::test]
async fn dropped_generate_stops_retrying() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server))
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(5))
        .with_retry_attempts(3);

    let outcome = tokio::time::timeout(Duration::from_millis(100), client.generate("slow")).await;
    assert!(outcome.is_err(), "generation should still be pending");

    // Long enough for the first backoff (1s) and a second attempt
    tokio::time::sleep(Duration::from_millis(1800)).await;

    let requests = server
        .received_requests()
        .await
        .expect("request recording should be enabled");
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn completed_generate_is_not_marked_cancelled() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "answer-model",
            "response": "ok",
            "done": true
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    for _ in 0..2 {
        let answer = client.generate("again").await.expect("generation should succeed");
        assert_eq!(answer, "ok");
    }
    assert!(!client.is_cancelled());
}

#[tokio::test]
async fn health_check_requires_both_models() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "embed-model", "size": 1024 },
                { "name": "answer-model" }
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let handle = tokio::task::spawn_blocking(move || client.health_check());
    handle
        .await
        .expect("health check task should join")
        .expect("health check should pass");
}

#[tokio::test]
async fn validate_models_reports_missing_model() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "embed-model" }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = tokio::task::spawn_blocking(move || client.validate_models())
        .await
        .expect("validation task should join");

    let message = format!("{:#}", result.expect_err("missing model should fail"));
    assert!(message.contains("answer-model"));
}
