use std::sync::Arc;

use docqa_model::{GenerationConfig, GenerationRequest, Llm, MockLlm};

#[tokio::test]
async fn test_mock_behind_trait_object() {
    let llm: Arc<dyn Llm> = Arc::new(MockLlm::with_response("Revenue was $120M.").named("llama-3.1-8b-instant"));
    assert_eq!(llm.name(), "llama-3.1-8b-instant");

    let response = llm.generate(GenerationRequest::new("What was Q2 revenue?")).await.unwrap();
    assert_eq!(response.text, "Revenue was $120M.");
    assert_eq!(response.model, "llama-3.1-8b-instant");
}

#[test]
fn test_generation_request_creation() {
    let request = GenerationRequest::new("Hello")
        .with_config(GenerationConfig { temperature: 0.2, max_output_tokens: Some(256) });

    assert_eq!(request.prompt, "Hello");
    assert_eq!(request.config.temperature, 0.2);
    assert_eq!(request.config.max_output_tokens, Some(256));
}

#[test]
fn test_default_temperature() {
    assert_eq!(GenerationRequest::new("x").config.temperature, 0.5);
}

#[cfg(feature = "groq")]
#[test]
fn test_groq_client_creation() {
    use docqa_model::groq::{DEFAULT_MODEL, GroqClient, GroqConfig};

    let client = GroqClient::new(GroqConfig::new("test-api-key", DEFAULT_MODEL)).unwrap();
    assert_eq!(client.name(), "llama-3.1-8b-instant");
}
