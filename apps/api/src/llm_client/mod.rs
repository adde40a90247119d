//! LLM client: the single point of entry for all OpenAI API calls.
//!
//! ARCHITECTURAL RULE: No other module may call the provider directly.
//! Completions and embeddings both go through this module.
//!
//! Models are hardcoded to match the ones the impact model was trained against.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Completion model used for answer synthesis.
pub const COMPLETION_MODEL: &str = "gpt-3.5-turbo-instruct";
/// Embedding model used for chunk and query vectors.
pub const EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const TEMPERATURE: f32 = 0.9;
const MAX_TOKENS: u32 = 500;
const MAX_RETRIES: u32 = 3;
/// First retry delay; doubles on each further attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Text completion backend. Implemented by [`LlmClient`]; faked in tests.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Embedding backend. Returns one vector per input text, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<CompletionChoice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionChoice {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

impl CompletionResponse {
    /// Text of the first choice, if it has any non-whitespace content.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

/// The single OpenAI client shared by the pipeline.
/// Wraps the completions and embeddings endpoints with retry logic.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    retry_delay: Duration,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_delay: RETRY_BASE_DELAY,
        }
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// POSTs a JSON body to `{base_url}/{path}` and deserializes the response.
    /// Retries on 429 (rate limit), 5xx and transport errors with exponential backoff.
    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, LlmError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = self.retry_delay * (1 << (attempt - 1));
                warn!(
                    "OpenAI call to {} attempt {} failed, retrying after {}ms...",
                    path,
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("OpenAI API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: api_error_message(body),
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: api_error_message(body),
                });
            }

            let text = response.text().await?;
            return serde_json::from_str(&text).map_err(LlmError::Parse);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: COMPLETION_MODEL,
            prompt,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        let response: CompletionResponse = self.post_json("completions", &request).await?;

        if let Some(usage) = &response.usage {
            debug!(
                "Completion succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }
}

#[async_trait]
impl Embedder for LlmClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingRequest {
            model: EMBEDDING_MODEL,
            input: texts,
        };
        let response: EmbeddingResponse = self.post_json("embeddings", &request).await?;
        let vectors = order_embeddings(response.data);

        if vectors.len() != texts.len() {
            return Err(LlmError::Api {
                status: 200,
                message: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    vectors.len()
                ),
            });
        }
        debug!("Embedded {} texts", vectors.len());
        Ok(vectors)
    }
}

/// The embeddings endpoint tags each vector with its input index; order by it.
fn order_embeddings(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    data.sort_by_key(|d| d.index);
    data.into_iter().map(|d| d.embedding).collect()
}

/// Pulls `error.message` out of a provider error body, falling back to the raw body.
fn api_error_message(body: String) -> String {
    serde_json::from_str::<OpenAiError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    const TEST_DELAY: Duration = Duration::from_millis(20);
    const OVERLOADED: &str = r#"{"error": {"message": "The engine is currently overloaded"}}"#;
    const BAD_KEY: &str = r#"{"error": {"message": "Incorrect API key provided"}}"#;
    const COMPLETION: &str = r#"{"choices": [{"text": " The goal is $5,000."}]}"#;

    /// Serves `responses` in order on `/v1/completions`, repeating the last one.
    /// Returns the base URL and a hit counter.
    async fn stub_provider(responses: Vec<(StatusCode, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let responses = Arc::new(responses);

        let app = Router::new().route(
            "/v1/completions",
            post(move || {
                let counter = counter.clone();
                let responses = responses.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    responses[n.min(responses.len() - 1)]
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1"), hits)
    }

    fn client(base_url: String) -> LlmClient {
        LlmClient::new("sk-test".into(), base_url).with_retry_delay(TEST_DELAY)
    }

    #[tokio::test]
    async fn test_server_error_retried_until_attempts_exhausted() {
        let (base_url, hits) =
            stub_provider(vec![(StatusCode::SERVICE_UNAVAILABLE, OVERLOADED)]).await;

        let started = Instant::now();
        let err = client(base_url).complete("prompt").await.unwrap_err();

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        // 20ms then 40ms of backoff
        assert!(started.elapsed() >= TEST_DELAY * 3);
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "The engine is currently overloaded");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_error_fails_without_retry() {
        let (base_url, hits) = stub_provider(vec![(StatusCode::UNAUTHORIZED, BAD_KEY)]).await;

        let err = client(base_url).complete("prompt").await.unwrap_err();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(matches!(err, LlmError::Api { status: 401, .. }));
        assert!(err.to_string().contains("Incorrect API key provided"));
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let (base_url, hits) = stub_provider(vec![
            (StatusCode::TOO_MANY_REQUESTS, "slow down"),
            (StatusCode::OK, COMPLETION),
        ])
        .await;

        let text = client(base_url).complete("prompt").await.unwrap();

        assert_eq!(text, "The goal is $5,000.");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_connection_refused_is_http_error() {
        // Bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{addr}/v1"))
            .complete("prompt")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Http(_)));
    }

    #[test]
    fn test_completion_text_trims_leading_whitespace() {
        let json = r#"{
            "choices": [{"text": "\n\nThe campaign goal is $5,000.", "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 12}
        }"#;
        let response: CompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), Some("The campaign goal is $5,000."));
    }

    #[test]
    fn test_completion_text_none_when_blank() {
        let json = r#"{"choices": [{"text": "   ", "finish_reason": "length"}], "usage": null}"#;
        let response: CompletionResponse = serde_json::from_str(json).unwrap();
        assert!(response.text().is_none());
    }

    #[test]
    fn test_completion_text_none_without_choices() {
        let json = r#"{"choices": []}"#;
        let response: CompletionResponse = serde_json::from_str(json).unwrap();
        assert!(response.text().is_none());
    }

    #[test]
    fn test_embeddings_reordered_by_index() {
        let json = r#"{"data": [
            {"embedding": [0.0, 1.0], "index": 1},
            {"embedding": [1.0, 0.0], "index": 0}
        ]}"#;
        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        let vectors = order_embeddings(response.data);
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_api_error_message_extracts_nested_message() {
        let body = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        assert_eq!(
            api_error_message(body.to_string()),
            "Incorrect API key provided"
        );
    }

    #[test]
    fn test_api_error_message_falls_back_to_raw_body() {
        assert_eq!(api_error_message("Bad gateway".to_string()), "Bad gateway");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = LlmClient::new("sk-test".into(), "http://localhost:9999/v1/".into());
        assert_eq!(client.base_url, "http://localhost:9999/v1");
    }
}
