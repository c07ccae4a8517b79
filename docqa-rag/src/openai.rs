//! OpenAI embedding and chat completion providers.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::completion::CompletionProvider;
use crate::config::ProviderConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::prompt::Prompt;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// The default model for OpenAI embeddings.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// The dimensionality of `text-embedding-ada-002`.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

/// The default chat completion model.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

const PROVIDER: &str = "OpenAI";

fn http_client(config: &ProviderConfig) -> Result<reqwest::Client> {
    if config.api_key.is_empty() {
        return Err(RagError::Config("OpenAI API key must not be empty".into()));
    }
    reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Read an unsuccessful response into a readable message.
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail =
        serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
    format!("API returned {status}: {detail}")
}

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{ProviderConfig, openai::OpenAIEmbeddingProvider};
///
/// let provider = OpenAIEmbeddingProvider::new(&ProviderConfig::new("sk-..."))?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbeddingProvider {
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the API key is empty.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            api_key: config.api_key.clone(),
            base_url: OPENAI_API_BASE.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        })
    }

    /// Use a different model; `dimensions` must match its output size.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Point at an OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding(PROVIDER, "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest { model: &self.model, input: texts })
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                RagError::embedding(PROVIDER, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(provider = PROVIDER, %status, "API error");
            return Err(RagError::embedding(PROVIDER, error_detail(response).await));
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::embedding(PROVIDER, format!("failed to parse response: {e}"))
        })?;
        parsed.data.sort_by_key(|d| d.index);

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

/// A [`CompletionProvider`] backed by the OpenAI chat completions API.
pub struct OpenAIChatProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIChatProvider {
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the API key is empty.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            api_key: config.api_key.clone(),
            base_url: OPENAI_API_BASE.into(),
            model: DEFAULT_CHAT_MODEL.into(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionProvider for OpenAIChatProvider {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, "chat completion");

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: &prompt.system },
                ChatMessage { role: "user", content: &prompt.user },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                RagError::completion(PROVIDER, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(provider = PROVIDER, %status, "API error");
            return Err(RagError::completion(PROVIDER, error_detail(response).await));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::completion(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::completion(PROVIDER, "API returned no choices"))
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    /// Accept one connection, answer it with `body`, and hand back the raw request.
    async fn serve_once(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });
        (format!("http://{addr}/v1"), handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(matches!(
            OpenAIEmbeddingProvider::new(&ProviderConfig::new("")),
            Err(RagError::Config(_))
        ));
        assert!(OpenAIChatProvider::new(&ProviderConfig::new("")).is_err());
    }

    #[test]
    fn defaults_match_ada_and_gpt35() {
        let embedder = OpenAIEmbeddingProvider::new(&ProviderConfig::new("sk-test")).unwrap();
        assert_eq!(embedder.dimensions(), 1536);
        assert_eq!(embedder.model, "text-embedding-ada-002");
        let chat = OpenAIChatProvider::new(&ProviderConfig::new("sk-test")).unwrap();
        assert_eq!(chat.model, "gpt-3.5-turbo");
    }

    #[test]
    fn chat_request_serializes_both_messages() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: [
                ChatMessage { role: "system", content: "be brief" },
                ChatMessage { role: "user", content: "hi" },
            ],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
    }

    #[tokio::test]
    async fn embeddings_follow_configured_endpoint_and_response_index() {
        let (base_url, server) = serve_once(
            r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#,
        )
        .await;
        let embedder = OpenAIEmbeddingProvider::new(&ProviderConfig::new("sk-test"))
            .unwrap()
            .with_model("custom-embed", 2)
            .with_base_url(base_url);

        let vectors = embedder.embed_batch(&["first", "second"]).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(embedder.dimensions(), 2);

        let request = server.await.unwrap().to_ascii_lowercase();
        assert!(request.starts_with("post /v1/embeddings "), "request was {request}");
        assert!(request.contains("authorization: bearer sk-test"));
        assert!(request.contains(r#""model":"custom-embed""#));
    }

    #[tokio::test]
    async fn chat_uses_configured_model_and_returns_first_choice() {
        let (base_url, server) =
            serve_once(r#"{"choices":[{"message":{"content":"Stanford University"}}]}"#).await;
        let chat = OpenAIChatProvider::new(&ProviderConfig::new("sk-test"))
            .unwrap()
            .with_model("gpt-4o-mini")
            .with_base_url(base_url);

        let answer = chat.complete(&Prompt::new("be brief", "Where?")).await.unwrap();
        assert_eq!(answer, "Stanford University");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/chat/completions "), "request was {request}");
        assert!(request.contains(r#""model":"gpt-4o-mini""#));
        assert!(request.contains(r#""content":"Where?""#));
    }
}
