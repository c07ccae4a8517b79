//! Completion provider trait and its timeout-bounded client.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::config::ProviderConfig;
use crate::error::{RagError, Result};
use crate::prompt::Prompt;

/// A provider that turns an assembled prompt into answer text.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{CompletionProvider, Prompt};
///
/// let text = provider.complete(&Prompt::new("Be brief.", "Question: hi")).await?;
/// ```
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn complete(&self, prompt: &Prompt) -> Result<String>;

    /// A short provider name used in errors and logs.
    fn name(&self) -> &str {
        "completion"
    }
}

/// Calls a [`CompletionProvider`] under the configured per-call timeout.
///
/// Completions are never retried: a failed or timed-out call surfaces once
/// as [`RagError::Completion`].
#[derive(Clone)]
pub struct CompletionClient {
    provider: Arc<dyn CompletionProvider>,
    config: ProviderConfig,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("provider", &self.provider.name())
            .field("timeout_ms", &self.config.timeout_ms)
            .finish()
    }
}

impl CompletionClient {
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if the config has a zero limit.
    pub fn new(provider: Arc<dyn CompletionProvider>, config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { provider, config })
    }

    /// Run one completion call.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Completion`] if the provider fails or exceeds the
    /// configured timeout.
    pub async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let provider = self.provider.name();
        debug!(provider, prompt_chars = prompt.char_count(), "requesting completion");

        let outcome = tokio::time::timeout(self.config.timeout(), self.provider.complete(prompt))
            .await
            .unwrap_or_else(|_| {
                Err(RagError::completion(
                    provider,
                    format!("request timed out after {}ms", self.config.timeout_ms),
                ))
            });

        outcome.map_err(|e| {
            error!(provider, error = %e, "completion failed");
            match e {
                RagError::Completion { .. } => e,
                other => RagError::completion(provider, other.to_string()),
            }
        })
    }
}
