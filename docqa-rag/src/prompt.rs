//! Prompt assembly from retrieved context.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::{ContextTruncated, SearchResult};
use crate::error::{RagError, Result};

/// The default instruction sent as the system message.
pub const DEFAULT_INSTRUCTION: &str =
    "Answer the following question based only on the provided context.";

/// The default separator placed between context chunks.
pub const DEFAULT_DELIMITER: &str = "\n\n---\n\n";

/// A system/user message pair ready for a completion provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self { system: system.into(), user: user.into() }
    }

    /// Combined length of both messages in chars.
    pub fn char_count(&self) -> usize {
        self.system.chars().count() + self.user.chars().count()
    }
}

/// The output of [`PromptAssembler::assemble`].
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub prompt: Prompt,
    /// The results whose text made it into the context, in retrieval order.
    pub included: Vec<SearchResult>,
    /// Set when lower-ranked results were dropped to fit the budget.
    pub truncated: Option<ContextTruncated>,
}

/// Builds the prompt from an instruction, retrieved chunks and the question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAssembler {
    instruction: String,
    delimiter: String,
    max_prompt_chars: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(12_000)
    }
}

impl PromptAssembler {
    pub fn new(max_prompt_chars: usize) -> Self {
        Self {
            instruction: DEFAULT_INSTRUCTION.to_string(),
            delimiter: DEFAULT_DELIMITER.to_string(),
            max_prompt_chars,
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Assemble a prompt from `results` (most relevant first) and `question`.
    ///
    /// Lowest-ranked results are dropped one at a time until the prompt fits
    /// `max_prompt_chars`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Validation`] if the instruction and question alone
    /// exceed the budget.
    pub fn assemble(&self, results: &[SearchResult], question: &str) -> Result<AssembledPrompt> {
        let mut kept = results.len();
        loop {
            let prompt = self.render(&results[..kept], question);
            let chars = prompt.char_count();
            if chars <= self.max_prompt_chars {
                let dropped = results.len() - kept;
                let truncated = (dropped > 0).then(|| {
                    warn!(
                        dropped,
                        kept,
                        max_prompt_chars = self.max_prompt_chars,
                        "context truncated to fit prompt budget"
                    );
                    ContextTruncated { dropped, kept }
                });
                debug!(prompt_chars = chars, context_chunks = kept, "prompt assembled");
                return Ok(AssembledPrompt {
                    prompt,
                    included: results[..kept].to_vec(),
                    truncated,
                });
            }
            if kept == 0 {
                return Err(RagError::Validation(format!(
                    "question too long: prompt needs {chars} chars without context, limit is {}",
                    self.max_prompt_chars
                )));
            }
            kept -= 1;
        }
    }

    fn render(&self, results: &[SearchResult], question: &str) -> Prompt {
        let context = results
            .iter()
            .map(|r| r.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(&self.delimiter);
        Prompt::new(
            self.instruction.clone(),
            format!("<context>\n{context}\n</context>\nQuestion: {question}"),
        )
    }
}
