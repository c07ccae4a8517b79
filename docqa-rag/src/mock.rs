//! Deterministic providers for tests and offline runs.
//!
//! [`BagOfWordsEmbedder`] hashes word counts into a fixed-size vector, so texts
//! sharing vocabulary score higher under cosine similarity.
//! [`ExtractiveCompleter`] answers with the context sentence that shares the
//! most words with the question. Neither touches the network.

use async_trait::async_trait;

use crate::completion::CompletionProvider;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::prompt::Prompt;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from", "has",
    "have", "how", "in", "is", "it", "of", "on", "or", "that", "the", "this", "to", "was", "were",
    "what", "when", "where", "which", "who", "why", "with",
];

/// Lowercased alphanumeric words with stopwords removed.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .filter(|word| !STOPWORDS.contains(&word.as_str()))
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Hashed bag-of-words embeddings.
#[derive(Debug, Clone, Copy)]
pub struct BagOfWordsEmbedder {
    dimensions: usize,
}

impl Default for BagOfWordsEmbedder {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl BagOfWordsEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }
}

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; self.dimensions];
        for word in tokens(text) {
            let bucket = (fnv1a(&word) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "bag-of-words"
    }
}

/// Answers with the best-matching context sentence.
#[derive(Debug, Clone)]
pub struct ExtractiveCompleter {
    fallback: String,
}

impl Default for ExtractiveCompleter {
    fn default() -> Self {
        Self { fallback: "I don't know.".to_string() }
    }
}

impl ExtractiveCompleter {
    /// Answer with `fallback` when no context sentence shares a word with the question.
    pub fn with_fallback(fallback: impl Into<String>) -> Self {
        Self { fallback: fallback.into() }
    }
}

/// Split the user message into its context block and question.
fn parse_user_message(user: &str) -> (&str, &str) {
    let context = user
        .split_once("<context>")
        .and_then(|(_, rest)| rest.split_once("</context>"))
        .map_or("", |(context, _)| context);
    let question = user.rsplit_once("Question:").map_or(user, |(_, question)| question);
    (context, question)
}

#[async_trait]
impl CompletionProvider for ExtractiveCompleter {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let (context, question) = parse_user_message(&prompt.user);
        let wanted: Vec<String> = tokens(question).collect();

        let best = context
            .split(['\n', '.', '!', '?'])
            .map(str::trim)
            .filter(|sentence| !sentence.is_empty() && *sentence != "---")
            .map(|sentence| {
                let hits = tokens(sentence).filter(|word| wanted.contains(word)).count();
                (hits, sentence)
            })
            .fold(None, |best: Option<(usize, &str)>, candidate| match best {
                Some(current) if current.0 >= candidate.0 => Some(current),
                _ => Some(candidate),
            });

        Ok(match best {
            Some((hits, sentence)) if hits > 0 => format!("{sentence}."),
            _ => self.fallback.clone(),
        })
    }

    fn name(&self) -> &str {
        "extractive"
    }
}
