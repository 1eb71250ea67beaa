//! Pluggable token counting.

#[cfg(feature = "tiktoken")]
use crate::error::ConfigError;

/// Maps text to a token count for a specific tokenizer.
///
/// Implement this to count with a real tokenizer vocabulary; the budgeter
/// only requires that counts do not shrink as a prefix grows.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize;
}

/// Character-based token counter.
///
/// Uses the `token_count ≈ char_count / chars_per_token` heuristic, a
/// reasonable approximation for English text with GPT-family tokenizers.
/// Suitable for rough budget enforcement; bring a real tokenizer for
/// per-token accuracy.
#[derive(Debug, Clone)]
pub struct HeuristicCounter {
    /// Characters per token ratio
    chars_per_token: usize,
}

impl HeuristicCounter {
    /// Create a counter with a custom chars-per-token ratio.
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }
}

impl Default for HeuristicCounter {
    fn default() -> Self {
        Self { chars_per_token: 4 }
    }
}

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }
}

/// Accurate token counter backed by a tiktoken vocabulary.
#[cfg(feature = "tiktoken")]
#[derive(Debug, Clone)]
pub struct TiktokenCounter {
    encoder: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "tiktoken")]
impl TiktokenCounter {
    /// Create a counter for a model's tokenizer (e.g. `"gpt-4o"`).
    pub fn for_model(model: &str) -> Result<Self, ConfigError> {
        let encoder = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|_| ConfigError::UnknownTokenizerModel(model.to_string()))?;
        Ok(Self { encoder })
    }
}

#[cfg(feature = "tiktoken")]
impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.encoder.encode_with_special_tokens(text).len()
    }
}
