//! Token-budget-aware message truncation.
//!
//! Fits a chat-style history under a provider's context limit while
//! preserving the most recent turns:
//! - the last message is always kept (hard-truncated if it alone exceeds
//!   the budget)
//! - earlier messages are included newest-first until the budget is spent
//! - relative ordering of the included messages is preserved
//!
//! Token counting is delegated to a [`TokenCounter`] so the vocabulary can
//! vary by provider. The budgeter holds no mutable state and is safe to
//! share across call paths without coordination.

pub mod counter;

#[cfg(feature = "tiktoken")]
pub use counter::TiktokenCounter;
pub use counter::{HeuristicCounter, TokenCounter};

use tracing::warn;

#[cfg(feature = "tiktoken")]
use crate::error::ConfigError;
use crate::message::ChatMessage;

/// Fits message histories under a token budget, preferring recency.
pub struct MessageBudgeter {
    counter: Box<dyn TokenCounter>,
}

impl MessageBudgeter {
    /// Budgeter with the chars/4 heuristic counter.
    pub fn new() -> Self {
        Self::with_counter(Box::new(HeuristicCounter::default()))
    }

    /// Budgeter with a caller-provided counter.
    pub fn with_counter(counter: Box<dyn TokenCounter>) -> Self {
        Self { counter }
    }

    /// Budgeter counting with the named model's tiktoken vocabulary.
    #[cfg(feature = "tiktoken")]
    pub fn for_model(model: &str) -> Result<Self, ConfigError> {
        Ok(Self::with_counter(Box::new(TiktokenCounter::for_model(
            model,
        )?)))
    }

    /// Token count for a piece of text, for pre-flight budget checks.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    /// Total token count across `messages`.
    pub fn total_tokens(&self, messages: &[ChatMessage]) -> usize {
        messages.iter().map(|m| self.counter.count(&m.content)).sum()
    }

    /// Produce a subsequence of `messages` whose token total fits
    /// `max_tokens`, preferring the most recent turns.
    ///
    /// The input is never mutated. When everything fits, the history is
    /// returned unchanged. Otherwise the last message is always kept; if it
    /// alone exceeds the budget its content is cut to the largest prefix
    /// that fits and all earlier context is dropped. Earlier messages are
    /// added newest-first; the walk stops at the first message that does
    /// not fit, since anything older is rejected on the same exhausted
    /// budget.
    pub fn truncate(&self, messages: &[ChatMessage], max_tokens: usize) -> Vec<ChatMessage> {
        let Some(last) = messages.last() else {
            return Vec::new();
        };
        if self.total_tokens(messages) <= max_tokens {
            return messages.to_vec();
        }

        let last_tokens = self.counter.count(&last.content);
        if last_tokens > max_tokens {
            let content = self.largest_fitting_prefix(&last.content, max_tokens);
            warn!(
                dropped = messages.len() - 1,
                budget = max_tokens,
                "last message alone exceeds budget, hard-truncating its content"
            );
            return vec![ChatMessage::new(last.role, content)];
        }

        let mut kept: Vec<&ChatMessage> = vec![last];
        let mut used = last_tokens;
        for message in messages[..messages.len() - 1].iter().rev() {
            let tokens = self.counter.count(&message.content);
            if used + tokens > max_tokens {
                break;
            }
            used += tokens;
            kept.push(message);
        }
        kept.reverse();

        warn!(
            kept = kept.len(),
            dropped = messages.len() - kept.len(),
            used_tokens = used,
            budget = max_tokens,
            "truncated conversation history"
        );
        kept.into_iter().cloned().collect()
    }

    /// Largest prefix of `content`, on a char boundary, whose token count
    /// fits `max_tokens`.
    fn largest_fitting_prefix(&self, content: &str, max_tokens: usize) -> String {
        // binary search over char boundaries; the empty prefix always fits
        let boundaries: Vec<usize> = content
            .char_indices()
            .map(|(i, _)| i)
            .chain([content.len()])
            .collect();
        let mut lo = 0;
        let mut hi = boundaries.len() - 1;
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if self.counter.count(&content[..boundaries[mid]]) <= max_tokens {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        content[..boundaries[lo]].to_string()
    }
}

impl Default for MessageBudgeter {
    fn default() -> Self {
        Self::new()
    }
}
