//! Conversation history and cumulative token usage for one session

use crate::llm::{ChatMessage, Usage};

/// Cumulative token counters for the lifetime of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageCounters {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl UsageCounters {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    fn add(&mut self, delta: Usage) {
        self.input_tokens = self.input_tokens.saturating_add(delta.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(delta.output_tokens);
    }
}

/// Ordered message history plus usage counters
///
/// History only grows through [`append_turn`](Self::append_turn), which takes
/// a whole finished turn at once, so an abandoned turn leaves no trace.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    messages: Vec<ChatMessage>,
    usage: UsageCounters,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed turn and its token usage
    pub fn append_turn(&mut self, messages: Vec<ChatMessage>, usage_delta: Usage) {
        self.messages.extend(messages);
        self.usage.add(usage_delta);
    }

    /// Drop all history. Usage counters are cumulative and survive a reset.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn usage(&self) -> UsageCounters {
        self.usage
    }
}
