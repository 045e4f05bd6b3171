//! Conversation state and streamed-response accumulation
//!
//! The message list is published as immutable snapshots. Every change
//! builds a new list, so a renderer holding an older snapshot never sees a
//! half-applied update.

use std::sync::Arc;

use crate::sse::StreamEvent;
use crate::state::{ChatMessage, ChatRole};

#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Arc<[ChatMessage]>,
    accumulator: String,
    is_loading: bool,
    waiting_for_first_token: bool,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: Arc::from(Vec::<ChatMessage>::new()),
            accumulator: String::new(),
            is_loading: false,
            waiting_for_first_token: false,
        }
    }

    /// Current message list
    pub fn snapshot(&self) -> Arc<[ChatMessage]> {
        Arc::clone(&self.messages)
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

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn waiting_for_first_token(&self) -> bool {
        self.waiting_for_first_token
    }

    /// Start a turn: append the user message and an empty assistant
    /// placeholder. Returns the history to send, placeholder excluded.
    ///
    /// Blank input and input arriving while a turn is in flight are ignored.
    pub fn begin_turn(&mut self, input: &str) -> Option<Vec<ChatMessage>> {
        let text = input.trim();
        if text.is_empty() || self.is_loading {
            return None;
        }

        let mut next = self.messages.to_vec();
        next.push(ChatMessage::user(text));
        let history = next.clone();
        next.push(ChatMessage::assistant(""));

        self.messages = next.into();
        self.accumulator.clear();
        self.is_loading = true;
        self.waiting_for_first_token = true;

        tracing::debug!(messages = self.messages.len(), "Turn started");
        Some(history)
    }

    /// Fold one decoded event into the trailing assistant message
    pub fn apply(&mut self, event: StreamEvent) {
        if !self.is_loading {
            tracing::debug!(?event, "Dropping event outside of a turn");
            return;
        }

        match event {
            StreamEvent::Delta(text) => {
                if text.is_empty() {
                    return;
                }
                self.waiting_for_first_token = false;
                self.accumulator.push_str(&text);
                self.publish_accumulator();
            }
            StreamEvent::Error(error) => {
                tracing::error!(%error, "Chat service reported an error");
            }
            StreamEvent::Done => self.finish(),
        }
    }

    /// Transport failure: keep whatever streamed so far and end the turn
    pub fn fail(&mut self, reason: &str) {
        tracing::error!(%reason, partial_len = self.accumulator.len(), "Chat request failed");
        self.finish();
    }

    pub fn finish(&mut self) {
        self.is_loading = false;
        self.waiting_for_first_token = false;
    }

    /// Drop the whole conversation. Refused while a turn is in flight.
    pub fn clear(&mut self) -> bool {
        if self.is_loading {
            return false;
        }
        self.messages = Arc::from(Vec::<ChatMessage>::new());
        self.accumulator.clear();
        true
    }

    /// Content of the newest assistant message, if any
    pub fn last_assistant(&self) -> Option<&ChatMessage> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::Assistant)
    }

    fn publish_accumulator(&mut self) {
        let mut next = self.messages.to_vec();
        if let Some(last) = next.last_mut() {
            last.content = self.accumulator.clone();
        }
        self.messages = next.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(s: &str) -> StreamEvent {
        StreamEvent::Delta(s.to_string())
    }

    #[test]
    fn test_begin_turn_appends_user_and_placeholder() {
        let mut convo = Conversation::new();
        let history = convo.begin_turn("  hello  ").unwrap();

        assert_eq!(history, vec![ChatMessage::user("hello")]);
        assert_eq!(
            convo.messages(),
            &[ChatMessage::user("hello"), ChatMessage::assistant("")]
        );
        assert!(convo.is_loading());
        assert!(convo.waiting_for_first_token());
    }

    #[test]
    fn test_blank_or_concurrent_send_is_ignored() {
        let mut convo = Conversation::new();
        assert!(convo.begin_turn("   \n").is_none());
        assert!(convo.is_empty());

        convo.begin_turn("first").unwrap();
        assert!(convo.begin_turn("second").is_none());
        assert_eq!(convo.len(), 2);
    }

    #[test]
    fn test_deltas_accumulate_and_flag_flips_once() {
        let mut convo = Conversation::new();
        convo.begin_turn("hi").unwrap();

        let mut flag_history = vec![convo.waiting_for_first_token()];
        for part in ["Hel", "lo, ", "world"] {
            convo.apply(delta(part));
            flag_history.push(convo.waiting_for_first_token());
        }

        assert_eq!(flag_history, vec![true, false, false, false]);
        assert_eq!(convo.messages()[1].content, "Hello, world");

        convo.apply(StreamEvent::Done);
        assert!(!convo.is_loading());
    }

    #[test]
    fn test_snapshots_are_not_mutated() {
        let mut convo = Conversation::new();
        convo.begin_turn("hi").unwrap();
        convo.apply(delta("a"));
        let before = convo.snapshot();

        convo.apply(delta("b"));

        assert_eq!(before[1].content, "a");
        assert_eq!(convo.snapshot()[1].content, "ab");
        assert_eq!(before[0], convo.snapshot()[0]);
    }

    #[test]
    fn test_only_trailing_message_changes_on_second_turn() {
        let mut convo = Conversation::new();
        convo.begin_turn("one").unwrap();
        convo.apply(delta("first answer"));
        convo.apply(StreamEvent::Done);

        let history = convo.begin_turn("two").unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1], ChatMessage::assistant("first answer"));

        convo.apply(delta("second"));
        let messages = convo.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content, "first answer");
        assert_eq!(messages[3].content, "second");
    }

    #[test]
    fn test_error_event_keeps_content() {
        let mut convo = Conversation::new();
        convo.begin_turn("hi").unwrap();
        convo.apply(delta("partial"));
        convo.apply(StreamEvent::Error("boom".to_string()));

        assert_eq!(convo.messages()[1].content, "partial");
        assert!(convo.is_loading());
    }

    #[test]
    fn test_fail_clears_loading_and_keeps_partial() {
        let mut convo = Conversation::new();
        convo.begin_turn("hi").unwrap();
        convo.fail("connection refused");

        assert!(!convo.is_loading());
        assert!(!convo.waiting_for_first_token());
        assert_eq!(convo.len(), 2);
        assert_eq!(convo.messages()[1].content, "");
    }

    #[test]
    fn test_clear_refused_while_loading() {
        let mut convo = Conversation::new();
        convo.begin_turn("hi").unwrap();
        assert!(!convo.clear());
        convo.finish();
        assert!(convo.clear());
        assert!(convo.is_empty());
    }

    #[test]
    fn test_events_outside_turn_are_dropped() {
        let mut convo = Conversation::new();
        convo.apply(delta("stray"));
        assert!(convo.is_empty());
    }
}
