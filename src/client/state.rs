use std::collections::VecDeque;

use log::debug;

use super::transport::{ ProxyReply, TransportError };
use super::{
    failure_notice,
    CONTEXT_MESSAGES,
    GENERIC_NOTICE,
    GREETING,
    MAX_MESSAGES,
    MAX_MESSAGE_CHARS,
};
use crate::models::chat::{ ChatMessage, ChatRequest, HistoryEntry };

/// Lifecycle of one chat widget.
///
/// A request in flight outlives the window: closing while `Awaiting` keeps waiting with
/// `visible: false`, and the reply still lands in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatState {
    #[default]
    Closed,
    Open,
    Awaiting {
        visible: bool,
    },
}

impl ChatState {
    pub fn is_open(&self) -> bool {
        matches!(self, ChatState::Open | ChatState::Awaiting { visible: true })
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ChatState::Awaiting { .. })
    }
}

/// Requests for the renderer. The controller never touches the screen itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEffect {
    FocusInput,
    ScrollToLatest,
}

#[derive(Debug, Default)]
pub struct Conversation {
    messages: VecDeque<ChatMessage>,
    state: ChatState,
    draft: String,
    appended: u64,
    effects: Vec<ViewEffect>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &VecDeque<ChatMessage> {
        &self.messages
    }

    /// Messages ever appended, including those since evicted.
    pub fn total_appended(&self) -> u64 {
        self.appended
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn open(&mut self) {
        self.state = match self.state {
            ChatState::Closed => ChatState::Open,
            ChatState::Awaiting { visible: false } => ChatState::Awaiting { visible: true },
            _ => {
                return;
            }
        };
        if self.messages.is_empty() {
            self.push(ChatMessage::assistant(GREETING));
        }
        self.effects.push(ViewEffect::FocusInput);
    }

    pub fn close(&mut self) {
        self.state = match self.state {
            ChatState::Open => ChatState::Closed,
            ChatState::Awaiting { visible: true } => ChatState::Awaiting { visible: false },
            other => other,
        };
    }

    pub fn toggle(&mut self) {
        if self.is_open() { self.close() } else { self.open() }
    }

    /// Sends the current draft.
    pub fn submit_draft(&mut self) -> Option<ChatRequest> {
        let text = self.draft.clone();
        self.submit(&text)
    }

    /// Starts a turn and returns the request to dispatch. Blank or oversized text, or a
    /// request already in flight, makes this a no-op.
    pub fn submit(&mut self, text: &str) -> Option<ChatRequest> {
        if text.trim().is_empty() {
            return None;
        }
        if text.chars().count() > MAX_MESSAGE_CHARS {
            debug!("Ignoring submit over {} characters", MAX_MESSAGE_CHARS);
            return None;
        }
        let visible = match self.state {
            ChatState::Awaiting { .. } => {
                debug!("Ignoring submit while a reply is pending");
                return None;
            }
            ChatState::Open => true,
            ChatState::Closed => false,
        };

        let skip = self.messages.len().saturating_sub(CONTEXT_MESSAGES);
        let conversation_history: Vec<HistoryEntry> = self.messages
            .iter()
            .skip(skip)
            .map(HistoryEntry::from)
            .collect();

        self.push(ChatMessage::user(text));
        self.draft.clear();
        self.state = ChatState::Awaiting { visible };

        Some(ChatRequest {
            message: text.to_string(),
            conversation_history,
        })
    }

    /// Lands the outcome of the in-flight request as exactly one assistant message.
    pub fn resolve(&mut self, outcome: Result<ProxyReply, TransportError>) {
        let ChatState::Awaiting { visible } = self.state else {
            debug!("Dropping reply with no request in flight");
            return;
        };

        let message = match outcome {
            Ok(ProxyReply::Success { message }) => ChatMessage::assistant(message),
            Ok(ProxyReply::Failure { error }) => {
                ChatMessage::failure(error.unwrap_or_else(|| GENERIC_NOTICE.to_string()))
            }
            Err(e) => {
                debug!("Chat request failed: {}", e);
                ChatMessage::failure(failure_notice(e.kind))
            }
        };
        self.push(message);
        self.state = if visible { ChatState::Open } else { ChatState::Closed };
    }

    pub fn drain_effects(&mut self) -> Vec<ViewEffect> {
        std::mem::take(&mut self.effects)
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        self.appended += 1;
        while self.messages.len() > MAX_MESSAGES {
            self.messages.pop_front();
        }
        self.effects.push(ViewEffect::ScrollToLatest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::FailureKind;
    use crate::client::{ MALFORMED_NOTICE, TIMEOUT_NOTICE, UNREACHABLE_NOTICE };
    use crate::models::chat::Role;

    fn success(text: &str) -> Result<ProxyReply, TransportError> {
        Ok(ProxyReply::Success { message: text.to_string() })
    }

    fn last(conv: &Conversation) -> &ChatMessage {
        conv.messages().back().unwrap()
    }

    #[test]
    fn opening_empty_conversation_greets_once() {
        let mut conv = Conversation::new();
        conv.open();
        conv.close();
        conv.open();
        conv.open();

        assert_eq!(conv.messages().len(), 1);
        assert_eq!(conv.messages()[0].content, GREETING);
        assert_eq!(conv.messages()[0].role, Role::Assistant);
        assert!(!conv.messages()[0].is_error);
    }

    #[test]
    fn opening_requests_focus_and_closing_does_not() {
        let mut conv = Conversation::new();
        conv.open();
        assert_eq!(conv.drain_effects(), vec![ViewEffect::ScrollToLatest, ViewEffect::FocusInput]);
        conv.close();
        assert!(conv.drain_effects().is_empty());
        conv.open();
        assert_eq!(conv.drain_effects(), vec![ViewEffect::FocusInput]);
    }

    #[test]
    fn blank_submit_is_ignored() {
        let mut conv = Conversation::new();
        conv.open();
        assert!(conv.submit("   \n").is_none());
        assert_eq!(conv.messages().len(), 1);
        assert!(!conv.is_loading());
    }

    #[test]
    fn oversized_submit_is_rejected_locally() {
        let mut conv = Conversation::new();
        conv.open();
        conv.set_draft("a".repeat(MAX_MESSAGE_CHARS + 1));

        assert!(conv.submit_draft().is_none());
        assert_eq!(conv.messages().len(), 1);
        assert_eq!(conv.state(), ChatState::Open);
        assert_eq!(conv.draft().chars().count(), MAX_MESSAGE_CHARS + 1);

        let request = conv.submit(&"é".repeat(MAX_MESSAGE_CHARS)).unwrap();
        assert_eq!(request.message.chars().count(), MAX_MESSAGE_CHARS);
        assert!(conv.is_loading());
    }

    #[test]
    fn submit_while_loading_is_a_no_op() {
        let mut conv = Conversation::new();
        conv.open();
        assert!(conv.submit("first").is_some());
        assert!(conv.submit("second").is_none());
        assert!(conv.submit("third").is_none());

        let users = conv.messages().iter().filter(|m| m.role == Role::User).count();
        assert_eq!(users, 1);

        conv.resolve(success("ok"));
        assert!(conv.submit("fourth").is_some());
    }

    #[test]
    fn submit_clears_draft_and_sends_prior_context() {
        let mut conv = Conversation::new();
        conv.open();
        conv.set_draft("need a hoodie");
        let request = conv.submit_draft().unwrap();

        assert_eq!(conv.draft(), "");
        assert_eq!(request.message, "need a hoodie");
        assert_eq!(request.conversation_history, vec![HistoryEntry {
            role: Role::Assistant,
            content: GREETING.to_string(),
        }]);
    }

    #[test]
    fn context_is_capped_to_recent_messages() {
        let mut conv = Conversation::new();
        conv.open();
        for i in 0..8 {
            conv.submit(&format!("q{i}")).unwrap();
            conv.resolve(success(&format!("a{i}")));
        }
        let request = conv.submit("latest").unwrap();

        assert_eq!(request.conversation_history.len(), CONTEXT_MESSAGES);
        assert_eq!(request.conversation_history[0].content, "q3");
        assert_eq!(request.conversation_history[9].content, "a7");
    }

    #[test]
    fn transcript_never_exceeds_cap() {
        let mut conv = Conversation::new();
        conv.open();
        for i in 0..40 {
            conv.submit(&format!("q{i}")).unwrap();
            conv.resolve(success(&format!("a{i}")));
            assert!(conv.messages().len() <= MAX_MESSAGES);
        }

        assert_eq!(conv.messages().len(), MAX_MESSAGES);
        assert_eq!(conv.total_appended(), 81);
        assert_eq!(conv.messages().front().unwrap().content, "q15");
        assert_eq!(last(&conv).content, "a39");
    }

    #[test]
    fn failures_map_to_fixed_notices() {
        let cases = [
            (FailureKind::Unreachable, UNREACHABLE_NOTICE),
            (FailureKind::Timeout, TIMEOUT_NOTICE),
            (FailureKind::MalformedResponse, MALFORMED_NOTICE),
            (FailureKind::Generic, GENERIC_NOTICE),
        ];
        for (kind, notice) in cases {
            let mut conv = Conversation::new();
            conv.open();
            conv.submit("hi").unwrap();
            conv.resolve(Err(TransportError::new(kind, "boom")));

            assert_eq!(last(&conv).content, notice);
            assert!(last(&conv).is_error);
            assert!(!conv.is_loading());
        }
    }

    #[test]
    fn application_error_prefers_server_text() {
        let mut conv = Conversation::new();
        conv.open();
        conv.submit("hi").unwrap();
        conv.resolve(Ok(ProxyReply::Failure { error: Some("Failed to process chat request".into()) }));
        assert_eq!(last(&conv).content, "Failed to process chat request");
        assert!(last(&conv).is_error);

        conv.submit("again").unwrap();
        conv.resolve(Ok(ProxyReply::Failure { error: None }));
        assert_eq!(last(&conv).content, GENERIC_NOTICE);
    }

    #[test]
    fn reply_lands_after_window_closed_mid_flight() {
        let mut conv = Conversation::new();
        conv.open();
        conv.submit("hi").unwrap();
        conv.close();
        assert_eq!(conv.state(), ChatState::Awaiting { visible: false });

        conv.resolve(success("still here"));
        assert_eq!(conv.state(), ChatState::Closed);
        assert_eq!(last(&conv).content, "still here");
    }

    #[test]
    fn stray_resolve_is_ignored() {
        let mut conv = Conversation::new();
        conv.open();
        conv.resolve(success("unexpected"));
        assert_eq!(conv.messages().len(), 1);
        assert_eq!(conv.state(), ChatState::Open);
    }
}
