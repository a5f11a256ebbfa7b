//! Browser-side chat widget logic, expressed as a UI-agnostic controller.
//!
//! [`Conversation`] owns the visible transcript and lifecycle; [`ChatSession`] drives it
//! over an async [`ChatTransport`]; [`RecoveryBoundary`] contains rendering faults.
//! The terminal front-end in [`terminal`] is one renderer on top of these.

pub mod boundary;
pub mod session;
pub mod state;
pub mod terminal;
pub mod transport;

pub use boundary::RecoveryBoundary;
pub use session::ChatSession;
pub use state::{ ChatState, Conversation, ViewEffect };
pub use transport::{ ChatTransport, FailureKind, HttpTransport, ProxyReply, TransportError };

/// Messages kept in the transcript; older ones are dropped first.
pub const MAX_MESSAGES: usize = 50;
/// Longest message the widget will send, in characters. Matches the proxy's limit.
pub const MAX_MESSAGE_CHARS: usize = 2000;
/// Prior messages sent along as context with each new turn.
pub const CONTEXT_MESSAGES: usize = 10;

pub const GREETING: &str = "Yo. I'm Merica. Need custom tees or you just browsing?";

pub const UNREACHABLE_NOTICE: &str = "Can't reach the server. Check your connection.";
pub const TIMEOUT_NOTICE: &str = "Merica dozed off waiting on that one. Try again in a sec.";
pub const MALFORMED_NOTICE: &str = "Got a garbled answer back. Try again.";
pub const GENERIC_NOTICE: &str = "Damn, something broke. Try again in a sec.";

pub fn failure_notice(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Unreachable => UNREACHABLE_NOTICE,
        FailureKind::Timeout => TIMEOUT_NOTICE,
        FailureKind::MalformedResponse => MALFORMED_NOTICE,
        FailureKind::Generic => GENERIC_NOTICE,
    }
}
