use std::sync::{ Arc, Mutex, MutexGuard };

use log::debug;

use super::state::Conversation;
use super::transport::ChatTransport;

/// Async driver for one [`Conversation`].
///
/// The conversation lock is released while the request is on the wire, so the rest of
/// the widget stays usable. After [`ChatSession::teardown`] late replies are dropped.
pub struct ChatSession<T: ChatTransport> {
    conversation: Arc<Mutex<Option<Conversation>>>,
    transport: Arc<T>,
}

impl<T: ChatTransport> Clone for ChatSession<T> {
    fn clone(&self) -> Self {
        Self {
            conversation: Arc::clone(&self.conversation),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: ChatTransport> ChatSession<T> {
    pub fn new(transport: T) -> Self {
        Self::with_transport(Arc::new(transport))
    }

    pub fn with_transport(transport: Arc<T>) -> Self {
        Self {
            conversation: Arc::new(Mutex::new(Some(Conversation::new()))),
            transport,
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Runs `f` against the live conversation; `None` once torn down.
    pub fn with<R>(&self, f: impl FnOnce(&mut Conversation) -> R) -> Option<R> {
        self.lock().as_mut().map(f)
    }

    pub fn open(&self) {
        self.with(Conversation::open);
    }

    pub fn close(&self) {
        self.with(Conversation::close);
    }

    /// Submits `text` and waits for the outcome. Returns `false` when the submit was
    /// ignored (blank text, a request already in flight, or a torn-down session).
    pub async fn submit(&self, text: &str) -> bool {
        let Some(request) = self.with(|conv| conv.submit(text)).flatten() else {
            return false;
        };

        let outcome = self.transport.send(&request).await;

        if self.with(|conv| conv.resolve(outcome)).is_none() {
            debug!("Session torn down before the reply arrived; dropping it");
        }
        true
    }

    pub fn teardown(&self) {
        self.lock().take();
    }

    fn lock(&self) -> MutexGuard<'_, Option<Conversation>> {
        self.conversation.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
