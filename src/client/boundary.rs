use std::any::Any;
use std::panic::{ self, AssertUnwindSafe };

use log::error;

pub const FALLBACK_TITLE: &str = "Oops! Something Broke";
pub const FALLBACK_BODY: &str =
    "Merica knocked something over. Try again or head back to the home page.";
pub const TRY_AGAIN_LABEL: &str = "Try Again";
pub const GO_HOME_LABEL: &str = "Go Home";

/// What the user picked on the fallback panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Render the same view again.
    Retry,
    /// Discard the view and start from the landing page.
    Home,
}

/// Catches a panicking render and shows a fixed panel in its place until the user
/// picks a recovery action.
#[derive(Debug, Default)]
pub struct RecoveryBoundary {
    fault: Option<String>,
}

impl RecoveryBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_fault(&self) -> bool {
        self.fault.is_some()
    }

    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// Renders the subtree, or the fallback panel if it (or an earlier render) faulted.
    pub fn render<F>(&mut self, view: F) -> String where F: FnOnce() -> String {
        if self.fault.is_some() {
            return fallback_panel();
        }
        match panic::catch_unwind(AssertUnwindSafe(view)) {
            Ok(output) => output,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Chat view crashed: {}", message);
                self.fault = Some(message);
                fallback_panel()
            }
        }
    }

    pub fn recover(&mut self, action: Recovery) -> Recovery {
        self.fault = None;
        action
    }

    pub fn retry(&mut self) {
        self.recover(Recovery::Retry);
    }

    pub fn go_home(&mut self) -> Recovery {
        self.recover(Recovery::Home)
    }
}

pub fn fallback_panel() -> String {
    format!(
        "*** {} ***\n{}\n[{}]  [{}]  (/retry or /home)",
        FALLBACK_TITLE,
        FALLBACK_BODY,
        TRY_AGAIN_LABEL,
        GO_HOME_LABEL
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
