//! View routing and the back-navigation guard.
//!
//! The router owns the view history explicitly instead of touching any
//! ambient browser/terminal state. While a [`BackGuard`] is installed every
//! back event is swallowed and the current view stays put.

use std::sync::Arc;

use crate::submission::SubmissionReceipt;

/// Reason shown when the disqualify signal carries no text.
pub const DEFAULT_DISQUALIFY_REASON: &str = "You have been disqualified.";

#[derive(Debug, Clone)]
pub enum View {
    /// The test itself (all answering happens here).
    Test,
    /// Terminal confirmation with the persisted payload as context.
    Confirmation(Arc<SubmissionReceipt>),
    /// Terminal disqualification notice.
    Disqualified { reason: String },
}

impl View {
    pub fn name(&self) -> &'static str {
        match self {
            View::Test => "test",
            View::Confirmation(_) => "confirmation",
            View::Disqualified { .. } => "disqualified",
        }
    }
}

/// What happened to a back-navigation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    /// The guard swallowed the event.
    Intercepted,
    /// Moved to the previous view.
    Moved,
    /// No history to go back to.
    AtStart,
}

/// Blocks back navigation for as long as it is installed.
#[derive(Debug, Default)]
pub struct BackGuard {
    intercepted: u32,
}

impl BackGuard {
    pub fn intercepted(&self) -> u32 {
        self.intercepted
    }
}

#[derive(Debug)]
pub struct ViewRouter {
    current: View,
    history: Vec<View>,
    guard: Option<BackGuard>,
}

impl Default for ViewRouter {
    fn default() -> Self {
        Self {
            current: View::Test,
            history: Vec::new(),
            guard: None,
        }
    }
}

impl ViewRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &View {
        &self.current
    }

    pub fn navigate(&mut self, view: View) {
        tracing::debug!(from = self.current.name(), to = view.name(), "navigating");
        let previous = std::mem::replace(&mut self.current, view);
        self.history.push(previous);
    }

    pub fn install_guard(&mut self) {
        if self.guard.is_none() {
            self.guard = Some(BackGuard::default());
        }
    }

    /// Remove the guard, returning it with its interception count.
    pub fn uninstall_guard(&mut self) -> Option<BackGuard> {
        self.guard.take()
    }

    pub fn guard(&self) -> Option<&BackGuard> {
        self.guard.as_ref()
    }

    /// Handle a back-navigation event.
    pub fn back(&mut self) -> BackOutcome {
        if let Some(guard) = self.guard.as_mut() {
            guard.intercepted += 1;
            tracing::debug!(view = self.current.name(), "back navigation intercepted");
            return BackOutcome::Intercepted;
        }
        match self.history.pop() {
            Some(previous) => {
                self.current = previous;
                BackOutcome::Moved
            }
            None => BackOutcome::AtStart,
        }
    }

    /// Enter the confirmation view and lock it.
    pub fn enter_confirmation(&mut self, receipt: Arc<SubmissionReceipt>) {
        self.navigate(View::Confirmation(receipt));
        self.install_guard();
    }

    pub fn enter_disqualified(&mut self, reason: &str) {
        let reason = if reason.trim().is_empty() {
            DEFAULT_DISQUALIFY_REASON.to_string()
        } else {
            reason.to_string()
        };
        self.navigate(View::Disqualified { reason });
    }
}
