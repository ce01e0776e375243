//! Forward-only cursor over the test's sections.

use crate::error::SessionError;
use crate::model::{Question, Section, Test};

/// Tracks the active section. Never moves backwards.
#[derive(Debug, Clone)]
pub struct SectionNavigator {
    current: Section,
}

impl Default for SectionNavigator {
    fn default() -> Self {
        Self {
            current: Section::ORDER[0],
        }
    }
}

impl SectionNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Section {
        self.current
    }

    pub fn is_last(&self) -> bool {
        self.current.next().is_none()
    }

    /// Move to the next section.
    ///
    /// Fails with `InvalidTransition` when already on the last section; the
    /// cursor is left unchanged.
    pub fn advance(&mut self) -> Result<Section, SessionError> {
        let next = self
            .current
            .next()
            .ok_or_else(|| SessionError::invalid(format!("in {} section", self.current), "advance"))?;
        tracing::debug!(from = %self.current, to = %next, "advancing section");
        self.current = next;
        Ok(next)
    }

    /// Questions of the active section, in test order.
    pub fn questions<'a>(&self, test: &'a Test) -> Vec<&'a Question> {
        test.questions_in(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_in_fixed_order() {
        let mut nav = SectionNavigator::new();
        assert_eq!(nav.current(), Section::Objective);
        assert_eq!(nav.advance().unwrap(), Section::Subjective);
        assert_eq!(nav.advance().unwrap(), Section::Coding);
        assert!(nav.is_last());
    }

    #[test]
    fn advance_past_coding_is_rejected() {
        let mut nav = SectionNavigator::new();
        nav.advance().unwrap();
        nav.advance().unwrap();
        let err = nav.advance().unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
        assert_eq!(nav.current(), Section::Coding);
    }

    #[test]
    fn never_returns_to_objective() {
        let mut nav = SectionNavigator::new();
        nav.advance().unwrap();
        for _ in 0..5 {
            let _ = nav.advance();
            assert_ne!(nav.current(), Section::Objective);
        }
    }
}
