pub mod answer;
pub mod pipeline;
pub mod prompts;
pub mod resolve;

use std::time::{Duration, Instant};

use crate::error::TurnError;

/// Externally supplied turn budget, checked between pipeline stages.
/// `Deadline::none()` disables the checks; the core mandates no timeout
/// value of its own.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn within(budget: Duration) -> Self {
        Self(Some(Instant::now() + budget))
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn expired(&self) -> bool {
        self.0.is_some_and(|t| Instant::now() >= t)
    }

    /// Error with the stage name when the budget is spent.
    pub fn check(&self, stage: &'static str) -> Result<(), TurnError> {
        if self.expired() {
            Err(TurnError::DeadlineExceeded { stage })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_deadline_never_expires() {
        let deadline = Deadline::none();
        assert!(!deadline.expired());
        assert!(deadline.check("anything").is_ok());
    }

    #[test]
    fn test_elapsed_deadline_reports_stage() {
        let deadline = Deadline::at(Instant::now() - Duration::from_millis(1));
        let err = deadline.check("retrieval").unwrap_err();
        assert!(err.to_string().contains("retrieval"));
    }

    #[test]
    fn test_future_deadline_passes() {
        let deadline = Deadline::within(Duration::from_secs(60));
        assert!(deadline.check("generation").is_ok());
    }
}
