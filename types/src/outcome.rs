use thiserror::Error;

/// A failure reported by the wrapped capability itself.
///
/// `code` is the domain failure code when the capability supplied one. Zero is
/// normalized to `None` so it can never be mistaken for the success status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CapabilityFailure {
    code: Option<i32>,
    message: String,
}

impl CapabilityFailure {
    #[must_use]
    pub fn new(code: Option<i32>, message: impl Into<String>) -> Self {
        Self {
            code: code.filter(|code| *code != 0),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn uncoded(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result of one capability invocation, produced once and consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    Success(String),
    Failure(CapabilityFailure),
}

impl InvocationOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, InvocationOutcome::Success(_))
    }
}

impl From<Result<String, CapabilityFailure>> for InvocationOutcome {
    fn from(result: Result<String, CapabilityFailure>) -> Self {
        match result {
            Ok(payload) => InvocationOutcome::Success(payload),
            Err(failure) => InvocationOutcome::Failure(failure),
        }
    }
}
