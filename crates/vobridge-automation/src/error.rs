//! Error types for the automation ports.

/// Failure of an OS automation call.
///
/// The two variants map to different HTTP statuses: a call that could not be
/// set up at all versus one that ran and reported an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AutomationError {
    #[error("Automation unavailable: {0}")]
    Unavailable(String),
    #[error("Automation failed: {0}")]
    Execution(String),
}

/// Failure of a narrator phrase query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Narrator returned no phrase")]
    Empty,
    #[error("Narrator query failed: {0}")]
    Failed(String),
}

impl From<AutomationError> for QueryError {
    fn from(err: AutomationError) -> Self {
        QueryError::Failed(err.to_string())
    }
}
