use thiserror::Error;

use crate::shim::StateError;

/// Failure raised by a contract function.
///
/// The dispatcher turns every variant into an error [`Response`] carrying the
/// `Display` text, so the messages are what a client ends up reading.
///
/// [`Response`]: crate::shim::Response
#[derive(Debug, Error)]
pub enum ChaincodeError {
    /// No function of that name is registered for this deployment.
    #[error("Received unknown function {0} invocation")]
    UnknownFunction(String),

    #[error("Incorrect number of arguments for {function}. Expecting {expected}, got {actual}")]
    ArgumentCountMismatch {
        function: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{0} does not exist")]
    KeyNotFound(String),

    /// Stored bytes are absent where a record was required, or do not decode
    /// into a valid user record.
    #[error("user record at {key} could not be parsed: {reason}")]
    ParseFailure { key: String, reason: String },

    #[error("verification failed for {0}: stored hashes do not match")]
    VerificationMismatch(String),

    #[error("state access failed: {0}")]
    State(#[from] StateError),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ChaincodeError {
    pub(crate) fn parse_failure(key: &str, reason: impl ToString) -> Self {
        ChaincodeError::ParseFailure {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}
