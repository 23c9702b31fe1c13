//! Error taxonomy for the reading coordinator and its collaborators.

use thiserror::Error;

/// Failures a command can report back to its sender. The session is left
/// untouched whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinatorError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("seek index {index} is out of range for {len} chunks")]
    OutOfRange { index: usize, len: usize },
    #[error("speech engine is unavailable")]
    EngineUnavailable,
}

impl CoordinatorError {
    /// Stable identifier carried in `{success: false}` replies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::OutOfRange { .. } => "out_of_range",
            Self::EngineUnavailable => "engine_unavailable",
        }
    }
}

/// A notification could not reach its recipient (closed tab, closed popup,
/// torn-down bridge). Always swallowed by the sender.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("delivery channel is closed")]
    ChannelClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine rejected the utterance: {0}")]
    Rejected(String),
    #[error("engine bridge is disconnected")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::CoordinatorError;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            CoordinatorError::InvalidInput("x".into()).code(),
            "invalid_input"
        );
        assert_eq!(
            CoordinatorError::OutOfRange { index: 4, len: 2 }.code(),
            "out_of_range"
        );
        assert_eq!(
            CoordinatorError::EngineUnavailable.code(),
            "engine_unavailable"
        );
    }

    #[test]
    fn out_of_range_message_names_bounds() {
        let err = CoordinatorError::OutOfRange { index: 7, len: 3 };
        assert_eq!(
            err.to_string(),
            "seek index 7 is out of range for 3 chunks"
        );
    }
}
