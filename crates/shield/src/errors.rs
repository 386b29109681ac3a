use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::tool::ErrorKind;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ShieldError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Model service unavailable: {0}")]
    Transport(String),

    #[error("Capability unavailable: {0}")]
    UnsupportedCapability(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShieldError {
    /// The tool-result error kind this error is reported as, if it can be reported to the model
    pub fn tool_error_kind(&self) -> Option<ErrorKind> {
        match self {
            ShieldError::InvalidParameters(_) => Some(ErrorKind::ValidationError),
            ShieldError::ExecutionError(_) | ShieldError::Internal(_) => {
                Some(ErrorKind::ToolExecutionError)
            }
            ShieldError::Transport(_) | ShieldError::UnsupportedCapability(_) => None,
        }
    }
}

pub type ShieldResult<T> = Result<T, ShieldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_kinds() {
        assert_eq!(
            ShieldError::InvalidParameters("x".into()).tool_error_kind(),
            Some(ErrorKind::ValidationError)
        );
        assert_eq!(
            ShieldError::Internal("x".into()).tool_error_kind(),
            Some(ErrorKind::ToolExecutionError)
        );
        assert_eq!(ShieldError::Transport("down".into()).tool_error_kind(), None);
    }

    #[test]
    fn test_display() {
        let err = ShieldError::ExecutionError("no shelters".into());
        assert_eq!(err.to_string(), "Tool execution failed: no shelters");
    }
}
