//! Common error types for Mathcha components.

use thiserror::Error;

use crate::types::PipelineStage;

/// Errors raised while generating or rendering a CAPTCHA
#[derive(Debug, Error)]
pub enum CaptchaError {
    /// Malformed generation parameters or tool arguments
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generation attempted with no operators registered
    #[error("No operators registered")]
    EmptyRegistry,

    /// A pipeline stage (file write, typesetter, rasterizer) failed
    #[error("{stage} stage failed: {message}")]
    ExternalTool {
        stage: PipelineStage,
        message: String,
    },

    /// Every redraw collided with a key whose pipeline is still running
    #[error("Key collision with in-flight CAPTCHA: {0}")]
    KeyCollision(String),

    /// The record was cleaned up while its pipeline was still running
    #[error("CAPTCHA removed before it was ready: {0}")]
    Removed(String),
}

impl CaptchaError {
    /// Build an external tool error for the given stage
    pub fn tool(stage: PipelineStage, message: impl Into<String>) -> Self {
        Self::ExternalTool {
            stage,
            message: message.into(),
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidConfig(_) => 500,
            Self::EmptyRegistry => 500,
            Self::ExternalTool { .. } => 502,
            Self::KeyCollision(_) => 503,
            Self::Removed(_) => 409,
        }
    }

    /// Returns true if calling `generate` again may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExternalTool { .. } | Self::KeyCollision(_) | Self::Removed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_message_names_stage() {
        let err = CaptchaError::tool(PipelineStage::Typeset, "exit status 1");
        assert_eq!(err.to_string(), "typeset stage failed: exit status 1");
        assert_eq!(err.status_code(), 502);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_config_errors_are_not_retryable() {
        assert!(!CaptchaError::EmptyRegistry.is_retryable());
        assert!(!CaptchaError::InvalidConfig("max_ops".into()).is_retryable());
    }
}
