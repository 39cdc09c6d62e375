//! Core types shared across Mathcha components.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a tracked CAPTCHA.
///
/// Records are inserted as `Pending`, become `Ready` once the image exists,
/// and are removed from tracking entirely on cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    /// Pipeline still running, image not available
    Pending,
    /// Image rendered, answer can be checked
    Ready,
}

/// One step of the image production pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    /// Writing the LaTeX source file
    Write,
    /// Running the typesetter on the source
    Typeset,
    /// Running the rasterizer on the typesetter output
    Rasterize,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Write => "write",
            Self::Typeset => "typeset",
            Self::Rasterize => "rasterize",
        };
        f.write_str(name)
    }
}

/// Public view of a tracked CAPTCHA (never carries the answer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaTicket {
    /// Content-derived key
    pub key: String,

    /// Current lifecycle state
    pub state: RecordState,

    /// Rendered image path (only once ready)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,

    /// Creation timestamp (Unix epoch seconds)
    pub created_at: i64,

    /// Auto-cleanup timestamp (only once ready)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl CaptchaTicket {
    /// Seconds left before auto-cleanup, relative to `now`
    pub fn expires_in_secs(&self, now: i64) -> u64 {
        self.expires_at
            .map(|at| at.saturating_sub(now).max(0) as u64)
            .unwrap_or(0)
    }
}

/// CAPTCHA verification result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_hides_missing_fields() {
        let ticket = CaptchaTicket {
            key: "abc".to_string(),
            state: RecordState::Pending,
            image_path: None,
            created_at: 1_700_000_000,
            expires_at: None,
        };

        let json = serde_json::to_value(&ticket).unwrap();
        assert_eq!(json["state"], "pending");
        assert!(json.get("image_path").is_none());
        assert!(json.get("expires_at").is_none());
    }

    #[test]
    fn test_expires_in_secs() {
        let ticket = CaptchaTicket {
            key: "abc".to_string(),
            state: RecordState::Ready,
            image_path: Some("/tmp/abc.png".to_string()),
            created_at: 100,
            expires_at: Some(400),
        };

        assert_eq!(ticket.expires_in_secs(100), 300);
        assert_eq!(ticket.expires_in_secs(500), 0);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(PipelineStage::Write.to_string(), "write");
        assert_eq!(PipelineStage::Rasterize.to_string(), "rasterize");
    }
}
