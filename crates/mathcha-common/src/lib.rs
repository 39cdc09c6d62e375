//! # Mathcha Common
//!
//! Shared types, errors, and defaults used across Mathcha components.
//!
//! ## Modules
//! - `types` - Lifecycle and wire types (RecordState, CaptchaTicket, etc.)
//! - `error` - The CAPTCHA error taxonomy
//! - `constants` - Documented configuration defaults

pub mod constants;
pub mod error;
pub mod types;

pub use error::CaptchaError;
pub use types::*;
