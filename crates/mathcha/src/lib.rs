//! # Mathcha
//!
//! Arithmetic CAPTCHAs: random expression trees, typeset with LaTeX,
//! rasterized to PNG, and verified against the computed answer.
//!
//! ## Modules
//! - `expr` - Operators, random generation, evaluation, and LaTeX rendering
//! - `captcha` - Rendering pipeline and the CAPTCHA lifecycle manager
//!
//! ## Pipeline
//! ```text
//! generate → evaluate ─┐
//!          → render ───┴→ key = sha256(document) → .tex → latex → .dvi → dvipng → .png
//! ```

pub mod captcha;
pub mod expr;

pub use captcha::{CaptchaConfig, CaptchaManager};
pub use expr::{Expr, Operator, OperatorRegistry};
pub use mathcha_common::CaptchaError;
