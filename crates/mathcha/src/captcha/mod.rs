//! CAPTCHA lifecycle: rendering pipeline, tracking, verification, expiry.

mod color;
mod manager;
mod pipeline;

pub use color::normalize_color;
pub use manager::{CaptchaManager, answers_match};
pub use pipeline::{Toolchain, derive_key, wrap_document};

use mathcha_common::constants::{
    DEFAULT_BACKGROUND, DEFAULT_BOUNDING, DEFAULT_CLEANUP_SECS, DEFAULT_FOREGROUND,
    DEFAULT_MAX_OPS, DEFAULT_MIN_OPS, DEFAULT_RASTERIZER, DEFAULT_RESOLUTION, DEFAULT_TYPESETTER,
    DEFAULT_VALUE_RANGE, DEFAULT_WORK_DIR_NAME,
};
use serde::Deserialize;
use std::path::PathBuf;

/// Manager configuration, fixed for the manager's lifetime
#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaConfig {
    /// Typesetter binary (LaTeX → DVI)
    #[serde(default = "default_typesetter")]
    pub typesetter: PathBuf,

    /// Rasterizer binary (DVI → PNG)
    #[serde(default = "default_rasterizer")]
    pub rasterizer: PathBuf,

    /// Text color (`#RRGGBB`, `rgb(r,g,b)` or `Transparent`)
    #[serde(default = "default_foreground")]
    pub foreground: String,

    /// Background color (`#RRGGBB`, `rgb(r,g,b)` or `Transparent`)
    #[serde(default = "default_background")]
    pub background: String,

    /// Rasterizer bounding box mode
    #[serde(default = "default_bounding")]
    pub bounding: String,

    /// Rasterizer resolution in DPI
    #[serde(default = "default_resolution")]
    pub resolution: u32,

    /// Directory holding sources and rendered images
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Minimum operators per expression
    #[serde(default = "default_min_ops")]
    pub min_ops: usize,

    /// Maximum operators per expression
    #[serde(default = "default_max_ops")]
    pub max_ops: usize,

    /// Pool operands are drawn from
    #[serde(default = "default_values")]
    pub values: Vec<f64>,

    /// Seconds a ready CAPTCHA lives before it is cleaned up
    #[serde(default = "default_cleanup_secs")]
    pub cleanup_secs: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            typesetter: default_typesetter(),
            rasterizer: default_rasterizer(),
            foreground: default_foreground(),
            background: default_background(),
            bounding: default_bounding(),
            resolution: default_resolution(),
            work_dir: default_work_dir(),
            min_ops: default_min_ops(),
            max_ops: default_max_ops(),
            values: default_values(),
            cleanup_secs: default_cleanup_secs(),
        }
    }
}

// Default value functions
fn default_typesetter() -> PathBuf { PathBuf::from(DEFAULT_TYPESETTER) }
fn default_rasterizer() -> PathBuf { PathBuf::from(DEFAULT_RASTERIZER) }
fn default_foreground() -> String { DEFAULT_FOREGROUND.to_string() }
fn default_background() -> String { DEFAULT_BACKGROUND.to_string() }
fn default_bounding() -> String { DEFAULT_BOUNDING.to_string() }
fn default_resolution() -> u32 { DEFAULT_RESOLUTION }
fn default_work_dir() -> PathBuf { std::env::temp_dir().join(DEFAULT_WORK_DIR_NAME) }
fn default_min_ops() -> usize { DEFAULT_MIN_OPS }
fn default_max_ops() -> usize { DEFAULT_MAX_OPS }
fn default_cleanup_secs() -> u64 { DEFAULT_CLEANUP_SECS }

fn default_values() -> Vec<f64> {
    let (low, high) = DEFAULT_VALUE_RANGE;
    (low..=high).map(f64::from).collect()
}
