//! Application state and shared resources.

use anyhow::{Context, Result};
use std::time::Instant;

use crate::config::AppConfig;
use mathcha::CaptchaManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// CAPTCHA lifecycle manager (cheap to clone, shared records)
    pub captchas: CaptchaManager,

    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Create application state, validating the CAPTCHA configuration
    pub fn new(config: AppConfig) -> Result<Self> {
        let captchas = CaptchaManager::new(config.captcha.clone())
            .context("Invalid CAPTCHA configuration")?;

        Ok(Self {
            config,
            captchas,
            started_at: Instant::now(),
        })
    }
}
