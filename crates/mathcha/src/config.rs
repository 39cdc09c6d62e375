//! Configuration management for the demo server.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use mathcha::CaptchaConfig;
use mathcha_common::constants::DEFAULT_LISTEN_ADDR;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Decimal places answers are compared at
    #[serde(default)]
    pub answer_places: u32,

    /// CAPTCHA generation and rendering
    #[serde(default)]
    pub captcha: CaptchaConfig,
}

fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!("Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(ref work_dir) = args.work_dir {
            config.captcha.work_dir = work_dir.clone();
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            answer_places: mathcha_common::constants::DEFAULT_ANSWER_PLACES,
            captcha: CaptchaConfig::default(),
        }
    }
}
