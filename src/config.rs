// Service configuration, loaded with the 'config' crate and 'dotenv'

use anyhow::Result;
use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server_address: String,
    // Suggestion provider (Gemini). No key means AI features are disabled.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub suggestion_debounce_ms: u64,
    pub suggestion_timeout_ms: u64,
    // Data sources
    pub catalog_path: Option<String>,
    pub listings_path: Option<String>,
    pub seed_mock_listings: bool,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Self::with_defaults(Config::builder())?
            // Load from a configuration file (e.g., config.toml)
            .add_source(File::with_name("config").required(false))
            // Load from environment variables (e.g., APP_GEMINI_API_KEY)
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Settings built from the defaults alone, ignoring files and environment.
    pub fn defaults() -> Result<Self> {
        let settings = Self::with_defaults(Config::builder())?.build()?.try_deserialize()?;
        Ok(settings)
    }

    fn with_defaults(builder: ConfigBuilder<DefaultState>) -> Result<ConfigBuilder<DefaultState>> {
        Ok(builder
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("gemini_model", "gemini-2.5-flash")?
            .set_default("gemini_base_url", "https://generativelanguage.googleapis.com")?
            .set_default("suggestion_debounce_ms", 750)?
            .set_default("suggestion_timeout_ms", 8000)?
            .set_default("seed_mock_listings", true)?)
    }

    pub fn suggestion_debounce(&self) -> Duration {
        Duration::from_millis(self.suggestion_debounce_ms)
    }

    pub fn suggestion_timeout(&self) -> Duration {
        Duration::from_millis(self.suggestion_timeout_ms)
    }
}
