use anyhow::{Context, Result};
use log::info;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:8080/api";

/// Runtime configuration. The API base URL can be embedded at build time via
/// build.rs or overridden with the TESTDESK_API_URL environment variable.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: Url,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        // Don't fail if .env doesn't exist
        dotenvy::dotenv().ok();

        let raw = std::env::var("TESTDESK_API_URL")
            .ok()
            .or_else(|| option_env!("TESTDESK_API_URL").map(str::to_string))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let api_base_url = Url::parse(&raw)
            .with_context(|| format!("Invalid TESTDESK_API_URL: {}", raw))?;

        info!("Using API base URL: {}", api_base_url);

        Ok(Self { api_base_url })
    }
}
