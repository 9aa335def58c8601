use serde::Deserialize;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-09-2025";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Gemini API key. `None` disables all model-backed operations; the
    /// service still starts and degrades to fail-open defaults.
    pub api_key: Option<String>,
    pub model: String,
    pub gemini_base_url: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty());

        let config = Self {
            api_key,
            model: std::env::var("GEMINI_MODEL")
                .ok()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_base_url: std::env::var("GEMINI_BASE_URL")
                .ok()
                .filter(|u| !u.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("GEMINI_BASE_URL must start with http:// or https://");
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })
                .transpose()?
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
        };

        if config.api_key.is_some() {
            tracing::info!("Gemini API key loaded");
        } else {
            tracing::warn!(
                "GEMINI_API_KEY / GOOGLE_API_KEY not set; AI features are disabled"
            );
        }
        tracing::debug!("Model: {}", config.model);
        tracing::debug!("Gemini base URL: {}", config.gemini_base_url);
        tracing::debug!("Server port: {}", config.port);

        Ok(config)
    }

    /// Configuration for tests and embedding callers, bypassing the environment.
    pub fn for_endpoint(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            model: DEFAULT_MODEL.to_string(),
            gemini_base_url: base_url.into().trim_end_matches('/').to_string(),
            port: 3000,
        }
    }
}
