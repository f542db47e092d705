use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// TMDB API key
    pub tmdb_api_key: String,

    /// TMDB API base URL
    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// Base URL for resolving poster paths to absolute image URLs
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,

    /// OpenRouter API key; when absent, intent extraction and pick ranking
    /// fall back to their heuristic defaults
    #[serde(default)]
    pub openrouter_api_key: Option<String>,

    /// Model identifier passed to OpenRouter
    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// Fallback region for certification/provider lookups
    #[serde(default = "default_region")]
    pub default_region: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_image_base_url() -> String {
    "https://image.tmdb.org/t/p/w500".to_string()
}

fn default_llm_model() -> String {
    "openai/gpt-4.1-mini".to_string()
}

fn default_region() -> String {
    "GB".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}
