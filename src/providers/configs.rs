use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const ANTHROPIC_DEFAULT_MAX_TOKENS: u32 = 1024;

/// Generic version tags understood by the adapter.
///
/// Resolution to a concrete vendor model string never fails: an unrecognized
/// tag degrades to the default model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelVersion {
    Claude4Opus,
    Claude4Sonnet,
    Claude37Sonnet,
    Claude35Sonnet,
    Claude35Haiku,
    Claude3Opus,
    Claude3Haiku,
}

impl Default for ModelVersion {
    fn default() -> Self {
        ModelVersion::Claude4Sonnet
    }
}

impl ModelVersion {
    /// Look up a version tag, falling back to the default model for tags this
    /// adapter does not recognize.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "claude-4-opus" => ModelVersion::Claude4Opus,
            "claude-4-sonnet" => ModelVersion::Claude4Sonnet,
            "claude-3-7-sonnet" => ModelVersion::Claude37Sonnet,
            "claude-3-5-sonnet" => ModelVersion::Claude35Sonnet,
            "claude-3-5-haiku" => ModelVersion::Claude35Haiku,
            "claude-3-opus" => ModelVersion::Claude3Opus,
            "claude-3-haiku" => ModelVersion::Claude3Haiku,
            _ => ModelVersion::default(),
        }
    }

    /// The concrete model identifier sent to the API.
    pub fn resolve(&self) -> &'static str {
        match self {
            ModelVersion::Claude4Opus => "claude-opus-4-0",
            ModelVersion::Claude4Sonnet => "claude-sonnet-4-0",
            ModelVersion::Claude37Sonnet => "claude-3-7-sonnet-latest",
            ModelVersion::Claude35Sonnet => "claude-3-5-sonnet-latest",
            ModelVersion::Claude35Haiku => "claude-3-5-haiku-latest",
            ModelVersion::Claude3Opus => "claude-3-opus-latest",
            ModelVersion::Claude3Haiku => "claude-3-haiku-20240307",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: ModelVersion,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl AnthropicProviderConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            host: ANTHROPIC_HOST.to_string(),
            api_key,
            model: ModelVersion::default(),
            max_tokens: ANTHROPIC_DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    /// Build a config from the ANTHROPIC_* environment variables.
    pub fn from_env() -> Result<Self> {
        let api_key =
            std::env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY is not set")?;
        let mut config = Self::new(api_key);

        if let Ok(host) = std::env::var("ANTHROPIC_HOST") {
            config.host = host;
        }
        if let Ok(tag) = std::env::var("ANTHROPIC_MODEL") {
            config.model = ModelVersion::from_tag(&tag);
        }
        if let Ok(max_tokens) = std::env::var("ANTHROPIC_MAX_TOKENS") {
            config.max_tokens = max_tokens
                .parse()
                .context("ANTHROPIC_MAX_TOKENS must be an integer")?;
        }

        Ok(config)
    }
}
