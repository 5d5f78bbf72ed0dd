//! Model configuration handed to the agent loop on every run.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20240620";

/// Default computer-use tool version.
pub const DEFAULT_TOOL_VERSION: &str = "computer_use_20241022";

/// Default output token limit per sampling step.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Model API provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiProvider {
    #[default]
    Anthropic,
    Bedrock,
    Vertex,
}

impl fmt::Display for ApiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Anthropic => "anthropic",
            Self::Bedrock => "bedrock",
            Self::Vertex => "vertex",
        })
    }
}

impl FromStr for ApiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "bedrock" => Ok(Self::Bedrock),
            "vertex" => Ok(Self::Vertex),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Sampling settings shared by every run of a task manager.
///
/// The API key is never serialized; adapters pass it out of band.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model: String,
    #[serde(default)]
    pub provider: ApiProvider,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub tool_version: String,
    pub max_tokens: u32,
    #[serde(default)]
    pub system_prompt_suffix: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            provider: ApiProvider::default(),
            api_key: None,
            tool_version: DEFAULT_TOOL_VERSION.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt_suffix: String::new(),
        }
    }
}

impl ModelConfig {
    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("tool_version", &self.tool_version)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt_suffix", &self.system_prompt_suffix)
            .finish()
    }
}
