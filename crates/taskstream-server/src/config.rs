//! Command-line and environment configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::{Context, bail};
use clap::Parser;
use taskstream_core::{ApiProvider, ModelConfig, context};
use taskstream_executor::{CommandBuilder, ProcessAgentLoop};

/// Serve computer-use agent tasks over HTTP and WebSocket.
#[derive(Debug, Parser)]
#[command(name = "taskstream", version, about)]
pub struct Config {
    /// Address to bind.
    #[arg(long, env = "TASKSTREAM_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to bind.
    #[arg(long, short, env = "TASKSTREAM_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Command that runs the agent loop, one process per task.
    #[arg(long, env = "TASKSTREAM_AGENT_COMMAND", conflicts_with = "scripted")]
    pub agent_command: Option<String>,

    /// Replay a canned session instead of running an agent process.
    #[arg(long)]
    pub scripted: bool,

    #[arg(long, env = "TASKSTREAM_MODEL", default_value = context::DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, env = "TASKSTREAM_PROVIDER", default_value_t = ApiProvider::Anthropic)]
    pub provider: ApiProvider,

    #[arg(long, env = "TASKSTREAM_TOOL_VERSION", default_value = context::DEFAULT_TOOL_VERSION)]
    pub tool_version: String,

    #[arg(long, env = "TASKSTREAM_MAX_TOKENS", default_value_t = context::DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    /// Extra text appended to the agent's system prompt.
    #[arg(long, env = "TASKSTREAM_SYSTEM_PROMPT_SUFFIX", default_value = "")]
    pub system_prompt_suffix: String,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl Config {
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Model settings handed to every run.
    #[must_use]
    pub fn model_config(&self) -> ModelConfig {
        let config = ModelConfig {
            model: self.model.clone(),
            provider: self.provider,
            api_key: None,
            tool_version: self.tool_version.clone(),
            max_tokens: self.max_tokens,
            system_prompt_suffix: self.system_prompt_suffix.clone(),
        };
        match &self.api_key {
            Some(key) => config.with_api_key(key),
            None => config,
        }
    }

    /// Process-backed agent loop for the configured command.
    ///
    /// # Errors
    /// Fails if no agent command is set or it does not parse.
    pub fn process_agent(&self) -> anyhow::Result<ProcessAgentLoop> {
        let Some(command) = &self.agent_command else {
            bail!("no agent command configured; set TASKSTREAM_AGENT_COMMAND or pass --scripted");
        };
        let builder = CommandBuilder::new(command.as_str());
        builder
            .build()
            .with_context(|| format!("invalid agent command: {command}"))?;
        Ok(ProcessAgentLoop::new(builder))
    }
}
