//! Provider module
//!
//! This module contains the chat provider abstraction and the adapters
//! for Anthropic, OpenAI, Cerebras, and the local Ollama-compatible
//! endpoint.

pub mod anthropic;
pub mod base;
pub mod openai_compat;

pub use anthropic::AnthropicProvider;
pub use base::{
    format_file_size, validate_transcript, Attachment, ChatProvider, Citation, GenerationParams,
    Message, ProviderTurn, ReasoningEffort, TextStream, TokenUsage, ToolCall,
};
pub use openai_compat::OpenAiCompatProvider;

use crate::config::ProvidersConfig;
use crate::error::{Result, WorkdeskError};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The chat providers a request can select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Anthropic Messages API
    Anthropic,
    /// OpenAI chat completions
    OpenAi,
    /// Cerebras chat completions
    Cerebras,
    /// Local Ollama-compatible endpoint
    Local,
}

impl ProviderKind {
    /// Every selectable provider
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Anthropic,
        ProviderKind::OpenAi,
        ProviderKind::Cerebras,
        ProviderKind::Local,
    ];
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Cerebras => "cerebras",
            Self::Local => "local",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "cerebras" => Ok(Self::Cerebras),
            "local" => Ok(Self::Local),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// Create a provider instance based on configuration
///
/// # Arguments
///
/// * `kind` - Which provider to create
/// * `config` - Provider configuration section
///
/// # Returns
///
/// Returns a shared provider instance
///
/// # Errors
///
/// Returns error if provider initialization fails
///
/// # Examples
///
/// ```
/// use workdesk::config::ProvidersConfig;
/// use workdesk::providers::{create_provider, ProviderKind};
///
/// let config = ProvidersConfig::default();
/// let provider = create_provider(ProviderKind::Local, &config).unwrap();
/// assert_eq!(provider.name(), "local");
/// ```
pub fn create_provider(
    kind: ProviderKind,
    config: &ProvidersConfig,
) -> Result<Arc<dyn ChatProvider>> {
    let provider: Arc<dyn ChatProvider> = match kind {
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(config.anthropic.clone())?),
        ProviderKind::OpenAi => Arc::new(OpenAiCompatProvider::openai(config.openai.clone())?),
        ProviderKind::Cerebras => {
            Arc::new(OpenAiCompatProvider::cerebras(config.cerebras.clone())?)
        }
        ProviderKind::Local => Arc::new(OpenAiCompatProvider::local(config.local.clone())?),
    };
    Ok(provider)
}

/// Create a provider by name, for CLI and test call sites
///
/// # Errors
///
/// Returns error if the name is unknown or initialization fails
pub fn create_provider_by_name(
    name: &str,
    config: &ProvidersConfig,
) -> Result<Arc<dyn ChatProvider>> {
    let kind = ProviderKind::from_str(name)
        .map_err(WorkdeskError::Provider)?;
    create_provider(kind, config)
}
