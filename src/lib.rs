//! Workdesk - workspace file manager and AI chat assistant server
//!
//! This library provides the core functionality for the Workdesk server:
//! a user-scoped file manager over an object storage backend and a
//! multi-provider LLM chat assistant driven by one shared tool-calling
//! orchestration loop.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `chat`: Chat turn types, system prompt assembly, and the bounded
//!   tool-calling orchestration loop
//! - `providers`: Chat provider abstraction and implementations
//!   (Anthropic, OpenAI, Cerebras, local Ollama-compatible endpoint)
//! - `tools`: Tool schemas, outcomes, registry, and the built-in catalog
//! - `files`: File manager, filename sanitization, and object storage
//!   backends
//! - `sessions`: Chat session models, repository backends, and the
//!   eviction policy
//! - `auth`: Session-token verification
//! - `server`: The axum HTTP surface
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use workdesk::chat::{ChatRequest, Orchestrator};
//! use workdesk::config::Config;
//! use workdesk::providers::{create_provider, ProviderKind};
//! use workdesk::tools::ToolRegistry;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let provider = create_provider(ProviderKind::Local, &config.providers)?;
//!     let tools = Arc::new(ToolRegistry::with_builtins());
//!     let orchestrator = Orchestrator::new(provider, tools, &config.chat)?;
//!
//!     let outcome = orchestrator
//!         .run(&ChatRequest {
//!             message: "What time is it in UTC?".to_string(),
//!             ..ChatRequest::default()
//!         })
//!         .await?;
//!     println!("{}", outcome.message);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod files;
pub mod metrics;
pub mod providers;
pub mod server;
pub mod sessions;
pub mod tools;

// Re-export commonly used types
pub use chat::{ChatOutcome, ChatRequest, Orchestrator};
pub use config::Config;
pub use error::{Result, WorkdeskError};
pub use providers::{ChatProvider, ProviderKind};
pub use tools::ToolRegistry;
