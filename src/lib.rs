//! # multigenie
//!
//! A supervisor workflow that answers travel questions by routing them to
//! domain-specific Genie agents and synthesizing their replies.
//!
//! ## Features
//!
//! - **Task decomposition**: compound questions split into routed subtasks
//! - **Keyword and model routing**: subtasks by keyword score, single tasks by a structured model choice
//! - **Bounded loop**: an iteration cap and a repeat check guarantee termination
//! - **Link preservation**: URLs returned by workers survive into the final answer
//! - **Streaming**: produced messages are available as they are generated
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use multigenie::{ChatAgent, Message, SupervisorConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SupervisorConfig::from_env()?;
//!     let agent = ChatAgent::from_config(config)?;
//!
//!     let response = agent
//!         .predict(vec![Message::user("Vegan restaurants and a hotel in San Francisco?")])
//!         .await?;
//!     if let Some(answer) = response.answer() {
//!         println!("{}", answer.content);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agent;
pub mod config;
pub mod error;
pub mod llm_client;
pub mod message;
pub mod orchestrator;
pub mod serving;
pub mod state;
pub mod tracing_ext;
pub mod types;
pub mod workers;

#[cfg(test)]
#[allow(missing_docs)]
mod testing;

// Re-exports for convenience
pub use agent::{AgentResponse, ChatAgent, ResponseChunk};
pub use config::{GeniePollConfig, ModelConfig, SupervisorConfig, WorkerConfig, WorkspaceConfig};
pub use error::{Error, Result};
pub use llm_client::ChatModel;
pub use message::{Message, Role};
pub use orchestrator::{CompiledGraph, WorkflowGraph};
pub use serving::ServingClient;
pub use state::{ConversationState, Route, StateUpdate};
pub use tracing_ext::{init_tracing, NodeVisit, RunTrace};
pub use types::{RunId, TokenUsage};
pub use workers::{GenieWorker, Worker, WorkerKind, WorkerReply};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::agent::{AgentResponse, ChatAgent};
    pub use crate::config::SupervisorConfig;
    pub use crate::error::{Error, Result};
    pub use crate::llm_client::ChatModel;
    pub use crate::message::Message;
    pub use crate::workers::{Worker, WorkerKind};
    pub use crate::types::*;
}
