//! Orchestrator module - supervisor workflow over domain workers
//!
//! The workflow is a fixed graph: a supervisor decides which worker answers
//! next, workers report back to the supervisor, and a final answer node
//! synthesizes the reply once the supervisor finishes.
//!
//! # Example
//!
//! ```rust,ignore
//! use multigenie::orchestrator::WorkflowGraph;
//!
//! let graph = WorkflowGraph::builder(config)
//!     .model(model)
//!     .worker(WorkerKind::HotelGenie, hotel)
//!     .compile()?;
//! let state = graph.invoke(ConversationState::new(messages)).await?;
//! ```

pub mod decomposer;
pub mod graph;
pub mod router;
pub mod supervisor;
pub mod synthesizer;

// Re-exports
pub use decomposer::{decompose, Decomposition, SINGLE_TASK};
pub use graph::{CompiledGraph, Node, NodeEvent, WorkflowGraph, WorkflowGraphBuilder};
pub use router::Router;
pub use supervisor::Supervisor;
pub use synthesizer::Synthesizer;
