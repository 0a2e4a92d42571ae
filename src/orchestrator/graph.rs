//! Graph assembly and execution
//!
//! The topology is fixed: `supervisor` is the entry point, every worker
//! reports back to `supervisor`, `supervisor` branches on its `next_node`
//! decision to a worker or to `final_answer`, and `final_answer` ends the run.

use crate::config::SupervisorConfig;
use crate::error::{Error, Result};
use crate::llm_client::ChatModel;
use crate::orchestrator::router::Router;
use crate::orchestrator::supervisor::Supervisor;
use crate::orchestrator::synthesizer::Synthesizer;
use crate::serving::ServingClient;
use crate::state::{ConversationState, Route, StateUpdate};
use crate::tracing_ext::NodeVisit;
use crate::workers::{run_worker_node, GenieWorker, Worker, WorkerKind};
use chrono::Utc;
use futures::stream::{BoxStream, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// A node of the workflow graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    /// Orchestration node and entry point
    Supervisor,
    /// A worker agent
    Worker(WorkerKind),
    /// Synthesis node, the only exit
    FinalAnswer,
}

impl Node {
    /// Node name
    pub fn as_str(&self) -> &'static str {
        match self {
            Node::Supervisor => "supervisor",
            Node::Worker(kind) => kind.as_str(),
            Node::FinalAnswer => "final_answer",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one node execution
#[derive(Debug, Clone)]
pub struct NodeEvent {
    /// Node that ran
    pub node: Node,
    /// State update it produced
    pub update: StateUpdate,
    /// Timing of the visit
    pub visit: NodeVisit,
}

/// Entry point for assembling a workflow
pub struct WorkflowGraph;

impl WorkflowGraph {
    /// Start building a graph for `config`
    pub fn builder(config: SupervisorConfig) -> WorkflowGraphBuilder {
        WorkflowGraphBuilder {
            config,
            model: None,
            workers: HashMap::new(),
        }
    }

    /// Build a graph with a serving-endpoint model and Genie workers
    pub fn from_config(config: SupervisorConfig) -> Result<CompiledGraph> {
        let model = ServingClient::new(config.workspace.clone(), config.model.clone())?;
        let mut builder = Self::builder(config.clone()).model(Arc::new(model));
        for worker in &config.workers {
            let genie = GenieWorker::from_config(worker, &config.workspace, &config.genie)?;
            builder = builder.worker(worker.kind, Arc::new(genie));
        }
        builder.compile()
    }
}

/// Builder binding the model and workers into the fixed topology
pub struct WorkflowGraphBuilder {
    config: SupervisorConfig,
    model: Option<Arc<dyn ChatModel>>,
    workers: HashMap<WorkerKind, Arc<dyn Worker>>,
}

impl WorkflowGraphBuilder {
    /// Set the chat model used by the supervisor and the final answer node
    pub fn model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Bind a worker node
    pub fn worker(mut self, kind: WorkerKind, worker: Arc<dyn Worker>) -> Self {
        self.workers.insert(kind, worker);
        self
    }

    /// Check the wiring and produce an executable graph
    pub fn compile(self) -> Result<CompiledGraph> {
        self.config.validate()?;
        let model = self
            .model
            .ok_or_else(|| Error::config("a chat model must be bound before compiling"))?;

        for worker in &self.config.workers {
            if !self.workers.contains_key(&worker.kind) {
                return Err(Error::config(format!("worker {} is configured but not bound", worker.kind)));
            }
        }
        for kind in self.workers.keys() {
            if self.config.worker(*kind).is_none() {
                return Err(Error::config(format!("worker {} is bound but not configured", kind)));
            }
        }

        let router = Router::new(&self.config.workers);
        Ok(CompiledGraph {
            supervisor: Supervisor::new(model.clone(), router, self.config.max_iterations),
            synthesizer: Synthesizer::new(model),
            workers: self.workers,
            recursion_limit: self.config.recursion_limit,
        })
    }
}

/// An executable workflow
pub struct CompiledGraph {
    supervisor: Supervisor,
    synthesizer: Synthesizer,
    workers: HashMap<WorkerKind, Arc<dyn Worker>>,
    recursion_limit: usize,
}

impl CompiledGraph {
    /// Node names in routing order, entry first
    pub fn nodes(&self) -> Vec<Node> {
        std::iter::once(Node::Supervisor)
            .chain(self.supervisor.router().workers().map(Node::Worker))
            .chain(std::iter::once(Node::FinalAnswer))
            .collect()
    }

    /// Mermaid flowchart of the topology
    pub fn to_mermaid(&self) -> String {
        let mut lines = vec![
            "graph TD".to_string(),
            "    __start__ --> supervisor".to_string(),
        ];
        for kind in self.supervisor.router().workers() {
            lines.push(format!("    supervisor -. {} .-> {}", kind, kind));
            lines.push(format!("    {} --> supervisor", kind));
        }
        lines.push("    supervisor -. FINISH .-> final_answer".to_string());
        lines.push("    final_answer --> __end__".to_string());
        lines.join("\n")
    }

    fn successor(&self, node: Node, state: &ConversationState) -> Option<Node> {
        match node {
            Node::Supervisor => match state.next_node {
                Some(Route::Worker(kind)) => Some(Node::Worker(kind)),
                Some(Route::Finish) | None => Some(Node::FinalAnswer),
            },
            Node::Worker(_) => Some(Node::Supervisor),
            Node::FinalAnswer => None,
        }
    }

    /// Node visits allowed before the run is handed to `final_answer`
    ///
    /// A decomposed run needs two visits per subtask plus the opening
    /// supervisor visit and the final answer, so the cap never cuts it short.
    fn visit_limit(&self, state: &ConversationState) -> usize {
        let planned = state.subtasks.as_ref().map_or(0, |tasks| 2 * tasks.len() + 2);
        self.recursion_limit.max(planned)
    }

    async fn execute(&self, node: Node, state: &ConversationState) -> Result<StateUpdate> {
        match node {
            Node::Supervisor => self.supervisor.step(state).await,
            Node::Worker(kind) => {
                let worker = self
                    .workers
                    .get(&kind)
                    .ok_or_else(|| Error::worker(kind.as_str(), "worker is not bound in this graph"))?;
                run_worker_node(state, worker.as_ref(), kind).await
            }
            Node::FinalAnswer => self.synthesizer.run(state).await,
        }
    }

    /// Run the graph, yielding each node's output as it completes
    ///
    /// The stream is finite and runs one node at a time; dropping it stops
    /// the run before the next node starts.
    pub fn stream(&self, initial: ConversationState) -> BoxStream<'_, Result<NodeEvent>> {
        async_stream::try_stream! {
            let mut state = initial;
            let mut node = Node::Supervisor;
            let mut visits = 0usize;

            loop {
                let limit = self.visit_limit(&state);
                if visits >= limit && node != Node::FinalAnswer {
                    tracing::warn!(limit, skipped = %node, "visit limit reached, answering from accumulated state");
                    node = Node::FinalAnswer;
                }
                visits += 1;

                let started_at = Utc::now();
                let timer = Instant::now();
                let update = self.execute(node, &state).await?;
                let visit = NodeVisit {
                    node: node.as_str().to_string(),
                    started_at,
                    duration_ms: timer.elapsed().as_millis() as u64,
                    messages_emitted: update.messages.len(),
                    decision: match node {
                        Node::Supervisor => update.next_node,
                        _ => None,
                    },
                };
                tracing::debug!(node = %node, duration_ms = visit.duration_ms, "node finished");

                state.apply(update.clone());
                yield NodeEvent { node, update, visit };

                match self.successor(node, &state) {
                    Some(next) => node = next,
                    None => break,
                }
            }
        }
        .boxed()
    }

    /// Run the graph to completion and return the final state
    pub async fn invoke(&self, initial: ConversationState) -> Result<ConversationState> {
        let mut state = initial.clone();
        let mut events = self.stream(initial);
        while let Some(event) = events.next().await {
            state.apply(event?.update);
        }
        Ok(state)
    }
}
