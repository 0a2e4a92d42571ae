//! Chat agent entry point wrapping the compiled workflow

use crate::config::SupervisorConfig;
use crate::error::{Error, Result};
use crate::message::{Message, Role};
use crate::orchestrator::graph::{CompiledGraph, WorkflowGraph};
use crate::state::ConversationState;
use crate::tracing_ext::RunTrace;
use crate::types::RunId;
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

/// Messages produced by one run, with its trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Produced messages in execution order
    pub messages: Vec<Message>,
    /// Node-level record of the run
    pub trace: RunTrace,
}

impl AgentResponse {
    /// The final answer, if the run produced one
    pub fn answer(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// One streamed message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseChunk {
    /// Message produced by a node
    pub delta: Message,
}

/// Question-answering agent backed by the supervisor workflow
pub struct ChatAgent {
    graph: CompiledGraph,
}

impl ChatAgent {
    /// Wrap a compiled graph
    pub fn new(graph: CompiledGraph) -> Self {
        Self { graph }
    }

    /// Build the agent against a workspace from configuration
    pub fn from_config(config: SupervisorConfig) -> Result<Self> {
        Ok(Self::new(WorkflowGraph::from_config(config)?))
    }

    /// Underlying graph
    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    fn initial_state(messages: Vec<Message>) -> Result<ConversationState> {
        if messages.is_empty() {
            return Err(Error::invalid_input("no messages supplied"));
        }
        if !messages.iter().any(|m| m.role == Role::User) {
            return Err(Error::invalid_input("conversation has no user message"));
        }
        Ok(ConversationState::new(messages))
    }

    /// Run the workflow and collect every produced message
    pub async fn predict(&self, messages: Vec<Message>) -> Result<AgentResponse> {
        let state = Self::initial_state(messages)?;
        let mut trace = RunTrace::new(RunId::new());
        let span = tracing::info_span!("predict", run_id = %trace.run_id);

        async {
            tracing::info!(input_messages = state.messages.len(), "run started");
            let mut produced = Vec::new();
            let mut events = self.graph.stream(state);
            while let Some(event) = events.next().await {
                let event = event?;
                produced.extend(event.update.messages);
                trace.record(event.visit);
            }
            trace.complete();
            tracing::info!(
                produced = produced.len(),
                visits = trace.visits.len(),
                "run finished"
            );
            Ok::<_, Error>(AgentResponse {
                messages: produced,
                trace,
            })
        }
        .instrument(span)
        .await
    }

    /// Run the workflow, yielding each produced message as its node completes
    ///
    /// The stream is finite and cannot be restarted. Invalid input surfaces as
    /// its single item.
    pub fn predict_stream(&self, messages: Vec<Message>) -> BoxStream<'_, Result<ResponseChunk>> {
        let state = match Self::initial_state(messages) {
            Ok(state) => state,
            Err(e) => return futures::stream::once(async move { Err(e) }).boxed(),
        };
        let run_id = RunId::new();
        tracing::info!(run_id = %run_id, "streaming run started");

        self.graph
            .stream(state)
            .flat_map(|event| {
                let chunks: Vec<Result<ResponseChunk>> = match event {
                    Ok(event) => event
                        .update
                        .messages
                        .into_iter()
                        .map(|delta| Ok(ResponseChunk { delta }))
                        .collect(),
                    Err(e) => vec![Err(e)],
                };
                futures::stream::iter(chunks)
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{WorkerConfig, WorkspaceConfig};
    use crate::orchestrator::decomposer::SINGLE_TASK;
    use crate::testing::{FailingWorker, ScriptedModel, ScriptedWorker};
    use crate::workers::WorkerKind;
    use futures::TryStreamExt;
    use std::sync::Arc;
    use url::Url;

    fn agent(model: ScriptedModel, hotel: Arc<dyn crate::workers::Worker>) -> ChatAgent {
        let workspace = WorkspaceConfig::new(Url::parse("https://workspace.example").unwrap(), "t");
        let config = SupervisorConfig::new(
            workspace,
            vec![
                WorkerConfig::new(WorkerKind::RestaurantsGenie, "r"),
                WorkerConfig::new(WorkerKind::HotelGenie, "h"),
            ],
        );
        let graph = WorkflowGraph::builder(config)
            .model(Arc::new(model))
            .worker(
                WorkerKind::RestaurantsGenie,
                Arc::new(ScriptedWorker::always("Greens https://food.example/greens")),
            )
            .worker(WorkerKind::HotelGenie, hotel)
            .compile()
            .unwrap();
        ChatAgent::new(graph)
    }

    fn trip_model() -> ScriptedModel {
        ScriptedModel::new()
            .with_reply("1. Find vegan restaurants\n2. Find a hotel to stay")
            .with_reply("Eat at Greens, sleep at the Grand.")
    }

    #[tokio::test]
    async fn test_predict_collects_produced_messages() {
        let agent = agent(
            trip_model(),
            Arc::new(ScriptedWorker::always("The Grand https://hotel.example/grand")),
        );

        let response = agent
            .predict(vec![Message::user("Vegan food and a hotel in SF?")])
            .await
            .unwrap();

        let names: Vec<_> = response.messages.iter().map(|m| m.name.as_deref()).collect();
        assert_eq!(names, vec![Some("restaurants_genie"), Some("hotel_genie"), None]);
        let answer = response.answer().unwrap();
        assert!(answer.content.starts_with("Eat at Greens, sleep at the Grand."));
        assert!(answer.content.contains("https://hotel.example/grand"));

        assert_eq!(
            response.trace.path(),
            vec![
                "supervisor",
                "restaurants_genie",
                "supervisor",
                "hotel_genie",
                "supervisor",
                "final_answer",
            ]
        );
        assert_eq!(response.trace.supervisor_visits(), 3);
        assert!(response.trace.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_predict_stream_yields_messages_in_order() {
        let agent = agent(
            trip_model(),
            Arc::new(ScriptedWorker::always("The Grand https://hotel.example/grand")),
        );

        let chunks: Vec<ResponseChunk> = agent
            .predict_stream(vec![Message::user("Vegan food and a hotel in SF?")])
            .try_collect()
            .await
            .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].delta.name.as_deref(), Some("restaurants_genie"));
        assert_eq!(chunks[1].delta.name.as_deref(), Some("hotel_genie"));
        assert_eq!(chunks[2].delta.role, Role::Assistant);
        assert!(chunks.iter().all(|c| c.delta.id.is_some()));
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let agent = agent(ScriptedModel::new(), Arc::new(ScriptedWorker::always("x")));

        assert!(matches!(agent.predict(vec![]).await, Err(Error::InvalidInput(_))));
        assert!(matches!(
            agent.predict(vec![Message::system("be nice")]).await,
            Err(Error::InvalidInput(_))
        ));

        let items: Vec<_> = agent.predict_stream(vec![]).collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_worker_failure_ends_the_stream_with_an_error() {
        let items: Vec<_> = failing_hotel()
            .predict_stream(vec![Message::user("Best hotel?")])
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::Worker { .. })));

        let result = failing_hotel().predict(vec![Message::user("Best hotel?")]).await;
        assert!(matches!(result, Err(Error::Worker { .. })));
    }

    fn failing_hotel() -> ChatAgent {
        agent(
            ScriptedModel::new().with_reply(SINGLE_TASK).with_choice("hotel_genie"),
            Arc::new(FailingWorker),
        )
    }
}
