//! Worker routing
//!
//! Subtasks are routed by keyword scoring; whole conversations are routed by
//! a structured model choice over the bound workers and `FINISH`.

use crate::config::WorkerConfig;
use crate::error::Result;
use crate::llm_client::ChatModel;
use crate::message::Message;
use crate::state::{Route, FINISH};
use crate::workers::WorkerKind;

/// Chooses the next worker for the supervisor
#[derive(Debug, Clone)]
pub struct Router {
    workers: Vec<WorkerConfig>,
}

impl Router {
    /// Create a router over the bound workers, kept in routing order
    pub fn new(workers: &[WorkerConfig]) -> Self {
        let workers = WorkerKind::ALL
            .into_iter()
            .filter_map(|kind| workers.iter().find(|w| w.kind == kind).cloned())
            .collect();
        Self { workers }
    }

    /// Bound workers in routing order
    pub fn workers(&self) -> impl Iterator<Item = WorkerKind> + '_ {
        self.workers.iter().map(|w| w.kind)
    }

    /// Number of keywords of `kind` found in `text`
    pub fn score(kind: WorkerKind, text: &str) -> usize {
        let text = text.to_lowercase();
        kind.keywords()
            .iter()
            .filter(|keyword| text.contains(*keyword))
            .count()
    }

    /// Route one subtask by keyword score
    ///
    /// The strictly highest score wins and ties keep the earlier worker. A
    /// subtask matching no keywords finishes the run.
    pub fn route_subtask(&self, subtask: &str) -> Route {
        let mut best: Option<(WorkerKind, usize)> = None;
        for kind in self.workers() {
            let score = Self::score(kind, subtask);
            if score > best.map_or(0, |(_, s)| s) {
                best = Some((kind, score));
            }
        }

        match best {
            Some((kind, score)) => {
                tracing::debug!(worker = kind.as_str(), score, "subtask routed by keywords");
                Route::Worker(kind)
            }
            None => {
                tracing::debug!(subtask, "no worker keywords matched");
                Route::Finish
            }
        }
    }

    /// System prompt listing every bound worker
    pub fn system_prompt(&self) -> String {
        let descriptions = self
            .workers
            .iter()
            .map(|w| format!("- {}: {}", w.kind, w.description()))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Decide between routing between the following workers or ending the conversation if an answer is provided. \n{}",
            descriptions
        )
    }

    /// Allowed structured choices: `FINISH` followed by the bound workers
    pub fn options(&self) -> Vec<&'static str> {
        std::iter::once(FINISH)
            .chain(self.workers().map(|kind| kind.as_str()))
            .collect()
    }

    /// Route a whole conversation with a structured model choice
    pub async fn route_conversation(&self, model: &dyn ChatModel, messages: &[Message]) -> Result<Route> {
        let mut prompt = Vec::with_capacity(messages.len() + 1);
        prompt.push(Message::system(self.system_prompt()));
        prompt.extend_from_slice(messages);

        let choice = model.invoke_structured(&prompt, &self.options()).await?;
        let route: Route = choice.parse()?;
        tracing::debug!(route = %route, "conversation routed by model");
        Ok(route)
    }
}
