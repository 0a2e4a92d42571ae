//! Supervisor node
//!
//! Decides after every worker turn what runs next. A run either decomposes
//! into subtasks, which are routed one by one by keyword score, or stays a
//! single task routed by the model over the whole conversation. Two rules
//! keep the loop finite: the iteration bound, and finishing when the model
//! picks the same worker twice in a row.

use crate::error::{Error, Result};
use crate::llm_client::ChatModel;
use crate::orchestrator::decomposer::{decompose, Decomposition};
use crate::orchestrator::router::Router;
use crate::state::{ConversationState, Route, StateUpdate};
use std::sync::Arc;

/// The orchestration node of the graph
pub struct Supervisor {
    model: Arc<dyn ChatModel>,
    router: Router,
    max_iterations: u32,
}

impl Supervisor {
    /// Create a supervisor
    pub fn new(model: Arc<dyn ChatModel>, router: Router, max_iterations: u32) -> Self {
        Self {
            model,
            router,
            max_iterations,
        }
    }

    /// Router used for both routing modes
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Run one supervisor visit
    pub async fn step(&self, state: &ConversationState) -> Result<StateUpdate> {
        let count = state.iteration_count + 1;
        if count > self.max_iterations {
            tracing::warn!(
                max_iterations = self.max_iterations,
                "iteration bound reached, finishing"
            );
            return Ok(StateUpdate::finish());
        }

        match &state.subtasks {
            None => {
                let question = state
                    .last_user_message()
                    .ok_or_else(|| Error::invalid_input("conversation has no user message"))?;

                if let Decomposition::Subtasks(subtasks) =
                    decompose(self.model.as_ref(), &question.content).await?
                {
                    return Ok(self.start_subtasks(subtasks));
                }
            }
            Some(subtasks) => return Ok(self.advance_subtasks(state, subtasks)),
        }

        self.route_single(state, count).await
    }

    fn start_subtasks(&self, subtasks: Vec<String>) -> StateUpdate {
        let route = self.router.route_subtask(&subtasks[0]);
        tracing::info!(count = subtasks.len(), first = %route, "routing first subtask");

        StateUpdate {
            next_node: Some(route),
            subtasks: Some(subtasks),
            current_subtask_index: Some(0),
            ..Default::default()
        }
    }

    fn advance_subtasks(&self, state: &ConversationState, subtasks: &[String]) -> StateUpdate {
        let mut update = StateUpdate::default();

        // Only a worker turn completes a subtask
        if let Some(last) = state.messages.last().filter(|m| m.is_from_worker()) {
            update.subtask_results.push(last.clone());
        }

        let next_index = state.current_subtask_index + 1;
        update.current_subtask_index = Some(next_index);
        update.next_node = Some(match subtasks.get(next_index) {
            Some(subtask) => {
                let route = self.router.route_subtask(subtask);
                tracing::info!(index = next_index, route = %route, "routing next subtask");
                route
            }
            None => {
                tracing::info!(completed = subtasks.len(), "all subtasks complete");
                Route::Finish
            }
        });
        update
    }

    async fn route_single(&self, state: &ConversationState, count: u32) -> Result<StateUpdate> {
        let route = self
            .router
            .route_conversation(self.model.as_ref(), &state.messages)
            .await?;

        if state.next_node == Some(route) {
            tracing::info!(route = %route, "same worker chosen twice, finishing");
            return Ok(StateUpdate::finish());
        }

        tracing::info!(route = %route, iteration = count, "single task routed");
        Ok(StateUpdate {
            next_node: Some(route),
            iteration_count: Some(count),
            ..Default::default()
        })
    }
}
