//! Final answer node

use crate::error::Result;
use crate::llm_client::ChatModel;
use crate::message::Message;
use crate::state::{ConversationState, StateUpdate};
use std::sync::Arc;

const SYNTHESIS_PROMPT: &str = "Synthesize a complete answer from the following subtask results.
Make sure to include all relevant links and URLs in your response.
Combine the information coherently to answer the original user question:
Original Question: {original_question}
Subtasks and Results:
{subtask_results}
";

const SINGLE_TASK_PROMPT: &str = "Using only the content in the messages, respond to the previous user question using the answer given by the other assistant messages.";

/// Produces the user-facing answer at the end of a run
pub struct Synthesizer {
    model: Arc<dyn ChatModel>,
}

impl Synthesizer {
    /// Create a synthesizer
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Build the final instruction for `state`
    pub fn prompt(state: &ConversationState) -> String {
        if state.subtask_results.is_empty() {
            return SINGLE_TASK_PROMPT.to_string();
        }

        let subtasks = state.subtasks.as_deref().unwrap_or_default();
        let sections = subtasks
            .iter()
            .zip(&state.subtask_results)
            .enumerate()
            .map(|(i, (task, result))| {
                let mut section = format!("Subtask {}: {}\nResult: {}", i + 1, task, result.content);
                if !result.links().is_empty() {
                    section.push_str("\nRelevant links: ");
                    section.push_str(&result.links().join(", "));
                }
                section
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let original_question = state
            .original_question()
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        SYNTHESIS_PROMPT
            .replace("{original_question}", original_question)
            .replace("{subtask_results}", &sections)
    }

    /// Links gathered from the subtask results, first occurrence only
    pub fn collected_links(state: &ConversationState) -> Vec<String> {
        let mut links: Vec<String> = Vec::new();
        for link in state.subtask_results.iter().flat_map(|r| r.links()) {
            if !links.contains(link) {
                links.push(link.clone());
            }
        }
        links
    }

    /// Generate the final answer message
    pub async fn run(&self, state: &ConversationState) -> Result<StateUpdate> {
        let mut messages = state.messages.clone();
        messages.push(Message::user(Self::prompt(state)));

        let mut answer = self.model.invoke(&messages).await?;

        let missing: Vec<String> = Self::collected_links(state)
            .into_iter()
            .filter(|link| !answer.contains(link.as_str()))
            .collect();
        if !missing.is_empty() {
            tracing::debug!(count = missing.len(), "appending links dropped by the model");
            answer.push_str("\n\nRelevant links: ");
            answer.push_str(&missing.join(", "));
        }

        tracing::info!(
            subtasks = state.subtask_results.len(),
            answer_len = answer.len(),
            "final answer ready"
        );
        Ok(StateUpdate::message(Message::assistant(answer).with_new_id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::testing::ScriptedModel;

    fn multi_task_state() -> ConversationState {
        let mut state = ConversationState::new(vec![
            Message::user("Accessible airbnb and vegan restaurants in SF?"),
            Message::from_worker("airbnb_genie", "Loft", vec!["https://air.example/1".into()]),
            Message::from_worker("restaurants_genie", "Greens", vec!["https://food.example/2".into()]),
        ]);
        state.subtasks = Some(vec![
            "Find accessible airbnb listings".into(),
            "Find vegan restaurants".into(),
        ]);
        state.subtask_results = state.messages[1..].to_vec();
        state
    }

    #[test]
    fn test_multi_task_prompt_lists_subtasks_and_links() {
        let prompt = Synthesizer::prompt(&multi_task_state());
        assert!(prompt.contains("Original Question: Accessible airbnb and vegan restaurants in SF?"));
        assert!(prompt.contains(
            "Subtask 1: Find accessible airbnb listings\nResult: Loft\nRelevant links: https://air.example/1"
        ));
        assert!(prompt.contains("Subtask 2: Find vegan restaurants\nResult: Greens"));
        assert!(prompt.contains("https://food.example/2"));
    }

    #[test]
    fn test_results_without_links_omit_link_line() {
        let mut state = multi_task_state();
        state.subtask_results[0].urls = Some(vec![]);
        let prompt = Synthesizer::prompt(&state);
        assert!(prompt.contains("Result: Loft\n\nSubtask 2"));
    }

    #[test]
    fn test_single_task_prompt() {
        let state = ConversationState::new(vec![Message::user("hotels?")]);
        assert_eq!(Synthesizer::prompt(&state), SINGLE_TASK_PROMPT);
    }

    #[tokio::test]
    async fn test_final_answer_references_every_link() {
        let model = Arc::new(ScriptedModel::new().with_reply("Stay at the Loft (https://air.example/1)."));
        let synthesizer = Synthesizer::new(model.clone());

        let update = synthesizer.run(&multi_task_state()).await.unwrap();

        assert_eq!(update.messages.len(), 1);
        let answer = &update.messages[0];
        assert_eq!(answer.role, Role::Assistant);
        assert!(answer.content.contains("https://air.example/1"));
        assert!(answer.content.contains("https://food.example/2"));
        assert_eq!(answer.content.matches("https://air.example/1").count(), 1);

        let calls = model.calls();
        let sent = &calls[0];
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[3].role, Role::User);
        assert!(sent[3].content.starts_with("Synthesize a complete answer"));
    }

    #[tokio::test]
    async fn test_single_task_answer_is_appended_verbatim() {
        let model = Arc::new(ScriptedModel::new().with_reply("The Grand is best."));
        let synthesizer = Synthesizer::new(model);
        let state = ConversationState::new(vec![
            Message::user("best hotel?"),
            Message::from_worker("hotel_genie", "The Grand", vec![]),
        ]);

        let update = synthesizer.run(&state).await.unwrap();
        assert_eq!(update.messages[0].content, "The Grand is best.");
        assert!(update.next_node.is_none());
    }
}
