//! Task decomposition
//!
//! Asks the model whether a question splits into independent subtasks, one
//! per data source, or can be answered by a single worker.

use crate::error::Result;
use crate::llm_client::ChatModel;
use crate::message::Message;

/// Sentinel the model emits when no decomposition is needed
pub const SINGLE_TASK: &str = "SINGLE_TASK";

/// Prefix of template lines the model sometimes echoes back
const ECHO_PREFIX: &str = "Input:";

const BREAKDOWN_PROMPT: &str = r#"Break down this question into specific subtasks for different agents. Each subtask should focus on
one specific type of information (Airbnb, restaurant, or hotel data). If the question only needs one type of information,
return 'SINGLE_TASK'.

Examples:
Input: "Tell me some airbnb with accessibility in San francisco. Also provide me recommendation of some restaurants with vegan option"
Output:
1. Find Airbnb listings in San Francisco that have accessibility features
2. Search for restaurants in San Francisco that offer vegan options

Input: "What are the best Italian restaurants in the city?"
Output: SINGLE_TASK

Current question: {question}
Output:"#;

/// Outcome of decomposing a question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decomposition {
    /// One worker can answer the whole question
    SingleTask,
    /// Ordered, non-empty subtask descriptions
    Subtasks(Vec<String>),
}

/// Build the decomposition prompt for `question`
pub fn breakdown_prompt(question: &str) -> String {
    BREAKDOWN_PROMPT.replace("{question}", question)
}

/// Interpret a raw decomposition reply
///
/// A reply with no usable lines is treated as a single task.
pub fn parse_decomposition(raw: &str) -> Decomposition {
    let raw = raw.trim();
    if raw == SINGLE_TASK {
        return Decomposition::SingleTask;
    }

    let subtasks: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(ECHO_PREFIX))
        .map(str::to_string)
        .collect();

    if subtasks.is_empty() {
        Decomposition::SingleTask
    } else {
        Decomposition::Subtasks(subtasks)
    }
}

/// Ask the model to decompose `question`
pub async fn decompose(model: &dyn ChatModel, question: &str) -> Result<Decomposition> {
    let reply = model.invoke(&[Message::user(breakdown_prompt(question))]).await?;
    let decomposition = parse_decomposition(&reply);
    match &decomposition {
        Decomposition::SingleTask => tracing::debug!("question needs a single worker"),
        Decomposition::Subtasks(tasks) => {
            tracing::debug!(count = tasks.len(), "question decomposed into subtasks")
        }
    }
    Ok(decomposition)
}
