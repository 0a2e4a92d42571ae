//! Conversation state threaded through the workflow graph
//!
//! Nodes read a shared `&ConversationState` and return a [`StateUpdate`]; the
//! executor merges the update with append semantics for `messages` and
//! `subtask_results` and replace semantics for the scalar fields.

use crate::error::{Error, Result};
use crate::message::{Message, Role};
use crate::workers::WorkerKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire form of the finish sentinel
pub const FINISH: &str = "FINISH";

/// Supervisor decision: the next node to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Invoke a worker
    Worker(WorkerKind),
    /// Hand over to the final answer node
    Finish,
}

impl Route {
    /// Wire name of this route
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Worker(kind) => kind.as_str(),
            Route::Finish => FINISH,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Route {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == FINISH {
            return Ok(Route::Finish);
        }
        s.parse::<WorkerKind>().map(Route::Worker)
    }
}

impl Serialize for Route {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Route {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// State of one workflow run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    /// Append-only conversation
    pub messages: Vec<Message>,
    /// Node chosen by the supervisor on its last visit
    pub next_node: Option<Route>,
    /// Single-task supervisor visits recorded so far
    pub iteration_count: u32,
    /// Decomposed subtasks, set once per run
    pub subtasks: Option<Vec<String>>,
    /// Cursor into `subtasks`
    pub current_subtask_index: usize,
    /// One worker reply per completed subtask, in subtask order
    pub subtask_results: Vec<Message>,
}

impl ConversationState {
    /// Create a fresh state for an incoming request
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// Most recent user message
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    /// First message of the conversation (the original question)
    pub fn original_question(&self) -> Option<&Message> {
        self.messages.first()
    }

    /// Subtask currently being worked on, if the run was decomposed
    pub fn current_subtask(&self) -> Option<&str> {
        self.subtasks
            .as_ref()
            .and_then(|tasks| tasks.get(self.current_subtask_index))
            .map(String::as_str)
    }

    /// Merge a node's update into this state
    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);
        if let Some(next_node) = update.next_node {
            self.next_node = Some(next_node);
        }
        if let Some(count) = update.iteration_count {
            if count < self.iteration_count {
                tracing::warn!(
                    current = self.iteration_count,
                    proposed = count,
                    "ignoring iteration count decrease"
                );
            } else {
                self.iteration_count = count;
            }
        }
        if let Some(subtasks) = update.subtasks {
            if self.subtasks.is_some() {
                tracing::warn!("subtasks already recorded for this run; ignoring reassignment");
            } else {
                self.subtasks = Some(subtasks);
            }
        }
        if let Some(index) = update.current_subtask_index {
            self.current_subtask_index = index;
        }
        self.subtask_results.extend(update.subtask_results);
    }
}

/// Partial state returned by a node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    /// Messages to append
    pub messages: Vec<Message>,
    /// Replacement routing decision
    pub next_node: Option<Route>,
    /// Replacement iteration count
    pub iteration_count: Option<u32>,
    /// Subtask list to record
    pub subtasks: Option<Vec<String>>,
    /// Replacement subtask cursor
    pub current_subtask_index: Option<usize>,
    /// Subtask results to append
    pub subtask_results: Vec<Message>,
}

impl StateUpdate {
    /// Update that only routes to the final answer
    pub fn finish() -> Self {
        Self::route(Route::Finish)
    }

    /// Update that only sets the routing decision
    pub fn route(route: Route) -> Self {
        Self {
            next_node: Some(route),
            ..Default::default()
        }
    }

    /// Update that only appends one message
    pub fn message(message: Message) -> Self {
        Self {
            messages: vec![message],
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_wire_names() {
        assert_eq!(Route::Finish.to_string(), "FINISH");
        assert_eq!(
            "hotel_genie".parse::<Route>().unwrap(),
            Route::Worker(WorkerKind::HotelGenie)
        );
        assert!("finish".parse::<Route>().is_err());
    }

    #[test]
    fn test_route_serde() {
        let json = serde_json::to_value(Route::Worker(WorkerKind::AirbnbGenie)).unwrap();
        assert_eq!(json, serde_json::json!("airbnb_genie"));
        let back: Route = serde_json::from_value(serde_json::json!("FINISH")).unwrap();
        assert_eq!(back, Route::Finish);
    }

    #[test]
    fn test_apply_appends_and_replaces() {
        let mut state = ConversationState::new(vec![Message::user("q")]);
        state.apply(StateUpdate {
            messages: vec![Message::assistant("a")],
            next_node: Some(Route::Finish),
            iteration_count: Some(2),
            current_subtask_index: Some(1),
            subtask_results: vec![Message::assistant("r")],
            ..Default::default()
        });

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].content, "a");
        assert_eq!(state.next_node, Some(Route::Finish));
        assert_eq!(state.iteration_count, 2);
        assert_eq!(state.current_subtask_index, 1);
        assert_eq!(state.subtask_results.len(), 1);
    }

    #[test]
    fn test_subtasks_are_recorded_once() {
        let mut state = ConversationState::new(vec![Message::user("q")]);
        state.apply(StateUpdate {
            subtasks: Some(vec!["first".into()]),
            ..Default::default()
        });
        state.apply(StateUpdate {
            subtasks: Some(vec!["other".into(), "list".into()]),
            ..Default::default()
        });
        assert_eq!(state.subtasks, Some(vec!["first".to_string()]));
        assert_eq!(state.current_subtask(), Some("first"));
    }

    #[test]
    fn test_iteration_count_never_decreases() {
        let mut state = ConversationState::default();
        state.apply(StateUpdate {
            iteration_count: Some(2),
            ..Default::default()
        });
        state.apply(StateUpdate {
            iteration_count: Some(1),
            ..Default::default()
        });
        assert_eq!(state.iteration_count, 2);
    }

    #[test]
    fn test_last_user_message_skips_assistants() {
        let state = ConversationState::new(vec![
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second"),
            Message::assistant("reply 2"),
        ]);
        assert_eq!(state.last_user_message().unwrap().content, "second");
        assert_eq!(state.original_question().unwrap().content, "first");
    }
}
