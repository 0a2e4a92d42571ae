//! Scripted model and worker fakes for unit tests

use crate::error::{Error, Result};
use crate::llm_client::ChatModel;
use crate::message::Message;
use crate::state::ConversationState;
use crate::workers::{Worker, WorkerReply};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Chat model answering from queued replies
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    choices: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Vec<Message>>>,
    structured_calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `invoke`
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.replies.lock().push_back(reply.into());
        self
    }

    /// Queue a choice for `invoke_structured`
    pub fn with_choice(self, choice: impl Into<String>) -> Self {
        self.choices.lock().push_back(choice.into());
        self
    }

    /// Conversations passed to `invoke`
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().clone()
    }

    /// Conversations passed to `invoke_structured`
    pub fn structured_calls(&self) -> Vec<Vec<Message>> {
        self.structured_calls.lock().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn invoke(&self, messages: &[Message]) -> Result<String> {
        self.calls.lock().push(messages.to_vec());
        self.replies
            .lock()
            .pop_front()
            .ok_or_else(|| Error::model("no scripted reply left"))
    }

    async fn invoke_structured(&self, messages: &[Message], choices: &[&str]) -> Result<String> {
        self.structured_calls.lock().push(messages.to_vec());
        let choice = self
            .choices
            .lock()
            .pop_front()
            .ok_or_else(|| Error::model("no scripted choice left"))?;
        if !choices.contains(&choice.as_str()) {
            return Err(Error::structured_output(format!("{} not in {:?}", choice, choices)));
        }
        Ok(choice)
    }

    fn client_type(&self) -> &str {
        "scripted"
    }
}

/// Worker answering from queued replies, then from an optional fallback
#[derive(Default)]
pub struct ScriptedWorker {
    replies: Mutex<VecDeque<WorkerReply>>,
    fallback: Option<String>,
    states: Mutex<Vec<ConversationState>>,
}

impl ScriptedWorker {
    pub fn new(replies: Vec<WorkerReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    /// Worker that always answers with `text`
    pub fn always(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(text.into()),
            ..Default::default()
        }
    }

    /// Number of invocations so far
    pub fn call_count(&self) -> usize {
        self.states.lock().len()
    }

    /// States the worker was invoked with
    pub fn states(&self) -> Vec<ConversationState> {
        self.states.lock().clone()
    }
}

#[async_trait]
impl Worker for ScriptedWorker {
    async fn invoke(&self, state: &ConversationState) -> Result<WorkerReply> {
        self.states.lock().push(state.clone());
        if let Some(reply) = self.replies.lock().pop_front() {
            return Ok(reply);
        }
        self.fallback
            .as_ref()
            .map(WorkerReply::text)
            .ok_or_else(|| Error::worker("scripted", "no scripted reply left"))
    }
}

/// Worker that always fails
pub struct FailingWorker;

#[async_trait]
impl Worker for FailingWorker {
    async fn invoke(&self, _state: &ConversationState) -> Result<WorkerReply> {
        Err(Error::worker("failing", "backend unavailable"))
    }
}
