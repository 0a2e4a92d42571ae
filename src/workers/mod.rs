//! Worker agents and the node wrapper that invokes them
//!
//! A worker is an opaque data-retrieval agent: it receives the conversation
//! state and answers with one or more messages. The workflow only cares about
//! the content of the last one.

pub mod genie;

use crate::error::{Error, Result};
use crate::message::Message;
use crate::state::{ConversationState, StateUpdate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use genie::{GenieClient, GenieWorker};

/// The workers the supervisor can route to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    /// Google Maps restaurant data
    RestaurantsGenie,
    /// Booking.com hotel data
    HotelGenie,
    /// Airbnb rental data
    AirbnbGenie,
}

impl WorkerKind {
    /// All workers in routing order; keyword ties go to the earlier entry
    pub const ALL: [WorkerKind; 3] = [
        WorkerKind::RestaurantsGenie,
        WorkerKind::HotelGenie,
        WorkerKind::AirbnbGenie,
    ];

    /// Node name of this worker
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::RestaurantsGenie => "restaurants_genie",
            WorkerKind::HotelGenie => "hotel_genie",
            WorkerKind::AirbnbGenie => "airbnb_genie",
        }
    }

    /// Lowercase keywords used for subtask routing
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            WorkerKind::RestaurantsGenie => &[
                "restaurant",
                "food",
                "eat",
                "dining",
                "vegan",
                "vegetarian",
                "cuisine",
            ],
            WorkerKind::HotelGenie => &["hotel", "stay", "booking", "accommodation", "lodging"],
            WorkerKind::AirbnbGenie => &[
                "airbnb",
                "rental",
                "accessibility",
                "accessible",
                "apartment",
            ],
        }
    }

    /// Description shown to the routing model when none is configured
    pub fn default_description(&self) -> &'static str {
        match self {
            WorkerKind::RestaurantsGenie => {
                "This genie agent can answer questions using google map data. If this agent doesn't answer the question, try a different agent"
            }
            WorkerKind::HotelGenie => {
                "This genie agent can answer questions using Booking.com hotel data. If this agent doesn't answer the question, try a different agent"
            }
            WorkerKind::AirbnbGenie => {
                "This genie agent can answer questions using Airbnb rental data. If this agent doesn't answer the question, try a different agent"
            }
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        WorkerKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::invalid_input(format!("unknown worker: {}", s)))
    }
}

/// Messages produced by one worker invocation
#[derive(Debug, Clone, Default)]
pub struct WorkerReply {
    /// Produced messages; the last one carries the answer
    pub messages: Vec<Message>,
}

impl WorkerReply {
    /// Reply consisting of a single assistant message
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::assistant(content)],
        }
    }
}

/// A domain-specific data-retrieval agent
#[async_trait]
pub trait Worker: Send + Sync {
    /// Answer from the current conversation state
    async fn invoke(&self, state: &ConversationState) -> Result<WorkerReply>;
}

/// Collect `http://` and `https://` tokens, trimming trailing punctuation
///
/// Order follows first appearance and duplicates are kept.
pub fn extract_urls(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|word| word.starts_with("http://") || word.starts_with("https://"))
        .map(|word| {
            word.trim_end_matches(['.', ',', '!', '?', ')'])
                .to_string()
        })
        .collect()
}

/// Invoke a worker and turn its reply into one attributed assistant message
pub async fn run_worker_node(
    state: &ConversationState,
    worker: &dyn Worker,
    kind: WorkerKind,
) -> Result<StateUpdate> {
    let reply = worker.invoke(state).await?;
    let content = reply
        .messages
        .last()
        .map(|m| m.content.clone())
        .ok_or_else(|| Error::worker(kind.as_str(), "worker returned no messages"))?;

    let urls = extract_urls(&content);
    tracing::debug!(
        worker = kind.as_str(),
        content_len = content.len(),
        url_count = urls.len(),
        "worker replied"
    );

    Ok(StateUpdate::message(
        Message::from_worker(kind.as_str(), content, urls).with_new_id(),
    ))
}
