//! Conversation message records

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message
    System,
    /// User message
    User,
    /// Assistant message
    Assistant,
}

impl Role {
    /// Wire name of this role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier assigned to messages produced by the workflow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
    /// Worker that produced this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Links extracted from the content, in order of appearance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            content: content.into(),
            name: None,
            urls: None,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create an assistant message attributed to a worker, with its extracted links
    pub fn from_worker(
        name: impl Into<String>,
        content: impl Into<String>,
        urls: Vec<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            urls: Some(urls),
            ..Self::assistant(content)
        }
    }

    /// Assign a fresh identifier
    pub fn with_new_id(mut self) -> Self {
        self.id = Some(Uuid::new_v4().to_string());
        self
    }

    /// Whether a worker produced this message
    pub fn is_from_worker(&self) -> bool {
        self.role == Role::Assistant && self.name.is_some()
    }

    /// Extracted links, empty when none were recorded
    pub fn links(&self) -> &[String] {
        self.urls.as_deref().unwrap_or(&[])
    }
}
