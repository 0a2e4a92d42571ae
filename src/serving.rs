//! Model serving client for OpenAI-compatible chat endpoints
//!
//! Requests go to `{host}/serving-endpoints/{endpoint}/invocations`.
//! Structured calls attach a JSON-schema `response_format` and validate the
//! parsed reply against the same schema before handing it to the caller.

use crate::config::{ModelConfig, WorkspaceConfig};
use crate::error::{Error, Result};
use crate::llm_client::ChatModel;
use crate::message::{Message, Role};
use crate::types::TokenUsage;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Property name carrying the structured choice
const CHOICE_FIELD: &str = "next_node";

/// Client for a chat model served behind a workspace endpoint
pub struct ServingClient {
    /// HTTP client
    client: Client,
    /// Workspace host and token
    workspace: WorkspaceConfig,
    /// Endpoint and sampling settings
    model: ModelConfig,
    /// Tokens consumed by this client so far
    usage: Mutex<TokenUsage>,
}

impl ServingClient {
    /// Create a new serving client
    pub fn new(workspace: WorkspaceConfig, model: ModelConfig) -> Result<Self> {
        let client = Client::builder().timeout(model.timeout()).build()?;

        Ok(Self {
            client,
            workspace,
            model,
            usage: Mutex::new(TokenUsage::default()),
        })
    }

    /// Invocation URL of the configured endpoint
    pub fn invocations_url(&self) -> String {
        self.workspace
            .endpoint_url(&format!("serving-endpoints/{}/invocations", self.model.endpoint))
    }

    /// Tokens consumed so far
    pub fn total_usage(&self) -> TokenUsage {
        *self.usage.lock()
    }

    /// Send a completion request
    pub async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let response = self
            .client
            .post(self.invocations_url())
            .bearer_auth(self.workspace.token())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::model(format!(
                "Request to {} failed with status {}: {}",
                self.model.endpoint, status, error_text
            )));
        }

        let completion: CompletionResponse = response.json().await?;
        if let Some(usage) = &completion.usage {
            let usage = TokenUsage::from(usage);
            self.usage.lock().add(usage);
            tracing::debug!(
                endpoint = %self.model.endpoint,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion finished"
            );
        }
        Ok(completion)
    }

    fn request(&self, messages: &[Message]) -> CompletionRequest {
        CompletionRequest {
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: self.model.temperature,
            max_tokens: self.model.max_tokens,
            response_format: None,
        }
    }
}

/// JSON schema constraining a structured reply to `choices`
pub fn choice_schema(choices: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": {
            CHOICE_FIELD: { "type": "string", "enum": choices }
        },
        "required": [CHOICE_FIELD],
        "additionalProperties": false
    })
}

/// Parse and validate a structured reply against [`choice_schema`]
pub fn parse_choice(content: &str, choices: &[&str]) -> Result<String> {
    let schema = choice_schema(choices);
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| Error::structured_output(format!("invalid choice schema: {}", e)))?;

    let reply: Value = serde_json::from_str(content.trim())?;
    if !validator.is_valid(&reply) {
        return Err(Error::structured_output(format!(
            "reply {} is not one of {:?}",
            reply, choices
        )));
    }

    reply
        .get(CHOICE_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::structured_output(format!("missing {}", CHOICE_FIELD)))
}

/// Completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Messages in the conversation
    pub messages: Vec<WireMessage>,
    /// Temperature for sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens for completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Structured output constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
}

/// Message as sent to the endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Choices
    pub choices: Vec<Choice>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    /// Content of the first choice
    pub fn content(&self) -> Option<&str> {
        self.choices.first().map(|choice| choice.message.content.as_str())
    }
}

/// Choice in completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of the choice
    #[serde(default)]
    pub index: u32,
    /// Message content
    pub message: WireMessage,
    /// Finish reason
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token usage information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub prompt_tokens: u64,
    /// Completion tokens
    pub completion_tokens: u64,
    /// Total tokens
    pub total_tokens: u64,
}

impl From<&Usage> for TokenUsage {
    fn from(usage: &Usage) -> Self {
        TokenUsage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

#[async_trait]
impl ChatModel for ServingClient {
    async fn invoke(&self, messages: &[Message]) -> Result<String> {
        let response = self.complete(self.request(messages)).await?;
        response
            .content()
            .map(str::to_string)
            .ok_or_else(|| Error::model("completion returned no choices"))
    }

    async fn invoke_structured(&self, messages: &[Message], choices: &[&str]) -> Result<String> {
        let mut request = self.request(messages);
        request.response_format = Some(json!({
            "type": "json_schema",
            "json_schema": {
                "name": CHOICE_FIELD,
                "schema": choice_schema(choices),
                "strict": true
            }
        }));

        let response = self.complete(request).await?;
        let content = response
            .content()
            .ok_or_else(|| Error::model("completion returned no choices"))?;
        parse_choice(content, choices)
    }

    fn client_type(&self) -> &str {
        "serving-endpoint"
    }
}
