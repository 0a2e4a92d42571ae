//! Genie space worker
//!
//! Asks a question in a Genie space, polls the message until it settles and
//! renders the text and query-result attachments as one answer.

use crate::config::{GeniePollConfig, WorkerConfig, WorkspaceConfig};
use crate::error::{Error, Result};
use crate::state::ConversationState;
use crate::workers::{Worker, WorkerKind, WorkerReply};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP client for a single Genie space
pub struct GenieClient {
    /// HTTP client
    client: Client,
    /// Workspace host and token
    workspace: WorkspaceConfig,
    /// Genie space identifier
    space_id: String,
    /// Polling behaviour
    poll: GeniePollConfig,
}

impl GenieClient {
    /// Create a new Genie client
    pub fn new(workspace: WorkspaceConfig, space_id: impl Into<String>, poll: GeniePollConfig) -> Result<Self> {
        let client = Client::builder().timeout(poll.timeout()).build()?;

        Ok(Self {
            client,
            workspace,
            space_id: space_id.into(),
            poll,
        })
    }

    /// Genie space identifier
    pub fn space_id(&self) -> &str {
        &self.space_id
    }

    fn space_url(&self, path: &str) -> String {
        self.workspace
            .endpoint_url(&format!("api/2.0/genie/spaces/{}/{}", self.space_id, path))
    }

    async fn send<T: for<'de> Deserialize<'de>>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request.bearer_auth(self.workspace.token()).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::worker(
                format!("genie space {}", self.space_id),
                format!("request failed with status {}: {}", status, error_text),
            ));
        }

        Ok(response.json().await?)
    }

    /// Start a conversation with `question`
    pub async fn start_conversation(&self, question: &str) -> Result<StartConversation> {
        let request = self
            .client
            .post(self.space_url("start-conversation"))
            .json(&serde_json::json!({ "content": question }));
        self.send(request).await
    }

    /// Fetch the current state of a message
    pub async fn get_message(&self, conversation_id: &str, message_id: &str) -> Result<GenieMessage> {
        let url = self.space_url(&format!(
            "conversations/{}/messages/{}",
            conversation_id, message_id
        ));
        self.send(self.client.get(url)).await
    }

    /// Fetch the result table of a query attachment
    pub async fn get_query_result(
        &self,
        conversation_id: &str,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<QueryResult> {
        let url = self.space_url(&format!(
            "conversations/{}/messages/{}/query-result/{}",
            conversation_id, message_id, attachment_id
        ));
        self.send(self.client.get(url)).await
    }

    /// Ask a question and wait for the rendered answer
    pub async fn ask(&self, question: &str) -> Result<String> {
        let started = self.start_conversation(question).await?;
        tracing::debug!(
            space_id = %self.space_id,
            conversation_id = %started.conversation_id,
            "genie conversation started"
        );

        let message = self
            .wait_for_completion(&started.conversation_id, &started.message_id)
            .await?;

        let mut sections = Vec::new();
        for attachment in &message.attachments {
            if let Some(text) = &attachment.text {
                sections.push(text.content.clone());
            }
            if let Some(query) = &attachment.query {
                let mut section = String::new();
                if let Some(description) = &query.description {
                    section.push_str(description);
                    section.push_str("\n\n");
                }
                if let Some(attachment_id) = &attachment.attachment_id {
                    let result = self
                        .get_query_result(&started.conversation_id, &started.message_id, attachment_id)
                        .await?;
                    section.push_str(&result.to_markdown());
                }
                sections.push(section.trim_end().to_string());
            }
        }

        if sections.is_empty() {
            if let Some(content) = message.content.filter(|c| !c.is_empty()) {
                sections.push(content);
            }
        }

        Ok(sections.join("\n\n"))
    }

    async fn wait_for_completion(&self, conversation_id: &str, message_id: &str) -> Result<GenieMessage> {
        for _ in 0..self.poll.max_polls {
            let message = self.get_message(conversation_id, message_id).await?;
            match message.status {
                MessageStatus::Completed => return Ok(message),
                MessageStatus::Failed | MessageStatus::Cancelled | MessageStatus::QueryResultExpired => {
                    let reason = message
                        .error
                        .as_ref()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| format!("{:?}", message.status));
                    return Err(Error::worker(
                        format!("genie space {}", self.space_id),
                        format!("message {} ended without an answer: {}", message_id, reason),
                    ));
                }
                MessageStatus::Pending => tokio::time::sleep(self.poll.poll_interval()).await,
            }
        }

        Err(Error::timeout(format!(
            "genie message {} did not complete after {} polls",
            message_id, self.poll.max_polls
        )))
    }
}

/// Response to `start-conversation`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartConversation {
    /// Conversation identifier
    pub conversation_id: String,
    /// Identifier of the question message
    pub message_id: String,
}

/// Processing status of a Genie message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    /// Answer is ready
    Completed,
    /// Genie failed to answer
    Failed,
    /// Processing was cancelled
    Cancelled,
    /// The query result is no longer available
    QueryResultExpired,
    /// Any in-progress status (submitted, executing query, ...)
    #[serde(other)]
    Pending,
}

/// A Genie message and its attachments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenieMessage {
    /// Processing status
    pub status: MessageStatus,
    /// Message content (the question, or a plain reply)
    #[serde(default)]
    pub content: Option<String>,
    /// Text and query attachments
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Error details for failed messages
    #[serde(default)]
    pub error: Option<Value>,
}

/// Attachment of a Genie message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment identifier
    #[serde(default)]
    pub attachment_id: Option<String>,
    /// Text answer
    #[serde(default)]
    pub text: Option<TextAttachment>,
    /// Generated SQL query
    #[serde(default)]
    pub query: Option<QueryAttachment>,
}

/// Text attachment body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextAttachment {
    /// Text content
    pub content: String,
}

/// Query attachment body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAttachment {
    /// SQL text
    #[serde(default)]
    pub query: Option<String>,
    /// Natural-language description of the query
    #[serde(default)]
    pub description: Option<String>,
}

/// Result of a query attachment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Statement execution payload
    pub statement_response: StatementResponse,
}

/// Statement execution payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementResponse {
    /// Result schema
    #[serde(default)]
    pub manifest: Option<Manifest>,
    /// Result rows
    #[serde(default)]
    pub result: Option<ResultData>,
}

/// Result manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Column schema
    pub schema: ResultSchema,
}

/// Column schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSchema {
    /// Columns in order
    #[serde(default)]
    pub columns: Vec<Column>,
}

/// Result column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
}

/// Result rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultData {
    /// Row values
    #[serde(default)]
    pub data_array: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Render the result as a markdown table
    pub fn to_markdown(&self) -> String {
        let columns: Vec<&str> = self
            .statement_response
            .manifest
            .as_ref()
            .map(|m| m.schema.columns.iter().map(|c| c.name.as_str()).collect())
            .unwrap_or_default();
        let rows = self
            .statement_response
            .result
            .as_ref()
            .map(|r| r.data_array.as_slice())
            .unwrap_or_default();

        if columns.is_empty() && rows.is_empty() {
            return String::new();
        }

        let mut table = String::new();
        if !columns.is_empty() {
            table.push_str(&format!("| {} |\n", columns.join(" | ")));
            table.push_str(&format!("|{}\n", " --- |".repeat(columns.len())));
        }
        for row in rows {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            table.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        table
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Worker backed by a Genie space
pub struct GenieWorker {
    kind: WorkerKind,
    client: GenieClient,
}

impl GenieWorker {
    /// Create a worker for a Genie space
    pub fn new(kind: WorkerKind, client: GenieClient) -> Self {
        Self { kind, client }
    }

    /// Create a worker from its configuration
    pub fn from_config(
        worker: &WorkerConfig,
        workspace: &WorkspaceConfig,
        poll: &GeniePollConfig,
    ) -> Result<Self> {
        let client = GenieClient::new(workspace.clone(), worker.space_id.clone(), poll.clone())?;
        Ok(Self::new(worker.kind, client))
    }

    /// Which worker this is
    pub fn kind(&self) -> WorkerKind {
        self.kind
    }
}

/// Question sent to Genie for the current state
///
/// A decomposed run asks only the active subtask; otherwise the whole
/// conversation is forwarded as `role: content` lines.
pub fn question_for(state: &ConversationState) -> String {
    if let Some(subtask) = state.current_subtask() {
        return subtask.to_string();
    }
    state
        .messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Worker for GenieWorker {
    async fn invoke(&self, state: &ConversationState) -> Result<WorkerReply> {
        let question = question_for(state);
        let answer = self.client.ask(&question).await.map_err(|e| match e {
            Error::Worker { message, .. } => Error::worker(self.kind.as_str(), message),
            other => other,
        })?;
        Ok(WorkerReply::text(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use serde_json::json;
    use url::Url;

    const SPACE: &str = "space-1";

    fn client_for(server: &mockito::ServerGuard, max_polls: u32) -> GenieClient {
        let workspace = WorkspaceConfig::new(Url::parse(&server.url()).unwrap(), "dapi-test");
        let poll = GeniePollConfig {
            poll_interval_ms: 1,
            max_polls,
            timeout_secs: 5,
        };
        GenieClient::new(workspace, SPACE, poll).unwrap()
    }

    async fn mock_start(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/api/2.0/genie/spaces/space-1/start-conversation")
            .match_header("authorization", "Bearer dapi-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "conversation_id": "c1", "message_id": "m1" }).to_string())
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_ask_renders_text_and_query_results() {
        let mut server = mockito::Server::new_async().await;
        let start = mock_start(&mut server).await;
        server
            .mock("GET", "/api/2.0/genie/spaces/space-1/conversations/c1/messages/m1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "status": "COMPLETED",
                    "attachments": [
                        { "attachment_id": "a1", "text": { "content": "Here are two hotels." } },
                        { "attachment_id": "a2", "query": { "query": "SELECT 1", "description": "Top hotels" } }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock(
                "GET",
                "/api/2.0/genie/spaces/space-1/conversations/c1/messages/m1/query-result/a2",
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "statement_response": {
                        "manifest": { "schema": { "columns": [{ "name": "name" }, { "name": "url" }] } },
                        "result": { "data_array": [["Grand", "https://grand.example"], ["Inn", null]] }
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server, 3);
        let answer = client.ask("hotels in SF?").await.unwrap();

        assert!(answer.starts_with("Here are two hotels."));
        assert!(answer.contains("Top hotels"));
        assert!(answer.contains("| name | url |"));
        assert!(answer.contains("| Grand | https://grand.example |"));
        assert!(answer.contains("| Inn |  |"));
        start.assert_async().await;
    }

    #[tokio::test]
    async fn test_ask_polls_until_completed() {
        let mut server = mockito::Server::new_async().await;
        mock_start(&mut server).await;
        let pending = server
            .mock("GET", "/api/2.0/genie/spaces/space-1/conversations/c1/messages/m1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "status": "EXECUTING_QUERY" }).to_string())
            .expect(1)
            .create_async()
            .await;
        let done = server
            .mock("GET", "/api/2.0/genie/spaces/space-1/conversations/c1/messages/m1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "status": "COMPLETED",
                    "attachments": [{ "text": { "content": "done" } }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server, 5);
        assert_eq!(client.ask("q").await.unwrap(), "done");
        pending.assert_async().await;
        done.assert_async().await;
    }

    #[tokio::test]
    async fn test_ask_times_out() {
        let mut server = mockito::Server::new_async().await;
        mock_start(&mut server).await;
        server
            .mock("GET", "/api/2.0/genie/spaces/space-1/conversations/c1/messages/m1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "status": "SUBMITTED" }).to_string())
            .create_async()
            .await;

        let client = client_for(&server, 2);
        let err = client.ask("q").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_failed_message_is_a_worker_error() {
        let mut server = mockito::Server::new_async().await;
        mock_start(&mut server).await;
        server
            .mock("GET", "/api/2.0/genie/spaces/space-1/conversations/c1/messages/m1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "status": "FAILED", "error": { "error": "no warehouse" } }).to_string())
            .create_async()
            .await;

        let worker = GenieWorker::new(WorkerKind::HotelGenie, client_for(&server, 2));
        let state = ConversationState::new(vec![Message::user("q")]);
        match worker.invoke(&state).await.unwrap_err() {
            Error::Worker { worker, message } => {
                assert_eq!(worker, "hotel_genie");
                assert!(message.contains("no warehouse"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_worker_from_config() {
        let workspace = WorkspaceConfig::new(Url::parse("https://h.example").unwrap(), "t");
        let config = WorkerConfig::new(WorkerKind::AirbnbGenie, "01f0-airbnb");
        let worker = GenieWorker::from_config(&config, &workspace, &GeniePollConfig::default()).unwrap();

        assert_eq!(worker.kind(), WorkerKind::AirbnbGenie);
        assert_eq!(worker.client.space_id(), "01f0-airbnb");
        assert_eq!(
            worker.client.space_url("start-conversation"),
            "https://h.example/api/2.0/genie/spaces/01f0-airbnb/start-conversation"
        );
    }

    #[test]
    fn test_question_prefers_active_subtask() {
        let mut state = ConversationState::new(vec![
            Message::user("hotels and food in SF"),
            Message::assistant("..."),
        ]);
        assert_eq!(
            question_for(&state),
            "user: hotels and food in SF\nassistant: ..."
        );

        state.subtasks = Some(vec!["Find hotels".into(), "Find food".into()]);
        state.current_subtask_index = 1;
        assert_eq!(question_for(&state), "Find food");
    }
}
