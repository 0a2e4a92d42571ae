//! Language model interface consumed by the workflow

use crate::error::Result;
use crate::message::Message;
use async_trait::async_trait;

/// Chat model used for decomposition, routing and synthesis
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete a conversation and return the reply text
    async fn invoke(&self, messages: &[Message]) -> Result<String>;

    /// Complete a conversation constrained to one of `choices`
    ///
    /// Implementations must return exactly one of the given values or an
    /// error; callers do not re-validate the result.
    async fn invoke_structured(&self, messages: &[Message], choices: &[&str]) -> Result<String>;

    /// Get the client type for debugging/logging
    fn client_type(&self) -> &str;
}
