//! Configuration for the supervisor workflow
//!
//! Everything the graph needs at construction time lives in
//! [`SupervisorConfig`]: the model serving endpoint, the workspace
//! credentials, the Genie space behind each worker and the liveness bounds.

use crate::error::{Error, Result};
use crate::workers::WorkerKind;
use dotenvy::dotenv;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Prefix for environment overrides applied by [`SupervisorConfig::load`]
pub const ENV_PREFIX: &str = "MULTIGENIE";

/// Top-level workflow configuration
#[derive(Clone, Deserialize)]
pub struct SupervisorConfig {
    /// Chat model used by the supervisor and the final answer node
    #[serde(default)]
    pub model: ModelConfig,
    /// Workspace hosting the model endpoint and Genie spaces
    pub workspace: WorkspaceConfig,
    /// Workers bound into the graph
    pub workers: Vec<WorkerConfig>,
    /// Supervisor visits allowed before forcing the final answer
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Node visits before the run falls through to the final answer
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,
    /// Genie polling behaviour
    #[serde(default)]
    pub genie: GeniePollConfig,
}

fn default_max_iterations() -> u32 { 3 }
fn default_recursion_limit() -> usize { 25 }

/// Model serving endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Serving endpoint name
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Temperature for sampling
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Maximum tokens for completion
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String { presets::LLAMA_3_3_70B.to_string() }
fn default_timeout_secs() -> u64 { 120 }

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(default_endpoint())
    }
}

impl ModelConfig {
    /// Create a model configuration for an endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            temperature: None,
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Workspace host and access token
#[derive(Clone, Deserialize)]
pub struct WorkspaceConfig {
    /// Workspace base URL
    pub host: Url,
    /// Personal access token
    #[serde(deserialize_with = "deserialize_secret")]
    pub token: SecretString,
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl WorkspaceConfig {
    /// Create a workspace configuration
    pub fn new(host: Url, token: impl Into<String>) -> Self {
        Self {
            host,
            token: SecretString::from(token.into()),
        }
    }

    /// Get the token as a string
    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    /// Join a path onto the host, keeping any base path
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.host.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl std::fmt::Debug for WorkspaceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceConfig")
            .field("host", &self.host.as_str())
            .field("token", &"***REDACTED***")
            .finish()
    }
}

/// One worker and the Genie space it queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Which worker this is
    pub kind: WorkerKind,
    /// Genie space identifier
    pub space_id: String,
    /// Description shown to the routing model
    #[serde(default)]
    pub description: Option<String>,
}

impl WorkerConfig {
    /// Create a worker configuration with the default description
    pub fn new(kind: WorkerKind, space_id: impl Into<String>) -> Self {
        Self {
            kind,
            space_id: space_id.into(),
            description: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Configured description or the worker's default
    pub fn description(&self) -> &str {
        self.description
            .as_deref()
            .unwrap_or_else(|| self.kind.default_description())
    }
}

/// Genie polling behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeniePollConfig {
    /// Delay between status polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Status polls before giving up
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_poll_interval_ms() -> u64 { 1000 }
fn default_max_polls() -> u32 { 120 }

impl Default for GeniePollConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GeniePollConfig {
    /// Delay between status polls
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// HTTP request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SupervisorConfig {
    /// Create a configuration with default bounds
    pub fn new(workspace: WorkspaceConfig, workers: Vec<WorkerConfig>) -> Self {
        Self {
            model: ModelConfig::default(),
            workspace,
            workers,
            max_iterations: default_max_iterations(),
            recursion_limit: default_recursion_limit(),
            genie: GeniePollConfig::default(),
        }
    }

    /// Set the model configuration
    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    /// Set the supervisor iteration bound
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the node visit cap
    pub fn with_recursion_limit(mut self, recursion_limit: usize) -> Self {
        self.recursion_limit = recursion_limit;
        self
    }

    /// Set Genie polling behaviour
    pub fn with_genie(mut self, genie: GeniePollConfig) -> Self {
        self.genie = genie;
        self
    }

    /// Build a configuration from environment variables
    ///
    /// Reads `DB_MODEL_SERVING_HOST_URL`, `DATABRICKS_GENIE_PAT`,
    /// `LLM_ENDPOINT_NAME` and one `<WORKER>_SPACE_ID` per worker, e.g.
    /// `HOTEL_GENIE_SPACE_ID`. Workers without a space id are left out.
    pub fn from_env() -> Result<Self> {
        // Load .env if present so local development picks up credentials
        let _ = dotenv();

        let host = std::env::var("DB_MODEL_SERVING_HOST_URL")
            .map_err(|_| Error::config("DB_MODEL_SERVING_HOST_URL environment variable not set"))?;
        let host = Url::parse(&host)
            .map_err(|e| Error::config(format!("Invalid DB_MODEL_SERVING_HOST_URL: {}", e)))?;
        let token = std::env::var("DATABRICKS_GENIE_PAT")
            .map_err(|_| Error::config("DATABRICKS_GENIE_PAT environment variable not set"))?;

        let workers = WorkerKind::ALL
            .into_iter()
            .filter_map(|kind| {
                let var = format!("{}_SPACE_ID", kind.as_str().to_uppercase());
                std::env::var(var).ok().map(|space| WorkerConfig::new(kind, space))
            })
            .collect();

        let mut model = ModelConfig::default();
        if let Ok(endpoint) = std::env::var("LLM_ENDPOINT_NAME") {
            model.endpoint = endpoint;
        }

        let config = Self::new(WorkspaceConfig::new(host, token), workers).with_model(model);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, layered with `MULTIGENIE__*` overrides
    ///
    /// `MULTIGENIE__MAX_ITERATIONS=5` overrides `max_iterations`,
    /// `MULTIGENIE__WORKSPACE__TOKEN` overrides `workspace.token`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let _ = dotenv();

        let config: Self = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check bounds and worker uniqueness
    pub fn validate(&self) -> Result<()> {
        if self.workers.is_empty() {
            return Err(Error::config("at least one worker must be configured"));
        }
        let mut seen = HashSet::new();
        for worker in &self.workers {
            if !seen.insert(worker.kind) {
                return Err(Error::config(format!("worker {} configured twice", worker.kind)));
            }
            if worker.space_id.trim().is_empty() {
                return Err(Error::config(format!("worker {} has an empty space_id", worker.kind)));
            }
        }
        if self.max_iterations == 0 {
            return Err(Error::config("max_iterations must be at least 1"));
        }
        if self.recursion_limit == 0 {
            return Err(Error::config("recursion_limit must be at least 1"));
        }
        if self.genie.max_polls == 0 {
            return Err(Error::config("genie.max_polls must be at least 1"));
        }
        if !matches!(self.workspace.host.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "workspace host must be http(s), got {}",
                self.workspace.host
            )));
        }
        Ok(())
    }

    /// Configuration for one worker, if bound
    pub fn worker(&self, kind: WorkerKind) -> Option<&WorkerConfig> {
        self.workers.iter().find(|w| w.kind == kind)
    }
}

impl std::fmt::Debug for SupervisorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorConfig")
            .field("model", &self.model)
            .field("workspace", &self.workspace)
            .field("workers", &self.workers)
            .field("max_iterations", &self.max_iterations)
            .field("recursion_limit", &self.recursion_limit)
            .field("genie", &self.genie)
            .finish()
    }
}

/// Serving endpoints known to work as supervisors
pub mod presets {
    /// Llama 3.3 70B instruct
    pub const LLAMA_3_3_70B: &str = "databricks-meta-llama-3-3-70b-instruct";

    /// Claude 3.7 Sonnet, the most reliable router in practice
    pub const CLAUDE_3_7_SONNET: &str = "databricks-claude-3-7-sonnet";

    /// GPT-4o
    pub const GPT4O: &str = "gpt-4o";
}
