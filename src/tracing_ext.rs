//! Tracing and observability infrastructure

use crate::error::{Error, Result};
use crate::state::Route;
use crate::types::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "multigenie=info";

/// Install a global fmt subscriber filtered by `RUST_LOG`
pub fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| Error::config(format!("failed to install tracing subscriber: {}", e)))
}

/// Record of one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTrace {
    /// Run identifier
    pub run_id: RunId,
    /// Start timestamp
    pub started_at: DateTime<Utc>,
    /// End timestamp
    pub ended_at: Option<DateTime<Utc>>,
    /// Node visits in execution order
    pub visits: Vec<NodeVisit>,
}

/// One node execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeVisit {
    /// Node name
    pub node: String,
    /// Start timestamp
    pub started_at: DateTime<Utc>,
    /// Execution time in milliseconds
    pub duration_ms: u64,
    /// Messages the node produced
    pub messages_emitted: usize,
    /// Routing decision, for supervisor visits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Route>,
}

impl RunTrace {
    /// Start a trace for a run
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            ended_at: None,
            visits: Vec::new(),
        }
    }

    /// Record a node visit
    pub fn record(&mut self, visit: NodeVisit) {
        self.visits.push(visit);
    }

    /// Mark the run finished
    pub fn complete(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    /// Number of supervisor visits
    pub fn supervisor_visits(&self) -> usize {
        self.visits.iter().filter(|v| v.node == "supervisor").count()
    }

    /// Node names in execution order
    pub fn path(&self) -> Vec<&str> {
        self.visits.iter().map(|v| v.node.as_str()).collect()
    }
}
