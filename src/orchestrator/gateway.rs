use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Failures reported by the cluster control plane
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Control plane unreachable or the RPC layer failed. Always transient.
    #[error("Cluster connectivity error: {0}")]
    Connectivity(String),

    #[error("Topology '{0}' already exists on the cluster")]
    AlreadyExists(String),

    #[error("Topology '{0}' is not running")]
    NotRunning(String),

    #[error("Invalid topology: {0}")]
    InvalidGraph(String),
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Connectivity(_))
    }
}

/// One row of the cluster's running-topology listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySummary {
    pub name: String,
    pub id: String,
    pub status: String,
}

/// Cluster-native executable form of a job. Opaque to the orchestrator: it is
/// produced by a [`crate::orchestrator::TopologyBuilder`] and handed to the
/// cluster unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutableGraph(serde_json::Value);

impl ExecutableGraph {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Human readable rendering for debug logs
    pub fn description(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.0.to_string())
    }
}

/// RPC surface of the cluster control plane.
///
/// Implementations must be safe to share between concurrently running
/// deployment workers.
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    async fn list_running(&self) -> Result<Vec<TopologySummary>, GatewayError>;

    /// Kill `name`, letting it drain for `wait_secs` (cluster default when `None`).
    async fn kill(&self, name: &str, wait_secs: Option<u64>) -> Result<(), GatewayError>;

    /// Upload the job artifact and return the cluster-side reference to it
    async fn upload_artifact(&self, local_path: &Path) -> Result<String, GatewayError>;

    async fn submit(
        &self,
        name: &str,
        artifact_ref: &str,
        serialized_config: &str,
        graph: &ExecutableGraph,
    ) -> Result<(), GatewayError>;
}
