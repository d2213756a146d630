//! In-memory stand-in for the cluster control plane.
//!
//! [`SimulatedCluster`] implements [`ClusterGateway`] with scriptable faults
//! (connectivity outages, slow removal, rejected graphs, topologies created
//! behind the orchestrator's back) and records every call it receives so
//! tests can assert on exactly what reached the cluster.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::orchestrator::gateway::{ClusterGateway, ExecutableGraph, GatewayError, TopologySummary};
use crate::{TOPOLOGY_STATUS_ACTIVE, TOPOLOGY_STATUS_KILLED};

/// A call received by the simulated cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    ListRunning,
    Kill {
        name: String,
        wait_secs: Option<u64>,
    },
    UploadArtifact {
        path: PathBuf,
    },
    Submit {
        name: String,
        artifact_ref: String,
        serialized_config: String,
    },
}

#[derive(Debug, Clone)]
struct RunningTopology {
    id: String,
    graph: ExecutableGraph,
    // Listings left before a killed topology disappears
    removal_countdown: Option<u32>,
}

#[derive(Debug, Default)]
struct ClusterState {
    running: BTreeMap<String, RunningTopology>,
    calls: Vec<ClusterCall>,
    outage_remaining: u32,
    removal_delay: u32,
    rejected_graphs: Vec<ExecutableGraph>,
    launch_after_upload: Vec<(String, ExecutableGraph)>,
    next_id: u64,
    uploads: u64,
}

impl ClusterState {
    fn record(&mut self, call: ClusterCall) -> Result<(), GatewayError> {
        self.calls.push(call);
        if self.outage_remaining > 0 {
            self.outage_remaining -= 1;
            return Err(GatewayError::Connectivity(
                "connection refused by simulated cluster".to_string(),
            ));
        }
        Ok(())
    }

    fn launch(&mut self, name: &str, graph: ExecutableGraph) {
        self.next_id += 1;
        let id = format!("{name}-{}", self.next_id);
        self.running.insert(
            name.to_string(),
            RunningTopology {
                id,
                graph,
                removal_countdown: None,
            },
        );
    }
}

/// Cluster control plane kept entirely in memory
#[derive(Debug, Default)]
pub struct SimulatedCluster {
    state: Mutex<ClusterState>,
    call_latency: Mutex<Option<Duration>>,
}

impl SimulatedCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `calls` calls with a connectivity error
    pub async fn fail_next(&self, calls: u32) {
        self.state.lock().await.outage_remaining = calls;
    }

    /// Number of listings a killed topology stays visible for
    pub async fn set_removal_delay(&self, listings: u32) {
        self.state.lock().await.removal_delay = listings;
    }

    /// Delay every call by `latency` before it takes effect
    pub async fn set_call_latency(&self, latency: Duration) {
        *self.call_latency.lock().await = Some(latency);
    }

    /// Refuse `graph` as structurally invalid on submit
    pub async fn reject_graph(&self, graph: ExecutableGraph) {
        self.state.lock().await.rejected_graphs.push(graph);
    }

    /// Start a topology as if someone outside the orchestrator had submitted it
    pub async fn launch_external(&self, name: &str, graph: ExecutableGraph) {
        self.state.lock().await.launch(name, graph);
    }

    /// Start a topology right after the next artifact upload completes
    pub async fn launch_external_after_upload(&self, name: &str, graph: ExecutableGraph) {
        self.state
            .lock()
            .await
            .launch_after_upload
            .push((name.to_string(), graph));
    }

    pub async fn is_running(&self, name: &str) -> bool {
        self.state.lock().await.running.contains_key(name)
    }

    pub async fn running_graph(&self, name: &str) -> Option<ExecutableGraph> {
        self.state
            .lock()
            .await
            .running
            .get(name)
            .map(|topology| topology.graph.clone())
    }

    pub async fn calls(&self) -> Vec<ClusterCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn count_calls<F>(&self, predicate: F) -> usize
    where
        F: Fn(&ClusterCall) -> bool,
    {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    async fn simulate_latency(&self) {
        let latency = *self.call_latency.lock().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ClusterGateway for SimulatedCluster {
    async fn list_running(&self) -> Result<Vec<TopologySummary>, GatewayError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.record(ClusterCall::ListRunning)?;

        let mut removed = Vec::new();
        for (name, topology) in state.running.iter_mut() {
            match topology.removal_countdown {
                Some(0) => removed.push(name.clone()),
                Some(remaining) => topology.removal_countdown = Some(remaining - 1),
                None => {}
            }
        }
        for name in removed {
            state.running.remove(&name);
        }

        Ok(state
            .running
            .iter()
            .map(|(name, topology)| TopologySummary {
                name: name.clone(),
                id: topology.id.clone(),
                status: if topology.removal_countdown.is_some() {
                    TOPOLOGY_STATUS_KILLED.to_string()
                } else {
                    TOPOLOGY_STATUS_ACTIVE.to_string()
                },
            })
            .collect())
    }

    async fn kill(&self, name: &str, wait_secs: Option<u64>) -> Result<(), GatewayError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.record(ClusterCall::Kill {
            name: name.to_string(),
            wait_secs,
        })?;

        let delay = state.removal_delay;
        let Some(topology) = state.running.get_mut(name) else {
            return Err(GatewayError::NotRunning(name.to_string()));
        };
        if topology.removal_countdown.is_some() {
            return Ok(());
        }
        if delay > 0 {
            topology.removal_countdown = Some(delay);
        } else {
            state.running.remove(name);
        }
        Ok(())
    }

    async fn upload_artifact(&self, local_path: &Path) -> Result<String, GatewayError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.record(ClusterCall::UploadArtifact {
            path: local_path.to_path_buf(),
        })?;

        for (name, graph) in std::mem::take(&mut state.launch_after_upload) {
            state.launch(&name, graph);
        }

        state.uploads += 1;
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(format!("uploaded/{}/{file_name}", state.uploads))
    }

    async fn submit(
        &self,
        name: &str,
        artifact_ref: &str,
        serialized_config: &str,
        graph: &ExecutableGraph,
    ) -> Result<(), GatewayError> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;
        state.record(ClusterCall::Submit {
            name: name.to_string(),
            artifact_ref: artifact_ref.to_string(),
            serialized_config: serialized_config.to_string(),
        })?;

        if state.running.contains_key(name) {
            return Err(GatewayError::AlreadyExists(name.to_string()));
        }
        if state.rejected_graphs.contains(graph) {
            return Err(GatewayError::InvalidGraph(format!(
                "topology '{name}' has no valid components"
            )));
        }

        state.launch(name, graph.clone());
        Ok(())
    }
}
