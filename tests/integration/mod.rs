//! Integration tests for the deployment orchestrator.
//!
//! Every test drives a real [`Orchestrator`] against the in-memory
//! `SimulatedCluster`, with tokio's clock paused so retry and removal-poll
//! sleeps complete instantly.
//!
//! ## Test Organization
//!
//! - **supersession**: last-writer-wins between repeated submits of one job
//! - **connectivity**: outages, retry intervals and authority re-checks
//!
//! ```bash
//! cargo test --features test-harness
//! ```

pub mod supersession;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use topology_deployer::orchestrator::{
    DeploymentRegistry, Orchestrator, RemovalPolicy, WorkerContext,
};
use topology_deployer::test_harness::SimulatedCluster;

pub fn orchestrator_for(cluster: &Arc<SimulatedCluster>) -> Orchestrator {
    Orchestrator::new(
        cluster.clone(),
        Arc::new(DeploymentRegistry::new()),
        WorkerContext {
            artifact_path: PathBuf::from("conf/cluster/topology.jar"),
            serialized_config: r#"{"topology_workers":1}"#.to_string(),
            removal: RemovalPolicy::default(),
            jitter: false,
        },
        Duration::from_millis(100),
    )
}

pub async fn poll_until<T, F, Fut>(
    timeout: std::time::Duration,
    interval: std::time::Duration,
    mut check: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check().await {
            return Some(value);
        }

        if Instant::now() >= deadline {
            return None;
        }

        tokio::time::sleep(interval).await;
    }
}
