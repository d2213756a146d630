use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use crate::orchestrator::gateway::ExecutableGraph;
use crate::orchestrator::identity::JobIdentity;

/// Unique per attempt. Two attempts with identical fields still carry
/// different tokens, and authority is decided by token alone.
pub type AttemptToken = Uuid;

/// One request to get a job's topology running. Immutable once created.
#[derive(Debug)]
pub struct DeploymentAttempt {
    token: AttemptToken,
    job: JobIdentity,
    cluster_name: String,
    graph: ExecutableGraph,
    retry_interval: Duration,
    created_at: DateTime<Utc>,
}

impl DeploymentAttempt {
    pub fn new(job: JobIdentity, graph: ExecutableGraph, retry_interval: Duration) -> Self {
        let cluster_name = job.cluster_name();
        Self {
            token: Uuid::new_v4(),
            job,
            cluster_name,
            graph,
            retry_interval,
            created_at: Utc::now(),
        }
    }

    pub fn token(&self) -> AttemptToken {
        self.token
    }

    pub fn job(&self) -> &JobIdentity {
        &self.job
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn graph(&self) -> &ExecutableGraph {
        &self.graph
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
