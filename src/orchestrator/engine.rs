use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};

use crate::orchestrator::attempt::{AttemptToken, DeploymentAttempt};
use crate::orchestrator::gateway::{ClusterGateway, ExecutableGraph, GatewayError, TopologySummary};
use crate::orchestrator::identity::JobIdentity;
use crate::orchestrator::registry::{DeploymentRegistry, PendingDeployment};
use crate::orchestrator::settings::Settings;
use crate::orchestrator::worker::{DeploymentOutcome, DeploymentWorker, WorkerContext};

/// Errors surfaced synchronously to callers of the orchestrator
#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("Cluster request failed: {0}")]
    Cluster(#[from] GatewayError),

    #[error("Cannot build topology for {job}: {reason}")]
    Build { job: JobIdentity, reason: String },
}

/// Turns a job's plan into the cluster's executable form
pub trait TopologyBuilder: Send + Sync {
    fn build(&self, job: &JobIdentity, plan: &str) -> Result<ExecutableGraph, String>;
}

/// Handle to a deployment running in the background. Dropping it does not
/// stop the deployment.
#[derive(Debug)]
pub struct DeploymentHandle {
    cluster_name: String,
    token: AttemptToken,
    handle: JoinHandle<DeploymentOutcome>,
}

impl DeploymentHandle {
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn token(&self) -> AttemptToken {
        self.token
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker to finish
    pub async fn outcome(self) -> Result<DeploymentOutcome, JoinError> {
        self.handle.await
    }
}

/// Public entry point: accepts submit, kill and list requests for topologies.
///
/// Every submit installs a fresh attempt as the authoritative one for its
/// job and starts a worker for it; older workers for the same job notice on
/// their next authority check and stop.
#[derive(Clone)]
pub struct Orchestrator {
    gateway: Arc<dyn ClusterGateway>,
    registry: Arc<DeploymentRegistry>,
    context: Arc<WorkerContext>,
    default_retry_interval: Duration,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn ClusterGateway>,
        registry: Arc<DeploymentRegistry>,
        context: WorkerContext,
        default_retry_interval: Duration,
    ) -> Self {
        Self {
            gateway,
            registry,
            context: Arc::new(context),
            default_retry_interval,
        }
    }

    /// Create an orchestrator with its own registry from loaded settings
    pub fn from_settings(gateway: Arc<dyn ClusterGateway>, settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            gateway,
            Arc::new(DeploymentRegistry::new()),
            settings.worker_context()?,
            settings.retry_interval(),
        ))
    }

    pub fn cluster_name(&self, job: &JobIdentity) -> String {
        job.cluster_name()
    }

    pub fn registry(&self) -> &Arc<DeploymentRegistry> {
        &self.registry
    }

    /// Attempts that still hold authority, by cluster name
    pub fn pending(&self) -> Vec<PendingDeployment> {
        self.registry.pending()
    }

    /// Make `graph` the wanted topology for `job` and deploy it in the background.
    ///
    /// Replaces any earlier request for the same job. Returns as soon as the
    /// worker is started; must be called from within a tokio runtime.
    pub fn submit(
        &self,
        job: JobIdentity,
        graph: ExecutableGraph,
        retry_interval: Duration,
    ) -> DeploymentHandle {
        let attempt = Arc::new(DeploymentAttempt::new(job, graph, retry_interval));
        let cluster_name = attempt.cluster_name().to_string();
        let token = attempt.token();

        self.registry.register(&cluster_name, attempt.clone());
        log::info!(
            "Queued deployment {token} of topology '{cluster_name}' for {}",
            attempt.job()
        );

        let worker = DeploymentWorker::new(
            attempt,
            self.registry.clone(),
            self.gateway.clone(),
            self.context.clone(),
        );

        DeploymentHandle {
            cluster_name,
            token,
            handle: worker.spawn(),
        }
    }

    pub fn submit_with_default_interval(
        &self,
        job: JobIdentity,
        graph: ExecutableGraph,
    ) -> DeploymentHandle {
        self.submit(job, graph, self.default_retry_interval)
    }

    /// Build the topology for `plan` and submit it. Build failures are
    /// returned here, before anything reaches the cluster.
    pub fn submit_plan(
        &self,
        job: JobIdentity,
        plan: &str,
        builder: &dyn TopologyBuilder,
        retry_interval: Duration,
    ) -> Result<DeploymentHandle, DeploymentError> {
        let graph = builder
            .build(&job, plan)
            .map_err(|reason| DeploymentError::Build {
                job: job.clone(),
                reason,
            })?;

        log::debug!(
            "Generated topology for {job}:\n{}",
            graph.description()
        );
        Ok(self.submit(job, graph, retry_interval))
    }

    /// Stop any in-flight deployment of `job` and kill it on the cluster.
    ///
    /// A topology that is not running counts as killed.
    pub async fn kill(&self, job: &JobIdentity) -> Result<(), DeploymentError> {
        let cluster_name = job.cluster_name();
        self.registry.remove(&cluster_name);

        log::info!("Killing topology '{cluster_name}' for {job}");
        match self.gateway.kill(&cluster_name, None).await {
            Ok(()) => Ok(()),
            Err(GatewayError::NotRunning(_)) => {
                log::debug!("Topology '{cluster_name}' was not running");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Topologies the cluster currently reports. Not retried.
    pub async fn list_running(&self) -> Result<Vec<TopologySummary>, DeploymentError> {
        Ok(self.gateway.list_running().await?)
    }
}
