use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use crate::orchestrator::attempt::DeploymentAttempt;
use crate::orchestrator::gateway::{ClusterGateway, GatewayError};
use crate::orchestrator::registry::DeploymentRegistry;
use crate::orchestrator::retry_policy::{RemovalPolicy, RetryPolicy};

/// Deployment parameters shared by every worker of an orchestrator
#[derive(Debug, Clone)]
pub struct WorkerContext {
    /// Local artifact uploaded before each submit
    pub artifact_path: PathBuf,
    /// Cluster configuration handed to the cluster with each submit
    pub serialized_config: String,
    pub removal: RemovalPolicy,
    pub jitter: bool,
}

/// How a deployment worker finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentOutcome {
    /// The topology was submitted and accepted by the cluster
    Deployed { retries: u32 },
    /// A newer attempt or a kill took over; the worker stopped without error.
    /// If that happened while its submit was in flight, the newer attempt
    /// replaces what it submitted.
    Superseded { retries: u32 },
    /// The cluster refused the topology itself; retrying cannot help
    Rejected { reason: String },
}

enum Step {
    Continue,
    Finished(DeploymentOutcome),
}

/// Drives one deployment attempt to completion or self-abandonment.
///
/// Each cycle checks authority, looks the topology up on the cluster and
/// then either kills the existing instance and waits for it to disappear, or
/// uploads the artifact and submits. Authority is re-checked before every
/// side-effecting call and after every sleep, so a superseded worker wastes
/// at most the RPC it was already in.
pub struct DeploymentWorker {
    attempt: Arc<DeploymentAttempt>,
    registry: Arc<DeploymentRegistry>,
    gateway: Arc<dyn ClusterGateway>,
    context: Arc<WorkerContext>,
    retry: RetryPolicy,
    retries: u32,
    job_prefix: String,
}

impl DeploymentWorker {
    pub fn new(
        attempt: Arc<DeploymentAttempt>,
        registry: Arc<DeploymentRegistry>,
        gateway: Arc<dyn ClusterGateway>,
        context: Arc<WorkerContext>,
    ) -> Self {
        let retry = RetryPolicy::fixed(attempt.retry_interval()).with_jitter(context.jitter);
        let job_prefix = format!("Deployment {}: ", attempt.token());
        Self {
            attempt,
            registry,
            gateway,
            context,
            retry,
            retries: 0,
            job_prefix,
        }
    }

    /// Run the worker as its own task
    pub fn spawn(self) -> tokio::task::JoinHandle<DeploymentOutcome> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) -> DeploymentOutcome {
        info!(
            "{}Started deploying topology '{}'",
            self.job_prefix,
            self.name()
        );

        loop {
            if !self.is_authoritative() {
                return self.abandon();
            }

            let step = match self.topology_exists().await {
                Ok(true) => self.replace_existing().await,
                Ok(false) => self.submit_topology().await,
                Err(e) => Err(e),
            };

            match step {
                Ok(Step::Continue) => {}
                Ok(Step::Finished(outcome)) => return outcome,
                Err(e) => self.back_off(&e).await,
            }
        }
    }

    fn name(&self) -> &str {
        self.attempt.cluster_name()
    }

    fn is_authoritative(&self) -> bool {
        self.registry
            .is_authoritative(self.attempt.cluster_name(), self.attempt.token())
    }

    fn abandon(&self) -> DeploymentOutcome {
        info!(
            "{}Aborting deployment of '{}', as a newer request replaced it",
            self.job_prefix,
            self.name()
        );
        DeploymentOutcome::Superseded {
            retries: self.retries,
        }
    }

    async fn back_off(&mut self, cause: &GatewayError) {
        error!(
            "{}Error talking to the cluster while deploying '{}': {cause}",
            self.job_prefix,
            self.name()
        );
        let delay = self.retry.calculate_delay();
        info!(
            "{}Retrying deployment of '{}' in {} ms",
            self.job_prefix,
            self.name(),
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
        self.retries += 1;
    }

    async fn topology_exists(&self) -> Result<bool, GatewayError> {
        let running = self.gateway.list_running().await?;
        Ok(running.iter().any(|summary| summary.name == self.name()))
    }

    async fn replace_existing(&self) -> Result<Step, GatewayError> {
        if !self.is_authoritative() {
            return Ok(Step::Finished(self.abandon()));
        }

        info!(
            "{}Killing already existing topology '{}' to re-submit",
            self.job_prefix,
            self.name()
        );
        match self
            .gateway
            .kill(self.name(), Some(self.context.removal.kill_wait_secs))
            .await
        {
            Ok(()) => {}
            Err(GatewayError::NotRunning(_)) => {
                info!(
                    "{}Topology '{}' is not alive to kill",
                    self.job_prefix,
                    self.name()
                );
            }
            Err(e) => return Err(e),
        }

        self.wait_for_removal().await
    }

    // Unbounded on purpose: removal time is up to the cluster, and only a
    // lost authority check ends the wait early.
    async fn wait_for_removal(&self) -> Result<Step, GatewayError> {
        info!(
            "{}Waiting for topology '{}' to be removed from the cluster",
            self.job_prefix,
            self.name()
        );

        loop {
            if self.topology_exists().await? {
                tokio::time::sleep(self.context.removal.poll_interval).await;
                if !self.is_authoritative() {
                    return Ok(Step::Finished(self.abandon()));
                }
            } else {
                tokio::time::sleep(self.context.removal.settle_delay).await;
                info!(
                    "{}Topology '{}' removed from the cluster",
                    self.job_prefix,
                    self.name()
                );
                return Ok(Step::Continue);
            }
        }
    }

    async fn submit_topology(&self) -> Result<Step, GatewayError> {
        if !self.is_authoritative() {
            return Ok(Step::Finished(self.abandon()));
        }

        let artifact_ref = self
            .gateway
            .upload_artifact(&self.context.artifact_path)
            .await?;

        if !self.is_authoritative() {
            return Ok(Step::Finished(self.abandon()));
        }

        debug!(
            "{}Submitting topology '{}':\n{}",
            self.job_prefix,
            self.name(),
            self.attempt.graph().description()
        );
        match self
            .gateway
            .submit(
                self.name(),
                &artifact_ref,
                &self.context.serialized_config,
                self.attempt.graph(),
            )
            .await
        {
            Ok(()) => {
                if !self
                    .registry
                    .remove_if_authoritative(self.name(), self.attempt.token())
                {
                    info!(
                        "{}Submitted topology '{}', but a newer request overtook it during the submit",
                        self.job_prefix,
                        self.name()
                    );
                    return Ok(Step::Finished(DeploymentOutcome::Superseded {
                        retries: self.retries,
                    }));
                }
                info!(
                    "{}Successfully submitted topology '{}'",
                    self.job_prefix,
                    self.name()
                );
                Ok(Step::Finished(DeploymentOutcome::Deployed {
                    retries: self.retries,
                }))
            }
            Err(GatewayError::AlreadyExists(_)) => {
                warn!(
                    "{}Topology '{}' already exists. Trying to kill and re-submit",
                    self.job_prefix,
                    self.name()
                );
                Ok(Step::Continue)
            }
            Err(GatewayError::InvalidGraph(reason)) => {
                error!(
                    "{}Cannot deploy, invalid topology '{}': {reason}",
                    self.job_prefix,
                    self.name()
                );
                Ok(Step::Finished(DeploymentOutcome::Rejected { reason }))
            }
            Err(e) => Err(e),
        }
    }
}
