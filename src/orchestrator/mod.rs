pub mod attempt;
pub mod engine;
pub mod gateway;
pub mod identity;
pub mod registry;
pub mod retry_policy;
pub mod settings;
pub mod worker;

// Re-export commonly used items
pub use attempt::{AttemptToken, DeploymentAttempt};
pub use engine::{DeploymentError, DeploymentHandle, Orchestrator, TopologyBuilder};
pub use gateway::{ClusterGateway, ExecutableGraph, GatewayError, TopologySummary};
pub use identity::JobIdentity;
pub use registry::{DeploymentRegistry, PendingDeployment};
pub use retry_policy::{RemovalPolicy, RetryPolicy};
pub use settings::Settings;
pub use worker::{DeploymentOutcome, DeploymentWorker, WorkerContext};
