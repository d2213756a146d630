use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::orchestrator::attempt::{AttemptToken, DeploymentAttempt};

/// Snapshot of an attempt that still holds authority for its cluster name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeployment {
    pub cluster_name: String,
    pub token: AttemptToken,
    pub created_at: DateTime<Utc>,
}

/// Which deployment attempt is currently wanted for each cluster name.
///
/// Every operation goes through the map's per-key lock, so a `register`
/// that has returned is visible to every later `is_authoritative` call for
/// that name. No lock is ever held across an await point.
#[derive(Debug, Default)]
pub struct DeploymentRegistry {
    attempts: DashMap<String, Arc<DeploymentAttempt>>,
}

impl DeploymentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `attempt` as authoritative for `name`, replacing whatever was there
    pub fn register(&self, name: &str, attempt: Arc<DeploymentAttempt>) {
        if let Some(previous) = self.attempts.insert(name.to_string(), attempt) {
            log::debug!(
                "Deployment {} of '{name}' superseded",
                previous.token()
            );
        }
    }

    /// Drop the entry for `name` regardless of which attempt holds it
    pub fn remove(&self, name: &str) -> Option<Arc<DeploymentAttempt>> {
        self.attempts.remove(name).map(|(_, attempt)| attempt)
    }

    /// Drop the entry for `name` only while `token` still owns it
    pub fn remove_if_authoritative(&self, name: &str, token: AttemptToken) -> bool {
        self.attempts
            .remove_if(name, |_, current| current.token() == token)
            .is_some()
    }

    pub fn is_authoritative(&self, name: &str, token: AttemptToken) -> bool {
        self.attempts
            .get(name)
            .map(|current| current.token() == token)
            .unwrap_or(false)
    }

    pub fn pending(&self) -> Vec<PendingDeployment> {
        let mut pending: Vec<PendingDeployment> = self
            .attempts
            .iter()
            .map(|entry| PendingDeployment {
                cluster_name: entry.key().clone(),
                token: entry.value().token(),
                created_at: entry.value().created_at(),
            })
            .collect();
        pending.sort_by(|a, b| a.cluster_name.cmp(&b.cluster_name));
        pending
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}
