use serde::{Deserialize, Serialize};
use std::fmt;

/// A job namespaced under a tenant. Two identities deploy to the same cluster
/// topology if and only if they are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobIdentity {
    pub job_name: String,
    pub tenant_id: i32,
}

impl JobIdentity {
    pub fn new(job_name: impl Into<String>, tenant_id: i32) -> Self {
        Self {
            job_name: job_name.into(),
            tenant_id,
        }
    }

    /// Name the cluster knows this job by, `<jobName>[<tenantId>]`.
    ///
    /// Existing deployments are located by this exact string, so the format
    /// must not change. The tenant id never contains `[`, which keeps the
    /// mapping injective even when job names do.
    pub fn cluster_name(&self) -> String {
        format!("{}[{}]", self.job_name, self.tenant_id)
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "job '{}' of tenant '{}'",
            self.job_name, self.tenant_id
        )
    }
}
