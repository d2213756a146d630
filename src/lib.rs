pub mod orchestrator;

#[cfg(any(test, feature = "test-harness"))]
pub mod test_harness;

// Fixed cluster-side timings used while replacing a running topology
pub const DEFAULT_KILL_WAIT_SECS: u64 = 10;
pub const DEFAULT_REMOVAL_POLL_MS: u64 = 5000;
pub const DEFAULT_REMOVAL_SETTLE_MS: u64 = 2000;

// Default interval between transient retries when the caller does not supply one
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 10_000;

// Topology status strings reported by the cluster
pub const TOPOLOGY_STATUS_ACTIVE: &str = "ACTIVE";
pub const TOPOLOGY_STATUS_KILLED: &str = "KILLED";
