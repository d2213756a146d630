//! Integration tests for last-writer-wins deployment of a single job.
//!
//! Repeated submits for the same job must converge on the most recently
//! registered graph, with older workers abandoning without touching the
//! cluster further.

#![cfg(feature = "test-harness")]

use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use topology_deployer::orchestrator::{DeploymentOutcome, ExecutableGraph, JobIdentity};
use topology_deployer::test_harness::{ClusterCall, SimulatedCluster};

use crate::integration::{orchestrator_for, poll_until};

/// Redeploying a running job while an older redeploy is still listing the
/// cluster: the older worker abandons after its listing, the newer one kills
/// and resubmits.
#[tokio::test(start_paused = true)]
async fn test_newer_submit_replaces_running_topology() {
    let _ = env_logger::try_init();

    let cluster = Arc::new(SimulatedCluster::new());
    let orchestrator = orchestrator_for(&cluster);
    let job = JobIdentity::new("orders", 5);
    let g1 = ExecutableGraph::new(json!({"bolts": ["filter-v1"]}));
    let g2 = ExecutableGraph::new(json!({"bolts": ["filter-v2"]}));

    // Initial deployment onto an empty cluster.
    let outcome = orchestrator
        .submit(job.clone(), g1.clone(), Duration::from_millis(100))
        .outcome()
        .await
        .unwrap();
    assert_eq!(outcome, DeploymentOutcome::Deployed { retries: 0 });
    assert_eq!(cluster.running_graph("orders[5]").await, Some(g1.clone()));
    let calls_before = cluster.calls().await.len();

    // Each call takes 50ms; G2 arrives while the redeploy of G1 is listing.
    cluster.set_call_latency(Duration::from_millis(50)).await;
    let stale = orchestrator.submit(job.clone(), g1.clone(), Duration::from_millis(100));
    tokio::time::sleep(Duration::from_millis(10)).await;
    let fresh = orchestrator.submit(job.clone(), g2.clone(), Duration::from_millis(100));

    assert!(matches!(
        stale.outcome().await.unwrap(),
        DeploymentOutcome::Superseded { .. }
    ));
    assert_eq!(
        fresh.outcome().await.unwrap(),
        DeploymentOutcome::Deployed { retries: 0 }
    );

    assert_eq!(cluster.running_graph("orders[5]").await, Some(g2));
    assert!(orchestrator.pending().is_empty());

    let calls = cluster.calls().await.split_off(calls_before);
    // The stale listing completes first, 10ms ahead of the fresh one.
    assert_eq!(calls[0], ClusterCall::ListRunning);
    let count = |matcher: fn(&ClusterCall) -> bool| calls.iter().filter(|c| matcher(c)).count();
    // One listing from the stale worker; list, removal poll and re-list from the fresh one.
    assert_eq!(count(|c| matches!(c, ClusterCall::ListRunning)), 4);
    assert_eq!(count(|c| matches!(c, ClusterCall::Kill { .. })), 1);
    assert_eq!(count(|c| matches!(c, ClusterCall::UploadArtifact { .. })), 1);
    assert_eq!(count(|c| matches!(c, ClusterCall::Submit { .. })), 1);
}

/// A worker whose submit is in flight when a newer request arrives does not
/// count as deployed; the newer request replaces what it submitted.
#[tokio::test(start_paused = true)]
async fn test_submit_overtaken_mid_flight() {
    let cluster = Arc::new(SimulatedCluster::new());
    cluster.set_call_latency(Duration::from_millis(50)).await;
    let orchestrator = orchestrator_for(&cluster);
    let job = JobIdentity::new("orders", 5);
    let g2 = ExecutableGraph::new(json!({"v": 2}));

    let first = orchestrator.submit(
        job.clone(),
        ExecutableGraph::new(json!({"v": 1})),
        Duration::from_millis(100),
    );
    // List and upload finish at 100ms, the submit lands at 150ms.
    tokio::time::sleep(Duration::from_millis(120)).await;
    let second = orchestrator.submit(job, g2.clone(), Duration::from_millis(100));

    assert_eq!(
        first.outcome().await.unwrap(),
        DeploymentOutcome::Superseded { retries: 0 }
    );
    assert_eq!(
        second.outcome().await.unwrap(),
        DeploymentOutcome::Deployed { retries: 0 }
    );
    assert_eq!(cluster.running_graph("orders[5]").await, Some(g2));
    let kills = cluster
        .count_calls(|call| matches!(call, ClusterCall::Kill { .. }))
        .await;
    assert_eq!(kills, 1);
}

/// Staggered submits of one job: every worker reaches the cluster, but only
/// the last one registered deploys.
#[tokio::test(start_paused = true)]
async fn test_concurrent_submits_converge_on_last_registered() {
    let cluster = Arc::new(SimulatedCluster::new());
    cluster.set_call_latency(Duration::from_millis(20)).await;
    let orchestrator = orchestrator_for(&cluster);
    let job = JobIdentity::new("orders", 5);

    // A new request every 10ms, each listing for 20ms before it can act.
    let submitters: Vec<_> = (0..8u64)
        .map(|version| {
            let orchestrator = orchestrator.clone();
            let job = job.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10 * version)).await;
                let graph = ExecutableGraph::new(json!({ "version": version }));
                let handle = orchestrator.submit(job, graph.clone(), Duration::from_millis(100));
                (graph, handle)
            })
        })
        .collect();

    let mut submitted = Vec::new();
    for submitter in submitters {
        submitted.push(submitter.await.unwrap());
    }
    let expected = ExecutableGraph::new(json!({ "version": 7 }));

    let (graphs, handles): (Vec<_>, Vec<_>) = submitted.into_iter().unzip();
    let outcomes: Vec<_> = join_all(handles.into_iter().map(|handle| handle.outcome()))
        .await
        .into_iter()
        .map(|outcome| outcome.unwrap())
        .collect();

    let deployed: Vec<_> = graphs
        .iter()
        .zip(&outcomes)
        .filter(|(_, outcome)| matches!(outcome, DeploymentOutcome::Deployed { .. }))
        .map(|(graph, _)| graph.clone())
        .collect();
    assert_eq!(deployed, vec![expected.clone()]);
    assert_eq!(cluster.running_graph("orders[5]").await, Some(expected));

    let listings = cluster
        .count_calls(|call| matches!(call, ClusterCall::ListRunning))
        .await;
    assert_eq!(listings, 8, "every worker checked the cluster once");
    let submits = cluster
        .count_calls(|call| matches!(call, ClusterCall::Submit { .. }))
        .await;
    assert_eq!(submits, 1);
}

/// Different jobs deploy independently of each other.
#[tokio::test(start_paused = true)]
async fn test_jobs_deploy_in_parallel() {
    let cluster = Arc::new(SimulatedCluster::new());
    let orchestrator = orchestrator_for(&cluster);

    let handles: Vec<_> = [("orders", 5), ("orders", 6), ("billing", 5)]
        .into_iter()
        .map(|(name, tenant)| {
            orchestrator.submit(
                JobIdentity::new(name, tenant),
                ExecutableGraph::new(json!({ "job": name, "tenant": tenant })),
                Duration::from_millis(100),
            )
        })
        .collect();

    for outcome in join_all(handles.into_iter().map(|handle| handle.outcome())).await {
        assert_eq!(outcome.unwrap(), DeploymentOutcome::Deployed { retries: 0 });
    }

    let mut names: Vec<_> = orchestrator
        .list_running()
        .await
        .unwrap()
        .into_iter()
        .map(|summary| summary.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["billing[5]", "orders[5]", "orders[6]"]);
}

/// A kill racing ahead of a fresh submit does not stop the fresh deployment.
#[tokio::test(start_paused = true)]
async fn test_kill_then_submit_deploys_new_graph() {
    let cluster = Arc::new(SimulatedCluster::new());
    let orchestrator = orchestrator_for(&cluster);
    let job = JobIdentity::new("orders", 5);
    let graph = ExecutableGraph::new(json!({"v": 2}));

    cluster
        .launch_external("orders[5]", ExecutableGraph::new(json!({"v": 1})))
        .await;

    orchestrator.kill(&job).await.unwrap();
    let handle = orchestrator.submit(job, graph.clone(), Duration::from_millis(100));

    let running = poll_until(Duration::from_secs(30), Duration::from_millis(100), || {
        let cluster = cluster.clone();
        async move { cluster.running_graph("orders[5]").await }
    })
    .await;
    assert_eq!(running, Some(graph));
    assert_eq!(
        handle.outcome().await.unwrap(),
        DeploymentOutcome::Deployed { retries: 0 }
    );
}
