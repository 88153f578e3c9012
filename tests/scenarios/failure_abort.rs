//! Test: a failed step aborts the whole run

use crate::helpers::*;
use meshup::core::OutcomeStatus;
use meshup::stages::{self, *};
use meshup::ProvisionError;

const QUOTA_ERROR: &str = "Error: Error launching source instance: InvalidParameterValue: \
                           Value (m5.xlarge) for parameter instanceType is invalid.";

#[tokio::test]
async fn test_worker_failure_aborts_before_install_wait() {
    let process = ScriptedProcess::new().fail_on("module.cluster2-workers", QUOTA_ERROR);
    let harness = Harness::with(THREE_CLUSTERS, process, FakeCluster::new(), |_| {});

    let err = harness
        .run(&stages::provisioning_pipeline(&harness.targets))
        .await
        .unwrap_err();

    let ProvisionError::Aborted(report) = &err else {
        panic!("expected abort, got {err}");
    };
    assert_eq!(report.stage, WORKERS);
    assert_eq!(report.failed_targets(), vec!["cluster2"]);
    assert!(report.failures[0].diagnostic.contains("InvalidParameterValue"));
    assert!(err.to_string().contains("cluster2 [workers]"));

    assert!(harness.process.calls_containing("wait-for install-complete").is_empty());
    assert_eq!(harness.started_stages().last().map(String::as_str), Some(WORKERS));
}

#[tokio::test]
async fn test_failure_does_not_cancel_sibling_targets() {
    let process = ScriptedProcess::new().fail_on("module.cluster2-workers", QUOTA_ERROR);
    let harness = Harness::with(THREE_CLUSTERS, process, FakeCluster::new(), |_| {});

    harness
        .run(&stages::provisioning_pipeline(&harness.targets))
        .await
        .unwrap_err();

    let statuses: Vec<_> = harness
        .outcomes(WORKERS)
        .into_iter()
        .map(|o| (o.target, o.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("cluster1".to_string(), OutcomeStatus::Ok),
            ("cluster2".to_string(), OutcomeStatus::Failed),
            ("cluster3".to_string(), OutcomeStatus::Ok),
        ]
    );
    assert_eq!(harness.process.calls_containing("module.cluster3-workers").len(), 1);
}

#[tokio::test]
async fn test_every_failed_target_is_reported() {
    let process = ScriptedProcess::new()
        .fail_on("create manifests --dir", "level=fatal msg=\"failed to fetch Master Machines\"");
    let harness = Harness::with(THREE_CLUSTERS, process, FakeCluster::new(), |_| {});

    let err = harness
        .run(&stages::provisioning_pipeline(&harness.targets))
        .await
        .unwrap_err();

    assert_eq!(err.report().stage, MANIFESTS);
    assert_eq!(err.report().failed_targets(), vec!["cluster1", "cluster2", "cluster3"]);
    assert!(harness.process.calls_containing("ignition-configs").is_empty());
}
