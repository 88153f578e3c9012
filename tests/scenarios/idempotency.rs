//! Test: "already exists" style failures count as success

use crate::helpers::*;
use meshup::stages::{self, *};

#[tokio::test]
async fn test_existing_tooling_is_idempotent() {
    let cluster = FakeCluster::new().fail_manifest(
        "serviceaccount.json",
        "Error from server (AlreadyExists): serviceaccounts \"tiller\" already exists",
    );
    let harness = Harness::with(THREE_CLUSTERS, ScriptedProcess::new(), cluster, |_| {});

    let report = harness
        .run(&stages::provisioning_pipeline(&harness.targets))
        .await
        .unwrap();

    let (_, summary) = report
        .steps
        .iter()
        .find(|(stage, _)| stage == TILLER_SERVICE_ACCOUNT)
        .unwrap();
    assert_eq!(summary.idempotent, 3);
    assert_eq!(summary.failed, 0);
    assert!(harness
        .outcomes(TILLER_SERVICE_ACCOUNT)
        .iter()
        .all(|o| o.diagnostic.contains("already exists")));
}

#[tokio::test]
async fn test_tooling_created_one_cluster_at_a_time() {
    let harness = Harness::new(THREE_CLUSTERS);
    harness
        .run(&stages::provisioning_pipeline(&harness.targets))
        .await
        .unwrap();

    let creates = harness.cluster.calls_containing(": create ");
    let order: Vec<_> = creates
        .iter()
        .map(|c| (c.split(':').next().unwrap(), c.rsplit('/').next().unwrap()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("cluster1", "serviceaccount.json -n kube-system"),
            ("cluster2", "serviceaccount.json -n kube-system"),
            ("cluster3", "serviceaccount.json -n kube-system"),
            ("cluster1", "clusterrolebinding.json -n kube-system"),
            ("cluster2", "clusterrolebinding.json -n kube-system"),
            ("cluster3", "clusterrolebinding.json -n kube-system"),
            ("cluster1", "tillerdeploy.json -n kube-system"),
            ("cluster2", "tillerdeploy.json -n kube-system"),
            ("cluster3", "tillerdeploy.json -n kube-system"),
        ]
    );
}

#[tokio::test]
async fn test_other_failure_aborts() {
    let cluster = FakeCluster::new().fail_manifest(
        "clusterrolebinding.json",
        "Error from server (Forbidden): clusterrolebindings.rbac.authorization.k8s.io is forbidden",
    );
    let harness = Harness::with(THREE_CLUSTERS, ScriptedProcess::new(), cluster, |_| {});

    let err = harness
        .run(&stages::provisioning_pipeline(&harness.targets))
        .await
        .unwrap_err();

    assert_eq!(err.report().stage, TILLER_ROLE_BINDING);
    assert_eq!(err.report().failures.len(), 3);
    assert!(harness.outcomes(TILLER_DEPLOYMENT).is_empty());
}

#[tokio::test]
async fn test_existing_broker_release_is_idempotent() {
    let process = ScriptedProcess::new().fail_on(
        "submariner-latest/submariner-k8s-broker",
        "Error: a release named submariner-k8s-broker already exists.",
    );
    let harness = Harness::with(THREE_CLUSTERS, process, FakeCluster::new(), |_| {});

    harness
        .run(&stages::provisioning_pipeline(&harness.targets))
        .await
        .unwrap();

    assert_eq!(
        harness.outcomes(BROKER)[0].status,
        meshup::core::OutcomeStatus::OkIdempotent
    );
    assert_eq!(harness.outcomes(GATEWAY).len(), 2);
}
