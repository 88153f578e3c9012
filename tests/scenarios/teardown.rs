//! Test: concurrent teardown of every cluster

use crate::helpers::*;
use meshup::ProvisionError;

fn seed_state(harness: &Harness) {
    let state = harness.ctx.state();
    for name in ["cluster1", "cluster2", "cluster3"] {
        for module in ["infra", "bootstrap", "workers"] {
            let path = state.terraform_state(name, module);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "{}").unwrap();
        }
    }
}

#[tokio::test]
async fn test_teardown_destroys_and_removes_state() {
    let harness = Harness::new(THREE_CLUSTERS);
    seed_state(&harness);

    let report = harness.teardown().await.unwrap();

    assert_eq!(report.steps[0].1.ok, 3);
    assert_eq!(harness.process.calls_containing("openshift-install destroy cluster").len(), 3);
    let remaining = std::fs::read_dir(harness.ctx.state().terraform_state_dir())
        .unwrap()
        .count();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_teardown_attempts_every_target() {
    let process = ScriptedProcess::new().fail_on(
        ".config/cluster2 --log-level",
        "level=fatal msg=\"Failed to destroy cluster: UnauthorizedOperation\"",
    );
    let harness = Harness::with(THREE_CLUSTERS, process, FakeCluster::new(), |_| {});
    seed_state(&harness);

    let err = harness.teardown().await.unwrap_err();

    let ProvisionError::TeardownFailed(report) = &err else {
        panic!("expected teardown failure, got {err}");
    };
    assert_eq!(report.failed_targets(), vec!["cluster2"]);
    assert!(report.failures[0].diagnostic.contains("UnauthorizedOperation"));
    assert_eq!(harness.process.calls_containing("destroy cluster").len(), 3);

    // State of the cluster that failed to destroy is kept
    let state = harness.ctx.state();
    assert!(state.terraform_state("cluster2", "infra").exists());
    assert!(!state.terraform_state("cluster1", "infra").exists());
}
