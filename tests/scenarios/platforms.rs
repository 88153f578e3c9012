//! Test: stage applicability by platform

use crate::helpers::*;
use meshup::core::{OutcomeStatus, Platform};
use meshup::stages::{self, *};

fn openstack_spokes(config: &mut meshup::core::config::MeshupConfig) {
    for cluster in config.clusters.iter_mut().skip(1) {
        cluster.platform = Platform::Openstack;
    }
}

#[tokio::test]
async fn test_installer_managed_platform_skips_machine_lifecycle() {
    let harness = Harness::with(THREE_CLUSTERS, ScriptedProcess::new(), FakeCluster::new(), openstack_spokes);

    harness
        .run(&stages::provisioning_pipeline(&harness.targets))
        .await
        .unwrap();

    for stage in [PRUNE_MACHINE_MANIFESTS, INFRA, BOOTSTRAP, WAIT_BOOTSTRAP, WORKERS, WAIT_INSTALL, DESTROY_BOOTSTRAP] {
        let statuses: Vec<_> = harness.outcomes(stage).into_iter().map(|o| o.status).collect();
        assert_eq!(
            statuses,
            vec![OutcomeStatus::Ok, OutcomeStatus::OkSkipped, OutcomeStatus::OkSkipped],
            "{}",
            stage
        );
    }

    assert!(harness.process.calls_containing("module.cluster2-").is_empty());
    assert!(harness.process.calls_containing("module.cluster3-").is_empty());
    assert_eq!(harness.process.calls_containing("terraform -chdir=").len(), 1 + 4);
}

#[tokio::test]
async fn test_installer_managed_spokes_skip_inventory_lookup() {
    let harness = Harness::with(THREE_CLUSTERS, ScriptedProcess::new(), FakeCluster::new(), openstack_spokes);

    harness
        .run(&stages::provisioning_pipeline(&harness.targets))
        .await
        .unwrap();

    assert!(harness
        .outcomes(LABEL_GATEWAYS)
        .iter()
        .all(|o| o.status == OutcomeStatus::OkSkipped));
    assert!(harness.cloud.calls().is_empty());
    // The mesh still comes up on every spoke
    assert_eq!(harness.outcomes(GATEWAY).len(), 2);
    assert!(harness.outcomes(WAIT_ENGINE).iter().all(|o| o.status == OutcomeStatus::Ok));
}

#[tokio::test]
async fn test_no_terraform_without_infra_managed_targets() {
    let harness = Harness::with(THREE_CLUSTERS, ScriptedProcess::new(), FakeCluster::new(), |config| {
        for cluster in config.clusters.iter_mut() {
            cluster.platform = Platform::Vsphere;
        }
    });

    harness
        .run(&stages::provisioning_pipeline(&harness.targets))
        .await
        .unwrap();

    assert!(harness.outcomes(TERRAFORM_INIT).is_empty());
    assert!(harness.process.calls_containing("terraform").is_empty());
}
