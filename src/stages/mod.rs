//! Stage catalog and the pipelines built from it

pub mod credentials;
pub mod infra;
pub mod install;
pub mod mesh;
pub mod template;
pub mod tooling;

use crate::core::config::ToolingManifests;
use crate::core::stage::applicability;
use crate::core::{ExecutionMode, IdempotencyMatcher, Pipeline, Platform, RunContext, Stage, TargetSelector, TargetSet};
use credentials::NormalizeKubeconfig;
use infra::{Module, TerraformInit, TerraformModule};
use install::{CreateInstallerAssets, DestroyCluster, PruneMachineManifests, RenderInstallConfig, WaitForInstaller};
use mesh::{
    BrokerInstall, GatewayInstall, GrantSecurityContext, LabelGateways, RemoveMeshCrds, RemoveRelease,
    RolloutImage, WaitForEngine,
};
use std::path::Path;
use tooling::{CreateToolingResource, HelmClientInit, HelmRepoAdd, WaitForController};

pub const INSTALL_CONFIG: &str = "install-config";
pub const MANIFESTS: &str = "manifests";
pub const PRUNE_MACHINE_MANIFESTS: &str = "prune-machine-manifests";
pub const IGNITION_CONFIGS: &str = "ignition-configs";
pub const TERRAFORM_INIT: &str = "terraform-init";
pub const INFRA: &str = "infra";
pub const BOOTSTRAP: &str = "bootstrap";
pub const WAIT_BOOTSTRAP: &str = "wait-bootstrap-complete";
pub const WORKERS: &str = "workers";
pub const WAIT_INSTALL: &str = "wait-install-complete";
pub const DESTROY_BOOTSTRAP: &str = "destroy-bootstrap";
pub const TILLER_SERVICE_ACCOUNT: &str = "tiller-service-account";
pub const TILLER_ROLE_BINDING: &str = "tiller-role-binding";
pub const TILLER_DEPLOYMENT: &str = "tiller-deployment";
pub const WAIT_TILLER: &str = "wait-tiller";
pub const HELM_INIT: &str = "helm-init";
pub const HELM_REPO: &str = "helm-repo";
pub const BROKER: &str = "broker";
pub const LABEL_GATEWAYS: &str = "label-gateways";
pub const SECURITY_CONTEXT: &str = "security-context";
pub const GATEWAY: &str = "gateway";
pub const WAIT_ENGINE: &str = "wait-engine";
pub const KUBECONFIG_DEV: &str = "kubeconfig-dev";
pub const REMOVE_HUB_RELEASE: &str = "remove-broker-release";
pub const REMOVE_SPOKE_RELEASE: &str = "remove-gateway-release";
pub const REMOVE_CRDS: &str = "remove-crds";
pub const ROLLOUT_IMAGE: &str = "rollout-image";
pub const DESTROY_CLUSTER: &str = "destroy-cluster";

fn infra_step(name: &str, module: Module, apply: bool) -> Stage {
    let action = if apply {
        TerraformModule::apply(module)
    } else {
        TerraformModule::destroy(module)
    };
    Stage::new(name, action).applies_when(applicability::infra_managed)
}

fn tooling_step(name: &str, kind: &'static str, manifest: fn(&ToolingManifests) -> &Path) -> Stage {
    Stage::new(name, CreateToolingResource { kind, manifest })
        .idempotent_on(IdempotencyMatcher::already_exists())
}

fn broker_stage() -> Stage {
    Stage::new(BROKER, BrokerInstall)
        .applies_when(applicability::hub)
        .idempotent_on(IdempotencyMatcher::already_exists())
}

fn gateway_stage(targets: &TargetSet) -> Stage {
    Stage::new(
        GATEWAY,
        GatewayInstall {
            broker: targets.hub().clone(),
        },
    )
    .applies_when(applicability::spoke)
    .idempotent_on(IdempotencyMatcher::already_exists())
}

fn wait_engine_stage() -> Stage {
    Stage::new(WAIT_ENGINE, WaitForEngine).applies_when(applicability::spoke)
}

/// Full provisioning: clusters, shared tooling, then the mesh
pub fn provisioning_pipeline(targets: &TargetSet) -> Pipeline {
    use ExecutionMode::{Once, Sequential};
    use TargetSelector::{All, Hub, Spokes};

    Pipeline::new("create clusters")
        .parallel(Stage::new(INSTALL_CONFIG, RenderInstallConfig), All)
        .parallel(Stage::new(MANIFESTS, CreateInstallerAssets { asset: "manifests" }), All)
        .parallel(
            Stage::new(PRUNE_MACHINE_MANIFESTS, PruneMachineManifests)
                .applies_when(applicability::infra_managed),
            All,
        )
        .parallel(
            Stage::new(IGNITION_CONFIGS, CreateInstallerAssets { asset: "ignition-configs" }),
            All,
        )
        .step(
            Stage::new(TERRAFORM_INIT, TerraformInit).applies_when(applicability::infra_managed),
            TargetSelector::Platform(Platform::Aws),
            Once,
        )
        .parallel(infra_step(INFRA, Module::Infra, true), All)
        .parallel(infra_step(BOOTSTRAP, Module::Bootstrap, true), All)
        .parallel(
            Stage::new(
                WAIT_BOOTSTRAP,
                WaitForInstaller {
                    condition: "bootstrap-complete",
                    spec: |t| t.bootstrap_complete,
                },
            )
            .applies_when(applicability::infra_managed),
            All,
        )
        .parallel(infra_step(WORKERS, Module::Workers, true), All)
        .parallel(
            Stage::new(
                WAIT_INSTALL,
                WaitForInstaller {
                    condition: "install-complete",
                    spec: |t| t.install_complete,
                },
            )
            .applies_when(applicability::infra_managed),
            All,
        )
        .parallel(infra_step(DESTROY_BOOTSTRAP, Module::Bootstrap, false), All)
        .step(
            tooling_step(TILLER_SERVICE_ACCOUNT, "service account", |m| m.service_account.as_path()),
            All,
            Sequential,
        )
        .step(
            tooling_step(TILLER_ROLE_BINDING, "cluster role binding", |m| m.cluster_role_binding.as_path()),
            All,
            Sequential,
        )
        .step(
            tooling_step(TILLER_DEPLOYMENT, "tiller deployment", |m| m.deployment.as_path()),
            All,
            Sequential,
        )
        .parallel(Stage::new(WAIT_TILLER, WaitForController), All)
        .step(Stage::new(HELM_INIT, HelmClientInit), Hub, Once)
        .step(
            Stage::new(HELM_REPO, HelmRepoAdd).idempotent_on(IdempotencyMatcher::already_exists()),
            Hub,
            Once,
        )
        .step(broker_stage(), Hub, Once)
        .parallel(
            Stage::new(LABEL_GATEWAYS, LabelGateways).applies_when(applicability::infra_managed_spoke),
            Spokes,
        )
        .parallel(
            Stage::new(SECURITY_CONTEXT, GrantSecurityContext).applies_when(applicability::spoke),
            Spokes,
        )
        .parallel(gateway_stage(targets), Spokes)
        .parallel(wait_engine_stage(), Spokes)
        .parallel(Stage::new(KUBECONFIG_DEV, NormalizeKubeconfig), All)
}

/// Remove and reinstall the mesh on already provisioned clusters
pub fn mesh_reinstall_pipeline(targets: &TargetSet) -> Pipeline {
    use ExecutionMode::Once;
    use TargetSelector::{All, Hub, Spokes};

    fn broker_release(ctx: &RunContext) -> &str {
        &ctx.helm.broker.namespace
    }

    fn gateway_release(ctx: &RunContext) -> &str {
        &ctx.helm.engine.namespace
    }

    Pipeline::new("reinstall mesh")
        .step(
            Stage::new(REMOVE_HUB_RELEASE, RemoveRelease { release: broker_release })
                .idempotent_on(IdempotencyMatcher::not_found()),
            Hub,
            Once,
        )
        .parallel(
            Stage::new(REMOVE_SPOKE_RELEASE, RemoveRelease { release: gateway_release })
                .applies_when(applicability::spoke)
                .idempotent_on(IdempotencyMatcher::not_found()),
            Spokes,
        )
        .parallel(
            Stage::new(REMOVE_CRDS, RemoveMeshCrds).idempotent_on(IdempotencyMatcher::not_found()),
            All,
        )
        .step(Stage::new(HELM_INIT, HelmClientInit), Hub, Once)
        .step(
            Stage::new(HELM_REPO, HelmRepoAdd).idempotent_on(IdempotencyMatcher::already_exists()),
            Hub,
            Once,
        )
        .step(broker_stage(), Hub, Once)
        .parallel(gateway_stage(targets), Spokes)
        .parallel(wait_engine_stage(), Spokes)
}

/// Point every spoke's mesh workloads at the configured images
pub fn image_rollout_pipeline() -> Pipeline {
    Pipeline::new("update mesh").step(
        Stage::new(ROLLOUT_IMAGE, RolloutImage).applies_when(applicability::spoke),
        TargetSelector::Spokes,
        ExecutionMode::Sequential,
    )
}

/// Per-target cluster destruction
pub fn teardown_stage() -> Stage {
    Stage::new(DESTROY_CLUSTER, DestroyCluster)
}
