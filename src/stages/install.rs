//! Installer stages: install config, manifests, ignition, completion waits

use crate::args;
use crate::collab::{run_checked, CollaboratorError};
use crate::core::{PollSpec, PollTimeouts, RunContext, StageAction, Target};
use crate::execution::PollWatcher;
use crate::stages::template;
use async_trait::async_trait;
use tracing::{debug, info};

const MACHINE_MANIFESTS: [&str; 2] = [
    "99_openshift-cluster-api_master-machines-",
    "99_openshift-cluster-api_worker-machineset-",
];

/// Render `install-config.yaml` unless the cluster was already installed
pub struct RenderInstallConfig;

#[async_trait]
impl StageAction for RenderInstallConfig {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let state = ctx.state();
        if state.exists(&state.metadata(&target.name)).await {
            debug!("metadata.json exists, leaving install config untouched");
            return Ok("metadata.json exists, install config left untouched".to_string());
        }

        let template_text = state.read(&ctx.templates.install_config).await?;
        let variables = template::install_config_variables(target, ctx);
        let rendered = template::render(&template_text, &variables)?;

        let path = state.install_config(&target.name);
        state.write(&path, &rendered).await?;
        info!("Install config written to {}", path.display());
        Ok(format!("wrote {}", path.display()))
    }
}

/// `openshift-install create <asset>`
pub struct CreateInstallerAssets {
    pub asset: &'static str,
}

#[async_trait]
impl StageAction for CreateInstallerAssets {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let dir = ctx.state().cluster_dir(&target.name);
        let output = run_checked(
            ctx.process(),
            &ctx.tools.openshift_install,
            &args!["create", self.asset, "--dir", dir.display(), "--log-level", "debug"],
        )
        .await?;
        Ok(format!("{} created: {}", self.asset, output.last_line()))
    }
}

/// Drop installer-generated machine manifests; machines come from terraform
pub struct PruneMachineManifests;

#[async_trait]
impl StageAction for PruneMachineManifests {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let state = ctx.state();
        let dir = state.cluster_dir(&target.name).join("openshift");

        let mut removed = 0;
        for prefix in MACHINE_MANIFESTS {
            removed += state.remove_matching(&dir, prefix, ".yaml").await?.len();
        }
        Ok(format!("removed {} machine manifest(s)", removed))
    }
}

/// Poll `openshift-install wait-for <condition>` until it succeeds
///
/// An invocation still in flight when the deadline fires is dropped, not
/// killed: the child `openshift-install` keeps running until its own timeout
/// and its output is discarded. External processes are never killed here.
pub struct WaitForInstaller {
    pub condition: &'static str,
    pub spec: fn(&PollTimeouts) -> PollSpec,
}

#[async_trait]
impl StageAction for WaitForInstaller {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let dir = ctx.state().cluster_dir(&target.name);
        let args = args!["wait-for", self.condition, "--dir", dir.display(), "--log-level", "debug"];
        let args = &args;
        let program = &ctx.tools.openshift_install;
        let watcher = PollWatcher::from_spec((self.spec)(&ctx.timeouts));

        watcher
            .wait_until(self.condition, move || async move {
                run_checked(ctx.process(), program, args).await.map(|_| true)
            })
            .await
            .into_stage_result(self.condition)
    }
}

/// `openshift-install destroy cluster`, then removal of terraform state
pub struct DestroyCluster;

#[async_trait]
impl StageAction for DestroyCluster {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let state = ctx.state();
        let dir = state.cluster_dir(&target.name);
        run_checked(
            ctx.process(),
            &ctx.tools.openshift_install,
            &args!["destroy", "cluster", "--dir", dir.display(), "--log-level", "debug"],
        )
        .await?;

        let removed = state.remove_terraform_state(&target.name).await?;
        info!("Cluster destroyed, {} state file(s) removed", removed.len());
        Ok(format!("destroyed, {} terraform state file(s) removed", removed.len()))
    }
}
