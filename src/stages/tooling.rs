//! In-cluster tooling controller (tiller) and local helm client setup

use crate::args;
use crate::collab::{run_checked, CollaboratorError};
use crate::core::config::ToolingManifests;
use crate::core::{RunContext, StageAction, Target};
use crate::execution::PollWatcher;
use async_trait::async_trait;
use std::path::Path;

pub const TOOLING_NAMESPACE: &str = "kube-system";
pub const CONTROLLER_SELECTOR: &str = "app=helm,name=tiller";
pub const CONTROLLER_DEPLOYMENT: &str = "tiller-deploy";

/// Create one tooling resource from its manifest file
pub struct CreateToolingResource {
    pub kind: &'static str,
    pub manifest: fn(&ToolingManifests) -> &Path,
}

#[async_trait]
impl StageAction for CreateToolingResource {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let kubeconfig = ctx.state().kubeconfig(&target.name);
        let manifest = (self.manifest)(&ctx.tooling);
        ctx.cluster()
            .create_from_manifest(&kubeconfig, TOOLING_NAMESPACE, manifest)
            .await?;
        Ok(format!("{} created", self.kind))
    }
}

/// Wait for the controller deployment to report a ready replica
pub struct WaitForController;

#[async_trait]
impl StageAction for WaitForController {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let kubeconfig = ctx.state().kubeconfig(&target.name);
        let kubeconfig = kubeconfig.as_path();
        let watcher = PollWatcher::from_spec(ctx.timeouts.controller_ready);

        watcher
            .wait_until("tiller ready", move || async move {
                let deployments = ctx
                    .cluster()
                    .list_deployments(kubeconfig, TOOLING_NAMESPACE, CONTROLLER_SELECTOR)
                    .await?;
                Ok::<_, CollaboratorError>(
                    deployments
                        .iter()
                        .any(|d| d.name == CONTROLLER_DEPLOYMENT && d.ready_replicas >= 1),
                )
            })
            .await
            .into_stage_result("tiller ready")
    }
}

/// `helm init --client-only`
pub struct HelmClientInit;

#[async_trait]
impl StageAction for HelmClientInit {
    async fn invoke(&self, _target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        run_checked(ctx.process(), &ctx.tools.helm, &args!["init", "--client-only"]).await?;
        Ok("helm client initialized".to_string())
    }
}

/// `helm repo add <name> <url>` for the configured chart repository
pub struct HelmRepoAdd;

#[async_trait]
impl StageAction for HelmRepoAdd {
    async fn invoke(&self, _target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let repo = &ctx.helm.helm_repo;
        let output = run_checked(
            ctx.process(),
            &ctx.tools.helm,
            &args!["repo", "add", repo.name, repo.url],
        )
        .await?;
        Ok(output.last_line().to_string())
    }
}
