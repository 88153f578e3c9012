//! Terraform-driven machine lifecycle for infra-managed platforms

use crate::args;
use crate::collab::{run_checked, CollaboratorError};
use crate::core::{RunContext, StageAction, Target};
use async_trait::async_trait;
use std::fmt;

/// Terraform module provisioned per cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Infra,
    Bootstrap,
    Workers,
}

impl Module {
    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Infra => "infra",
            Module::Bootstrap => "bootstrap",
            Module::Workers => "workers",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Apply,
    Destroy,
}

fn chdir(ctx: &RunContext) -> String {
    format!("-chdir={}", ctx.state().root().display())
}

/// `terraform init` in the working directory
pub struct TerraformInit;

#[async_trait]
impl StageAction for TerraformInit {
    async fn invoke(&self, _target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let output = run_checked(
            ctx.process(),
            &ctx.tools.terraform,
            &args![chdir(ctx), "init", "-input=false"],
        )
        .await?;
        Ok(output.last_line().to_string())
    }
}

/// Apply or destroy one module of a cluster
pub struct TerraformModule {
    pub module: Module,
    pub action: Action,
}

impl TerraformModule {
    pub fn apply(module: Module) -> Self {
        Self {
            module,
            action: Action::Apply,
        }
    }

    pub fn destroy(module: Module) -> Self {
        Self {
            module,
            action: Action::Destroy,
        }
    }

    fn arguments(&self, target: &Target, infra_id: &str, ctx: &RunContext) -> Vec<String> {
        let action = match self.action {
            Action::Apply => "apply",
            Action::Destroy => "destroy",
        };
        let network = &target.network;

        let mut args = args![
            chdir(ctx),
            action,
            "-target",
            format!("module.{}-{}", target.name, self.module),
            "-var",
            format!("aws_region={}", network.region),
            "-var",
            format!("infra_id={}", infra_id),
            "-var",
            format!("vpc_cidr={}", network.vpc_cidr),
            "-var",
            format!("dns_domain={}", network.dns_domain)
        ];

        match self.module {
            Module::Infra => {
                args.extend(args!["-var", format!("num_master_nodes={}", target.nodes.masters)]);
            }
            Module::Workers => {
                args.extend(args![
                    "-var",
                    format!("num_worker_nodes={}", target.nodes.workers),
                    "-var",
                    format!("num_subm_gateway_nodes={}", target.nodes.gateways)
                ]);
            }
            Module::Bootstrap => {}
        }

        let state = ctx.state().terraform_state(&target.name, self.module.as_str());
        args.extend(args!["-state", state.display(), "-input=false", "-auto-approve"]);
        args
    }
}

#[async_trait]
impl StageAction for TerraformModule {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let infra = ctx.state().infra_details(&target.name).await?;
        let args = self.arguments(target, &infra.infra_id, ctx);
        let output = run_checked(ctx.process(), &ctx.tools.terraform, &args).await?;
        Ok(output.last_line().to_string())
    }
}
