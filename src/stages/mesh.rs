//! Mesh networking stages: broker on the hub, gateways on the spokes

use crate::args;
use crate::collab::{run_checked, CollaboratorError, SecretData, WorkloadKind};
use crate::core::{RunContext, StageAction, Target};
use crate::execution::PollWatcher;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::sync::Arc;
use tracing::{debug, info};

pub const BROKER_CHART: &str = "submariner-k8s-broker";
pub const GATEWAY_CHART: &str = "submariner";
pub const GATEWAY_RELEASE: &str = "submariner";
pub const GATEWAY_LABEL: &str = "submariner.io/gateway";
pub const ENGINE_SELECTOR: &str = "app=submariner-engine";
pub const ENGINE_DEPLOYMENT: &str = "submariner";
pub const ROUTE_AGENT_DAEMONSET: &str = "submariner-routeagent";
pub const MESH_CRDS: [&str; 2] = ["clusters.submariner.io", "endpoints.submariner.io"];

const SECURITY_CONSTRAINT: &str = "privileged";
const TOKEN_SECRET_TYPE: &str = "type=kubernetes.io/service-account-token";
const API_PORT: u16 = 6443;

fn mesh_service_accounts(namespace: &str) -> [String; 2] {
    [
        format!("system:serviceaccount:{}:submariner-routeagent", namespace),
        format!("system:serviceaccount:{}:submariner-engine", namespace),
    ]
}

/// `helm install` of the broker chart on the hub
pub struct BrokerInstall;

#[async_trait]
impl StageAction for BrokerInstall {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let kubeconfig = ctx.state().kubeconfig(&target.name);
        let namespace = &ctx.helm.broker.namespace;
        let output = run_checked(
            ctx.process(),
            &ctx.tools.helm,
            &args![
                "install",
                "--debug",
                format!("{}/{}", ctx.helm.helm_repo.name, BROKER_CHART),
                "--name",
                namespace,
                "--namespace",
                namespace,
                "--kubeconfig",
                kubeconfig.display()
            ],
        )
        .await?;
        debug!("{}", output.combined_output);
        info!("Broker was installed on {}", target.name);
        Ok(format!("broker installed in {}", namespace))
    }
}

/// Find the cluster's gateway instances in the cloud inventory and label their nodes
///
/// Only runs on infra-managed spokes. On other platforms gateway nodes are
/// labeled outside meshup before `create clusters` reaches the mesh steps.
pub struct LabelGateways;

#[async_trait]
impl StageAction for LabelGateways {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let infra = ctx.state().infra_details(&target.name).await?;
        let region = &target.network.region;
        let owner_tag = format!("kubernetes.io/cluster/{}", infra.infra_id);

        let networks = ctx.cloud().networks_by_tag(region, &owner_tag, "owned").await?;
        let network = networks.first().ok_or_else(|| {
            CollaboratorError::Precondition(format!("no network tagged {}=owned in {}", owner_tag, region))
        })?;
        debug!("Cluster network is {}", network);

        let tags = [
            (owner_tag.clone(), "owned".to_string()),
            ("Submariner".to_string(), "gateway".to_string()),
        ];
        let instances = ctx.cloud().instances_by_tags(region, network, &tags).await?;
        if instances.is_empty() && target.nodes.gateways > 0 {
            return Err(CollaboratorError::Precondition(format!(
                "expected {} gateway instance(s) in {}, found none",
                target.nodes.gateways, network
            )));
        }

        let kubeconfig = ctx.state().kubeconfig(&target.name);
        for instance in &instances {
            ctx.cluster()
                .label_node(&kubeconfig, &instance.private_dns_name, GATEWAY_LABEL, "true")
                .await?;
            debug!("Labeled {} ({}) as gateway", instance.private_dns_name, instance.id);
        }
        Ok(format!("labeled {} gateway node(s)", instances.len()))
    }
}

/// Add the mesh service accounts to the privileged security context constraint
pub struct GrantSecurityContext;

#[async_trait]
impl StageAction for GrantSecurityContext {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let kubeconfig = ctx.state().kubeconfig(&target.name);
        let mut users = ctx
            .cluster()
            .security_constraint_users(&kubeconfig, SECURITY_CONSTRAINT)
            .await?;

        let missing: Vec<String> = mesh_service_accounts(&ctx.helm.engine.namespace)
            .into_iter()
            .filter(|account| !users.contains(account))
            .collect();
        if missing.is_empty() {
            return Ok("already granted".to_string());
        }

        users.extend(missing.iter().cloned());
        ctx.cluster()
            .set_security_constraint_users(&kubeconfig, SECURITY_CONSTRAINT, &users)
            .await?;
        info!("Security context updated for {}", target.name);
        Ok(format!("granted {} to {}", missing.join(", "), SECURITY_CONSTRAINT))
    }
}

/// Credentials a gateway uses to reach the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerCredentials {
    pub token: String,
    /// Still base64 encoded, the chart expects it that way
    pub ca: String,
}

/// Pick the broker client token secret, ignoring the platform's own copies
pub fn broker_credentials(
    secrets: &[SecretData],
    broker_namespace: &str,
) -> Result<BrokerCredentials, CollaboratorError> {
    let name = format!("{}-client-token", broker_namespace);
    let secret = secrets
        .iter()
        .filter(|s| s.name.contains(&name))
        .find(|s| {
            !s.annotations
                .iter()
                .any(|(k, v)| k.contains("openshift.io") || v.contains("openshift.io"))
        })
        .ok_or_else(|| CollaboratorError::Precondition(format!("no {} secret on the broker", name)))?;

    let encoded = secret
        .data
        .get("token")
        .ok_or_else(|| CollaboratorError::parse("broker secret", "missing token"))?;
    let token = STANDARD
        .decode(encoded)
        .map_err(|e| CollaboratorError::parse("broker token", e))?;
    let token =
        String::from_utf8(token).map_err(|e| CollaboratorError::parse("broker token", e))?;

    let ca = secret
        .data
        .get("ca.crt")
        .cloned()
        .ok_or_else(|| CollaboratorError::parse("broker secret", "missing ca.crt"))?;

    Ok(BrokerCredentials { token, ca })
}

/// `helm install` of the gateway chart on a spoke, pointed at the hub broker
pub struct GatewayInstall {
    pub broker: Arc<Target>,
}

impl GatewayInstall {
    fn values(&self, target: &Target, ctx: &RunContext, creds: &BrokerCredentials) -> String {
        let helm = &ctx.helm;
        let server = format!(
            "api.{}.{}:{}",
            ctx.installed_name(&self.broker.name),
            self.broker.network.dns_domain,
            API_PORT
        );
        [
            format!("ipsec.psk={}", ctx.mesh_secret.expose()),
            format!("broker.server={}", server),
            format!("broker.token={}", creds.token),
            format!("broker.namespace={}", helm.broker.namespace),
            format!("broker.ca={}", creds.ca),
            format!("submariner.clusterId={}", target.name),
            format!("submariner.clusterCidr={}", target.network.vpc_cidr),
            format!("submariner.serviceCidr={}", target.network.svc_cidr),
            "submariner.natEnabled=true".to_string(),
            format!("routeAgent.image.repository={}", helm.route_agent.image.repository),
            format!("routeAgent.image.tag={}", helm.route_agent.image.tag),
            format!("engine.image.repository={}", helm.engine.image.repository),
            format!("engine.image.tag={}", helm.engine.image.tag),
        ]
        .join(",")
    }
}

#[async_trait]
impl StageAction for GatewayInstall {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let broker_kubeconfig = ctx.state().kubeconfig(&self.broker.name);
        let secrets = ctx
            .cluster()
            .list_secrets(&broker_kubeconfig, &ctx.helm.broker.namespace, TOKEN_SECRET_TYPE)
            .await?;
        let creds = broker_credentials(&secrets, &ctx.helm.broker.namespace)?;

        let kubeconfig = ctx.state().kubeconfig(&target.name);
        let output = run_checked(
            ctx.process(),
            &ctx.tools.helm,
            &args![
                "install",
                "--debug",
                format!("{}/{}", ctx.helm.helm_repo.name, GATEWAY_CHART),
                "--name",
                GATEWAY_RELEASE,
                "--namespace",
                ctx.helm.engine.namespace,
                "--kubeconfig",
                kubeconfig.display(),
                "--set",
                self.values(target, ctx, &creds)
            ],
        )
        .await?;
        debug!("{}", output.combined_output);
        info!("Gateway was installed on {}", target.name);
        Ok(format!("gateway installed, broker {}", self.broker.name))
    }
}

/// Wait until every gateway runs a ready engine replica
///
/// Counts `numGateways` on every spoke, including those whose gateway nodes
/// were labeled outside meshup.
pub struct WaitForEngine;

#[async_trait]
impl StageAction for WaitForEngine {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let kubeconfig = ctx.state().kubeconfig(&target.name);
        let kubeconfig = kubeconfig.as_path();
        let namespace = ctx.helm.engine.namespace.as_str();
        let expected = target.nodes.gateways;
        let watcher = PollWatcher::from_spec(ctx.timeouts.mesh_agent_ready);

        watcher
            .wait_until("engine ready", move || async move {
                let deployments = ctx
                    .cluster()
                    .list_deployments(kubeconfig, namespace, ENGINE_SELECTOR)
                    .await?;
                Ok::<_, CollaboratorError>(
                    deployments
                        .iter()
                        .any(|d| d.ready_replicas == expected),
                )
            })
            .await
            .into_stage_result("engine ready")
    }
}

/// `helm del --purge` of the release named after a namespace
pub struct RemoveRelease {
    pub release: fn(&RunContext) -> &str,
}

#[async_trait]
impl StageAction for RemoveRelease {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let kubeconfig = ctx.state().kubeconfig(&target.name);
        let release = (self.release)(ctx);
        run_checked(
            ctx.process(),
            &ctx.tools.helm,
            &args!["del", "--purge", release, "--kubeconfig", kubeconfig.display(), "--debug"],
        )
        .await?;
        Ok(format!("release {} removed", release))
    }
}

/// Delete the mesh custom resource definitions
pub struct RemoveMeshCrds;

#[async_trait]
impl StageAction for RemoveMeshCrds {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let kubeconfig = ctx.state().kubeconfig(&target.name);
        ctx.cluster().delete_crds(&kubeconfig, &MESH_CRDS).await?;
        Ok(format!("removed {}", MESH_CRDS.join(", ")))
    }
}

/// Point the engine deployment and route-agent daemon set at the configured images
pub struct RolloutImage;

#[async_trait]
impl StageAction for RolloutImage {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let kubeconfig = ctx.state().kubeconfig(&target.name);
        let engine = ctx.helm.engine.image.to_string();
        let route_agent = ctx.helm.route_agent.image.to_string();

        ctx.cluster()
            .set_workload_image(
                &kubeconfig,
                &ctx.helm.engine.namespace,
                WorkloadKind::Deployment,
                ENGINE_DEPLOYMENT,
                &engine,
            )
            .await?;
        ctx.cluster()
            .set_workload_image(
                &kubeconfig,
                &ctx.helm.route_agent.namespace,
                WorkloadKind::DaemonSet,
                ROUTE_AGENT_DAEMONSET,
                &route_agent,
            )
            .await?;

        info!("Images updated on {}", target.name);
        Ok(format!("engine {}, route agent {}", engine, route_agent))
    }
}
