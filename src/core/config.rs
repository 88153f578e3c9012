//! Run configuration from YAML

use crate::core::context::{PollSpec, PollTimeouts};
use crate::core::target::{ClusterDescriptor, NetworkParams, NodeCounts, Platform, TargetSet};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default config file name, looked up in the current directory
pub const DEFAULT_CONFIG_FILE: &str = "meshup.yaml";

/// Top-level configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshupConfig {
    /// Directory holding `.config/`, `tf/`, templates and tool binaries
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    /// Prefix for installed cluster names (defaults to `$USER`)
    #[serde(default)]
    pub name_prefix: Option<String>,

    /// Ordered cluster list; the first entry is the hub
    pub clusters: Vec<ClusterConfig>,

    pub authentication: Authentication,

    pub helm: HelmSettings,

    #[serde(default)]
    pub openshift: OpenshiftSettings,

    #[serde(default)]
    pub tools: ToolPaths,

    /// Per-condition poll overrides
    #[serde(default)]
    pub timeouts: TimeoutOverrides,

    #[serde(default)]
    pub templates: Templates,

    #[serde(default)]
    pub tooling: ToolingManifests,
}

fn default_workdir() -> PathBuf {
    PathBuf::from(".")
}

/// One cluster as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    pub cluster_name: String,
    pub platform: Platform,
    pub region: String,
    pub vpc_cidr: String,
    pub pod_cidr: String,
    pub svc_cidr: String,
    pub num_masters: u32,
    pub num_workers: u32,
    /// Mesh gateway nodes. On aws they are found by instance tag and labeled;
    /// elsewhere they must already carry the `submariner.io/gateway=true` label.
    #[serde(default)]
    pub num_gateways: u32,
    pub dns_domain: String,
}

impl ClusterConfig {
    fn to_descriptor(&self) -> ClusterDescriptor {
        ClusterDescriptor {
            name: self.cluster_name.clone(),
            platform: self.platform,
            network: NetworkParams {
                region: self.region.clone(),
                vpc_cidr: self.vpc_cidr.clone(),
                pod_cidr: self.pod_cidr.clone(),
                svc_cidr: self.svc_cidr.clone(),
                dns_domain: self.dns_domain.clone(),
            },
            nodes: NodeCounts {
                masters: self.num_masters,
                workers: self.num_workers,
                gateways: self.num_gateways,
            },
        }
    }
}

/// Installer credentials
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authentication {
    pub pull_secret: String,
    pub ssh_key: String,
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authentication")
            .field("pull_secret", &"***")
            .field("ssh_key", &self.ssh_key)
            .finish()
    }
}

/// Chart repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelmRepo {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSettings {
    pub namespace: String,
}

/// Container image reference, `repository:tag`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

impl FromStr for ImageRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        // The last colon separates the tag unless it belongs to a registry port
        match s.rsplit_once(':') {
            Some((repository, tag))
                if !repository.is_empty() && !tag.is_empty() && !tag.contains('/') =>
            {
                Ok(Self {
                    repository: repository.to_string(),
                    tag: tag.to_string(),
                })
            }
            _ => anyhow::bail!("Invalid image '{}': expected repository:tag", s),
        }
    }
}

/// Namespace and image of one mesh component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSettings {
    pub namespace: String,
    pub image: ImageRef,
}

/// Helm chart and mesh component settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmSettings {
    pub helm_repo: HelmRepo,
    pub broker: BrokerSettings,
    pub engine: ComponentSettings,
    pub route_agent: ComponentSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenshiftSettings {
    #[serde(default)]
    pub version: Option<String>,
}

/// Paths of the external tools
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolPaths {
    pub openshift_install: PathBuf,
    pub terraform: PathBuf,
    pub helm: PathBuf,
    pub oc: PathBuf,
    pub aws: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            openshift_install: PathBuf::from("./bin/openshift-install"),
            terraform: PathBuf::from("./bin/terraform"),
            helm: PathBuf::from("./bin/helm"),
            oc: PathBuf::from("./bin/oc"),
            aws: PathBuf::from("./bin/aws"),
        }
    }
}

impl ToolPaths {
    pub fn resolved(&self, workdir: &Path) -> Self {
        Self {
            openshift_install: workdir.join(&self.openshift_install),
            terraform: workdir.join(&self.terraform),
            helm: workdir.join(&self.helm),
            oc: workdir.join(&self.oc),
            aws: workdir.join(&self.aws),
        }
    }
}

/// Template files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Templates {
    pub install_config: PathBuf,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            install_config: PathBuf::from("tpl/install-config.yaml"),
        }
    }
}

impl Templates {
    pub fn resolved(&self, workdir: &Path) -> Self {
        Self {
            install_config: workdir.join(&self.install_config),
        }
    }
}

/// Manifests of the in-cluster tooling controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolingManifests {
    pub service_account: PathBuf,
    pub cluster_role_binding: PathBuf,
    pub deployment: PathBuf,
}

impl Default for ToolingManifests {
    fn default() -> Self {
        Self {
            service_account: PathBuf::from("deploy/tiller/serviceaccount.json"),
            cluster_role_binding: PathBuf::from("deploy/tiller/clusterrolebinding.json"),
            deployment: PathBuf::from("deploy/tiller/tillerdeploy.json"),
        }
    }
}

impl ToolingManifests {
    pub fn resolved(&self, workdir: &Path) -> Self {
        Self {
            service_account: workdir.join(&self.service_account),
            cluster_role_binding: workdir.join(&self.cluster_role_binding),
            deployment: workdir.join(&self.deployment),
        }
    }
}

/// Override of one poll, in seconds
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PollOverride {
    #[serde(default)]
    pub interval: Option<u64>,
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl PollOverride {
    fn apply(&self, spec: PollSpec) -> PollSpec {
        PollSpec {
            interval: self.interval.map(Duration::from_secs).unwrap_or(spec.interval),
            timeout: self.timeout.map(Duration::from_secs).unwrap_or(spec.timeout),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeoutOverrides {
    pub bootstrap_complete: PollOverride,
    pub install_complete: PollOverride,
    pub controller_ready: PollOverride,
    pub mesh_agent_ready: PollOverride,
}

impl TimeoutOverrides {
    pub fn apply(&self, defaults: PollTimeouts) -> PollTimeouts {
        PollTimeouts {
            bootstrap_complete: self.bootstrap_complete.apply(defaults.bootstrap_complete),
            install_complete: self.install_complete.apply(defaults.install_complete),
            controller_ready: self.controller_ready.apply(defaults.controller_ready),
            mesh_agent_ready: self.mesh_agent_ready.apply(defaults.mesh_agent_ready),
        }
    }
}

impl MeshupConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: MeshupConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.clusters.is_empty() {
            anyhow::bail!("No clusters defined");
        }

        let mut seen = HashSet::new();
        for (index, cluster) in self.clusters.iter().enumerate() {
            if cluster.cluster_name.is_empty() {
                anyhow::bail!("Cluster #{} has an empty clusterName", index + 1);
            }
            if !seen.insert(&cluster.cluster_name) {
                anyhow::bail!("Duplicate cluster name: {}", cluster.cluster_name);
            }
            if cluster.num_masters == 0 {
                anyhow::bail!("Cluster '{}' needs at least one master", cluster.cluster_name);
            }
            if cluster.num_workers == 0 {
                anyhow::bail!("Cluster '{}' needs at least one worker", cluster.cluster_name);
            }
            // Every spoke runs a mesh gateway
            if index > 0 && cluster.num_gateways == 0 {
                anyhow::bail!(
                    "Cluster '{}' is a spoke and needs numGateways > 0",
                    cluster.cluster_name
                );
            }
        }

        for (name, o) in [
            ("bootstrapComplete", &self.timeouts.bootstrap_complete),
            ("installComplete", &self.timeouts.install_complete),
            ("controllerReady", &self.timeouts.controller_ready),
            ("meshAgentReady", &self.timeouts.mesh_agent_ready),
        ] {
            if o.interval == Some(0) || o.timeout == Some(0) {
                anyhow::bail!("Timeout '{}' must be positive", name);
            }
        }

        Ok(())
    }

    /// Build the ordered target set
    pub fn target_set(&self) -> Result<TargetSet> {
        let descriptors = self.clusters.iter().map(ClusterConfig::to_descriptor).collect();
        TargetSet::new(descriptors).context("Invalid cluster list")
    }

    /// Configured prefix, else the current user
    pub fn resolve_name_prefix(&self) -> Result<String> {
        match &self.name_prefix {
            Some(prefix) => Ok(prefix.clone()),
            None => std::env::var("USER")
                .context("namePrefix is not set and $USER is unavailable"),
        }
    }
}
