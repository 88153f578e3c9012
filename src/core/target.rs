//! Cluster targets and role partitioning

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Role a target plays in the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Rendezvous point hosting the broker
    Hub,
    /// Cluster that meshes into the hub
    Spoke,
}

/// Infrastructure platform a cluster is installed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Aws,
    Openstack,
    Vsphere,
}

impl Platform {
    /// Whether infra, bootstrap and worker machines are driven explicitly
    /// (user-provisioned infrastructure) rather than by the installer.
    pub fn requires_infra_lifecycle(&self) -> bool {
        matches!(self, Platform::Aws)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Aws => "aws",
            Platform::Openstack => "openstack",
            Platform::Vsphere => "vsphere",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network parameters of a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub region: String,
    pub vpc_cidr: String,
    pub pod_cidr: String,
    pub svc_cidr: String,
    pub dns_domain: String,
}

/// Requested node counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCounts {
    pub masters: u32,
    pub workers: u32,
    /// Worker nodes dedicated to mesh gateways
    pub gateways: u32,
}

/// Role-less cluster definition, as loaded from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDescriptor {
    pub name: String,
    pub platform: Platform,
    pub network: NetworkParams,
    pub nodes: NodeCounts,
}

/// One cluster to provision or join into the mesh.
///
/// Targets are created once by [`TargetSet::new`] and never mutated; they are
/// shared across concurrent stage invocations behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub role: Role,
    pub platform: Platform,
    pub network: NetworkParams,
    pub nodes: NodeCounts,
}

impl Target {
    pub fn is_hub(&self) -> bool {
        self.role == Role::Hub
    }

    pub fn is_spoke(&self) -> bool {
        self.role == Role::Spoke
    }

    pub fn requires_infra_lifecycle(&self) -> bool {
        self.platform.requires_infra_lifecycle()
    }
}

/// Errors building a target set
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetSetError {
    #[error("no clusters defined")]
    Empty,

    #[error("duplicate cluster name: {0}")]
    DuplicateName(String),
}

/// Subset of targets a pipeline step runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSelector {
    All,
    Hub,
    Spokes,
    Platform(Platform),
}

/// Ordered, read-only set of targets.
///
/// Element 0 of the input is the hub, every other element is a spoke.
#[derive(Debug, Clone)]
pub struct TargetSet {
    targets: Vec<Arc<Target>>,
}

impl TargetSet {
    pub fn new(descriptors: Vec<ClusterDescriptor>) -> Result<Self, TargetSetError> {
        if descriptors.is_empty() {
            return Err(TargetSetError::Empty);
        }

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(descriptors.len());

        for (index, descriptor) in descriptors.into_iter().enumerate() {
            if !seen.insert(descriptor.name.clone()) {
                return Err(TargetSetError::DuplicateName(descriptor.name));
            }

            let role = if index == 0 { Role::Hub } else { Role::Spoke };
            targets.push(Arc::new(Target {
                name: descriptor.name,
                role,
                platform: descriptor.platform,
                network: descriptor.network,
                nodes: descriptor.nodes,
            }));
        }

        Ok(Self { targets })
    }

    /// All targets in input order
    pub fn all(&self) -> &[Arc<Target>] {
        &self.targets
    }

    pub fn hub(&self) -> &Arc<Target> {
        // Construction rejects an empty set
        &self.targets[0]
    }

    pub fn spokes(&self) -> &[Arc<Target>] {
        &self.targets[1..]
    }

    /// Targets on the given platform, in input order
    pub fn by_platform(&self, platform: Platform) -> Vec<Arc<Target>> {
        self.targets
            .iter()
            .filter(|t| t.platform == platform)
            .cloned()
            .collect()
    }

    /// Distinct platforms in order of first appearance
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms = Vec::new();
        for target in &self.targets {
            if !platforms.contains(&target.platform) {
                platforms.push(target.platform);
            }
        }
        platforms
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Target>> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.name.clone()).collect()
    }

    /// Resolve a selector into an ordered subset
    pub fn select(&self, selector: TargetSelector) -> Vec<Arc<Target>> {
        match selector {
            TargetSelector::All => self.targets.clone(),
            TargetSelector::Hub => vec![self.hub().clone()],
            TargetSelector::Spokes => self.spokes().to_vec(),
            TargetSelector::Platform(platform) => self.by_platform(platform),
        }
    }
}
