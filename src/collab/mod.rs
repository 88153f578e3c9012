//! External collaborators: processes, cluster API, cloud inventory, local state
//!
//! Stages only talk to the outside world through the traits in this module,
//! which keeps every stage drivable by test doubles.

pub mod cloud;
pub mod error;
pub mod kube;
pub mod process;
pub mod state;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use cloud::AwsCliInventory;
pub use error::CollaboratorError;
pub use kube::KubectlClient;
pub use process::{run_checked, ProcessOutput, TokioProcessRunner};
pub use state::{InfraDetails, StateStore};

/// Runs an external program to completion
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args`, capturing stdout and stderr together.
    ///
    /// A non-zero exit is not an error at this level; only a failure to
    /// start the program is.
    async fn execute(&self, program: &Path, args: &[String]) -> Result<ProcessOutput, CollaboratorError>;
}

/// Ready state of one deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentStatus {
    pub name: String,
    pub ready_replicas: u32,
}

/// A secret as returned by the cluster, data values still base64 encoded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretData {
    pub name: String,
    pub annotations: BTreeMap<String, String>,
    pub data: BTreeMap<String, String>,
}

/// Kind of workload whose image can be replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    DaemonSet,
}

impl WorkloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "deployment",
            WorkloadKind::DaemonSet => "daemonset",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cluster API operations, authenticated by a per-target kubeconfig
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn create_from_manifest(
        &self,
        kubeconfig: &Path,
        namespace: &str,
        manifest: &Path,
    ) -> Result<String, CollaboratorError>;

    async fn list_deployments(
        &self,
        kubeconfig: &Path,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<DeploymentStatus>, CollaboratorError>;

    async fn list_secrets(
        &self,
        kubeconfig: &Path,
        namespace: &str,
        field_selector: &str,
    ) -> Result<Vec<SecretData>, CollaboratorError>;

    async fn label_node(
        &self,
        kubeconfig: &Path,
        node: &str,
        key: &str,
        value: &str,
    ) -> Result<String, CollaboratorError>;

    /// Users granted a security context constraint
    async fn security_constraint_users(
        &self,
        kubeconfig: &Path,
        constraint: &str,
    ) -> Result<Vec<String>, CollaboratorError>;

    async fn set_security_constraint_users(
        &self,
        kubeconfig: &Path,
        constraint: &str,
        users: &[String],
    ) -> Result<String, CollaboratorError>;

    /// Replace the image of the first container of a workload
    async fn set_workload_image(
        &self,
        kubeconfig: &Path,
        namespace: &str,
        kind: WorkloadKind,
        name: &str,
        image: &str,
    ) -> Result<String, CollaboratorError>;

    async fn delete_crds(&self, kubeconfig: &Path, names: &[&str]) -> Result<String, CollaboratorError>;
}

/// Compute instance as seen by the cloud inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub id: String,
    /// Name under which the instance registers as a cluster node
    pub private_dns_name: String,
}

/// Cloud-side lookups
#[async_trait]
pub trait CloudInventory: Send + Sync {
    /// Network ids carrying the tag
    async fn networks_by_tag(
        &self,
        region: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<String>, CollaboratorError>;

    /// Instances inside `network` carrying every tag
    async fn instances_by_tags(
        &self,
        region: &str,
        network: &str,
        tags: &[(String, String)],
    ) -> Result<Vec<Instance>, CollaboratorError>;
}

/// Everything a stage may call out to
#[derive(Clone)]
pub struct Collaborators {
    pub process: Arc<dyn ProcessRunner>,
    pub cluster: Arc<dyn ClusterApi>,
    pub cloud: Arc<dyn CloudInventory>,
    pub state: Arc<StateStore>,
}

impl Collaborators {
    /// Real implementations backed by the configured tool binaries
    pub fn system(kubectl: PathBuf, aws: PathBuf, workdir: PathBuf) -> Self {
        let process: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner::new());
        Self {
            cluster: Arc::new(KubectlClient::new(process.clone(), kubectl)),
            cloud: Arc::new(AwsCliInventory::new(process.clone(), aws)),
            state: Arc::new(StateStore::new(workdir)),
            process,
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
