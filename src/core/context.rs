//! Run-wide context handed to every stage invocation

use crate::collab::{CloudInventory, ClusterApi, Collaborators, ProcessRunner, StateStore};
use crate::core::config::{
    Authentication, HelmSettings, MeshupConfig, OpenshiftSettings, Templates, ToolPaths,
    ToolingManifests,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Length of the generated mesh pre-shared key
pub const SECRET_LEN: usize = 64;

/// Cadence and deadline of one readiness poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSpec {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSpec {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Poll settings for every asynchronous condition the pipeline waits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimeouts {
    pub bootstrap_complete: PollSpec,
    pub install_complete: PollSpec,
    pub controller_ready: PollSpec,
    pub mesh_agent_ready: PollSpec,
}

impl Default for PollTimeouts {
    fn default() -> Self {
        Self {
            bootstrap_complete: PollSpec::new(Duration::from_secs(30), Duration::from_secs(60 * 60)),
            install_complete: PollSpec::new(Duration::from_secs(30), Duration::from_secs(30 * 60)),
            controller_ready: PollSpec::new(Duration::from_secs(10), Duration::from_secs(5 * 60)),
            mesh_agent_ready: PollSpec::new(Duration::from_secs(60), Duration::from_secs(5 * 60)),
        }
    }
}

/// Mesh pre-shared key, generated once per run and shared by every spoke
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(Arc<str>);

impl SharedSecret {
    /// Random alphanumeric key of [`SECRET_LEN`] characters
    pub fn generate() -> Self {
        let key: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SECRET_LEN)
            .map(char::from)
            .collect();
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SharedSecret {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(***)")
    }
}

/// Everything a stage needs besides its target.
///
/// Built once by the caller of the engine and shared read-only by all tasks.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    /// Prefix of the cluster name given to the installer
    pub name_prefix: String,
    pub tools: ToolPaths,
    pub auth: Authentication,
    pub helm: HelmSettings,
    pub openshift: OpenshiftSettings,
    pub templates: Templates,
    pub tooling: ToolingManifests,
    pub timeouts: PollTimeouts,
    pub mesh_secret: SharedSecret,
    pub collaborators: Collaborators,
}

impl RunContext {
    /// Build a context from validated configuration.
    ///
    /// Relative tool, template and manifest paths are resolved against the
    /// configured working directory.
    pub fn from_config(
        config: &MeshupConfig,
        collaborators: Collaborators,
        mesh_secret: SharedSecret,
    ) -> anyhow::Result<Self> {
        let workdir = config.workdir.as_path();

        Ok(Self {
            run_id: Uuid::new_v4(),
            name_prefix: config.resolve_name_prefix()?,
            tools: config.tools.resolved(workdir),
            auth: config.authentication.clone(),
            helm: config.helm.clone(),
            openshift: config.openshift.clone(),
            templates: config.templates.resolved(workdir),
            tooling: config.tooling.resolved(workdir),
            timeouts: config.timeouts.apply(PollTimeouts::default()),
            mesh_secret,
            collaborators,
        })
    }

    pub fn process(&self) -> &dyn ProcessRunner {
        self.collaborators.process.as_ref()
    }

    pub fn cluster(&self) -> &dyn ClusterApi {
        self.collaborators.cluster.as_ref()
    }

    pub fn cloud(&self) -> &dyn CloudInventory {
        self.collaborators.cloud.as_ref()
    }

    pub fn state(&self) -> &StateStore {
        &self.collaborators.state
    }

    /// Name the installer gives a target's cluster
    pub fn installed_name(&self, target: &str) -> String {
        if self.name_prefix.is_empty() {
            target.to_string()
        } else {
            format!("{}-{}", self.name_prefix, target)
        }
    }
}
