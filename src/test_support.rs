//! Test doubles for unit tests

use crate::collab::{
    CloudInventory, ClusterApi, CollaboratorError, Collaborators, DeploymentStatus, Instance,
    ProcessOutput, ProcessRunner, SecretData, StateStore, WorkloadKind,
};
use crate::core::config::MeshupConfig;
use crate::core::{RunContext, SharedSecret};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Records every command line; fails those containing a configured needle
#[derive(Default)]
pub(crate) struct RecordingProcess {
    pub calls: Mutex<Vec<String>>,
    pub failures: Vec<(String, String)>,
}

impl RecordingProcess {
    pub fn failing(needle: &str, output: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: vec![(needle.to_string(), output.to_string())],
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for RecordingProcess {
    async fn execute(&self, program: &Path, args: &[String]) -> Result<ProcessOutput, CollaboratorError> {
        let line = format!("{} {}", program.display(), args.join(" "));
        self.calls.lock().unwrap().push(line.clone());

        for (needle, output) in &self.failures {
            if line.contains(needle.as_str()) {
                return Ok(ProcessOutput {
                    exit_code: 1,
                    stdout: String::new(),
                    combined_output: output.clone(),
                });
            }
        }
        let stdout = "ok\n".to_string();
        Ok(ProcessOutput {
            exit_code: 0,
            combined_output: stdout.clone(),
            stdout,
        })
    }
}

/// Cluster API that always succeeds with empty results
pub(crate) struct NullCluster;

#[async_trait]
impl ClusterApi for NullCluster {
    async fn create_from_manifest(&self, _: &Path, _: &str, _: &Path) -> Result<String, CollaboratorError> {
        Ok(String::new())
    }

    async fn list_deployments(&self, _: &Path, _: &str, _: &str) -> Result<Vec<DeploymentStatus>, CollaboratorError> {
        Ok(Vec::new())
    }

    async fn list_secrets(&self, _: &Path, _: &str, _: &str) -> Result<Vec<SecretData>, CollaboratorError> {
        Ok(Vec::new())
    }

    async fn label_node(&self, _: &Path, _: &str, _: &str, _: &str) -> Result<String, CollaboratorError> {
        Ok(String::new())
    }

    async fn security_constraint_users(&self, _: &Path, _: &str) -> Result<Vec<String>, CollaboratorError> {
        Ok(Vec::new())
    }

    async fn set_security_constraint_users(&self, _: &Path, _: &str, _: &[String]) -> Result<String, CollaboratorError> {
        Ok(String::new())
    }

    async fn set_workload_image(
        &self,
        _: &Path,
        _: &str,
        _: WorkloadKind,
        _: &str,
        _: &str,
    ) -> Result<String, CollaboratorError> {
        Ok(String::new())
    }

    async fn delete_crds(&self, _: &Path, _: &[&str]) -> Result<String, CollaboratorError> {
        Ok(String::new())
    }
}

pub(crate) struct NullCloud;

#[async_trait]
impl CloudInventory for NullCloud {
    async fn networks_by_tag(&self, _: &str, _: &str, _: &str) -> Result<Vec<String>, CollaboratorError> {
        Ok(Vec::new())
    }

    async fn instances_by_tags(
        &self,
        _: &str,
        _: &str,
        _: &[(String, String)],
    ) -> Result<Vec<Instance>, CollaboratorError> {
        Ok(Vec::new())
    }
}

/// Context over the sample config with the given collaborators
pub(crate) fn context_with(
    workdir: &Path,
    process: Arc<dyn ProcessRunner>,
    cluster: Arc<dyn ClusterApi>,
    cloud: Arc<dyn CloudInventory>,
) -> Arc<RunContext> {
    let mut config = MeshupConfig::from_yaml(crate::core::config::tests::SAMPLE).unwrap();
    config.workdir = workdir.to_path_buf();

    let collaborators = Collaborators {
        process,
        cluster,
        cloud,
        state: Arc::new(StateStore::new(workdir)),
    };
    Arc::new(RunContext::from_config(&config, collaborators, SharedSecret::from("test-psk")).unwrap())
}

/// Context whose collaborators succeed without doing anything
pub(crate) fn test_context(workdir: &Path) -> Arc<RunContext> {
    context_with(
        workdir,
        Arc::new(RecordingProcess::default()),
        Arc::new(NullCluster),
        Arc::new(NullCloud),
    )
}
