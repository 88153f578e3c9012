//! Cluster API over the `oc`/`kubectl` CLI with JSON output

use crate::args;
use crate::collab::{
    run_checked, ClusterApi, CollaboratorError, DeploymentStatus, ProcessOutput, ProcessRunner,
    SecretData, WorkloadKind,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct List<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMeta {
    name: String,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Deployment {
    metadata: ObjectMeta,
    #[serde(default)]
    status: DeploymentStatusJson,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentStatusJson {
    #[serde(default)]
    ready_replicas: u32,
}

#[derive(Debug, Deserialize)]
struct Secret {
    metadata: ObjectMeta,
    #[serde(default)]
    data: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SecurityContextConstraints {
    #[serde(default)]
    users: Vec<String>,
}

/// [`ClusterApi`] implemented by shelling out to `oc`
pub struct KubectlClient {
    runner: Arc<dyn ProcessRunner>,
    binary: PathBuf,
}

impl KubectlClient {
    pub fn new(runner: Arc<dyn ProcessRunner>, binary: PathBuf) -> Self {
        Self { runner, binary }
    }

    async fn execute(&self, kubeconfig: &Path, mut args: Vec<String>) -> Result<ProcessOutput, CollaboratorError> {
        args.push("--kubeconfig".to_string());
        args.push(kubeconfig.display().to_string());
        run_checked(self.runner.as_ref(), &self.binary, &args).await
    }

    async fn run(&self, kubeconfig: &Path, args: Vec<String>) -> Result<String, CollaboratorError> {
        Ok(self.execute(kubeconfig, args).await?.combined_output)
    }

    /// Run a `-o json` query; warnings on stderr are not part of the document
    async fn query<T: for<'de> Deserialize<'de>>(
        &self,
        what: &str,
        kubeconfig: &Path,
        args: Vec<String>,
    ) -> Result<T, CollaboratorError> {
        let output = self.execute(kubeconfig, args).await?;
        parse_json(what, &output.stdout)
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(what: &str, text: &str) -> Result<T, CollaboratorError> {
    serde_json::from_str(text).map_err(|e| CollaboratorError::parse(what, e))
}

#[async_trait]
impl ClusterApi for KubectlClient {
    async fn create_from_manifest(
        &self,
        kubeconfig: &Path,
        namespace: &str,
        manifest: &Path,
    ) -> Result<String, CollaboratorError> {
        self.run(
            kubeconfig,
            args!["create", "-f", manifest.display(), "-n", namespace],
        )
        .await
    }

    async fn list_deployments(
        &self,
        kubeconfig: &Path,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<DeploymentStatus>, CollaboratorError> {
        let list: List<Deployment> = self
            .query(
                "deployment list",
                kubeconfig,
                args!["get", "deployments", "-n", namespace, "-l", label_selector, "-o", "json"],
            )
            .await?;

        Ok(list
            .items
            .into_iter()
            .map(|d| DeploymentStatus {
                name: d.metadata.name,
                ready_replicas: d.status.ready_replicas,
            })
            .collect())
    }

    async fn list_secrets(
        &self,
        kubeconfig: &Path,
        namespace: &str,
        field_selector: &str,
    ) -> Result<Vec<SecretData>, CollaboratorError> {
        let list: List<Secret> = self
            .query(
                "secret list",
                kubeconfig,
                args![
                    "get",
                    "secrets",
                    "-n",
                    namespace,
                    "--field-selector",
                    field_selector,
                    "-o",
                    "json"
                ],
            )
            .await?;
        debug!("{} secrets in {}", list.items.len(), namespace);

        Ok(list
            .items
            .into_iter()
            .map(|s| SecretData {
                name: s.metadata.name,
                annotations: s.metadata.annotations,
                data: s.data,
            })
            .collect())
    }

    async fn label_node(
        &self,
        kubeconfig: &Path,
        node: &str,
        key: &str,
        value: &str,
    ) -> Result<String, CollaboratorError> {
        self.run(
            kubeconfig,
            args!["label", "node", node, format!("{key}={value}"), "--overwrite"],
        )
        .await
    }

    async fn security_constraint_users(
        &self,
        kubeconfig: &Path,
        constraint: &str,
    ) -> Result<Vec<String>, CollaboratorError> {
        let scc: SecurityContextConstraints = self
            .query(
                "security context constraints",
                kubeconfig,
                args!["get", "scc", constraint, "-o", "json"],
            )
            .await?;
        Ok(scc.users)
    }

    async fn set_security_constraint_users(
        &self,
        kubeconfig: &Path,
        constraint: &str,
        users: &[String],
    ) -> Result<String, CollaboratorError> {
        let patch = serde_json::json!({ "users": users }).to_string();
        self.run(
            kubeconfig,
            args!["patch", "scc", constraint, "--type=merge", "-p", patch],
        )
        .await
    }

    async fn set_workload_image(
        &self,
        kubeconfig: &Path,
        namespace: &str,
        kind: WorkloadKind,
        name: &str,
        image: &str,
    ) -> Result<String, CollaboratorError> {
        let patch = serde_json::json!([{
            "op": "replace",
            "path": "/spec/template/spec/containers/0/image",
            "value": image,
        }])
        .to_string();
        self.run(
            kubeconfig,
            args!["patch", kind, name, "-n", namespace, "--type=json", "-p", patch],
        )
        .await
    }

    async fn delete_crds(&self, kubeconfig: &Path, names: &[&str]) -> Result<String, CollaboratorError> {
        let mut args = args!["delete", "crd"];
        args.extend(names.iter().map(|n| n.to_string()));
        self.run(kubeconfig, args).await
    }
}
