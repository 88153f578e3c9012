//! Per-target state on the local filesystem
//!
//! Layout under the working directory:
//!
//! ```text
//! .config/<name>/install-config.yaml
//! .config/<name>/metadata.json
//! .config/<name>/auth/kubeconfig
//! .config/<name>/auth/kubeconfig-dev
//! tf/state/terraform-<name>-<module>.tfstate
//! ```

use crate::collab::CollaboratorError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Identifiers the installer writes to `metadata.json`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraDetails {
    #[serde(rename = "infraID")]
    pub infra_id: String,
    #[serde(rename = "clusterID", default)]
    pub cluster_id: String,
    pub cluster_name: String,
}

/// Terraform modules that keep a state file per target
pub const TERRAFORM_MODULES: [&str; 3] = ["infra", "bootstrap", "workers"];

/// Filesystem state store rooted at the working directory
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Installer asset directory of a target
    pub fn cluster_dir(&self, name: &str) -> PathBuf {
        self.root.join(".config").join(name)
    }

    pub fn install_config(&self, name: &str) -> PathBuf {
        self.cluster_dir(name).join("install-config.yaml")
    }

    pub fn metadata(&self, name: &str) -> PathBuf {
        self.cluster_dir(name).join("metadata.json")
    }

    pub fn kubeconfig(&self, name: &str) -> PathBuf {
        self.cluster_dir(name).join("auth").join("kubeconfig")
    }

    pub fn dev_kubeconfig(&self, name: &str) -> PathBuf {
        self.cluster_dir(name).join("auth").join("kubeconfig-dev")
    }

    /// Root module directory for terraform
    pub fn terraform_dir(&self) -> PathBuf {
        self.root.join("tf")
    }

    pub fn terraform_state_dir(&self) -> PathBuf {
        self.terraform_dir().join("state")
    }

    pub fn terraform_state(&self, name: &str, module: &str) -> PathBuf {
        self.terraform_state_dir()
            .join(format!("terraform-{name}-{module}.tfstate"))
    }

    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    pub async fn read(&self, path: &Path) -> Result<String, CollaboratorError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CollaboratorError::io(path, e))
    }

    /// Write a file, creating parent directories
    pub async fn write(&self, path: &Path, contents: &str) -> Result<(), CollaboratorError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CollaboratorError::io(parent, e))?;
        }
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| CollaboratorError::io(path, e))
    }

    pub async fn infra_details(&self, name: &str) -> Result<InfraDetails, CollaboratorError> {
        let path = self.metadata(name);
        let text = self.read(&path).await?;
        serde_json::from_str(&text).map_err(|e| CollaboratorError::parse(path.display().to_string(), e))
    }

    /// Remove files in `dir` whose name starts with `prefix` and ends with `suffix`.
    ///
    /// A missing directory removes nothing. Returns the removed paths sorted.
    pub async fn remove_matching(
        &self,
        dir: &Path,
        prefix: &str,
        suffix: &str,
    ) -> Result<Vec<PathBuf>, CollaboratorError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CollaboratorError::io(dir, e)),
        };

        let mut removed = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CollaboratorError::io(dir, e))?
        {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(prefix) && file_name.ends_with(suffix) {
                let path = entry.path();
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| CollaboratorError::io(&path, e))?;
                debug!("Removed {}", path.display());
                removed.push(path);
            }
        }

        removed.sort();
        Ok(removed)
    }

    /// Remove the terraform state files of one target, one per module
    pub async fn remove_terraform_state(&self, name: &str) -> Result<Vec<PathBuf>, CollaboratorError> {
        let mut removed = Vec::new();
        for module in TERRAFORM_MODULES {
            let path = self.terraform_state(name, module);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Removed {}", path.display());
                    removed.push(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(CollaboratorError::io(&path, e)),
            }
        }
        removed.sort();
        Ok(removed)
    }
}
