//! Per-target credential file normalization

use crate::collab::CollaboratorError;
use crate::core::{RunContext, StageAction, Target};
use async_trait::async_trait;
use serde_yaml::{Mapping, Value};
use tracing::info;

/// Rename the single context, cluster and user of a kubeconfig to `name`
pub fn rename_kubeconfig(kubeconfig: &str, name: &str) -> Result<String, CollaboratorError> {
    let mut doc: Value =
        serde_yaml::from_str(kubeconfig).map_err(|e| CollaboratorError::parse("kubeconfig", e))?;
    let root = doc
        .as_mapping_mut()
        .ok_or_else(|| CollaboratorError::parse("kubeconfig", "not a mapping"))?;
    let name = Value::String(name.to_string());

    root.insert(Value::from("current-context"), name.clone());

    let context = first_entry(root, "contexts")?;
    context.insert(Value::from("name"), name.clone());
    if let Some(inner) = context
        .get_mut(Value::from("context"))
        .and_then(Value::as_mapping_mut)
    {
        inner.insert(Value::from("cluster"), name.clone());
        inner.insert(Value::from("user"), name.clone());
    }

    first_entry(root, "clusters")?.insert(Value::from("name"), name.clone());
    first_entry(root, "users")?.insert(Value::from("name"), name);

    serde_yaml::to_string(&doc).map_err(|e| CollaboratorError::parse("kubeconfig", e))
}

fn first_entry<'a>(root: &'a mut Mapping, key: &str) -> Result<&'a mut Mapping, CollaboratorError> {
    root.get_mut(Value::from(key))
        .and_then(Value::as_sequence_mut)
        .and_then(|entries| entries.first_mut())
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| CollaboratorError::parse("kubeconfig", format!("no {} entry", key)))
}

/// Write `auth/kubeconfig-dev` with everything named after the target
pub struct NormalizeKubeconfig;

#[async_trait]
impl StageAction for NormalizeKubeconfig {
    async fn invoke(&self, target: &Target, ctx: &RunContext) -> Result<String, CollaboratorError> {
        let state = ctx.state();
        let source = state.read(&state.kubeconfig(&target.name)).await?;
        let renamed = rename_kubeconfig(&source, &target.name)?;

        let path = state.dev_kubeconfig(&target.name);
        state.write(&path, &renamed).await?;
        info!("Credentials written to {}", path.display());
        Ok(format!("wrote {}", path.display()))
    }
}
