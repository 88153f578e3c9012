//! `{{ key }}` template rendering for installer configs

use crate::collab::CollaboratorError;
use crate::core::{RunContext, Target};
use regex::{Captures, Regex};
use std::collections::BTreeMap;

const PLACEHOLDER: &str = r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}";

/// Replace every `{{ key }}` with its value.
///
/// Placeholders without a value are reported together as one error.
pub fn render(template: &str, variables: &BTreeMap<String, String>) -> Result<String, CollaboratorError> {
    let placeholder =
        Regex::new(PLACEHOLDER).map_err(|e| CollaboratorError::Precondition(e.to_string()))?;
    let mut missing = Vec::new();
    let rendered = placeholder.replace_all(template, |caps: &Captures| {
        let key = &caps[1];
        match variables.get(key) {
            Some(value) => value.clone(),
            None => {
                missing.push(key.to_string());
                caps[0].to_string()
            }
        }
    });

    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        return Err(CollaboratorError::Precondition(format!(
            "unknown template variable(s): {}",
            missing.join(", ")
        )));
    }
    Ok(rendered.into_owned())
}

/// Variables available to the install-config template
pub fn install_config_variables(target: &Target, ctx: &RunContext) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    let mut set = |k: &str, v: String| {
        vars.insert(k.to_string(), v);
    };

    set("cluster_name", ctx.installed_name(&target.name));
    set("platform", target.platform.to_string());
    set("region", target.network.region.clone());
    set("vpc_cidr", target.network.vpc_cidr.clone());
    set("pod_cidr", target.network.pod_cidr.clone());
    set("svc_cidr", target.network.svc_cidr.clone());
    set("dns_domain", target.network.dns_domain.clone());
    set("num_masters", target.nodes.masters.to_string());
    set("num_workers", target.nodes.workers.to_string());
    set("num_gateways", target.nodes.gateways.to_string());
    set("pull_secret", ctx.auth.pull_secret.clone());
    set("ssh_key", ctx.auth.ssh_key.clone());
    vars
}
