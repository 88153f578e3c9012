//! Cloud inventory over `aws ec2 describe-*`

use crate::args;
use crate::collab::{run_checked, CloudInventory, CollaboratorError, Instance, ProcessRunner};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeVpcs {
    #[serde(default)]
    vpcs: Vec<Vpc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Vpc {
    vpc_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstances {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Ec2Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Ec2Instance {
    instance_id: String,
    #[serde(default)]
    private_dns_name: String,
}

fn tag_filter(key: &str, value: &str) -> String {
    format!("Name=tag:{key},Values={value}")
}

/// [`CloudInventory`] backed by the AWS CLI
pub struct AwsCliInventory {
    runner: Arc<dyn ProcessRunner>,
    binary: PathBuf,
}

impl AwsCliInventory {
    pub fn new(runner: Arc<dyn ProcessRunner>, binary: PathBuf) -> Self {
        Self { runner, binary }
    }
}

#[async_trait]
impl CloudInventory for AwsCliInventory {
    async fn networks_by_tag(
        &self,
        region: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<String>, CollaboratorError> {
        let args = args![
            "ec2",
            "describe-vpcs",
            "--region",
            region,
            "--filters",
            tag_filter(key, value),
            "--output",
            "json"
        ];
        let output = run_checked(self.runner.as_ref(), &self.binary, &args).await?;
        let parsed: DescribeVpcs = serde_json::from_str(&output.stdout)
            .map_err(|e| CollaboratorError::parse("describe-vpcs output", e))?;

        Ok(parsed.vpcs.into_iter().map(|v| v.vpc_id).collect())
    }

    async fn instances_by_tags(
        &self,
        region: &str,
        network: &str,
        tags: &[(String, String)],
    ) -> Result<Vec<Instance>, CollaboratorError> {
        let mut args = args![
            "ec2",
            "describe-instances",
            "--region",
            region,
            "--filters",
            format!("Name=vpc-id,Values={network}")
        ];
        args.extend(tags.iter().map(|(k, v)| tag_filter(k, v)));
        args.extend(args!["--output", "json"]);

        let output = run_checked(self.runner.as_ref(), &self.binary, &args).await?;
        let parsed: DescribeInstances = serde_json::from_str(&output.stdout)
            .map_err(|e| CollaboratorError::parse("describe-instances output", e))?;

        Ok(parsed
            .reservations
            .into_iter()
            .flat_map(|r| r.instances)
            .map(|i| Instance {
                id: i.instance_id,
                private_dns_name: i.private_dns_name,
            })
            .collect())
    }
}
