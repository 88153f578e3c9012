//! Test doubles and a harness driving whole pipelines against them
#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use meshup::collab::{
    CloudInventory, ClusterApi, CollaboratorError, Collaborators, DeploymentStatus, Instance,
    ProcessOutput, ProcessRunner, SecretData, StateStore, WorkloadKind,
};
use meshup::core::config::MeshupConfig;
use meshup::core::{Outcome, Pipeline, RunContext, SharedSecret, TargetSet};
use meshup::execution::{ExecutionEngine, ExecutionEvent, FanOutScheduler, RunReport};
use meshup::ProvisionError;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const THREE_CLUSTERS: &str = r#"
namePrefix: ci
clusters:
  - clusterName: cluster1
    platform: aws
    region: eu-west-1
    vpcCidr: 10.164.0.0/16
    podCidr: 10.244.0.0/14
    svcCidr: 100.94.0.0/16
    numMasters: 3
    numWorkers: 2
    dnsDomain: devcluster.example.com
  - clusterName: cluster2
    platform: aws
    region: eu-west-2
    vpcCidr: 10.165.0.0/16
    podCidr: 10.248.0.0/14
    svcCidr: 100.95.0.0/16
    numMasters: 3
    numWorkers: 2
    numGateways: 1
    dnsDomain: devcluster.example.com
  - clusterName: cluster3
    platform: aws
    region: eu-west-3
    vpcCidr: 10.166.0.0/16
    podCidr: 10.252.0.0/14
    svcCidr: 100.96.0.0/16
    numMasters: 3
    numWorkers: 2
    numGateways: 1
    dnsDomain: devcluster.example.com
authentication:
  pullSecret: '{"auths":{}}'
  sshKey: ssh-rsa AAAA
helm:
  helmRepo:
    url: https://releases.rancher.com/submariner-charts/latest
    name: submariner-latest
  broker:
    namespace: submariner-k8s-broker
  engine:
    namespace: submariner
    image:
      repository: rancher/submariner
      tag: v0.0.1
  routeAgent:
    namespace: submariner
    image:
      repository: rancher/submariner-route-agent
      tag: v0.0.1
"#;

const INSTALL_CONFIG_TEMPLATE: &str = "\
apiVersion: v1
baseDomain: {{ dns_domain }}
metadata:
  name: {{ cluster_name }}
networking:
  clusterNetwork:
  - cidr: {{ pod_cidr }}
  machineCIDR: {{ vpc_cidr }}
  serviceNetwork:
  - {{ svc_cidr }}
platform:
  {{ platform }}:
    region: {{ region }}
pullSecret: '{{ pull_secret }}'
sshKey: {{ ssh_key }}
";

fn installer_kubeconfig(name: &str) -> String {
    format!(
        "apiVersion: v1\nclusters:\n- cluster:\n    server: https://api.{name}.devcluster.example.com:6443\n  name: {name}\n\
         contexts:\n- context:\n    cluster: {name}\n    user: admin\n  name: admin\ncurrent-context: admin\n\
         kind: Config\nusers:\n- name: admin\n  user:\n    token: abc\n"
    )
}

/// Records every command line (program file name first); commands
/// containing a configured needle exit 1 with the configured output.
///
/// `create ignition-configs` also writes the files the installer would:
/// `metadata.json` and `auth/kubeconfig`.
#[derive(Default)]
pub struct ScriptedProcess {
    calls: Mutex<Vec<String>>,
    failures: Vec<(String, String)>,
}

impl ScriptedProcess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, needle: &str, output: &str) -> Self {
        self.failures.push((needle.to_string(), output.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_containing(&self, needle: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.contains(needle))
            .collect()
    }

    fn fake_installer_assets(args: &[String]) {
        let Some(pos) = args.iter().position(|a| a == "--dir") else {
            return;
        };
        let dir = Path::new(&args[pos + 1]);
        let name = dir.file_name().unwrap().to_string_lossy().to_string();

        std::fs::create_dir_all(dir.join("auth")).unwrap();
        std::fs::write(
            dir.join("metadata.json"),
            format!(r#"{{"clusterName":"ci-{name}","clusterID":"0f1e","infraID":"ci-{name}-x7k2p"}}"#),
        )
        .unwrap();
        std::fs::write(dir.join("auth/kubeconfig"), installer_kubeconfig(&format!("ci-{name}"))).unwrap();
    }
}

#[async_trait]
impl ProcessRunner for ScriptedProcess {
    async fn execute(&self, program: &Path, args: &[String]) -> Result<ProcessOutput, CollaboratorError> {
        let program = program.file_name().unwrap().to_string_lossy();
        let line = format!("{} {}", program, args.join(" "));
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

        if line.starts_with("openshift-install create ignition-configs") {
            Self::fake_installer_assets(args);
        }
        let stdout = format!("{} done\n", program);
        Ok(ProcessOutput {
            exit_code: 0,
            combined_output: stdout.clone(),
            stdout,
        })
    }
}

/// In-memory cluster API where every workload is ready
pub struct FakeCluster {
    calls: Mutex<Vec<String>>,
    manifest_failures: Vec<(String, String)>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            manifest_failures: Vec::new(),
        }
    }

    /// Fail creating any manifest whose path contains `needle`
    pub fn fail_manifest(mut self, needle: &str, output: &str) -> Self {
        self.manifest_failures.push((needle.to_string(), output.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_containing(&self, needle: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.contains(needle))
            .collect()
    }

    fn record(&self, kubeconfig: &Path, call: String) {
        // .../.config/<name>/auth/kubeconfig
        let cluster = kubeconfig
            .parent()
            .and_then(Path::parent)
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.calls.lock().unwrap().push(format!("{}: {}", cluster, call));
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn create_from_manifest(
        &self,
        kubeconfig: &Path,
        namespace: &str,
        manifest: &Path,
    ) -> Result<String, CollaboratorError> {
        let manifest = manifest.display().to_string();
        self.record(kubeconfig, format!("create {} -n {}", manifest, namespace));
        for (needle, output) in &self.manifest_failures {
            if manifest.contains(needle.as_str()) {
                return Err(CollaboratorError::Exit {
                    program: "oc".to_string(),
                    code: 1,
                    output: output.clone(),
                });
            }
        }
        Ok("created".to_string())
    }

    async fn list_deployments(
        &self,
        kubeconfig: &Path,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<DeploymentStatus>, CollaboratorError> {
        self.record(kubeconfig, format!("get deployments -n {} -l {}", namespace, label_selector));
        let name = if label_selector.contains("tiller") {
            "tiller-deploy"
        } else {
            "submariner"
        };
        Ok(vec![DeploymentStatus {
            name: name.to_string(),
            ready_replicas: 1,
        }])
    }

    async fn list_secrets(
        &self,
        kubeconfig: &Path,
        namespace: &str,
        field_selector: &str,
    ) -> Result<Vec<SecretData>, CollaboratorError> {
        self.record(kubeconfig, format!("get secrets -n {} --field-selector {}", namespace, field_selector));
        Ok(vec![SecretData {
            name: format!("{}-client-token-q9wz4", namespace),
            annotations: BTreeMap::from([(
                "kubernetes.io/service-account.name".to_string(),
                format!("{}-client", namespace),
            )]),
            data: BTreeMap::from([
                ("token".to_string(), STANDARD.encode("broker-sa-token")),
                ("ca.crt".to_string(), "LS0tLS1CRUdJTiBDRVJU".to_string()),
            ]),
        }])
    }

    async fn label_node(
        &self,
        kubeconfig: &Path,
        node: &str,
        key: &str,
        value: &str,
    ) -> Result<String, CollaboratorError> {
        self.record(kubeconfig, format!("label node {} {}={}", node, key, value));
        Ok("labeled".to_string())
    }

    async fn security_constraint_users(
        &self,
        kubeconfig: &Path,
        constraint: &str,
    ) -> Result<Vec<String>, CollaboratorError> {
        self.record(kubeconfig, format!("get scc {}", constraint));
        Ok(vec!["system:admin".to_string()])
    }

    async fn set_security_constraint_users(
        &self,
        kubeconfig: &Path,
        constraint: &str,
        users: &[String],
    ) -> Result<String, CollaboratorError> {
        self.record(kubeconfig, format!("patch scc {} users={}", constraint, users.join(",")));
        Ok("patched".to_string())
    }

    async fn set_workload_image(
        &self,
        kubeconfig: &Path,
        namespace: &str,
        kind: WorkloadKind,
        name: &str,
        image: &str,
    ) -> Result<String, CollaboratorError> {
        self.record(kubeconfig, format!("set image {}/{} -n {} {}", kind, name, namespace, image));
        Ok("patched".to_string())
    }

    async fn delete_crds(&self, kubeconfig: &Path, names: &[&str]) -> Result<String, CollaboratorError> {
        self.record(kubeconfig, format!("delete crd {}", names.join(" ")));
        Ok("deleted".to_string())
    }
}

/// Cloud inventory with one network and one gateway instance per region
#[derive(Default)]
pub struct FakeCloud {
    calls: Mutex<Vec<String>>,
}

impl FakeCloud {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CloudInventory for FakeCloud {
    async fn networks_by_tag(&self, region: &str, key: &str, value: &str) -> Result<Vec<String>, CollaboratorError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("describe-vpcs {} {}={}", region, key, value));
        Ok(vec![format!("vpc-{}", region)])
    }

    async fn instances_by_tags(
        &self,
        region: &str,
        network: &str,
        tags: &[(String, String)],
    ) -> Result<Vec<Instance>, CollaboratorError> {
        let tags: Vec<String> = tags.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        self.calls
            .lock()
            .unwrap()
            .push(format!("describe-instances {} {} {}", region, network, tags.join(",")));
        Ok(vec![Instance {
            id: "i-0gw".to_string(),
            private_dns_name: format!("ip-10-0-1-10.{}.compute.internal", region),
        }])
    }
}

/// A workdir, fake collaborators and a context over them
pub struct Harness {
    pub dir: TempDir,
    pub process: Arc<ScriptedProcess>,
    pub cluster: Arc<FakeCluster>,
    pub cloud: Arc<FakeCloud>,
    pub targets: TargetSet,
    pub ctx: Arc<RunContext>,
    events: Arc<Mutex<Vec<ExecutionEvent>>>,
}

impl Harness {
    pub fn new(yaml: &str) -> Self {
        Self::with(yaml, ScriptedProcess::new(), FakeCluster::new(), |_| {})
    }

    pub fn with(
        yaml: &str,
        process: ScriptedProcess,
        cluster: FakeCluster,
        adjust: impl FnOnce(&mut MeshupConfig),
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = MeshupConfig::from_yaml(yaml).unwrap();
        config.workdir = dir.path().to_path_buf();
        adjust(&mut config);

        let template = dir.path().join("tpl/install-config.yaml");
        std::fs::create_dir_all(template.parent().unwrap()).unwrap();
        std::fs::write(&template, INSTALL_CONFIG_TEMPLATE).unwrap();

        let process = Arc::new(process);
        let cluster = Arc::new(cluster);
        let cloud = Arc::new(FakeCloud::default());
        let collaborators = Collaborators {
            process: process.clone(),
            cluster: cluster.clone(),
            cloud: cloud.clone(),
            state: Arc::new(StateStore::new(dir.path())),
        };
        let ctx = Arc::new(RunContext::from_config(&config, collaborators, SharedSecret::generate()).unwrap());

        Self {
            targets: config.target_set().unwrap(),
            dir,
            process,
            cluster,
            cloud,
            ctx,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn engine(&self) -> ExecutionEngine {
        let engine = ExecutionEngine::new(FanOutScheduler::new());
        let events = self.events.clone();
        engine
            .add_event_handler(move |event| events.lock().unwrap().push(event))
            .await;
        engine
    }

    pub async fn run(&self, pipeline: &Pipeline) -> Result<RunReport, ProvisionError> {
        self.engine()
            .await
            .execute(pipeline, &self.targets, self.ctx.clone())
            .await
    }

    pub async fn teardown(&self) -> Result<RunReport, ProvisionError> {
        self.engine()
            .await
            .teardown(meshup::stages::teardown_stage(), &self.targets, self.ctx.clone())
            .await
    }

    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Outcomes recorded for `stage`, in target order
    pub fn outcomes(&self, stage: &str) -> Vec<Outcome> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ExecutionEvent::OutcomeRecorded { outcome, .. } if outcome.stage == stage => Some(outcome),
                _ => None,
            })
            .collect()
    }

    /// Stage names in the order their steps started
    pub fn started_stages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ExecutionEvent::StepStarted { stage, .. } => Some(stage),
                _ => None,
            })
            .collect()
    }
}

/// Value of `key=` inside a comma-separated `--set` list
pub fn set_value<'a>(call: &'a str, key: &str) -> Option<&'a str> {
    let start = call.find(&format!("{}=", key))? + key.len() + 1;
    let rest = &call[start..];
    Some(rest.split(|c: char| c == ',' || c == ' ').next().unwrap_or(rest))
}
