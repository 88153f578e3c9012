use anyhow::{Context, Result};
use meshup::cli::commands::{MeshArgs, UpdateCommand, ValidateCommand};
use meshup::cli::output::*;
use meshup::cli::{Cli, Command};
use meshup::collab::Collaborators;
use meshup::core::config::MeshupConfig;
use meshup::core::{Pipeline, RunContext, SharedSecret, TargetSet};
use meshup::execution::{ExecutionEngine, ExecutionEvent, FanOutScheduler, RunReport};
use meshup::{stages, ProvisionError};
use std::path::Path;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Validate(cmd) => validate_config(&cli.config, cmd),
        Command::Create(_) => create_clusters(&cli).await,
        Command::Destroy(_) => destroy_clusters(&cli).await,
        Command::Update(UpdateCommand::Mesh(args)) => update_mesh(&cli, args).await,
    }
}

fn load_config(path: &Path) -> Result<MeshupConfig> {
    let config = MeshupConfig::from_file(path).context("Failed to load configuration")?;
    println!(
        "{} Loaded {} cluster(s) from {}",
        INFO,
        style(config.clusters.len()).cyan(),
        style(path.display()).bold()
    );
    Ok(config)
}

fn build_context(config: &MeshupConfig, secret: SharedSecret) -> Result<Arc<RunContext>> {
    let tools = config.tools.resolved(&config.workdir);
    let collaborators = Collaborators::system(tools.oc, tools.aws, config.workdir.clone());
    Ok(Arc::new(RunContext::from_config(config, collaborators, secret)?))
}

async fn engine_for(cli: &Cli, steps: usize) -> ExecutionEngine {
    let engine = ExecutionEngine::new(FanOutScheduler::with_max_parallel(cli.max_parallel));
    let progress = create_progress_bar(steps);

    engine
        .add_event_handler(move |event| {
            progress.println(format_execution_event(&event));
            match event {
                ExecutionEvent::StepCompleted { stage, .. } => {
                    progress.inc(1);
                    progress.set_message(stage);
                }
                ExecutionEvent::RunAborted { .. } => progress.abandon(),
                ExecutionEvent::RunCompleted { .. } => progress.finish_and_clear(),
                _ => {}
            }
        })
        .await;
    engine
}

async fn run_pipeline(
    cli: &Cli,
    pipeline: &Pipeline,
    targets: &TargetSet,
    ctx: Arc<RunContext>,
) -> Result<RunReport, ProvisionError> {
    let engine = engine_for(cli, pipeline.len()).await;
    engine.execute(pipeline, targets, ctx).await
}

fn exit_on_failure(result: Result<RunReport, ProvisionError>) -> RunReport {
    match result {
        Ok(report) => report,
        Err(e) => {
            println!("\n{} {}", CROSS, style("failed").red());
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

async fn create_clusters(cli: &Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    let targets = config.target_set()?;
    let ctx = build_context(&config, SharedSecret::generate())?;
    let pipeline = stages::provisioning_pipeline(&targets);

    let report = exit_on_failure(run_pipeline(cli, &pipeline, &targets, ctx.clone()).await);

    let kubeconfigs: Vec<String> = targets
        .names()
        .iter()
        .map(|name| ctx.state().dev_kubeconfig(name).display().to_string())
        .collect();
    println!(
        "\n{} {} finished in {}",
        CHECK,
        style(&report.pipeline).bold(),
        format_duration((report.finished_at - report.started_at).to_std().unwrap_or_default())
    );
    println!("{} Kubeconfigs: export KUBECONFIG={}", INFO, kubeconfigs.join(":"));
    Ok(())
}

async fn destroy_clusters(cli: &Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    let targets = config.target_set()?;
    let ctx = build_context(&config, SharedSecret::generate())?;

    let engine = engine_for(cli, 1).await;
    exit_on_failure(engine.teardown(stages::teardown_stage(), &targets, ctx).await);
    println!("\n{} {} cluster(s) destroyed", CHECK, style(targets.len()).cyan());
    Ok(())
}

async fn update_mesh(cli: &Cli, args: &MeshArgs) -> Result<()> {
    let mut config = load_config(&cli.config)?;
    args.apply(&mut config.helm);
    let targets = config.target_set()?;

    let pipeline = if args.reinstall {
        println!("{} Reinstalling the mesh", WARN);
        stages::mesh_reinstall_pipeline(&targets)
    } else {
        stages::image_rollout_pipeline()
    };
    let ctx = build_context(&config, SharedSecret::generate())?;

    exit_on_failure(run_pipeline(cli, &pipeline, &targets, ctx).await);
    Ok(())
}

fn validate_config(path: &Path, cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating configuration...", INFO);

    let result = MeshupConfig::from_file(path).and_then(|config| {
        let targets = config.target_set()?;
        Ok((config, targets))
    });

    match result {
        Ok((config, targets)) => {
            println!("{} Configuration is valid!", CHECK);
            for target in targets.all() {
                println!(
                    "  {} {} ({})",
                    style(&target.name).bold(),
                    style(format!("{:?}", target.role).to_lowercase()).cyan(),
                    target.platform
                );
            }

            if cmd.json {
                let pipeline = stages::provisioning_pipeline(&targets);
                let data = serde_json::json!({
                    "clusters": config.clusters,
                    "helm": config.helm,
                    "stages": pipeline.stage_names(),
                });
                println!("\n{}", serde_json::to_string_pretty(&data)?);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}
