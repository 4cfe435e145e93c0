//! CLI commands implementation

use anyhow::Result;
use inferlet_core::{
    environment, CapabilityProber, DeploymentRequest, EnvironmentMapping, ExitOutcome,
    ExitStatus, OrchestratorConfig,
};
use inferlet_runtime::{
    ComposeAction, ComposeController, ContainerSupervisor, DockerComposeCli, DockerEngine,
    TracingSink,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Exit code used when supervision was interrupted
pub const EXIT_CANCELLED: u8 = 130;

/// Exit code used when the wait timeout elapsed
pub const EXIT_TIMED_OUT: u8 = 124;

/// Command-line overrides for a deployment
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    pub image: Option<String>,
    pub models: Option<PathBuf>,
    pub build_accelerated_models: bool,
    pub wait_timeout: Option<u64>,
}

impl RunOptions {
    /// Layer the command-line values over the configuration file
    pub fn apply(&self, config: &mut OrchestratorConfig) {
        if let Some(image) = &self.image {
            config.container.image = image.clone();
        }
        if let Some(models) = &self.models {
            config.container.model_path = models.clone();
        }
        if let Some(secs) = self.wait_timeout {
            config.supervision.wait_timeout_secs = Some(secs);
        }
    }
}

/// Probe the host and build the deployment request
pub fn build_request(config: &OrchestratorConfig, build_accelerated_models: bool) -> DeploymentRequest {
    let capability = CapabilityProber::new(&config.container.accelerator_marker).probe();
    DeploymentRequest::from_config(&config.container, capability)
        .with_build_accelerated_models(build_accelerated_models)
}

/// Deploy the inference server and supervise it until it exits
pub async fn run(mut config: OrchestratorConfig, options: RunOptions) -> Result<u8> {
    options.apply(&mut config);

    info!(
        image = %config.container.image,
        models = %config.container.model_path.display(),
        build_accelerated_models = options.build_accelerated_models,
        "Starting deployment"
    );

    let request = build_request(&config, options.build_accelerated_models);
    let engine = Arc::new(DockerEngine::connect(&config.engine)?);
    let supervisor =
        ContainerSupervisor::new(engine, Arc::new(TracingSink), config.supervision.clone());

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping container");
            interrupt.cancel();
        }
    });

    let result = supervisor.run(request, cancel).await;
    signal_task.abort();

    let status = result?;
    println!("Inference server {}", status);
    Ok(exit_code(&status))
}

/// Map a container's terminal status onto this process's exit code
pub fn exit_code(status: &ExitStatus) -> u8 {
    match status.outcome {
        ExitOutcome::Exited => u8::try_from(status.code).unwrap_or(1),
        ExitOutcome::Cancelled => EXIT_CANCELLED,
        ExitOutcome::TimedOut => EXIT_TIMED_OUT,
    }
}

/// Start or stop compose services
pub async fn compose(action: ComposeAction, file: PathBuf, services: Vec<String>) -> Result<u8> {
    let controller = ComposeController::new(Arc::new(DockerComposeCli::new()));

    let outcome = match action {
        ComposeAction::Start => controller.start(&file, &services).await?,
        ComposeAction::Stop => controller.stop(&file, &services).await?,
    };

    if !outcome.report.is_empty() {
        println!("{}", outcome.report);
    }
    if outcome.succeeded {
        println!("{}: {}", outcome.action, outcome.services.join(", "));
    } else {
        println!(
            "{}: {} (engine reported a problem, see above)",
            outcome.action,
            outcome.services.join(", ")
        );
    }

    Ok(0)
}

/// Capability report printed by `inferlet probe`
#[derive(Debug, Serialize)]
pub struct ProbeReport {
    pub accelerator: bool,
    pub marker: PathBuf,
    pub environment: EnvironmentMapping,
}

impl ProbeReport {
    pub fn collect(config: &OrchestratorConfig) -> Self {
        let prober = CapabilityProber::new(&config.container.accelerator_marker);
        let capability = prober.probe();
        Self {
            accelerator: capability.accelerator,
            marker: prober.marker().to_path_buf(),
            environment: environment::compose(capability),
        }
    }
}

/// Show the host capability and the environment a deployment would get
pub fn probe(config: &OrchestratorConfig) -> Result<u8> {
    let report = ProbeReport::collect(config);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(0)
}
