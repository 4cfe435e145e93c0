//! Deployment request, container handle and exit status definitions

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::capability::CapabilityFlag;
use crate::config::{ContainerConfig, CONTAINER_MODEL_PATH};
use crate::environment::{compose, EnvironmentMapping, Mount, PortBinding, DEFAULT_SERVER_PORTS};

/// Everything needed to launch one inference server container.
///
/// Built once from CLI input and configuration, then handed to the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRequest {
    name: String,
    image: String,
    host_model_path: PathBuf,
    container_model_path: String,
    capability: CapabilityFlag,
    environment: EnvironmentMapping,
    ports: Vec<PortBinding>,
    command: Vec<String>,
    build_accelerated_models: bool,
    request_gpu_devices: bool,
}

impl DeploymentRequest {
    /// Create a request with the default ports, mount point and server command
    pub fn new(
        image: impl Into<String>,
        host_model_path: impl Into<PathBuf>,
        capability: CapabilityFlag,
    ) -> Self {
        Self {
            name: generate_name(),
            image: image.into(),
            host_model_path: host_model_path.into(),
            container_model_path: CONTAINER_MODEL_PATH.to_string(),
            capability,
            environment: compose(capability),
            ports: DEFAULT_SERVER_PORTS
                .iter()
                .map(|port| PortBinding::same(*port))
                .collect(),
            command: ContainerConfig::default_command(CONTAINER_MODEL_PATH),
            build_accelerated_models: false,
            request_gpu_devices: false,
        }
    }

    /// Create a request from container configuration
    pub fn from_config(config: &ContainerConfig, capability: CapabilityFlag) -> Self {
        Self {
            name: generate_name(),
            image: config.image.clone(),
            host_model_path: config.model_path.clone(),
            container_model_path: config.container_model_path.clone(),
            capability,
            environment: compose(capability),
            ports: config.ports.clone(),
            command: config.server_command(),
            build_accelerated_models: false,
            request_gpu_devices: config.request_gpu_devices && capability.accelerator,
        }
    }

    /// Record the "build accelerated models on the fly" request.
    ///
    /// The flag is carried along and logged; nothing acts on it yet.
    pub fn with_build_accelerated_models(mut self, enabled: bool) -> Self {
        self.build_accelerated_models = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn host_model_path(&self) -> &Path {
        &self.host_model_path
    }

    pub fn container_model_path(&self) -> &str {
        &self.container_model_path
    }

    pub fn capability(&self) -> CapabilityFlag {
        self.capability
    }

    pub fn environment(&self) -> &EnvironmentMapping {
        &self.environment
    }

    pub fn ports(&self) -> &[PortBinding] {
        &self.ports
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn build_accelerated_models(&self) -> bool {
        self.build_accelerated_models
    }

    pub fn request_gpu_devices(&self) -> bool {
        self.request_gpu_devices
    }

    /// The model repository bind
    pub fn model_mount(&self) -> Mount {
        Mount::read_write(
            self.host_model_path.to_string_lossy(),
            self.container_model_path.clone(),
        )
    }
}

fn generate_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("inferlet-{}", &id[..12])
}

/// Lifecycle of a supervised container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    /// Created by the engine, not yet started
    Created,
    /// Process started
    Running,
    /// Output stream attached to the log relay
    Relaying,
    /// Process exited
    Exited,
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerState::Created => write!(f, "Created"),
            ContainerState::Running => write!(f, "Running"),
            ContainerState::Relaying => write!(f, "Relaying"),
            ContainerState::Exited => write!(f, "Exited"),
        }
    }
}

/// Reference to a container owned by the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    id: String,
    name: String,
    state: ContainerState,
}

impl ContainerHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: ContainerState::Created,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Short form of the engine id, as printed by container tooling
    pub fn short_id(&self) -> &str {
        let end = self.id.len().min(12);
        &self.id[..end]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ContainerState {
        self.state
    }

    /// Advance the lifecycle. States only move forward.
    pub fn transition(&mut self, next: ContainerState) {
        if next as u8 > self.state as u8 {
            self.state = next;
        }
    }
}

/// How supervision of a container ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitOutcome {
    /// The container process exited on its own
    Exited,
    /// Supervision was cancelled and the container stopped
    Cancelled,
    /// The configured wait timeout elapsed and the container stopped
    TimedOut,
}

impl std::fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitOutcome::Exited => write!(f, "exited"),
            ExitOutcome::Cancelled => write!(f, "cancelled"),
            ExitOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Terminal status of a supervised container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    /// Exit code reported by the engine
    pub code: i64,
    pub outcome: ExitOutcome,
}

impl ExitStatus {
    pub fn exited(code: i64) -> Self {
        Self {
            code,
            outcome: ExitOutcome::Exited,
        }
    }

    /// Supervision was cancelled before any container was started; there is
    /// no engine exit code, so the code is 0
    pub fn cancelled_before_launch() -> Self {
        Self {
            code: 0,
            outcome: ExitOutcome::Cancelled,
        }
    }

    /// Clean natural exit
    pub fn success(&self) -> bool {
        self.code == 0 && self.outcome == ExitOutcome::Exited
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} with code {}", self.outcome, self.code)
    }
}
