//! Configuration types for inferlet

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::capability::DEFAULT_ACCELERATOR_MARKER;
use crate::environment::{PortBinding, DEFAULT_SERVER_PORTS};

/// Default inference server image
pub const DEFAULT_IMAGE: &str = "nvcr.io/nvidia/tritonserver:23.04-py3";

/// Placeholder model root used when nothing else is configured
pub const DEFAULT_MODEL_ROOT: &str = "/path/to/nas/models/root";

/// Path the model repository is mounted at inside the container
pub const CONTAINER_MODEL_PATH: &str = "/models";

/// Main orchestrator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Container engine connection
    pub engine: EngineConfig,
    /// Container settings
    pub container: ContainerConfig,
    /// Supervision settings
    pub supervision: SupervisionConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl OrchestratorConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::InferletError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::InferletError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content)
            .map_err(|e| crate::InferletError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Container engine connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Explicit engine socket; the local defaults (and `DOCKER_HOST`) apply when unset
    pub socket: Option<String>,
    /// Request timeout in seconds for engine API calls
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            socket: None,
            timeout_secs: 120,
        }
    }
}

/// Settings for the supervised inference server container
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Image reference
    pub image: String,
    /// Host directory holding the model repository
    pub model_path: PathBuf,
    /// Mount point of the model repository inside the container
    pub container_model_path: String,
    /// Published ports
    pub ports: Vec<PortBinding>,
    /// Server command line; derived from `container_model_path` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    /// Filesystem marker whose presence indicates an accelerator driver
    pub accelerator_marker: PathBuf,
    /// Also request GPU devices from the engine when an accelerator is present
    pub request_gpu_devices: bool,
}

impl ContainerConfig {
    /// Default server command for a model repository mounted at `model_path`
    pub fn default_command(model_path: &str) -> Vec<String> {
        vec![
            "tritonserver".to_string(),
            format!("--model-repository={}", model_path),
            "--strict-model-config=false".to_string(),
            "--log-verbose=true".to_string(),
        ]
    }

    /// The command the server container runs
    pub fn server_command(&self) -> Vec<String> {
        match &self.command {
            Some(command) => command.clone(),
            None => Self::default_command(&self.container_model_path),
        }
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            model_path: PathBuf::from(DEFAULT_MODEL_ROOT),
            container_model_path: CONTAINER_MODEL_PATH.to_string(),
            ports: DEFAULT_SERVER_PORTS
                .iter()
                .map(|port| PortBinding::same(*port))
                .collect(),
            command: None,
            accelerator_marker: PathBuf::from(DEFAULT_ACCELERATOR_MARKER),
            request_gpu_devices: false,
        }
    }
}

/// How the supervisor waits on the container
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisionConfig {
    /// Upper bound on the exit-wait in seconds; unbounded when unset
    pub wait_timeout_secs: Option<u64>,
    /// Grace period given to the container when it has to be stopped
    pub stop_grace_secs: u64,
    /// How long to wait for the log relay to drain once the container is gone
    pub relay_drain_secs: u64,
}

impl SupervisionConfig {
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_secs.map(Duration::from_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub fn relay_drain(&self) -> Duration {
        Duration::from_secs(self.relay_drain_secs)
    }
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: None,
            stop_grace_secs: 10,
            relay_drain_secs: 5,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (text or compact)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Full human readable output
    Text,
    /// Single-line compact output
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.container.image, DEFAULT_IMAGE);
        assert_eq!(config.container.container_model_path, "/models");
        let ports: Vec<u16> = config.container.ports.iter().map(|p| p.container).collect();
        assert_eq!(ports, vec![8000, 8001, 8002]);
        assert_eq!(
            config.container.server_command(),
            vec![
                "tritonserver",
                "--model-repository=/models",
                "--strict-model-config=false",
                "--log-verbose=true",
            ]
        );
        assert!(config.supervision.wait_timeout().is_none());
    }

    #[test]
    fn test_config_parse_partial() {
        let toml_str = r#"
[container]
image = "registry.local/tritonserver:24.01-py3"
model_path = "/srv/models"

[supervision]
wait_timeout_secs = 600

[logging]
level = "debug"
format = "compact"
"#;
        let config: OrchestratorConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.container.image, "registry.local/tritonserver:24.01-py3");
        assert_eq!(config.container.model_path, PathBuf::from("/srv/models"));
        // Unset fields keep their defaults
        assert_eq!(config.container.ports.len(), 3);
        assert_eq!(config.engine.timeout_secs, 120);
        assert_eq!(
            config.supervision.wait_timeout(),
            Some(Duration::from_secs(600))
        );
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let example = include_str!("../../../inferlet.example.toml");
        let config: OrchestratorConfig = toml::from_str(example).unwrap();
        let defaults = OrchestratorConfig::default();

        assert_eq!(config.container.image, defaults.container.image);
        assert_eq!(config.container.ports, defaults.container.ports);
        assert_eq!(
            config.container.server_command(),
            defaults.container.server_command()
        );
        assert_eq!(config.supervision.stop_grace_secs, defaults.supervision.stop_grace_secs);
    }

    #[test]
    fn test_command_follows_mount_point() {
        let config: OrchestratorConfig =
            toml::from_str("[container]\ncontainer_model_path = \"/opt/models\"\n").unwrap();
        assert_eq!(
            config.container.server_command()[1],
            "--model-repository=/opt/models"
        );

        let config: OrchestratorConfig = toml::from_str(
            "[container]\ncontainer_model_path = \"/opt/models\"\ncommand = [\"tritonserver\", \"--model-repository=/srv\"]\n",
        )
        .unwrap();
        assert_eq!(
            config.container.server_command(),
            vec!["tritonserver", "--model-repository=/srv"]
        );
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\nsocket = \"/run/user/1000/docker.sock\"").unwrap();

        let config = OrchestratorConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.engine.socket.as_deref(),
            Some("/run/user/1000/docker.sock")
        );
    }

    #[test]
    fn test_config_from_missing_file() {
        let err = OrchestratorConfig::from_file(std::path::Path::new("/nonexistent/inferlet.toml"))
            .unwrap_err();
        assert!(matches!(err, crate::InferletError::Config(_)));
    }
}
