//! Compose engine backed by the `docker compose` command line

use async_trait::async_trait;
use inferlet_core::{ComposeDescriptor, InferletError, InferletResult};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::compose::ComposeAction;
use crate::traits::{ComposeEngine, EngineReport};

/// Runs compose batches through `docker compose`
#[derive(Debug, Clone)]
pub struct DockerComposeCli {
    program: String,
}

impl DockerComposeCli {
    /// Use the `docker` binary found on `PATH`
    pub fn new() -> Self {
        Self::with_program("docker")
    }

    /// Use a specific docker-compatible binary
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Build the command for a batch
    fn build_command(
        &self,
        action: ComposeAction,
        descriptor: &ComposeDescriptor,
        services: &[String],
    ) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("compose").arg("-f").arg(descriptor.path());

        if let Some(project) = descriptor.project() {
            cmd.arg("-p").arg(project);
        }

        match action {
            ComposeAction::Start => cmd.arg("up").arg("-d"),
            ComposeAction::Stop => cmd.arg("stop"),
        };
        cmd.args(services);

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        cmd
    }

    async fn execute(
        &self,
        action: ComposeAction,
        descriptor: &ComposeDescriptor,
        services: &[String],
    ) -> InferletResult<EngineReport> {
        let mut cmd = self.build_command(action, descriptor, services);
        debug!(program = %self.program, action = %action, "Running compose command");

        let output = cmd.output().await.map_err(|e| {
            InferletError::RuntimeUnavailable(format!(
                "Failed to run '{} compose': {}",
                self.program, e
            ))
        })?;

        // Compose writes its progress to stderr
        let mut report = String::from_utf8_lossy(&output.stdout).into_owned();
        report.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(EngineReport {
            succeeded: output.status.success(),
            output: report.trim().to_string(),
        })
    }
}

impl Default for DockerComposeCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComposeEngine for DockerComposeCli {
    async fn start(
        &self,
        descriptor: &ComposeDescriptor,
        services: &[String],
    ) -> InferletResult<EngineReport> {
        self.execute(ComposeAction::Start, descriptor, services)
            .await
    }

    async fn stop(
        &self,
        descriptor: &ComposeDescriptor,
        services: &[String],
    ) -> InferletResult<EngineReport> {
        self.execute(ComposeAction::Stop, descriptor, services)
            .await
    }

    fn name(&self) -> &'static str {
        "docker-compose"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn descriptor(yaml: &str) -> ComposeDescriptor {
        ComposeDescriptor::parse(Path::new("/srv/stack/docker-compose.yml"), yaml).unwrap()
    }

    fn args(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_build_start_command() {
        let descriptor = descriptor("name: triton\nservices:\n  svcA: {}\n  svcB: {}\n");
        let services = descriptor.service_names();
        let cli = DockerComposeCli::new();

        let cmd = cli.build_command(ComposeAction::Start, &descriptor, &services);
        assert_eq!(cmd.as_std().get_program(), "docker");
        assert_eq!(
            args(&cmd),
            vec![
                "compose",
                "-f",
                "/srv/stack/docker-compose.yml",
                "-p",
                "triton",
                "up",
                "-d",
                "svcA",
                "svcB",
            ]
        );
    }

    #[test]
    fn test_build_stop_command_without_project() {
        let descriptor = descriptor("services:\n  svcA: {}\n");
        let cli = DockerComposeCli::new();

        let cmd = cli.build_command(ComposeAction::Stop, &descriptor, &["svcA".to_string()]);
        assert_eq!(
            args(&cmd),
            vec!["compose", "-f", "/srv/stack/docker-compose.yml", "stop", "svcA"]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let descriptor = descriptor("services:\n  svcA: {}\n");
        let cli = DockerComposeCli::with_program("/nonexistent/bin/docker");

        let err = cli
            .start(&descriptor, &["svcA".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, InferletError::RuntimeUnavailable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_becomes_report() {
        let descriptor = descriptor("services:\n  svcA: {}\n");
        let services = vec!["svcA".to_string()];

        let ok = DockerComposeCli::with_program("true")
            .stop(&descriptor, &services)
            .await
            .unwrap();
        assert!(ok.succeeded);

        let failed = DockerComposeCli::with_program("false")
            .stop(&descriptor, &services)
            .await
            .unwrap();
        assert!(!failed.succeeded);
    }
}
