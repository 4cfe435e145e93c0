//! Docker engine implementation
//!
//! Talks to the local Docker daemon through its HTTP API. Connection settings
//! follow the usual Docker client conventions (`DOCKER_HOST`, local socket).

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::CreateImageOptions;
use bollard::models::{DeviceRequest, HostConfig, PortBinding as EnginePortBinding};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::{stream, StreamExt, TryStreamExt};
use inferlet_core::{
    ContainerHandle, ContainerState, DeploymentRequest, EngineConfig, InferletError,
    InferletResult,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::traits::{ContainerEngine, Launched, LogStream};

/// Container engine backed by the Docker daemon
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect using the engine configuration.
    ///
    /// Connecting does not contact the daemon; unreachable engines surface on
    /// the first request.
    pub fn connect(config: &EngineConfig) -> InferletResult<Self> {
        let docker = match &config.socket {
            Some(socket) => {
                Docker::connect_with_socket(socket, config.timeout_secs, API_DEFAULT_VERSION)
            }
            None => Docker::connect_with_local_defaults()
                .map(|docker| docker.with_timeout(Duration::from_secs(config.timeout_secs))),
        }
        .map_err(|e| {
            InferletError::RuntimeUnavailable(format!(
                "Failed to connect to container engine: {}",
                e
            ))
        })?;

        Ok(Self { docker })
    }

    /// Build the engine-side container configuration for a request
    fn container_config(request: &DeploymentRequest) -> Config<String> {
        let exposed_ports: HashMap<String, HashMap<(), ()>> = request
            .ports()
            .iter()
            .map(|port| (port.container_key(), HashMap::new()))
            .collect();

        let port_bindings: HashMap<String, Option<Vec<EnginePortBinding>>> = request
            .ports()
            .iter()
            .map(|port| {
                (
                    port.container_key(),
                    Some(vec![EnginePortBinding {
                        host_ip: None,
                        host_port: Some(port.host.to_string()),
                    }]),
                )
            })
            .collect();

        let device_requests = request.request_gpu_devices().then(|| {
            vec![DeviceRequest {
                driver: Some("nvidia".to_string()),
                count: Some(-1),
                capabilities: Some(vec![vec!["gpu".to_string()]]),
                ..Default::default()
            }]
        });

        let host_config = HostConfig {
            binds: Some(vec![request.model_mount().bind_spec()]),
            port_bindings: Some(port_bindings),
            auto_remove: Some(true),
            device_requests,
            ..Default::default()
        };

        Config {
            image: Some(request.image().to_string()),
            cmd: Some(request.command().to_vec()),
            env: Some(request.environment().to_env_list()),
            exposed_ports: Some(exposed_ports),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(host_config),
            ..Default::default()
        }
    }

    async fn create(&self, request: &DeploymentRequest) -> Result<String, BollardError> {
        let options = CreateContainerOptions {
            name: request.name().to_string(),
            platform: None,
        };
        let response = self
            .docker
            .create_container(Some(options), Self::container_config(request))
            .await?;

        for warning in &response.warnings {
            warn!(container = request.name(), warning = %warning, "Engine warning");
        }

        Ok(response.id)
    }

    /// Pull an image that is not present locally
    async fn pull_image(&self, image: &str) -> InferletResult<()> {
        info!(image = image, "Pulling image");

        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        let mut progress = Box::pin(self.docker.create_image(Some(options), None, None));

        while let Some(info) = progress
            .try_next()
            .await
            .map_err(|e| classify(e, "pull image"))?
        {
            if let Some(status) = info.status {
                debug!(image = image, status = %status, "Pull progress");
            }
        }

        Ok(())
    }

    /// Best-effort removal of a container that was created but never started
    async fn discard(&self, id: &str) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        if let Err(e) = self.docker.remove_container(id, Some(options)).await {
            warn!(container_id = id, error = %e, "Failed to remove unstarted container");
        }
    }

    /// Start waiting for the next exit of a created container.
    ///
    /// Must be issued before the start request: the container is auto-removed
    /// on exit, and a wait that reaches the daemon afterwards finds nothing.
    fn register_exit_wait(&self, handle: &ContainerHandle) -> JoinHandle<InferletResult<i64>> {
        let docker = self.docker.clone();
        let id = handle.id().to_string();
        let short_id = handle.short_id().to_string();

        tokio::spawn(async move {
            let options = WaitContainerOptions {
                condition: "next-exit".to_string(),
            };
            let mut responses = Box::pin(docker.wait_container(&id, Some(options)));

            match responses.next().await {
                Some(Ok(response)) => Ok(response.status_code),
                // Non-zero exits come back as an error carrying the code
                Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
                Some(Err(BollardError::DockerResponseServerError {
                    status_code: 404, ..
                })) => Err(InferletError::Internal(format!(
                    "Container {} was removed before its exit status could be read",
                    short_id
                ))),
                Some(Err(e)) => Err(classify(e, "wait for container")),
                None => Err(InferletError::Internal(
                    "Container wait ended without a status".to_string(),
                )),
            }
        })
    }
}

/// Reassembles output lines from log frames.
///
/// Frames do not follow line boundaries: one line may arrive over several
/// frames and one frame may carry several lines. Stdout and stderr are
/// buffered separately.
#[derive(Debug, Default)]
struct OutputLines {
    stdout: String,
    stderr: String,
}

impl OutputLines {
    fn push(&mut self, output: &LogOutput) -> Vec<InferletResult<String>> {
        let buffer = match output {
            LogOutput::StdErr { .. } => &mut self.stderr,
            _ => &mut self.stdout,
        };
        buffer.push_str(&output.to_string());

        let mut lines = Vec::new();
        while let Some(end) = buffer.find('\n') {
            let line: String = buffer.drain(..=end).collect();
            lines.push(Ok(line.trim_end().to_string()));
        }
        lines
    }

    /// Whatever is left once the stream has ended
    fn finish(&mut self) -> Vec<InferletResult<String>> {
        [&mut self.stdout, &mut self.stderr]
            .into_iter()
            .filter(|rest| !rest.is_empty())
            .map(|rest| Ok(std::mem::take(rest).trim_end().to_string()))
            .collect()
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn ping(&self) -> InferletResult<()> {
        self.docker.ping().await.map(|_| ()).map_err(|e| {
            InferletError::RuntimeUnavailable(format!("Container engine is not reachable: {}", e))
        })
    }

    async fn create_and_start(
        &self,
        request: &DeploymentRequest,
        cancel: &CancellationToken,
    ) -> InferletResult<Launched> {
        let id = match self.create(request).await {
            Ok(id) => id,
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                // Image missing locally; pull once, then create again
                tokio::select! {
                    pulled = self.pull_image(request.image()) => pulled?,
                    _ = cancel.cancelled() => {
                        return Err(InferletError::Cancelled(format!(
                            "Pull of {} interrupted",
                            request.image()
                        )));
                    }
                }
                self.create(request)
                    .await
                    .map_err(|e| classify(e, "create container"))?
            }
            Err(e) => return Err(classify(e, "create container")),
        };

        let mut handle = ContainerHandle::new(id, request.name());
        debug!(container_id = handle.short_id(), "Container created");

        if cancel.is_cancelled() {
            self.discard(handle.id()).await;
            return Err(InferletError::Cancelled(
                "Interrupted before the container was started".to_string(),
            ));
        }

        let waiter = self.register_exit_wait(&handle);
        tokio::task::yield_now().await;

        if let Err(e) = self
            .docker
            .start_container(handle.id(), None::<StartContainerOptions<String>>)
            .await
        {
            waiter.abort();
            self.discard(handle.id()).await;
            return Err(classify(e, "start container"));
        }

        handle.transition(ContainerState::Running);
        let exit = Box::pin(async move {
            match waiter.await {
                Ok(code) => code,
                Err(e) => Err(InferletError::Internal(format!(
                    "Exit-wait task failed: {}",
                    e
                ))),
            }
        });
        Ok(Launched { handle, exit })
    }

    async fn attach_output(&self, handle: &ContainerHandle) -> InferletResult<LogStream> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            tail: "all".to_string(),
            ..Default::default()
        };

        let frames = Box::pin(self.docker.logs(handle.id(), Some(options)));
        let lines = stream::unfold(
            (frames, OutputLines::default(), false),
            |(mut frames, mut buffer, done)| async move {
                if done {
                    return None;
                }
                match frames.next().await {
                    Some(Ok(output)) => {
                        let lines = buffer.push(&output);
                        Some((lines, (frames, buffer, false)))
                    }
                    Some(Err(e)) => {
                        let failure = vec![Err(InferletError::Internal(format!(
                            "Container output stream failed: {}",
                            e
                        )))];
                        Some((failure, (frames, buffer, true)))
                    }
                    None => Some((buffer.finish(), (frames, buffer, true))),
                }
            },
        )
        .flat_map(stream::iter)
        .boxed();

        Ok(lines)
    }

    async fn stop(&self, handle: &ContainerHandle, grace: Duration) -> InferletResult<()> {
        info!(container_id = handle.short_id(), "Stopping container");

        let options = StopContainerOptions {
            t: grace.as_secs() as i64,
        };
        match self.docker.stop_container(handle.id(), Some(options)).await {
            Ok(()) => Ok(()),
            // Already stopped, or already removed
            Err(BollardError::DockerResponseServerError {
                status_code: 304 | 404,
                ..
            }) => Ok(()),
            Err(e) => Err(classify(e, "stop container")),
        }
    }

    fn name(&self) -> &'static str {
        "docker"
    }
}

/// Map an engine error onto the deployment error taxonomy.
///
/// Anything the daemon answered is a launch problem; anything else means the
/// daemon could not be talked to.
fn classify(err: BollardError, action: &str) -> InferletError {
    match err {
        BollardError::DockerResponseServerError {
            status_code,
            message,
        } => InferletError::Launch(format!(
            "Failed to {}: {} (status {})",
            action, message, status_code
        )),
        other => InferletError::RuntimeUnavailable(format!("Failed to {}: {}", action, other)),
    }
}
