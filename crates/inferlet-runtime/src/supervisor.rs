//! Container supervision
//!
//! Launches one inference server container per request, relays its output on a
//! separate task and blocks until the container exits.

use inferlet_core::{
    ContainerHandle, ContainerState, DeploymentRequest, ExitOutcome, ExitStatus, InferletError,
    InferletResult, SupervisionConfig,
};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::relay::{spawn_relay, LogSink, RelaySummary};
use crate::traits::{ContainerEngine, ExitWait, Launched};

/// Supervises a single inference server container
pub struct ContainerSupervisor {
    engine: Arc<dyn ContainerEngine>,
    sink: Arc<dyn LogSink>,
    config: SupervisionConfig,
}

impl ContainerSupervisor {
    /// Create a new supervisor
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        sink: Arc<dyn LogSink>,
        config: SupervisionConfig,
    ) -> Self {
        Self {
            engine,
            sink,
            config,
        }
    }

    /// Launch the container and block until it exits.
    ///
    /// Cancelling `cancel` (or hitting the configured wait timeout) stops the
    /// container; the call still returns its terminal status. Cancelling
    /// before the container has started (during an image pull, say) launches
    /// nothing. The log relay is always joined before returning.
    pub async fn run(
        &self,
        request: DeploymentRequest,
        cancel: CancellationToken,
    ) -> InferletResult<ExitStatus> {
        info!(
            image = request.image(),
            models = %request.host_model_path().display(),
            capability = %request.capability(),
            engine = self.engine.name(),
            "Deploying inference server"
        );
        if request.build_accelerated_models() {
            info!("Accelerated model build on startup requested");
        }

        if cancel.is_cancelled() {
            info!("Interrupted before launch, nothing started");
            return Ok(ExitStatus::cancelled_before_launch());
        }

        tokio::select! {
            reachable = self.engine.ping() => reachable?,
            _ = cancel.cancelled() => {
                info!("Interrupted before launch, nothing started");
                return Ok(ExitStatus::cancelled_before_launch());
            }
        }
        check_model_path(request.host_model_path()).await?;

        let Launched { mut handle, exit } =
            match self.engine.create_and_start(&request, &cancel).await {
                Ok(launched) => launched,
                Err(InferletError::Cancelled(reason)) => {
                    info!(reason = %reason, "Interrupted before launch, nothing started");
                    return Ok(ExitStatus::cancelled_before_launch());
                }
                Err(e) => {
                    error!(image = request.image(), error = %e, "Failed to launch container");
                    return Err(e);
                }
            };
        handle.transition(ContainerState::Running);

        info!(
            container_id = handle.short_id(),
            name = handle.name(),
            ports = ?request.ports().iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            "Container started"
        );

        let relay = match self.engine.attach_output(&handle).await {
            Ok(stream) => {
                handle.transition(ContainerState::Relaying);
                Some(spawn_relay(stream, self.sink.clone()))
            }
            Err(e) => {
                warn!(
                    container_id = handle.short_id(),
                    error = %e,
                    "Failed to attach to container output, continuing without logs"
                );
                None
            }
        };

        let status = self.wait_for_exit(&handle, exit, &cancel).await;
        if status.is_err() {
            // Make sure the relay has a stream end to reach
            self.stop_quietly(&handle).await;
        }
        handle.transition(ContainerState::Exited);

        if let Some(relay) = relay {
            self.drain(relay).await;
        }

        let status = status?;
        if status.success() {
            info!(container_id = handle.short_id(), "Container exited cleanly");
        } else {
            warn!(
                container_id = handle.short_id(),
                code = status.code,
                outcome = %status.outcome,
                "Container finished"
            );
        }
        Ok(status)
    }

    async fn wait_for_exit(
        &self,
        handle: &ContainerHandle,
        mut wait: ExitWait,
        cancel: &CancellationToken,
    ) -> InferletResult<ExitStatus> {
        let timeout = self.config.wait_timeout();
        let deadline = async move {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let outcome = tokio::select! {
            code = &mut wait => return code.map(ExitStatus::exited),
            _ = cancel.cancelled() => ExitOutcome::Cancelled,
            _ = &mut deadline => ExitOutcome::TimedOut,
        };

        warn!(
            container_id = handle.short_id(),
            outcome = %outcome,
            "Stopping container before it exited on its own"
        );
        self.engine.stop(handle, self.config.stop_grace()).await?;

        let code = wait.await?;
        Ok(ExitStatus { code, outcome })
    }

    async fn stop_quietly(&self, handle: &ContainerHandle) {
        if let Err(e) = self.engine.stop(handle, self.config.stop_grace()).await {
            debug!(container_id = handle.short_id(), error = %e, "Stop after failed wait");
        }
    }

    async fn drain(&self, relay: JoinHandle<RelaySummary>) {
        let abort = relay.abort_handle();
        match tokio::time::timeout(self.config.relay_drain(), relay).await {
            Ok(Ok(summary)) => debug!(
                lines = summary.lines,
                interrupted = summary.interrupted,
                "Log relay drained"
            ),
            Ok(Err(e)) => warn!(error = %e, "Log relay task failed"),
            Err(_) => {
                warn!("Log relay did not finish after container exit, abandoning it");
                abort.abort();
            }
        }
    }
}

/// The model directory must exist on the host before it can be bound
async fn check_model_path(path: &Path) -> InferletResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(InferletError::Launch(format!(
            "Model path {} is not a directory",
            path.display()
        ))),
        Err(e) => Err(InferletError::Launch(format!(
            "Model path {} is not accessible: {}",
            path.display(),
            e
        ))),
    }
}
