//! In-memory engines and sinks for tests

use async_trait::async_trait;
use futures::{stream, FutureExt, StreamExt};
use inferlet_core::{
    ComposeDescriptor, ContainerHandle, ContainerState, DeploymentRequest, InferletError,
    InferletResult,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::relay::LogSink;
use crate::traits::{ComposeEngine, ContainerEngine, EngineReport, Launched, LogStream};

/// Sink that keeps every line it receives
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl LogSink for MemorySink {
    fn emit(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

/// How the stub engine fails a create call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateFailure {
    UnresolvableImage,
}

/// Container engine double that records every call
pub struct StubEngine {
    pub reachable: bool,
    pub create_failure: Option<CreateFailure>,
    pub output: Vec<String>,
    pub exit_code: i64,
    /// Keep the container "running" until `stop` is called
    pub run_until_stopped: bool,
    /// Time spent before the container starts, like an image pull
    pub launch_delay: Option<Duration>,
    calls: Arc<Mutex<Vec<&'static str>>>,
    launched: Mutex<Option<DeploymentRequest>>,
    stopped: Arc<Notify>,
}

impl StubEngine {
    pub fn exiting_with(exit_code: i64, output: &[&str]) -> Self {
        Self {
            reachable: true,
            create_failure: None,
            output: output.iter().map(|line| line.to_string()).collect(),
            exit_code,
            run_until_stopped: false,
            launch_delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            launched: Mutex::new(None),
            stopped: Arc::new(Notify::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn launched(&self) -> Option<DeploymentRequest> {
        self.launched.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ContainerEngine for StubEngine {
    async fn ping(&self) -> InferletResult<()> {
        self.record("ping");
        if self.reachable {
            Ok(())
        } else {
            Err(InferletError::RuntimeUnavailable(
                "Cannot connect to the Docker daemon".to_string(),
            ))
        }
    }

    async fn create_and_start(
        &self,
        request: &DeploymentRequest,
        cancel: &CancellationToken,
    ) -> InferletResult<Launched> {
        self.record("create");
        if let Some(CreateFailure::UnresolvableImage) = self.create_failure {
            return Err(InferletError::Launch(format!(
                "Failed to create container: No such image: {} (status 404)",
                request.image()
            )));
        }
        if let Some(delay) = self.launch_delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    return Err(InferletError::Cancelled(format!(
                        "Pull of {} interrupted",
                        request.image()
                    )));
                }
            }
        }

        *self.launched.lock().unwrap() = Some(request.clone());
        let mut handle = ContainerHandle::new("f00dfeedcafe0123456789", request.name());
        handle.transition(ContainerState::Running);

        // Recorded when first polled, i.e. when the supervisor starts waiting
        let calls = self.calls.clone();
        let stopped = self.stopped.clone();
        let run_until_stopped = self.run_until_stopped;
        let exit_code = self.exit_code;
        let exit = async move {
            calls.lock().unwrap().push("wait");
            if run_until_stopped {
                stopped.notified().await;
            }
            Ok(exit_code)
        }
        .boxed();

        Ok(Launched { handle, exit })
    }

    async fn attach_output(&self, _handle: &ContainerHandle) -> InferletResult<LogStream> {
        self.record("attach");
        let lines: Vec<InferletResult<String>> = self.output.iter().cloned().map(Ok).collect();
        Ok(stream::iter(lines).boxed())
    }

    async fn stop(&self, _handle: &ContainerHandle, _grace: Duration) -> InferletResult<()> {
        self.record("stop");
        self.stopped.notify_one();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Compose engine double recording each batch it receives
pub struct RecordingComposeEngine {
    pub report: EngineReport,
    batches: Mutex<Vec<(&'static str, Vec<String>)>>,
}

impl RecordingComposeEngine {
    pub fn reporting(succeeded: bool, output: &str) -> Self {
        Self {
            report: EngineReport {
                succeeded,
                output: output.to_string(),
            },
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn batches(&self) -> Vec<(&'static str, Vec<String>)> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ComposeEngine for RecordingComposeEngine {
    async fn start(
        &self,
        _descriptor: &ComposeDescriptor,
        services: &[String],
    ) -> InferletResult<EngineReport> {
        self.batches
            .lock()
            .unwrap()
            .push(("start", services.to_vec()));
        Ok(self.report.clone())
    }

    async fn stop(
        &self,
        _descriptor: &ComposeDescriptor,
        services: &[String],
    ) -> InferletResult<EngineReport> {
        self.batches
            .lock()
            .unwrap()
            .push(("stop", services.to_vec()));
        Ok(self.report.clone())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
