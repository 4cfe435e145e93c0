//! Container engine trait definitions

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use inferlet_core::{ComposeDescriptor, ContainerHandle, DeploymentRequest, InferletResult};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Lazy sequence of output lines from a container, ending when the stream closes
pub type LogStream = BoxStream<'static, InferletResult<String>>;

/// Resolves to the container's exit code once it exits
pub type ExitWait = BoxFuture<'static, InferletResult<i64>>;

/// A started container and the wait for its exit
pub struct Launched {
    pub handle: ContainerHandle,
    /// Registered with the engine before the container was started, so it
    /// observes the exit even when the engine removes the container at once
    pub exit: ExitWait,
}

/// Container engine used to run a single inference server container
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Check that the engine endpoint answers
    async fn ping(&self) -> InferletResult<()>;

    /// Create and start a container for the request, configured to be
    /// removed by the engine once it exits.
    ///
    /// The exit-wait is registered before the start request is sent. If
    /// `cancel` fires before the container is started (an image pull in
    /// progress, say), nothing is left running and the call fails with
    /// `InferletError::Cancelled`.
    async fn create_and_start(
        &self,
        request: &DeploymentRequest,
        cancel: &CancellationToken,
    ) -> InferletResult<Launched>;

    /// Attach to the combined stdout/stderr of a running container
    async fn attach_output(&self, handle: &ContainerHandle) -> InferletResult<LogStream>;

    /// Ask the container to stop, killing it after `grace`
    async fn stop(&self, handle: &ContainerHandle, grace: Duration) -> InferletResult<()>;

    /// Get the engine name
    fn name(&self) -> &'static str;
}

/// What the engine said about a compose batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReport {
    /// Whether the engine accepted the batch
    pub succeeded: bool,
    /// Engine output, verbatim
    pub output: String,
}

/// Engine API for starting and stopping a group of compose services
#[async_trait]
pub trait ComposeEngine: Send + Sync {
    /// Start the given services as one batch
    async fn start(
        &self,
        descriptor: &ComposeDescriptor,
        services: &[String],
    ) -> InferletResult<EngineReport>;

    /// Stop the given services as one batch
    async fn stop(
        &self,
        descriptor: &ComposeDescriptor,
        services: &[String],
    ) -> InferletResult<EngineReport>;

    /// Get the engine name
    fn name(&self) -> &'static str;
}
