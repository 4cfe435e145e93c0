//! Compose controller
//!
//! Starts or stops the services declared in a compose file as a single batch.
//! Whether a batch was a no-op (already running, already stopped) is the
//! engine's call; its report is passed through as an informational outcome.

use inferlet_core::{ComposeDescriptor, InferletResult};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::traits::ComposeEngine;

/// Compose batch operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeAction {
    Start,
    Stop,
}

impl std::fmt::Display for ComposeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComposeAction::Start => write!(f, "start"),
            ComposeAction::Stop => write!(f, "stop"),
        }
    }
}

/// Result of a compose batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeOutcome {
    pub action: ComposeAction,
    /// Services the batch targeted
    pub services: Vec<String>,
    /// Whether the engine accepted the batch
    pub succeeded: bool,
    /// Engine output, verbatim
    pub report: String,
}

/// Starts and stops compose service sets
pub struct ComposeController {
    engine: Arc<dyn ComposeEngine>,
}

impl ComposeController {
    pub fn new(engine: Arc<dyn ComposeEngine>) -> Self {
        Self { engine }
    }

    /// Start the selected services (all when `selected` is empty)
    pub async fn start(
        &self,
        descriptor_path: &Path,
        selected: &[String],
    ) -> InferletResult<ComposeOutcome> {
        self.apply(ComposeAction::Start, descriptor_path, selected)
            .await
    }

    /// Stop the selected services (all when `selected` is empty)
    pub async fn stop(
        &self,
        descriptor_path: &Path,
        selected: &[String],
    ) -> InferletResult<ComposeOutcome> {
        self.apply(ComposeAction::Stop, descriptor_path, selected)
            .await
    }

    async fn apply(
        &self,
        action: ComposeAction,
        descriptor_path: &Path,
        selected: &[String],
    ) -> InferletResult<ComposeOutcome> {
        let descriptor = ComposeDescriptor::load(descriptor_path)?;
        let services = descriptor.resolve(selected)?;

        info!(
            action = %action,
            descriptor = %descriptor.path().display(),
            project = descriptor.project().unwrap_or("-"),
            services = ?services,
            engine = self.engine.name(),
            "Applying compose batch"
        );

        let report = match action {
            ComposeAction::Start => self.engine.start(&descriptor, &services).await?,
            ComposeAction::Stop => self.engine.stop(&descriptor, &services).await?,
        };

        if report.succeeded {
            info!(action = %action, "Compose batch accepted");
        } else {
            warn!(
                action = %action,
                report = %report.output,
                "Compose engine reported a problem"
            );
        }

        Ok(ComposeOutcome {
            action,
            services,
            succeeded: report.succeeded,
            report: report.output,
        })
    }
}
