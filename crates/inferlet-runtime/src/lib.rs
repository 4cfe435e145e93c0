//! inferlet-runtime: Container engine, supervision and log relay
//!
//! This crate provides everything that talks to the container engine:
//! - Engine traits and the Docker implementation
//! - The container supervisor and its log relay
//! - The compose controller and its `docker compose` engine

pub mod compose;
pub mod compose_cli;
pub mod docker;
pub mod relay;
pub mod supervisor;
pub mod traits;

#[cfg(test)]
mod testing;

pub use compose::{ComposeAction, ComposeController, ComposeOutcome};
pub use compose_cli::DockerComposeCli;
pub use docker::DockerEngine;
pub use relay::{relay, spawn_relay, LogSink, RelaySummary, TracingSink};
pub use supervisor::ContainerSupervisor;
pub use traits::{ComposeEngine, ContainerEngine, EngineReport, ExitWait, Launched, LogStream};
