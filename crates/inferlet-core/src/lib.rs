//! inferlet-core: Core types for the inferlet deployment orchestrator
//!
//! This crate provides the fundamental types used throughout inferlet:
//! - Accelerator capability detection
//! - Container environment and resource bindings
//! - Deployment requests, container handles and exit status
//! - Compose descriptors
//! - Configuration types
//! - Error handling

pub mod capability;
pub mod compose;
pub mod config;
pub mod environment;
pub mod error;
pub mod model;

pub use capability::*;
pub use compose::*;
pub use config::*;
pub use environment::*;
pub use error::*;
pub use model::*;
