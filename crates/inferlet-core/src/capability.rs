//! Accelerator capability detection
//!
//! The host is considered accelerator-capable when the GPU driver exposes its
//! marker path. Absence of the marker is a normal CPU-only result.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Marker exposed by the NVIDIA kernel driver when at least one GPU is present
pub const DEFAULT_ACCELERATOR_MARKER: &str = "/proc/driver/nvidia/gpus";

/// Whether the host can run accelerated inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFlag {
    pub accelerator: bool,
}

impl CapabilityFlag {
    pub fn accelerated() -> Self {
        Self { accelerator: true }
    }

    pub fn cpu_only() -> Self {
        Self { accelerator: false }
    }
}

impl From<bool> for CapabilityFlag {
    fn from(accelerator: bool) -> Self {
        Self { accelerator }
    }
}

impl std::fmt::Display for CapabilityFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.accelerator {
            write!(f, "GPU")
        } else {
            write!(f, "CPU")
        }
    }
}

/// Probes the host filesystem for the accelerator marker
#[derive(Debug, Clone)]
pub struct CapabilityProber {
    marker: PathBuf,
}

impl CapabilityProber {
    /// Create a prober checking the given marker path
    pub fn new(marker: impl Into<PathBuf>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Probe the host. Never fails.
    pub fn probe(&self) -> CapabilityFlag {
        let present = self.marker.exists();

        if present {
            info!(marker = %self.marker.display(), "NVIDIA GPU detected");
        } else {
            info!(
                marker = %self.marker.display(),
                "No NVIDIA GPU detected, falling back to CPU inference"
            );
        }

        CapabilityFlag::from(present)
    }
}

impl Default for CapabilityProber {
    fn default() -> Self {
        Self::new(DEFAULT_ACCELERATOR_MARKER)
    }
}
