//! Container environment and resource bindings

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::capability::CapabilityFlag;

/// Inference server ports: HTTP, gRPC and metrics
pub const DEFAULT_SERVER_PORTS: [u16; 3] = [8000, 8001, 8002];

/// Environment variable the NVIDIA container runtime reads to expose devices
pub const VISIBLE_DEVICES_VAR: &str = "NVIDIA_VISIBLE_DEVICES";

/// Ordered key/value environment for the container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentMapping(BTreeMap<String, String>);

impl EnvironmentMapping {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render as `KEY=VALUE` entries, the form container engines accept
    pub fn to_env_list(&self) -> Vec<String> {
        self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
    }
}

/// Compose the container environment for a host capability.
///
/// Accelerated hosts expose every GPU to the container; CPU-only hosts get an
/// empty environment.
pub fn compose(capability: CapabilityFlag) -> EnvironmentMapping {
    let mut env = EnvironmentMapping::new();
    if capability.accelerator {
        env.insert(VISIBLE_DEVICES_VAR, "all");
    }
    env
}

/// A published container port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortBinding {
    /// Port inside the container
    pub container: u16,
    /// Port on the host
    pub host: u16,
}

impl PortBinding {
    /// Bind a container port to the same port on the host
    pub fn same(port: u16) -> Self {
        Self {
            container: port,
            host: port,
        }
    }

    /// Engine-style key for the container side, e.g. `8000/tcp`
    pub fn container_key(&self) -> String {
        format!("{}/tcp", self.container)
    }
}

impl std::fmt::Display for PortBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.host, self.container)
    }
}

/// Read-write bind of a host directory into the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

impl Mount {
    pub fn read_write(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only: false,
        }
    }

    /// Bind specification in `source:target:mode` form
    pub fn bind_spec(&self) -> String {
        let mode = if self.read_only { "ro" } else { "rw" };
        format!("{}:{}:{}", self.source, self.target, mode)
    }
}
