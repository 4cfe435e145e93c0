//! Multi-service compose descriptors

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{InferletError, InferletResult};

/// A single service entry of a compose file.
///
/// Only the fields inferlet reports on are typed; everything else is kept
/// verbatim so the engine sees the file as written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub image: Option<String>,
    pub container_name: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ServiceDefinition {
    /// Services named by `depends_on` and `links`, in list or map form.
    ///
    /// A link may carry an alias (`db:database`); only the service part counts.
    pub fn references(&self) -> Vec<String> {
        let mut names = Vec::new();
        for key in ["depends_on", "links"] {
            match self.extra.get(key) {
                Some(serde_yaml::Value::Sequence(entries)) => names.extend(
                    entries
                        .iter()
                        .filter_map(serde_yaml::Value::as_str)
                        .map(|entry| entry.split(':').next().unwrap_or(entry).to_string()),
                ),
                Some(serde_yaml::Value::Mapping(entries)) => names.extend(
                    entries
                        .keys()
                        .filter_map(serde_yaml::Value::as_str)
                        .map(str::to_string),
                ),
                _ => {}
            }
        }
        names
    }
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    name: Option<String>,
    #[serde(default)]
    services: BTreeMap<String, ServiceDefinition>,
}

/// A named set of services loaded from a compose file
#[derive(Debug, Clone)]
pub struct ComposeDescriptor {
    path: PathBuf,
    project: Option<String>,
    services: BTreeMap<String, ServiceDefinition>,
}

impl ComposeDescriptor {
    /// Load and validate a compose file
    pub fn load(path: &Path) -> InferletResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            InferletError::Descriptor(format!(
                "Failed to read compose file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(path, &content)
    }

    /// Parse compose YAML that was read from `path`
    pub fn parse(path: &Path, content: &str) -> InferletResult<Self> {
        let raw: RawDescriptor = serde_yaml::from_str(content).map_err(|e| {
            InferletError::Descriptor(format!(
                "Failed to parse compose file {}: {}",
                path.display(),
                e
            ))
        })?;

        if raw.services.is_empty() {
            return Err(InferletError::Descriptor(format!(
                "Compose file {} declares no services",
                path.display()
            )));
        }

        for (name, service) in &raw.services {
            for dependency in service.references() {
                if !raw.services.contains_key(&dependency) {
                    return Err(InferletError::Descriptor(format!(
                        "Service '{}' in {} references unknown service '{}'",
                        name,
                        path.display(),
                        dependency
                    )));
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            project: raw.name,
            services: raw.services,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Project name declared by the file, if any
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// All declared service names
    pub fn service_names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    pub fn service(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.get(name)
    }

    /// Resolve the services an operation targets.
    ///
    /// An empty selection means every declared service. A selection naming a
    /// service the file does not declare is rejected.
    pub fn resolve(&self, selected: &[String]) -> InferletResult<Vec<String>> {
        if selected.is_empty() {
            return Ok(self.service_names());
        }

        let mut resolved = Vec::with_capacity(selected.len());
        for name in selected {
            if !self.services.contains_key(name) {
                return Err(InferletError::Descriptor(format!(
                    "Unknown service '{}' in {} (declared: {})",
                    name,
                    self.path.display(),
                    self.service_names().join(", ")
                )));
            }
            if !resolved.contains(name) {
                resolved.push(name.clone());
            }
        }
        Ok(resolved)
    }
}
