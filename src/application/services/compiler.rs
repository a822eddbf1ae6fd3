//! Compiled container artifacts: a resolved plan persisted per environment.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{Argument, DependencyTree, ManualOverrideMap};
use crate::infrastructure::traits::CacheStorage;

/// Bumped whenever the artifact layout changes.
pub const ARTIFACT_VERSION: u32 = 2;

/// Storage key for an environment's artifact (`container-<environment>`).
pub fn artifact_key(environment: &str) -> String {
    let tag: String = environment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("container-{tag}")
}

/// Persisted, self-verifying dependency plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledContainerArtifact {
    pub version: u32,
    pub environment: String,
    pub built_at: DateTime<Utc>,
    /// Hex SHA-256 over `overrides`, `services` and `tree`
    pub digest: String,
    /// Hex SHA-256 of the manual overrides the plan was resolved with
    pub overrides: String,
    /// Services in discovery order
    pub services: Vec<String>,
    pub tree: DependencyTree,
}

impl CompiledContainerArtifact {
    pub fn new(
        environment: &str,
        services: Vec<String>,
        tree: DependencyTree,
        overrides: &ManualOverrideMap,
    ) -> Self {
        let overrides = overrides_digest(overrides);
        let digest = payload_digest(&overrides, &services, &tree);
        Self {
            version: ARTIFACT_VERSION,
            environment: environment.to_string(),
            built_at: Utc::now(),
            digest,
            overrides,
            services,
            tree,
        }
    }

    /// Check that the artifact is usable for `environment` with `overrides`.
    pub fn verify(&self, environment: &str, overrides: &ManualOverrideMap) -> Result<(), CacheMiss> {
        if self.version != ARTIFACT_VERSION {
            return Err(CacheMiss::VersionMismatch {
                found: self.version,
            });
        }
        if self.environment != environment {
            return Err(CacheMiss::EnvironmentMismatch {
                found: self.environment.clone(),
            });
        }
        if payload_digest(&self.overrides, &self.services, &self.tree) != self.digest {
            return Err(CacheMiss::DigestMismatch);
        }
        if !self.tree.is_closed() {
            return Err(CacheMiss::Corrupt("plan is not closed".to_string()));
        }
        if overrides_digest(overrides) != self.overrides {
            return Err(CacheMiss::OverridesChanged);
        }
        Ok(())
    }

    /// Serialize; fails on values that would not survive a JSON round trip.
    pub fn to_json(&self) -> ApplicationResult<String> {
        let lossy = self.tree.iter().find(|(_, entry)| {
            entry
                .arguments
                .iter()
                .any(|a| matches!(a, Argument::Value(v) if !v.is_finite()))
        });
        if let Some((class, _)) = lossy {
            return Err(ApplicationError::OperationFailed {
                context: format!("serialize container artifact for '{}'", self.environment),
                source: format!("non-finite float argument for {class}").into(),
            });
        }
        serde_json::to_string_pretty(self).map_err(|e| ApplicationError::OperationFailed {
            context: format!("serialize container artifact for '{}'", self.environment),
            source: Box::new(e),
        })
    }

    pub fn from_json(blob: &str) -> Result<Self, CacheMiss> {
        serde_json::from_str(blob).map_err(|e| CacheMiss::Corrupt(e.to_string()))
    }
}

fn payload_digest(overrides: &str, services: &[String], tree: &DependencyTree) -> String {
    // serialization of a Vec and a BTreeMap-backed tree is deterministic
    let payload = serde_json::to_vec(&(overrides, services, tree)).unwrap_or_default();
    sha256_hex(&payload)
}

fn overrides_digest(overrides: &ManualOverrideMap) -> String {
    let payload = serde_json::to_vec(overrides).unwrap_or_default();
    sha256_hex(&payload)
}

fn sha256_hex(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hex::encode(hasher.finalize())
}

/// Why a stored artifact was not used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMiss {
    Missing,
    Unreadable(String),
    Corrupt(String),
    VersionMismatch { found: u32 },
    EnvironmentMismatch { found: String },
    DigestMismatch,
    /// Manual overrides differ from the ones the plan was built with
    OverridesChanged,
}

impl fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMiss::Missing => f.write_str("no compiled container"),
            CacheMiss::Unreadable(e) => write!(f, "cache unreadable: {e}"),
            CacheMiss::Corrupt(e) => write!(f, "artifact corrupt: {e}"),
            CacheMiss::VersionMismatch { found } => write!(
                f,
                "artifact version {found}, expected {ARTIFACT_VERSION}"
            ),
            CacheMiss::EnvironmentMismatch { found } => {
                write!(f, "artifact built for environment '{found}'")
            }
            CacheMiss::DigestMismatch => f.write_str("artifact digest mismatch"),
            CacheMiss::OverridesChanged => f.write_str("manual overrides changed"),
        }
    }
}

/// Reads and writes artifacts through a [`CacheStorage`].
pub struct ContainerCompiler {
    storage: Arc<dyn CacheStorage>,
}

impl ContainerCompiler {
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self { storage }
    }

    /// Persist an artifact under its environment's key.
    pub fn compile(&self, artifact: &CompiledContainerArtifact) -> ApplicationResult<()> {
        let key = artifact_key(&artifact.environment);
        debug!("compile: key={}, {} classes", key, artifact.tree.len());
        let blob = artifact.to_json()?;
        self.storage
            .write(&key, &blob)
            .map_err(|e| ApplicationError::OperationFailed {
                context: format!("write compiled container '{key}'"),
                source: Box::new(e),
            })?;
        info!("compiled container for '{}' written", artifact.environment);
        Ok(())
    }

    /// Load and verify the artifact for `environment` built with `overrides`.
    pub fn try_load(
        &self,
        environment: &str,
        overrides: &ManualOverrideMap,
    ) -> Result<CompiledContainerArtifact, CacheMiss> {
        let key = artifact_key(environment);
        let blob = self
            .storage
            .read(&key)
            .map_err(|e| CacheMiss::Unreadable(e.to_string()))?
            .ok_or(CacheMiss::Missing)?;
        let artifact = CompiledContainerArtifact::from_json(&blob)?;
        artifact.verify(environment, overrides)?;
        Ok(artifact)
    }

    /// Like [`try_load`](Self::try_load), with misses logged and mapped to `None`.
    pub fn load_compiled(
        &self,
        environment: &str,
        overrides: &ManualOverrideMap,
    ) -> Option<CompiledContainerArtifact> {
        match self.try_load(environment, overrides) {
            Ok(artifact) => {
                debug!(
                    "load_compiled: hit for '{}' built at {}",
                    environment, artifact.built_at
                );
                Some(artifact)
            }
            Err(CacheMiss::Missing) => {
                debug!("load_compiled: no artifact for '{}'", environment);
                None
            }
            Err(miss) => {
                warn!("compiled container for '{}' ignored: {}", environment, miss);
                None
            }
        }
    }

    /// Remove the artifact for `environment`; returns whether one existed.
    pub fn invalidate(&self, environment: &str) -> ApplicationResult<bool> {
        let key = artifact_key(environment);
        debug!("invalidate: key={}", key);
        self.storage
            .remove(&key)
            .map_err(|e| ApplicationError::OperationFailed {
                context: format!("remove compiled container '{key}'"),
                source: Box::new(e),
            })
    }
}
