//! Persisted model registry: one grouping model plus one classifier per
//! group, keyed by `(run_id, name)`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::registry::{ARTIFACT_EXTENSION, ARTIFACT_VERSION, CLASSIFIER_NAME_PREFIX};
use crate::errors::PipelineError;
use crate::types::{GroupId, ModelName};

/// Key-value persistence backend for model artifacts.
///
/// Implementations map `(run_id, name)` keys to opaque payload bytes.
/// The registry layers typed, versioned envelopes on top, so backends can
/// be swapped (local disk today, object storage later) without touching
/// dispatch logic.
pub trait ArtifactStore: Send + Sync {
    /// Persist `payload` under the key, overwriting any prior artifact.
    fn save(&self, run_id: &str, name: &str, payload: &[u8]) -> Result<(), PipelineError>;
    /// Load the payload under the key, `None` when absent.
    fn load(&self, run_id: &str, name: &str) -> Result<Option<Vec<u8>>, PipelineError>;
    /// True when an artifact exists under the key.
    fn exists(&self, run_id: &str, name: &str) -> Result<bool, PipelineError>;
}

/// Local-disk artifact store: one directory per run, one file per artifact.
#[derive(Clone, Debug)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Create a store rooted at `root` (created lazily on first save).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn artifact_path(&self, run_id: &str, name: &str) -> PathBuf {
        self.root
            .join(run_id)
            .join(format!("{name}.{ARTIFACT_EXTENSION}"))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn save(&self, run_id: &str, name: &str, payload: &[u8]) -> Result<(), PipelineError> {
        let path = self.artifact_path(run_id, name);
        ensure_parent_dir(&path)?;
        fs::write(&path, payload).map_err(|err| PipelineError::storage(&path, err))?;
        debug!(artifact = %path.display(), "saved model artifact");
        Ok(())
    }

    fn load(&self, run_id: &str, name: &str) -> Result<Option<Vec<u8>>, PipelineError> {
        let path = self.artifact_path(run_id, name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(PipelineError::storage(&path, err)),
        }
    }

    fn exists(&self, run_id: &str, name: &str) -> Result<bool, PipelineError> {
        Ok(self.artifact_path(run_id, name).is_file())
    }
}

/// Versioned wrapper around every persisted artifact payload.
#[derive(Serialize, Deserialize)]
struct ArtifactEnvelope {
    version: u32,
    payload: serde_json::Value,
}

/// Typed registry over an [`ArtifactStore`].
///
/// Exclusively owns the persisted representation of the grouping model and
/// the per-group classifiers; at most one active artifact exists per
/// `(run_id, name)` key because saves overwrite.
pub struct ModelRegistry {
    store: Box<dyn ArtifactStore>,
}

impl ModelRegistry {
    /// Wrap an artifact store backend.
    pub fn new(store: Box<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Registry over a local-disk store rooted at `root`.
    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(FsArtifactStore::new(root)))
    }

    /// Persist `model` under `(run_id, name)`, overwriting any prior artifact.
    pub fn save<T: Serialize>(
        &self,
        run_id: &str,
        name: &str,
        model: &T,
    ) -> Result<(), PipelineError> {
        let envelope = ArtifactEnvelope {
            version: ARTIFACT_VERSION,
            payload: serde_json::to_value(model).map_err(|err| {
                PipelineError::Configuration(format!(
                    "artifact '{name}' for run '{run_id}' failed to serialize: {err}"
                ))
            })?,
        };
        let bytes = serde_json::to_vec(&envelope).map_err(|err| {
            PipelineError::Configuration(format!(
                "artifact envelope for '{name}' failed to serialize: {err}"
            ))
        })?;
        self.store.save(run_id, name, &bytes)
    }

    /// Load the artifact under `(run_id, name)`.
    ///
    /// A registry miss is [`PipelineError::ModelNotFound`]; a corrupt or
    /// version-mismatched payload is a configuration error.
    pub fn load<T: DeserializeOwned>(&self, run_id: &str, name: &str) -> Result<T, PipelineError> {
        let bytes = self
            .store
            .load(run_id, name)?
            .ok_or_else(|| PipelineError::ModelNotFound {
                run_id: run_id.to_string(),
                name: name.to_string(),
            })?;
        let envelope: ArtifactEnvelope = serde_json::from_slice(&bytes).map_err(|err| {
            PipelineError::Configuration(format!(
                "artifact '{name}' for run '{run_id}' is corrupt: {err}"
            ))
        })?;
        if envelope.version != ARTIFACT_VERSION {
            return Err(PipelineError::Configuration(format!(
                "artifact '{name}' for run '{run_id}' has version {} (expected {})",
                envelope.version, ARTIFACT_VERSION
            )));
        }
        serde_json::from_value(envelope.payload).map_err(|err| {
            PipelineError::Configuration(format!(
                "artifact '{name}' for run '{run_id}' failed to decode: {err}"
            ))
        })
    }

    /// True when an artifact exists under `(run_id, name)`.
    pub fn exists(&self, run_id: &str, name: &str) -> Result<bool, PipelineError> {
        self.store.exists(run_id, name)
    }

    /// Canonical classifier artifact name for a group. Pure, no I/O.
    pub fn resolve_classifier_name(group_id: GroupId) -> ModelName {
        format!("{CLASSIFIER_NAME_PREFIX}{group_id}")
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| PipelineError::storage(parent, err))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stub {
        weights: Vec<f64>,
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let registry = ModelRegistry::on_disk(dir.path());
        let model = Stub {
            weights: vec![1.0, 2.5],
        };
        registry.save("run_1", "grouping", &model).unwrap();
        assert!(registry.exists("run_1", "grouping").unwrap());
        let loaded: Stub = registry.load("run_1", "grouping").unwrap();
        assert_eq!(loaded, model);
    }

    #[test]
    fn save_overwrites_prior_artifact_under_same_key() {
        let dir = tempdir().unwrap();
        let registry = ModelRegistry::on_disk(dir.path());
        registry
            .save("run_1", "classifier-0", &Stub { weights: vec![1.0] })
            .unwrap();
        registry
            .save("run_1", "classifier-0", &Stub { weights: vec![2.0] })
            .unwrap();
        let loaded: Stub = registry.load("run_1", "classifier-0").unwrap();
        assert_eq!(loaded.weights, vec![2.0]);
    }

    #[test]
    fn registry_miss_is_model_not_found() {
        let dir = tempdir().unwrap();
        let registry = ModelRegistry::on_disk(dir.path());
        let err = registry.load::<Stub>("run_1", "classifier-9").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ModelNotFound { run_id, name }
                if run_id == "run_1" && name == "classifier-9"
        ));
    }

    #[test]
    fn corrupt_payload_is_a_configuration_error() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.save("run_1", "grouping", b"not json").unwrap();
        let registry = ModelRegistry::new(Box::new(store));
        let err = registry.load::<Stub>("run_1", "grouping").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Configuration(msg) if msg.contains("corrupt")
        ));
    }

    #[test]
    fn version_mismatch_is_a_configuration_error() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let envelope = serde_json::json!({ "version": 99, "payload": { "weights": [] } });
        store
            .save("run_1", "grouping", envelope.to_string().as_bytes())
            .unwrap();
        let registry = ModelRegistry::new(Box::new(store));
        let err = registry.load::<Stub>("run_1", "grouping").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Configuration(msg) if msg.contains("version 99")
        ));
    }

    #[test]
    fn classifier_names_follow_the_group_convention() {
        assert_eq!(ModelRegistry::resolve_classifier_name(0), "classifier-0");
        assert_eq!(ModelRegistry::resolve_classifier_name(7), "classifier-7");
    }
}
