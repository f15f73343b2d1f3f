use std::path::{Path, PathBuf};

use crate::error::{Result, ScoringError};
use crate::predictor::{ModelArtifact, Predictor};

/// File name of the serialized model inside a version directory.
pub const ARTIFACT_FILE: &str = "model.json";

/// Resolves and loads models by `(name, environment, version)`.
pub trait ModelRegistry {
    fn load(&self, name: &str, environment: &str, version: &str) -> Result<Box<dyn Predictor>>;
}

/// Registry laid out on a filesystem:
/// `{root}/{environment}/{name}/{version}/model.json`.
///
/// Nothing is cached; every `load` re-reads the artifact.
#[derive(Debug, Clone)]
pub struct FsModelRegistry {
    root: PathBuf,
}

impl FsModelRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn artifact_path(&self, name: &str, environment: &str, version: &str) -> PathBuf {
        self.root
            .join(environment)
            .join(name)
            .join(version)
            .join(ARTIFACT_FILE)
    }
}

impl ModelRegistry for FsModelRegistry {
    fn load(&self, name: &str, environment: &str, version: &str) -> Result<Box<dyn Predictor>> {
        let path = self.artifact_path(name, environment, version);
        log::info!("loading model {name}/{environment}/{version} from {}", path.display());

        let bytes = read_artifact(&path)?;
        let artifact: ModelArtifact =
            serde_json::from_slice(&bytes).map_err(|e| ScoringError::Deserialization {
                what: path.display().to_string(),
                message: e.to_string(),
            })?;

        artifact
            .into_predictor()
            .map_err(|message| ScoringError::Deserialization {
                what: path.display().to_string(),
                message,
            })
    }
}

fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ScoringError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ScoringError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Table, Value};
    use pretty_assertions::assert_eq;

    const MODEL: &str = r#"{"kind": "logistic_regression", "features": ["x"], "coefficients": [1.0]}"#;

    fn write_model(root: &Path, body: &str) {
        let dir = root.join("test_env").join("test_model").join("1.0");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(ARTIFACT_FILE), body).unwrap();
    }

    #[test]
    fn path_follows_registry_layout() {
        let registry = FsModelRegistry::new("/models");
        assert_eq!(
            registry.artifact_path("test_model", "test_env", "1.0"),
            PathBuf::from("/models/test_env/test_model/1.0/model.json")
        );
    }

    #[test]
    fn loads_a_usable_predictor() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), MODEL);

        let model = FsModelRegistry::new(dir.path())
            .load("test_model", "test_env", "1.0")
            .unwrap();
        let table = Table::from_columns(vec![("x", vec![Value::Float(-3.0), Value::Float(3.0)])]).unwrap();
        assert_eq!(model.infer(&table).unwrap(), vec![Value::Integer(0), Value::Integer(1)]);
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsModelRegistry::new(dir.path())
            .load("test_model", "test_env", "2.0")
            .err()
            .unwrap();
        assert!(matches!(err, ScoringError::NotFound { .. }));
    }

    #[test]
    fn corrupt_artifact_is_a_deserialization_error() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "\u{80}not json");
        let err = FsModelRegistry::new(dir.path())
            .load("test_model", "test_env", "1.0")
            .err()
            .unwrap();
        assert!(matches!(err, ScoringError::Deserialization { .. }));
    }

    #[test]
    fn every_load_rereads_storage() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), MODEL);
        let registry = FsModelRegistry::new(dir.path());
        registry.load("test_model", "test_env", "1.0").unwrap();

        write_model(dir.path(), "{}");
        assert!(registry.load("test_model", "test_env", "1.0").is_err());
    }
}
