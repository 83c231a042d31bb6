//! Prediction artifact loader

use super::encoder::OneHotEncoder;
use super::onnx::OnnxRegressor;
use super::regressor::{LinearRegressor, Regressor};
use super::scaler::StandardScaler;
use super::xgboost::XgboostRegressor;
use crate::config::{ArtifactsConfig, ModelFormat};
use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Which artifacts made it into memory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactStatus {
    pub model_loaded: bool,
    pub encoder_loaded: bool,
    pub scaler_loaded: bool,
}

impl ArtifactStatus {
    /// Whether every artifact loaded
    pub fn all_loaded(&self) -> bool {
        self.model_loaded && self.encoder_loaded && self.scaler_loaded
    }

    /// Names of the artifacts that failed to load
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.model_loaded {
            missing.push("model");
        }
        if !self.encoder_loaded {
            missing.push("encoder");
        }
        if !self.scaler_loaded {
            missing.push("scaler");
        }
        missing
    }
}

/// Artifacts read at startup; any of them may be absent
#[derive(Clone, Default)]
pub struct LoadedArtifacts {
    pub model: Option<Arc<dyn Regressor>>,
    pub encoder: Option<OneHotEncoder>,
    pub scaler: Option<StandardScaler>,
}

impl LoadedArtifacts {
    /// Load state of each artifact
    pub fn status(&self) -> ArtifactStatus {
        ArtifactStatus {
            model_loaded: self.model.is_some(),
            encoder_loaded: self.encoder.is_some(),
            scaler_loaded: self.scaler.is_some(),
        }
    }
}

/// Loader for the model, encoder and scaler artifacts
pub struct ArtifactLoader {
    dir: PathBuf,
    config: ArtifactsConfig,
}

impl ArtifactLoader {
    /// Create a loader for the configured artifact directory
    pub fn new(config: &ArtifactsConfig) -> Self {
        Self {
            dir: PathBuf::from(&config.dir),
            config: config.clone(),
        }
    }

    /// Load a model file in the given format
    pub fn load_model<P: AsRef<Path>>(
        &self,
        path: P,
        format: ModelFormat,
    ) -> Result<Arc<dyn Regressor>> {
        let path = path.as_ref();
        let model: Arc<dyn Regressor> = match format {
            ModelFormat::Onnx => Arc::new(OnnxRegressor::load(
                path,
                "xgboost",
                self.config.onnx_threads,
            )?),
            ModelFormat::XgboostJson => Arc::new(XgboostRegressor::from_file(path)?),
            ModelFormat::LinearJson => Arc::new(LinearRegressor::from_file(path)?),
        };
        Ok(model)
    }

    /// Load all artifacts from the directory.
    ///
    /// Missing or unreadable files are logged and left empty, unless
    /// `require_all` is set, in which case loading fails.
    pub fn load_all(&self) -> Result<LoadedArtifacts> {
        let model_path = self.dir.join(&self.config.model_file);
        let encoder_path = self.dir.join(&self.config.encoder_file);
        let scaler_path = self.dir.join(&self.config.scaler_file);

        let artifacts = LoadedArtifacts {
            model: load_optional("model", &model_path, |p| {
                self.load_model(p, self.config.model_format)
            }),
            encoder: load_optional("encoder", &encoder_path, |p| OneHotEncoder::from_file(p)),
            scaler: load_optional("scaler", &scaler_path, |p| StandardScaler::from_file(p)),
        };

        let status = artifacts.status();
        if !status.all_loaded() && self.config.require_all {
            anyhow::bail!(
                "Missing artifacts in {}: {}",
                self.dir.display(),
                status.missing().join(", ")
            );
        }

        info!(
            dir = %self.dir.display(),
            model_loaded = status.model_loaded,
            encoder_loaded = status.encoder_loaded,
            scaler_loaded = status.scaler_loaded,
            "Artifact loading finished"
        );

        Ok(artifacts)
    }
}

fn load_optional<T, F>(kind: &str, path: &Path, load: F) -> Option<T>
where
    F: FnOnce(&Path) -> Result<T>,
{
    if !path.exists() {
        warn!(artifact = %kind, path = %path.display(), "Artifact file not found");
        return None;
    }

    match load(path) {
        Ok(value) => {
            info!(artifact = %kind, path = %path.display(), "Artifact loaded successfully");
            Some(value)
        }
        Err(e) => {
            let reason = format!("{e:#}");
            error!(artifact = %kind, path = %path.display(), error = %reason, "Could not load artifact");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_artifacts(dir: &Path) {
        std::fs::write(
            dir.join("encoder.json"),
            r#"{"feature": "fuel_type", "categories": ["D", "E", "N", "X", "Z"]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("scaler.json"),
            r#"{"mean": [3.0, 6.0, 0, 0, 0, 0, 0], "scale": [1.0, 2.0, 1, 1, 1, 1, 1]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("model.json"),
            r#"{"coefficients": [20.0, 10.0, 0, 0, 0, 5.0, 0], "intercept": 250.0}"#,
        )
        .unwrap();
    }

    fn config_for(dir: &Path) -> ArtifactsConfig {
        ArtifactsConfig {
            dir: dir.to_string_lossy().into_owned(),
            model_file: "model.json".to_string(),
            model_format: ModelFormat::LinearJson,
            ..ArtifactsConfig::default()
        }
    }

    #[test]
    fn test_load_all() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());

        let artifacts = ArtifactLoader::new(&config_for(dir.path())).load_all().unwrap();
        let status = artifacts.status();

        assert!(status.all_loaded());
        assert!(status.missing().is_empty());
        assert_eq!(artifacts.model.unwrap().input_width(), Some(7));
    }

    #[test]
    fn test_missing_artifacts_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());
        std::fs::remove_file(dir.path().join("scaler.json")).unwrap();

        let artifacts = ArtifactLoader::new(&config_for(dir.path())).load_all().unwrap();
        let status = artifacts.status();

        assert!(status.model_loaded);
        assert!(status.encoder_loaded);
        assert!(!status.scaler_loaded);
        assert_eq!(status.missing(), vec!["scaler"]);
    }

    #[test]
    fn test_corrupt_artifact_is_unloaded() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());
        std::fs::write(dir.path().join("encoder.json"), "not json").unwrap();

        let status = ArtifactLoader::new(&config_for(dir.path()))
            .load_all()
            .unwrap()
            .status();

        assert!(!status.encoder_loaded);
    }

    #[test]
    fn test_require_all_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let config = ArtifactsConfig {
            require_all: true,
            ..config_for(dir.path())
        };

        let err = ArtifactLoader::new(&config).load_all().err().unwrap();
        assert!(err.to_string().contains("model, encoder, scaler"));
    }
}
