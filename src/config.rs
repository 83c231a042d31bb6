//! Configuration management for the emission prediction service

use crate::types::emission::EmissionThresholds;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "CO2_CONFIG";

/// Serialized format of the model artifact
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelFormat {
    /// ONNX graph executed by ONNX Runtime
    #[default]
    Onnx,
    /// XGBoost native JSON model
    XgboostJson,
    /// Linear model coefficients as JSON
    LinearJson,
}

/// Transform applied to the target during training
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetTransform {
    /// Model predicts the target directly
    #[default]
    None,
    /// Model was trained on ln(target); predictions are exponentiated
    Log,
}

impl TargetTransform {
    /// Map a raw model output back to the target scale
    pub fn invert(&self, raw: f64) -> f64 {
        match self {
            TargetTransform::None => raw,
            TargetTransform::Log => raw.exp(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub pipeline: PipelineConfig,
    pub response: ResponseConfig,
    pub interpretation: EmissionThresholds,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Value for Access-Control-Allow-Origin; CORS headers are off when unset
    pub cors_allow_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_allow_origin: None,
        }
    }
}

/// Prediction artifact locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Directory containing the artifact files
    pub dir: String,
    /// Model file name, relative to `dir`
    pub model_file: String,
    /// Encoder file name, relative to `dir`
    pub encoder_file: String,
    /// Scaler file name, relative to `dir`
    pub scaler_file: String,
    /// Format of the model file
    pub model_format: ModelFormat,
    /// Refuse to start unless every artifact loads
    pub require_all: bool,
    /// Number of threads for ONNX inference (default: 1)
    pub onnx_threads: usize,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: "models".to_string(),
            model_file: "xgboost_model.onnx".to_string(),
            encoder_file: "encoder.json".to_string(),
            scaler_file: "scaler.json".to_string(),
            model_format: ModelFormat::Onnx,
            require_all: false,
            onnx_threads: 1,
        }
    }
}

/// Preprocessing and postprocessing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Transform the training target went through
    pub target_transform: TargetTransform,
    /// Decimal places predictions are rounded to
    pub round_decimals: u32,
    /// Training column name for engine size
    pub engine_size_column: String,
    /// Training column name for cylinder count
    pub cylinders_column: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_transform: TargetTransform::None,
            round_decimals: 2,
            engine_size_column: "engine_size".to_string(),
            cylinders_column: "cylinders".to_string(),
        }
    }
}

/// Response body shape
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Key carrying the predicted value
    pub field_name: String,
    /// Include unit, interpretation and category
    pub detailed: bool,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            field_name: "predicted_co2_emissions".to_string(),
            detailed: true,
        }
    }
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Seconds between logged summaries; 0 disables the reporter
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `CO2_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path, layered under `CO2__*` environment variables.
    ///
    /// A missing file is not an error; every section has defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("CO2")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
