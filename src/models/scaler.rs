//! Fitted standard scaler

use crate::error::{PredictionError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Standardizes features with `(x - mean) / scale` using training statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Per-column mean
    pub mean: Vec<f64>,
    /// Per-column scale (standard deviation)
    pub scale: Vec<f64>,
    /// Column names in training order, when recorded
    #[serde(default)]
    pub feature_names_in: Option<Vec<String>>,
}

impl StandardScaler {
    /// Create a scaler from fitted statistics
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> anyhow::Result<Self> {
        let scaler = Self {
            mean,
            scale,
            feature_names_in: None,
        };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Load a fitted scaler from its JSON artifact
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scaler from {}", path.display()))?;
        let scaler: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse scaler {}", path.display()))?;
        scaler.validate()?;
        Ok(scaler)
    }

    /// Check the fitted state is usable
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mean.is_empty() {
            anyhow::bail!("Scaler has no columns");
        }
        if self.mean.len() != self.scale.len() {
            anyhow::bail!(
                "Scaler mean has {} columns but scale has {}",
                self.mean.len(),
                self.scale.len()
            );
        }
        if let Some(names) = &self.feature_names_in {
            if names.len() != self.mean.len() {
                anyhow::bail!(
                    "Scaler records {} feature names for {} columns",
                    names.len(),
                    self.mean.len()
                );
            }
        }
        if self
            .mean
            .iter()
            .chain(self.scale.iter())
            .any(|v| !v.is_finite())
        {
            anyhow::bail!("Scaler statistics contain non-finite values");
        }
        Ok(())
    }

    /// Number of columns the scaler was fitted on
    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// Training column names, if the artifact recorded them
    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names_in.as_deref()
    }

    /// Standardize one row
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.width() {
            return Err(PredictionError::Prediction(format!(
                "scaler expects {} features, got {}",
                self.width(),
                row.len()
            )));
        }

        Ok(row
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(&x, (&mean, &scale))| {
                // Constant training columns have zero variance
                let scale = if scale == 0.0 { 1.0 } else { scale };
                (x - mean) / scale
            })
            .collect())
    }
}
