//! Regression model abstraction and the linear model artifact

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A fitted regression function over a preprocessed feature vector.
///
/// Implementations are shared read-only across requests.
pub trait Regressor: Send + Sync {
    /// Model name used in logs
    fn name(&self) -> &str;

    /// Feature vector width the model was trained on, if it declares one
    fn input_width(&self) -> Option<usize>;

    /// Predict the raw target for one feature vector
    fn predict(&self, features: &[f32]) -> Result<f64>;
}

/// Linear model, `intercept + coefficients · x`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegressor {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegressor {
    /// Create a linear model from fitted coefficients
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Result<Self> {
        let model = Self {
            coefficients,
            intercept,
        };
        model.validate()?;
        Ok(model)
    }

    /// Load a linear model from its JSON artifact
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read linear model from {}", path.display()))?;
        let model: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse linear model {}", path.display()))?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.coefficients.is_empty() {
            anyhow::bail!("Linear model has no coefficients");
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            anyhow::bail!("Linear model contains non-finite parameters");
        }
        Ok(())
    }
}

impl Regressor for LinearRegressor {
    fn name(&self) -> &str {
        "linear"
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }

    fn predict(&self, features: &[f32]) -> Result<f64> {
        if features.len() != self.coefficients.len() {
            anyhow::bail!(
                "Linear model expects {} features, got {}",
                self.coefficients.len(),
                features.len()
            );
        }

        let dot: f64 = self
            .coefficients
            .iter()
            .zip(features)
            .map(|(&w, &x)| w * x as f64)
            .sum();

        Ok(self.intercept + dot)
    }
}
