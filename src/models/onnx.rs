//! ONNX Runtime regressor

use super::regressor::Regressor;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{Tensor, ValueType};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Regression model exported to ONNX (e.g. XGBoost via onnxmltools)
pub struct OnnxRegressor {
    /// Model name
    name: String,
    /// ONNX Runtime session; `run` needs exclusive access
    session: Mutex<Session>,
    /// Input name for the model
    input_name: String,
    /// Output name carrying the prediction
    output_name: String,
    /// Feature count fixed by the graph's input shape
    input_width: Option<usize>,
}

impl OnnxRegressor {
    /// Load an ONNX model from file
    pub fn load<P: AsRef<Path>>(path: P, name: &str, threads: usize) -> Result<Self> {
        let path = path.as_ref();

        info!(model = %name, path = %path.display(), threads = threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads.max(1))?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let input_width = session
            .inputs
            .first()
            .and_then(|i| match &i.input_type {
                ValueType::Tensor { shape, .. } => declared_width(shape),
                _ => None,
            });

        // Regressors exported by onnxmltools name their output "variable"
        let output_name = session
            .outputs
            .iter()
            .find(|o| !o.name.contains("label"))
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "variable".to_string());

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            input_width = ?input_width,
            "Model loaded successfully"
        );

        Ok(Self {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            output_name,
            input_width,
        })
    }
}

impl Regressor for OnnxRegressor {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_width(&self) -> Option<usize> {
        self.input_width
    }

    fn predict(&self, features: &[f32]) -> Result<f64> {
        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor = Tensor::from_array((shape, features.to_vec()))
            .context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        let output = outputs
            .get(self.output_name.as_str())
            .with_context(|| format!("Model output '{}' missing", self.output_name))?;

        let (_, data) = output
            .try_extract_tensor::<f32>()
            .context("Model output is not a float tensor")?;

        let value = data
            .first()
            .copied()
            .context("Model returned an empty prediction")?;

        debug!(model = %self.name, raw = value, "ONNX inference complete");

        Ok(value as f64)
    }
}

/// Last dimension of a `[batch, features]` input; dynamic dimensions are negative
fn declared_width(shape: &[i64]) -> Option<usize> {
    shape
        .last()
        .and_then(|&dim| usize::try_from(dim).ok())
        .filter(|&dim| dim > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_width() {
        // onnxmltools exports [None, n]
        assert_eq!(declared_width(&[-1, 7]), Some(7));
        assert_eq!(declared_width(&[1, 6]), Some(6));
        assert_eq!(declared_width(&[-1, -1]), None);
        assert_eq!(declared_width(&[]), None);
    }
}
