//! Fitted one-hot encoder for the categorical feature

use crate::error::{PredictionError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// What to do with a category the encoder was not fitted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleUnknown {
    /// Reject the input
    #[default]
    Error,
    /// Encode as an all-zero indicator row
    Ignore,
}

fn default_feature() -> String {
    "fuel_type".to_string()
}

/// One-hot encoder with the category order captured at training time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    /// Name of the encoded input column
    #[serde(default = "default_feature")]
    pub feature: String,
    /// Fitted categories, in output column order
    pub categories: Vec<String>,
    /// Unknown category policy
    #[serde(default)]
    pub handle_unknown: HandleUnknown,
}

impl OneHotEncoder {
    /// Create an encoder from fitted categories
    pub fn new(feature: impl Into<String>, categories: Vec<String>) -> anyhow::Result<Self> {
        let encoder = Self {
            feature: feature.into(),
            categories,
            handle_unknown: HandleUnknown::Error,
        };
        encoder.validate()?;
        Ok(encoder)
    }

    /// Set the unknown category policy
    pub fn with_handle_unknown(mut self, handle_unknown: HandleUnknown) -> Self {
        self.handle_unknown = handle_unknown;
        self
    }

    /// Load a fitted encoder from its JSON artifact
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read encoder from {}", path.display()))?;
        let encoder: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse encoder {}", path.display()))?;
        encoder.validate()?;
        Ok(encoder)
    }

    /// Check the fitted state is usable
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.categories.is_empty() {
            anyhow::bail!("Encoder for '{}' has no categories", self.feature);
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            if !seen.insert(category.as_str()) {
                anyhow::bail!(
                    "Encoder for '{}' lists category '{}' twice",
                    self.feature,
                    category
                );
            }
        }

        Ok(())
    }

    /// Number of indicator columns produced
    pub fn width(&self) -> usize {
        self.categories.len()
    }

    /// Output column names, `<feature>_<category>`
    pub fn feature_names_out(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|category| format!("{}_{}", self.feature, category))
            .collect()
    }

    /// Whether the encoder was fitted on this category
    pub fn contains(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    /// Encode one category into its indicator row
    pub fn transform(&self, category: &str) -> Result<Vec<f64>> {
        let mut row = vec![0.0; self.width()];

        match self.categories.iter().position(|c| c == category) {
            Some(idx) => row[idx] = 1.0,
            None if self.handle_unknown == HandleUnknown::Ignore => {}
            None => {
                return Err(PredictionError::InvalidInput(format!(
                    "{} '{}' was not seen during training (known: {})",
                    self.feature,
                    category,
                    self.categories.join(", ")
                )));
            }
        }

        Ok(row)
    }
}
