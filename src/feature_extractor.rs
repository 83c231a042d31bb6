//! Feature extraction for emission model inference.
//!
//! Builds the unscaled feature vector the scaler and model were fitted on:
//! the numeric fields and the fuel type indicator columns, in training
//! column order.

use crate::error::Result;
use crate::models::encoder::OneHotEncoder;
use crate::types::vehicle::VehicleFeatures;
use std::collections::{HashMap, HashSet};

/// Source of one feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    EngineSize,
    Cylinders,
    Indicator(usize),
}

/// Feature extractor that turns vehicle records into model input rows.
///
/// The default layout is `[engine_size, cylinders, <one-hot fuel type>]`.
/// When training column names are known they decide the order instead.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    encoder: OneHotEncoder,
    names: Vec<String>,
    layout: Vec<Column>,
}

impl FeatureExtractor {
    /// Create an extractor with the default training layout
    pub fn new(
        encoder: OneHotEncoder,
        engine_size_column: &str,
        cylinders_column: &str,
    ) -> anyhow::Result<Self> {
        Self::with_column_order(encoder, engine_size_column, cylinders_column, None)
    }

    /// Create an extractor whose columns follow `trained_order` when given.
    ///
    /// Every column must appear exactly once; anything else means the serving
    /// path would silently disagree with training.
    pub fn with_column_order(
        encoder: OneHotEncoder,
        engine_size_column: &str,
        cylinders_column: &str,
        trained_order: Option<&[String]>,
    ) -> anyhow::Result<Self> {
        let mut columns = vec![
            (engine_size_column.to_string(), Column::EngineSize),
            (cylinders_column.to_string(), Column::Cylinders),
        ];
        columns.extend(
            encoder
                .feature_names_out()
                .into_iter()
                .enumerate()
                .map(|(i, name)| (name, Column::Indicator(i))),
        );

        let Some(order) = trained_order else {
            let (names, layout): (Vec<String>, Vec<Column>) = columns.into_iter().unzip();
            if names.iter().collect::<HashSet<_>>().len() != names.len() {
                anyhow::bail!("Feature column names collide: {}", names.join(", "));
            }
            return Ok(Self {
                encoder,
                names,
                layout,
            });
        };

        let by_name: HashMap<&str, Column> =
            columns.iter().map(|(name, col)| (name.as_str(), *col)).collect();
        if by_name.len() != columns.len() {
            anyhow::bail!("Feature column names collide: {:?}", columns);
        }

        let mut layout = Vec::with_capacity(order.len());
        for name in order {
            let column = by_name
                .get(name.as_str())
                .copied()
                .ok_or_else(|| anyhow::anyhow!("Unknown training column '{}'", name))?;
            if layout.contains(&column) {
                anyhow::bail!("Training column '{}' listed twice", name);
            }
            layout.push(column);
        }

        if layout.len() != columns.len() {
            let missing: Vec<&str> = columns
                .iter()
                .filter(|(_, col)| !layout.contains(col))
                .map(|(name, _)| name.as_str())
                .collect();
            anyhow::bail!("Training columns missing from layout: {}", missing.join(", "));
        }

        Ok(Self {
            encoder,
            names: order.to_vec(),
            layout,
        })
    }

    /// Extract the unscaled feature row for a record
    pub fn extract(&self, features: &VehicleFeatures) -> Result<Vec<f64>> {
        let indicators = self.encoder.transform(features.fuel_type.code())?;

        Ok(self
            .layout
            .iter()
            .map(|column| match column {
                Column::EngineSize => features.engine_size,
                Column::Cylinders => features.cylinders as f64,
                Column::Indicator(i) => indicators[*i],
            })
            .collect())
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        self.layout.len()
    }

    /// Get feature names in output order.
    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    /// The fitted encoder
    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictionError;
    use crate::models::encoder::HandleUnknown;
    use crate::types::vehicle::FuelType;

    fn encoder() -> OneHotEncoder {
        OneHotEncoder::new("fuel_type", vec!["D".into(), "X".into(), "Z".into()]).unwrap()
    }

    fn record(fuel_type: FuelType) -> VehicleFeatures {
        VehicleFeatures {
            fuel_type,
            engine_size: 2.0,
            cylinders: 4,
        }
    }

    #[test]
    fn test_default_layout() {
        let extractor = FeatureExtractor::new(encoder(), "engine_size", "cylinders").unwrap();

        assert_eq!(extractor.feature_count(), 5);
        assert_eq!(
            extractor.feature_names(),
            &["engine_size", "cylinders", "fuel_type_D", "fuel_type_X", "fuel_type_Z"]
        );
        assert_eq!(
            extractor.extract(&record(FuelType::X)).unwrap(),
            vec![2.0, 4.0, 0.0, 1.0, 0.0]
        );
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn with_order(order: &[String]) -> anyhow::Result<FeatureExtractor> {
        FeatureExtractor::with_column_order(encoder(), "engine_size(l)", "cylinders", Some(order))
    }

    #[test]
    fn test_trained_column_order() {
        let order = names(&["fuel_type_Z", "cylinders", "fuel_type_D", "engine_size(l)", "fuel_type_X"]);
        let extractor = with_order(&order).unwrap();

        assert_eq!(extractor.feature_names(), order.as_slice());
        assert_eq!(
            extractor.extract(&record(FuelType::Z)).unwrap(),
            vec![1.0, 4.0, 0.0, 2.0, 0.0]
        );
    }

    #[test]
    fn test_layout_mismatch_is_rejected() {
        // column the encoder never produces
        let unknown = names(&["engine_size(l)", "cylinders", "fuel_type_D", "fuel_type_X", "fuel_type_E"]);
        assert!(with_order(&unknown).is_err());

        // category dropped
        let short = names(&["engine_size(l)", "cylinders", "fuel_type_D", "fuel_type_X"]);
        assert!(with_order(&short).is_err());

        let duplicated = names(&["cylinders", "cylinders", "fuel_type_D", "fuel_type_X", "fuel_type_Z"]);
        assert!(with_order(&duplicated).is_err());

        // numeric column renamed since training
        let renamed = names(&["engine_size", "cylinders", "fuel_type_D", "fuel_type_X", "fuel_type_Z"]);
        assert!(with_order(&renamed).is_err());
    }

    #[test]
    fn test_fuel_type_outside_encoder() {
        let extractor = FeatureExtractor::new(encoder(), "engine_size", "cylinders").unwrap();
        assert!(matches!(
            extractor.extract(&record(FuelType::N)),
            Err(PredictionError::InvalidInput(_))
        ));

        let lenient = FeatureExtractor::new(
            encoder().with_handle_unknown(HandleUnknown::Ignore),
            "engine_size",
            "cylinders",
        )
        .unwrap();
        assert_eq!(
            lenient.extract(&record(FuelType::N)).unwrap(),
            vec![2.0, 4.0, 0.0, 0.0, 0.0]
        );
    }
}
