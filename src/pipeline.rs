//! Emission prediction pipeline.
//!
//! Encode fuel type, assemble the feature row in training order, scale it,
//! run the model, undo the target transform, round. The pipeline holds only
//! immutable artifacts and is shared across requests behind an `Arc`.

use crate::config::{PipelineConfig, TargetTransform};
use crate::error::{PredictionError, Result};
use crate::feature_extractor::FeatureExtractor;
use crate::models::encoder::OneHotEncoder;
use crate::models::loader::LoadedArtifacts;
use crate::models::regressor::Regressor;
use crate::models::scaler::StandardScaler;
use crate::types::vehicle::{FuelType, VehicleFeatures};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Decimal places an f64 prediction can meaningfully carry
pub const MAX_ROUND_DECIMALS: u32 = 15;

/// Preprocessing + model, built once from loaded artifacts
pub struct PredictionPipeline {
    extractor: FeatureExtractor,
    scaler: StandardScaler,
    model: Arc<dyn Regressor>,
    target_transform: TargetTransform,
    round_decimals: u32,
}

impl PredictionPipeline {
    /// Assemble a pipeline, checking the artifacts agree on the feature layout
    pub fn new(
        encoder: OneHotEncoder,
        scaler: StandardScaler,
        model: Arc<dyn Regressor>,
        config: &PipelineConfig,
    ) -> anyhow::Result<Self> {
        if config.round_decimals > MAX_ROUND_DECIMALS {
            anyhow::bail!(
                "round_decimals must be at most {}, got {}",
                MAX_ROUND_DECIMALS,
                config.round_decimals
            );
        }

        let extractor = FeatureExtractor::with_column_order(
            encoder,
            &config.engine_size_column,
            &config.cylinders_column,
            scaler.feature_names(),
        )?;

        if extractor.feature_count() != scaler.width() {
            anyhow::bail!(
                "Scaler was fitted on {} columns but the encoder produces {}",
                scaler.width(),
                extractor.feature_count()
            );
        }

        if let Some(width) = model.input_width() {
            if width != extractor.feature_count() {
                anyhow::bail!(
                    "Model '{}' expects {} features but the pipeline produces {}",
                    model.name(),
                    width,
                    extractor.feature_count()
                );
            }
        }

        info!(
            model = %model.name(),
            features = ?extractor.feature_names(),
            target_transform = ?config.target_transform,
            "Prediction pipeline initialized"
        );

        Ok(Self {
            extractor,
            scaler,
            model,
            target_transform: config.target_transform,
            round_decimals: config.round_decimals,
        })
    }

    /// Build from startup artifacts; `None` when any of them is missing
    pub fn from_artifacts(
        artifacts: &LoadedArtifacts,
        config: &PipelineConfig,
    ) -> Option<anyhow::Result<Self>> {
        let (model, encoder, scaler) = (
            artifacts.model.as_ref()?,
            artifacts.encoder.as_ref()?,
            artifacts.scaler.as_ref()?,
        );
        Some(Self::new(
            encoder.clone(),
            scaler.clone(),
            Arc::clone(model),
            config,
        ))
    }

    /// Predict emissions from raw request values
    pub fn predict(&self, fuel_type: &str, engine_size: f64, cylinders: i64) -> Result<f64> {
        let features = VehicleFeatures::parse(fuel_type, engine_size, cylinders)?;
        self.predict_features(&features)
    }

    /// Predict emissions for a validated record
    pub fn predict_features(&self, features: &VehicleFeatures) -> Result<f64> {
        let row = self.extractor.extract(features)?;
        let scaled = self.scaler.transform(&row)?;
        let input: Vec<f32> = scaled.iter().map(|&v| v as f32).collect();

        let raw = self
            .model
            .predict(&input)
            .map_err(|e| PredictionError::Prediction(format!("{e:#}")))?;

        let value = self.target_transform.invert(raw);
        if !value.is_finite() {
            return Err(PredictionError::Prediction(format!(
                "model produced a non-finite value ({})",
                value
            )));
        }

        let value = if value < 0.0 {
            warn!(
                model = %self.model.name(),
                raw = raw,
                "Negative emissions prediction clamped to zero"
            );
            0.0
        } else {
            value
        };

        let rounded = round_to(value, self.round_decimals);

        debug!(
            fuel_type = %features.fuel_type,
            engine_size = features.engine_size,
            cylinders = features.cylinders,
            raw = raw,
            predicted = rounded,
            "Prediction complete"
        );

        Ok(rounded)
    }

    /// Fuel types the fitted encoder accepts
    pub fn fuel_types(&self) -> Vec<FuelType> {
        let encoder = self.extractor.encoder();
        FuelType::ALL
            .into_iter()
            .filter(|fuel| encoder.contains(fuel.code()))
            .collect()
    }

    /// Feature names in model input order
    pub fn feature_names(&self) -> &[String] {
        self.extractor.feature_names()
    }

    /// Name of the underlying model
    pub fn model_name(&self) -> &str {
        self.model.name()
    }
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::regressor::LinearRegressor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Linear model that counts how often it is invoked
    struct CountingModel {
        inner: LinearRegressor,
        calls: AtomicUsize,
    }

    impl Regressor for CountingModel {
        fn name(&self) -> &str {
            "counting"
        }

        fn input_width(&self) -> Option<usize> {
            self.inner.input_width()
        }

        fn predict(&self, features: &[f32]) -> anyhow::Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.predict(features)
        }
    }

    /// Constant model returning a fixed raw value
    struct ConstantModel(f64);

    impl Regressor for ConstantModel {
        fn name(&self) -> &str {
            "constant"
        }

        fn input_width(&self) -> Option<usize> {
            None
        }

        fn predict(&self, _features: &[f32]) -> anyhow::Result<f64> {
            Ok(self.0)
        }
    }

    fn encoder() -> OneHotEncoder {
        OneHotEncoder::new(
            "fuel_type",
            ["D", "E", "N", "X", "Z"].iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }

    fn scaler() -> StandardScaler {
        StandardScaler::new(
            vec![3.0, 6.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            vec![1.0, 2.0, 1.0, 1.0, 1.0, 1.0, 1.0],
        )
        .unwrap()
    }

    fn linear() -> LinearRegressor {
        LinearRegressor::new(vec![20.0, 10.0, -4.0, 3.0, 1.0, 5.0, 8.0], 250.0).unwrap()
    }

    fn pipeline_with(model: Arc<dyn Regressor>, config: &PipelineConfig) -> PredictionPipeline {
        PredictionPipeline::new(encoder(), scaler(), model, config).unwrap()
    }

    #[test]
    fn test_fixed_artifacts_exact_prediction() {
        let pipeline = pipeline_with(Arc::new(linear()), &PipelineConfig::default());

        // scaled row: [-1, -1, 0, 0, 0, 1, 0] -> 250 - 20 - 10 + 5
        assert_eq!(pipeline.predict("X", 2.0, 4).unwrap(), 225.0);
        // scaled row: [0.5, 1, 1, 0, 0, 0, 0] -> 250 + 10 + 10 - 4
        assert_eq!(pipeline.predict("D", 3.5, 8).unwrap(), 266.0);
    }

    #[test]
    fn test_all_fuel_types_produce_finite_non_negative_values() {
        let pipeline = pipeline_with(Arc::new(linear()), &PipelineConfig::default());

        for fuel in FuelType::ALL {
            let value = pipeline.predict(fuel.code(), 1.6, 4).unwrap();
            assert!(value.is_finite());
            assert!(value >= 0.0);
        }
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let pipeline = pipeline_with(Arc::new(linear()), &PipelineConfig::default());

        let first = pipeline.predict("Z", 2.4, 6).unwrap();
        for _ in 0..10 {
            assert_eq!(pipeline.predict("Z", 2.4, 6).unwrap(), first);
        }
    }

    #[test]
    fn test_unknown_fuel_type_never_reaches_model() {
        let model = Arc::new(CountingModel {
            inner: linear(),
            calls: AtomicUsize::new(0),
        });
        let pipeline = pipeline_with(model.clone(), &PipelineConfig::default());

        assert!(matches!(
            pipeline.predict("Q", 2.0, 4),
            Err(PredictionError::InvalidInput(_))
        ));
        assert!(matches!(
            pipeline.predict("X", -2.0, 4),
            Err(PredictionError::InvalidInput(_))
        ));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);

        pipeline.predict("X", 2.0, 4).unwrap();
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fuel_type_missing_from_encoder() {
        let encoder = OneHotEncoder::new("fuel_type", vec!["D".into(), "X".into()]).unwrap();
        let scaler = StandardScaler::new(vec![0.0; 4], vec![1.0; 4]).unwrap();
        let pipeline = PredictionPipeline::new(
            encoder,
            scaler,
            Arc::new(ConstantModel(100.0)),
            &PipelineConfig::default(),
        )
        .unwrap();

        assert_eq!(pipeline.fuel_types(), vec![FuelType::X, FuelType::D]);
        assert!(matches!(
            pipeline.predict("E", 2.0, 4),
            Err(PredictionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_log_target_is_reversed() {
        let config = PipelineConfig {
            target_transform: TargetTransform::Log,
            ..PipelineConfig::default()
        };
        let pipeline = pipeline_with(Arc::new(ConstantModel(200.0_f64.ln())), &config);

        assert_eq!(pipeline.predict("X", 2.0, 4).unwrap(), 200.0);
    }

    #[test]
    fn test_rounding_and_clamping() {
        let pipeline = pipeline_with(Arc::new(ConstantModel(187.456)), &PipelineConfig::default());
        assert_eq!(pipeline.predict("X", 2.0, 4).unwrap(), 187.46);

        let pipeline = pipeline_with(Arc::new(ConstantModel(-3.2)), &PipelineConfig::default());
        assert_eq!(pipeline.predict("X", 2.0, 4).unwrap(), 0.0);

        let pipeline = pipeline_with(Arc::new(ConstantModel(f64::NAN)), &PipelineConfig::default());
        assert!(matches!(
            pipeline.predict("X", 2.0, 4),
            Err(PredictionError::Prediction(_))
        ));
    }

    #[test]
    fn test_model_width_mismatch_is_rejected() {
        let model = LinearRegressor::new(vec![1.0; 3], 0.0).unwrap();
        assert!(
            PredictionPipeline::new(encoder(), scaler(), Arc::new(model), &PipelineConfig::default())
                .is_err()
        );

        let narrow = StandardScaler::new(vec![0.0; 5], vec![1.0; 5]).unwrap();
        assert!(PredictionPipeline::new(
            encoder(),
            narrow,
            Arc::new(ConstantModel(1.0)),
            &PipelineConfig::default()
        )
        .is_err());
    }

    #[test]
    fn test_from_artifacts_requires_everything() {
        let mut artifacts = LoadedArtifacts {
            model: Some(Arc::new(linear())),
            encoder: Some(encoder()),
            scaler: None,
        };
        assert!(PredictionPipeline::from_artifacts(&artifacts, &PipelineConfig::default()).is_none());

        artifacts.scaler = Some(scaler());
        let pipeline = PredictionPipeline::from_artifacts(&artifacts, &PipelineConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(pipeline.model_name(), "linear");
        assert_eq!(pipeline.feature_names().len(), 7);
    }

    #[test]
    fn test_round_decimals_is_bounded() {
        let too_many = PipelineConfig {
            round_decimals: 400,
            ..PipelineConfig::default()
        };
        assert!(
            PredictionPipeline::new(encoder(), scaler(), Arc::new(linear()), &too_many).is_err()
        );

        let max = PipelineConfig {
            round_decimals: MAX_ROUND_DECIMALS,
            ..PipelineConfig::default()
        };
        let pipeline = pipeline_with(Arc::new(ConstantModel(187.456)), &max);
        let value = pipeline.predict("X", 2.0, 4).unwrap();
        assert!(value.is_finite());
        assert!((value - 187.456).abs() < 1e-9);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.005, 0), 1.0);
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(-2.5, 0), -3.0);
        assert_eq!(round_to(123.4567, 1), 123.5);
    }
}
