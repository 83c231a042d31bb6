//! CO2 Emission Prediction Service Library
//!
//! Serves a pre-trained vehicle CO2 emissions regression model over HTTP.
//! Requests are one-hot encoded, scaled and fed to the model exactly as
//! during training.

pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use error::PredictionError;
pub use feature_extractor::FeatureExtractor;
pub use models::loader::ArtifactLoader;
pub use pipeline::PredictionPipeline;
pub use server::AppState;
pub use types::{emission::EmissionCategory, vehicle::PredictionRequest};
