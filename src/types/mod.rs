//! Type definitions for the emission prediction service

pub mod emission;
pub mod vehicle;

pub use emission::{EmissionCategory, EmissionThresholds};
pub use vehicle::{FuelType, PredictionRequest, VehicleFeatures};
