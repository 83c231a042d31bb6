//! Vehicle feature records accepted by the prediction endpoint

use crate::error::{PredictionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fuel type codes used by the emissions dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FuelType {
    /// Regular gasoline
    X,
    /// Premium gasoline
    Z,
    /// Ethanol (E85)
    E,
    /// Diesel
    D,
    /// Natural gas
    N,
}

impl FuelType {
    /// Every accepted fuel type, in the order the API lists them.
    pub const ALL: [FuelType; 5] = [
        FuelType::X,
        FuelType::Z,
        FuelType::E,
        FuelType::D,
        FuelType::N,
    ];

    /// Single-letter dataset code
    pub fn code(&self) -> &'static str {
        match self {
            FuelType::X => "X",
            FuelType::Z => "Z",
            FuelType::E => "E",
            FuelType::D => "D",
            FuelType::N => "N",
        }
    }

    /// Human readable description
    pub fn description(&self) -> &'static str {
        match self {
            FuelType::X => "Regular gasoline",
            FuelType::Z => "Premium gasoline",
            FuelType::E => "Ethanol (E85)",
            FuelType::D => "Diesel",
            FuelType::N => "Natural gas",
        }
    }
}

impl FromStr for FuelType {
    type Err = PredictionError;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim();
        FuelType::ALL
            .into_iter()
            .find(|fuel| fuel.code() == code)
            .ok_or_else(|| {
                PredictionError::InvalidInput(format!(
                    "unknown fuel_type '{}', expected one of X, Z, E, D, N",
                    code
                ))
            })
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Raw prediction request as received over HTTP.
///
/// Fields stay loosely typed so that out-of-domain values are reported as
/// validation errors instead of JSON decoding failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Fuel type code (X, Z, E, D, N)
    pub fuel_type: String,

    /// Engine displacement in litres
    #[serde(alias = "engine_size(l)")]
    pub engine_size: f64,

    /// Number of cylinders
    pub cylinders: i64,
}

impl PredictionRequest {
    /// Create a new request
    pub fn new(fuel_type: impl Into<String>, engine_size: f64, cylinders: i64) -> Self {
        Self {
            fuel_type: fuel_type.into(),
            engine_size,
            cylinders,
        }
    }

    /// Validate the request into a typed feature record
    pub fn validate(&self) -> Result<VehicleFeatures> {
        VehicleFeatures::parse(&self.fuel_type, self.engine_size, self.cylinders)
    }
}

/// Validated, immutable vehicle feature record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleFeatures {
    pub fuel_type: FuelType,
    pub engine_size: f64,
    pub cylinders: u32,
}

impl VehicleFeatures {
    /// Parse and validate raw feature values
    pub fn parse(fuel_type: &str, engine_size: f64, cylinders: i64) -> Result<Self> {
        let fuel_type = fuel_type.parse::<FuelType>()?;

        if !engine_size.is_finite() || engine_size <= 0.0 {
            return Err(PredictionError::InvalidInput(format!(
                "engine_size must be a positive number, got {}",
                engine_size
            )));
        }

        let cylinders = u32::try_from(cylinders)
            .ok()
            .filter(|&c| c > 0)
            .ok_or_else(|| {
                PredictionError::InvalidInput(format!(
                    "cylinders must be a positive integer, got {}",
                    cylinders
                ))
            })?;

        Ok(Self {
            fuel_type,
            engine_size,
            cylinders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuel_type_parsing() {
        assert_eq!("X".parse::<FuelType>().unwrap(), FuelType::X);
        assert_eq!(" D ".parse::<FuelType>().unwrap(), FuelType::D);
        assert!(matches!(
            "x".parse::<FuelType>(),
            Err(PredictionError::InvalidInput(_))
        ));
        assert!("Q".parse::<FuelType>().is_err());
        assert!("".parse::<FuelType>().is_err());
    }

    #[test]
    fn test_fuel_type_descriptions() {
        assert_eq!(FuelType::ALL.len(), 5);
        assert_eq!(FuelType::E.description(), "Ethanol (E85)");
        assert_eq!(FuelType::N.to_string(), "N");
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"fuel_type": "Z", "engine_size(l)": 3.5, "cylinders": 6}"#;
        let request: PredictionRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.fuel_type, "Z");
        assert_eq!(request.engine_size, 3.5);
        assert_eq!(request.cylinders, 6);
    }

    #[test]
    fn test_feature_validation() {
        let features = PredictionRequest::new("X", 2.0, 4).validate().unwrap();
        assert_eq!(features.fuel_type, FuelType::X);
        assert_eq!(features.cylinders, 4);

        assert!(VehicleFeatures::parse("X", 0.0, 4).is_err());
        assert!(VehicleFeatures::parse("X", -1.5, 4).is_err());
        assert!(VehicleFeatures::parse("X", f64::NAN, 4).is_err());
        assert!(VehicleFeatures::parse("X", 2.0, 0).is_err());
        assert!(VehicleFeatures::parse("X", 2.0, -8).is_err());
    }
}
