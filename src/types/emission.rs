//! Emission prediction results and their interpretation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unit every prediction is reported in
pub const EMISSION_UNIT: &str = "g/km";

/// Emission category classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmissionCategory {
    Excellent,
    Good,
    Average,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl EmissionCategory {
    /// Classify an emissions value (g/km) against the thresholds
    pub fn from_value(value: f64, thresholds: &EmissionThresholds) -> Self {
        if value < thresholds.excellent {
            EmissionCategory::Excellent
        } else if value < thresholds.good {
            EmissionCategory::Good
        } else if value < thresholds.average {
            EmissionCategory::Average
        } else if value < thresholds.high {
            EmissionCategory::High
        } else {
            EmissionCategory::VeryHigh
        }
    }

    /// Display label, as returned in responses
    pub fn label(&self) -> &'static str {
        match self {
            EmissionCategory::Excellent => "Excellent",
            EmissionCategory::Good => "Good",
            EmissionCategory::Average => "Average",
            EmissionCategory::High => "High",
            EmissionCategory::VeryHigh => "Very High",
        }
    }

    /// Interpretation text shown to end users
    pub fn interpretation(&self) -> &'static str {
        match self {
            EmissionCategory::Excellent => {
                "Excellent! This vehicle has very low emissions and is environmentally friendly."
            }
            EmissionCategory::Good => {
                "Good! This vehicle has moderate emissions and is reasonably eco-friendly."
            }
            EmissionCategory::Average => {
                "Average. This vehicle has typical emissions for its class."
            }
            EmissionCategory::High => {
                "High. This vehicle produces above-average emissions and may have higher fuel costs."
            }
            EmissionCategory::VeryHigh => {
                "Very High. This vehicle produces significant emissions and will have high fuel costs."
            }
        }
    }
}

/// Upper bounds (exclusive, g/km) of each category but the last
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionThresholds {
    pub excellent: f64,
    pub good: f64,
    pub average: f64,
    pub high: f64,
}

impl Default for EmissionThresholds {
    fn default() -> Self {
        Self {
            excellent: 120.0,
            good: 160.0,
            average: 200.0,
            high: 250.0,
        }
    }
}

/// A finished prediction, ready to be rendered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmissionPrediction {
    /// Predicted emissions (g/km), already rounded
    pub value: f64,
    /// Category of the predicted value
    pub category: EmissionCategory,
}

impl EmissionPrediction {
    /// Classify a predicted value
    pub fn new(value: f64, thresholds: &EmissionThresholds) -> Self {
        Self {
            value,
            category: EmissionCategory::from_value(value, thresholds),
        }
    }

    /// Render the response body.
    ///
    /// `field_name` carries the value; `detailed` adds unit, interpretation
    /// and category.
    pub fn to_json(&self, field_name: &str, detailed: bool) -> Value {
        let mut body = Map::new();
        body.insert(field_name.to_string(), Value::from(self.value));

        if detailed {
            body.insert("unit".to_string(), Value::from(EMISSION_UNIT));
            body.insert(
                "interpretation".to_string(),
                Value::from(self.category.interpretation()),
            );
            body.insert("category".to_string(), Value::from(self.category.label()));
        }

        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_value() {
        let thresholds = EmissionThresholds::default();

        assert_eq!(
            EmissionCategory::from_value(95.0, &thresholds),
            EmissionCategory::Excellent
        );
        assert_eq!(
            EmissionCategory::from_value(120.0, &thresholds),
            EmissionCategory::Good
        );
        assert_eq!(
            EmissionCategory::from_value(199.99, &thresholds),
            EmissionCategory::Average
        );
        assert_eq!(
            EmissionCategory::from_value(230.0, &thresholds),
            EmissionCategory::High
        );
        assert_eq!(
            EmissionCategory::from_value(250.0, &thresholds),
            EmissionCategory::VeryHigh
        );
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&EmissionCategory::VeryHigh).unwrap();
        assert_eq!(json, "\"Very High\"");
    }

    #[test]
    fn test_detailed_response() {
        let prediction = EmissionPrediction::new(185.42, &EmissionThresholds::default());
        let body = prediction.to_json("predicted_co2_emissions", true);

        assert_eq!(body["predicted_co2_emissions"], 185.42);
        assert_eq!(body["unit"], "g/km");
        assert_eq!(body["category"], "Average");
        assert_eq!(
            body["interpretation"],
            "Average. This vehicle has typical emissions for its class."
        );
    }

    #[test]
    fn test_response_leads_with_value() {
        let prediction = EmissionPrediction::new(185.42, &EmissionThresholds::default());
        let body = prediction.to_json("predicted_co2_emissions", true);

        let keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["predicted_co2_emissions", "unit", "interpretation", "category"]
        );
        assert!(serde_json::to_string(&body)
            .unwrap()
            .starts_with(r#"{"predicted_co2_emissions":185.42,"#));
    }

    #[test]
    fn test_compact_response() {
        let prediction = EmissionPrediction::new(301.0, &EmissionThresholds::default());
        let body = prediction.to_json("predicted_CO2", false);

        let object = body.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(body["predicted_CO2"], 301.0);
    }
}
