//! Fitted prediction artifacts: encoder, scaler and regression model

pub mod encoder;
pub mod loader;
pub mod onnx;
pub mod regressor;
pub mod scaler;
pub mod xgboost;

pub use encoder::OneHotEncoder;
pub use loader::{ArtifactLoader, ArtifactStatus, LoadedArtifacts};
pub use regressor::{LinearRegressor, Regressor};
pub use scaler::StandardScaler;
pub use xgboost::XgboostRegressor;
