//! HTTP API for the prediction service

use crate::config::{ResponseConfig, ServerConfig};
use crate::error::PredictionError;
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::models::loader::ArtifactStatus;
use crate::pipeline::PredictionPipeline;
use crate::types::emission::{EmissionPrediction, EmissionThresholds};
use crate::types::vehicle::{FuelType, PredictionRequest};
use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

/// Immutable context shared by every handler
pub struct AppState {
    /// Ready pipeline; `None` when artifacts are missing or inconsistent
    pub pipeline: Option<Arc<PredictionPipeline>>,
    /// Which artifacts loaded at startup
    pub status: ArtifactStatus,
    /// Response body shape
    pub response: ResponseConfig,
    /// Interpretation thresholds
    pub thresholds: EmissionThresholds,
    /// Request metrics
    pub metrics: Arc<PipelineMetrics>,
}

impl AppState {
    pub fn new(
        pipeline: Option<Arc<PredictionPipeline>>,
        status: ArtifactStatus,
        response: ResponseConfig,
        thresholds: EmissionThresholds,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            pipeline,
            status,
            response,
            thresholds,
            metrics,
        }
    }

    /// The pipeline, or the reason predictions cannot be served
    fn ready_pipeline(&self) -> Result<&PredictionPipeline, PredictionError> {
        if let Some(pipeline) = &self.pipeline {
            return Ok(pipeline);
        }
        let missing = self.status.missing();
        let detail = if missing.is_empty() {
            "a consistent feature layout across model, encoder, and scaler".to_string()
        } else {
            missing.join(", ")
        };
        Err(PredictionError::ServiceUnavailable(detail))
    }
}

impl IntoResponse for PredictionError {
    fn into_response(self) -> Response {
        let status = match &self {
            PredictionError::InvalidInput(_) | PredictionError::Prediction(_) => {
                StatusCode::BAD_REQUEST
            }
            PredictionError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub encoder_loaded: bool,
    pub scaler_loaded: bool,
    pub pipeline_ready: bool,
}

/// Accepted fuel types
#[derive(Debug, Serialize)]
pub struct FuelTypesResponse {
    pub fuel_types: Vec<FuelType>,
    pub descriptions: BTreeMap<&'static str, &'static str>,
}

/// Build the application router
pub fn router(state: Arc<AppState>, cors_allow_origin: Option<&str>) -> Result<Router> {
    let app = Router::new()
        .route("/", get(root))
        .route("/predict", post(predict))
        .route("/health", get(health))
        .route("/fuel-types", get(fuel_types))
        .route("/metrics", get(metrics))
        .with_state(state);

    match cors_allow_origin {
        // Route layer, so unknown paths still answer 404
        Some(origin) => Ok(app.route_layer(cors_layer(origin)?)),
        None => Ok(app),
    }
}

/// CORS for the configured origin (`*` for any), mirroring requested methods and headers
fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let allow_origin = if origin == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::exact(
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid CORS origin '{}'", origin))?,
        )
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: &ServerConfig, state: Arc<AppState>) -> Result<()> {
    let app = router(state, config.cors_allow_origin.as_deref())?;

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    let addr = listener.local_addr()?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to the CO2 Emission Prediction API!" }))
}

/// Predict CO2 emissions from vehicle features
async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<Value>, PredictionError> {
    let request_id = Uuid::new_v4();
    let start = Instant::now();

    let result = payload
        .map_err(|rejection| PredictionError::InvalidInput(rejection.body_text()))
        .and_then(|Json(request)| {
            let pipeline = state.ready_pipeline()?;
            let features = request.validate()?;
            let value = pipeline.predict_features(&features)?;
            Ok((request, value))
        });

    match result {
        Ok((request, value)) => {
            let prediction = EmissionPrediction::new(value, &state.thresholds);
            let latency = start.elapsed();
            state.metrics.record_prediction(latency, prediction.category);

            info!(
                request_id = %request_id,
                fuel_type = %request.fuel_type,
                engine_size = request.engine_size,
                cylinders = request.cylinders,
                predicted = value,
                category = prediction.category.label(),
                latency_us = latency.as_micros() as u64,
                "Prediction served"
            );

            Ok(Json(prediction.to_json(
                &state.response.field_name,
                state.response.detailed,
            )))
        }
        Err(e) => {
            match e {
                PredictionError::InvalidInput(_) => state.metrics.record_rejected(),
                _ => state.metrics.record_failure(),
            }
            warn!(
                request_id = %request_id,
                kind = e.kind(),
                error = %e,
                "Prediction request failed"
            );
            Err(e)
        }
    }
}

/// Check if the prediction service is running
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ready = state.pipeline.is_some();
    Json(HealthResponse {
        status: if ready { "healthy" } else { "degraded" },
        model_loaded: state.status.model_loaded,
        encoder_loaded: state.status.encoder_loaded,
        scaler_loaded: state.status.scaler_loaded,
        pipeline_ready: ready,
    })
}

/// Get available fuel types
async fn fuel_types(State(state): State<Arc<AppState>>) -> Json<FuelTypesResponse> {
    let fuel_types = match &state.pipeline {
        Some(pipeline) => pipeline.fuel_types(),
        None => FuelType::ALL.to_vec(),
    };
    let descriptions = fuel_types
        .iter()
        .map(|fuel| (fuel.code(), fuel.description()))
        .collect();

    Json(FuelTypesResponse {
        fuel_types,
        descriptions,
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
