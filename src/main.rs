//! CO2 Emission Prediction Service - Main Entry Point
//!
//! Loads the model, encoder and scaler artifacts once and serves predictions
//! over HTTP.

use anyhow::Result;
use co2_emission_service::{
    config::{AppConfig, LoggingConfig},
    metrics::{MetricsReporter, PipelineMetrics},
    models::loader::ArtifactLoader,
    pipeline::PredictionPipeline,
    server::{self, AppState},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    init_logging(&config.logging)?;

    info!("Starting CO2 Emission Prediction Service");
    info!(
        artifacts_dir = %config.artifacts.dir,
        model_format = ?config.artifacts.model_format,
        target_transform = ?config.pipeline.target_transform,
        "Configuration loaded successfully"
    );

    // Load artifacts
    let artifacts = ArtifactLoader::new(&config.artifacts).load_all()?;
    let status = artifacts.status();

    let pipeline = match PredictionPipeline::from_artifacts(&artifacts, &config.pipeline) {
        Some(Ok(pipeline)) => {
            info!(
                model = %pipeline.model_name(),
                features = pipeline.feature_names().len(),
                "Predictions enabled"
            );
            Some(Arc::new(pipeline))
        }
        Some(Err(e)) if config.artifacts.require_all => return Err(e),
        Some(Err(e)) => {
            let reason = format!("{e:#}");
            error!(error = %reason, "Artifacts are inconsistent, predictions disabled");
            None
        }
        None => {
            warn!(
                missing = ?status.missing(),
                "Prediction service not fully initialized, predictions disabled"
            );
            None
        }
    };

    // Initialize metrics
    let metrics = Arc::new(PipelineMetrics::new());
    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let state = Arc::new(AppState::new(
        pipeline,
        status,
        config.response.clone(),
        config.interpretation.clone(),
        metrics.clone(),
    ));

    server::serve(&config.server, state).await?;

    // Print final summary
    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("co2_emission_service={}", config.level).parse()?);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}
