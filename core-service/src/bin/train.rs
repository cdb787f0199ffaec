//! Flood Risk - Offline training entry point
//!
//! Reads (or generates) the historical weather table, fits the scaler and
//! LSTM model, and writes the paired artifacts the model service loads.

use anyhow::Context;

use flood_risk_core::{TrainingConfig, TrainingPipeline};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = TrainingConfig::from_env();
    log::info!("Flood risk training v{} starting", flood_risk_core::constants::APP_VERSION);
    log::info!(
        "Data: {} | Artifacts: {} | epochs={} batch={} lr={} val_split={} seed={}",
        config.data_path.display(),
        config.artifact_dir.display(),
        config.epochs,
        config.batch_size,
        config.learning_rate,
        config.validation_split,
        config.seed
    );

    let pipeline = TrainingPipeline::new(config);
    let report = pipeline.run().context("training failed")?;

    if let Some(last) = report.final_epoch() {
        log::info!(
            "Run {} complete: val_loss {:.4}, val_accuracy {:.4}",
            report.run_id,
            last.val_loss,
            last.val_accuracy
        );
    }
    log::info!("Artifacts saved to {}", pipeline.store().dir().display());

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
