use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use video_harvester::{
    ApiKey, Config, CsvSink, HarvestState, Harvester, KeywordScheduler, YouTubeClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let (config, source) = Config::load_with_source().context("Failed to load configuration")?;
    let config = config.from_env().context("Failed to load configuration")?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.output.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &source {
        Some(path) => info!("📄 Loaded configuration from: {}", path.display()),
        None => info!("📄 No configuration file found, using defaults"),
    }

    config.validate().context("Invalid configuration")?;

    // The credential is checked before any state is created on disk
    let api_key = ApiKey::from_env(&config.api.api_key_env)?;

    info!("🚀 Video harvester starting...");
    info!("{}", config.summary());

    let state = HarvestState::open(&config.storage, config.harvest.on_corrupt_state)
        .await
        .context("Failed to open state directory")?;
    let client = YouTubeClient::new(&config.api, api_key)?;
    let sink = CsvSink::new(&config.output.csv_path);

    let harvester = Harvester::new(Arc::new(client), state, sink, &config);
    let mut scheduler = KeywordScheduler::new(harvester, config.harvest.keywords.clone());

    let start_time = std::time::Instant::now();
    let report = scheduler.run().await?;
    let duration = start_time.elapsed();

    for (keyword, outcome) in &report.outcomes {
        let stats = outcome.stats();
        info!(
            "📊 {}: {} pages, {} ids seen, {} new records",
            keyword, stats.pages, stats.ids_seen, stats.new_records
        );
    }

    match report.interruption() {
        Some((keyword, error)) => {
            if error.is_api_failure() {
                warn!(
                    "⏸️ Batch stopped at keyword '{}' after {:.1}s: {}",
                    keyword,
                    duration.as_secs_f64(),
                    error
                );
                warn!("Progress is saved; run again after the quota resets to resume");
            } else {
                error!(
                    "❌ Batch stopped at keyword '{}' after {:.1}s: {}",
                    keyword,
                    duration.as_secs_f64(),
                    error
                );
                error!("Local state or output failed; inspect it with `harvest-state status`");
            }
        }
        None => {
            info!(
                "🎉 Batch completed in {:.1}s with {} new records",
                duration.as_secs_f64(),
                report.total_records()
            );
        }
    }

    Ok(())
}
