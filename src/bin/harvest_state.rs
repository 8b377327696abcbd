use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use video_harvester::config::StorageConfig;
use video_harvester::{Config, CorruptStatePolicy, HarvestState};

#[derive(Parser)]
#[command(name = "harvest-state")]
#[command(about = "Inspect and reset persisted harvest state")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// State directory (defaults to the configured one)
    #[arg(long)]
    state_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show resume marker, pending cursors and identifier count
    Status,
    /// Remove the resume marker so the next run starts at the first keyword
    ClearMarker,
    /// Remove the saved page token for one keyword
    ClearCursor {
        /// Keyword whose cursor should be dropped
        keyword: String,
    },
    /// Remove the marker and every cursor; collected ids are kept
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let cli = Cli::parse();
    let config = Config::load()?.from_env()?;

    let storage = StorageConfig {
        state_dir: cli.state_dir.unwrap_or(config.storage.state_dir),
    };
    // Inspection should still work on a broken file, so never fail on parse errors here
    let state = HarvestState::open(&storage, CorruptStatePolicy::Reset).await?;

    match cli.command {
        Commands::Status => {
            match state.marker.get_entry().await? {
                Some(entry) => {
                    let when = entry
                        .updated_at
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                        .unwrap_or_else(|| "unknown time".to_string());
                    info!("📍 Resume marker: {} (set {})", entry.keyword, when);
                }
                None => info!("📍 No resume marker, next run starts at the first keyword"),
            }

            let pending = state.cursors.pending().await?;
            if pending.is_empty() {
                info!("🔖 No pending page tokens");
            } else {
                info!("🔖 {} keywords with pending page tokens:", pending.len());
                for keyword in pending {
                    let token = state.cursors.get(&keyword).await?.unwrap_or_default();
                    info!("  {} -> {}", keyword, token);
                }
            }

            let ids = state.ids.load().await?;
            info!("📋 {} video ids collected", ids.len());

            for keyword in &config.harvest.keywords {
                if state.cursors.get(keyword).await?.is_none() {
                    info!("  ✅ {}", keyword);
                } else {
                    info!("  ⏳ {}", keyword);
                }
            }
        }

        Commands::ClearMarker => {
            if state.marker.clear().await? {
                info!("✅ Resume marker removed");
            } else {
                warn!("⚠️ No resume marker was set");
            }
        }

        Commands::ClearCursor { keyword } => {
            if state.cursors.clear(&keyword).await? {
                info!("✅ Removed page token for: {}", keyword);
            } else {
                warn!("⚠️ No page token found for: {}", keyword);
            }
        }

        Commands::Reset => {
            let removed = state.reset_progress().await?;
            info!("🧹 Reset marker and {} page tokens", removed);
        }
    }

    Ok(())
}
