use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use trade_values::config::{RefreshSchedule, ScraperConfig};
use trade_values::orchestrator::{Orchestrator, TRADE_VALUES_DATASET};
use trade_values::query::{filter_records, search_records};
use trade_values::util::env as env_util;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "trade-values", version, about = "Trade-in value and promotions scraper")]
struct Cli {
    /// Snapshot directory (default: TRADEIN_DATA_DIR or ./data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Debug logging for this crate when RUST_LOG is unset
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Fetch, normalize, enrich and save trade values
    Trade {
        /// Keep at most this many records after filtering
        #[arg(long)]
        max: Option<usize>,
        /// Write `.min.json` snapshots
        #[arg(long, default_value_t = false)]
        minify: bool,
        /// Day of month that bypasses the product-id cache
        #[arg(long)]
        forced_day: Option<u32>,
        /// Days after `forced_day` for the second forced refresh
        #[arg(long)]
        forced_gap: Option<u32>,
        /// Concurrent catalog lookups per batch
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Scrape and save the promotions page
    Promotions {
        #[arg(long, default_value_t = false)]
        minify: bool,
    },
    /// Search the latest trade values by SKU or name
    Search { query: String },
    /// Filter the latest trade values by platform and price
    Filter {
        #[arg(long)]
        platform: Option<String>,
        #[arg(long)]
        min: Option<f64>,
        #[arg(long)]
        max: Option<f64>,
    },
    /// Run one catalog search for a SKU
    Lookup { sku: u64 },
    /// Delete dated snapshots beyond the most recent N dates
    Prune {
        /// `trade_values` or `promotions`
        #[arg(default_value = TRADE_VALUES_DATASET)]
        dataset: String,
        #[arg(long, default_value_t = 7)]
        keep: usize,
    },
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    let cli = Cli::parse();
    trade_values::logging::init_tracing("info", cli.verbose)?;

    let mut cfg = ScraperConfig::from_env();
    if let Some(dir) = cli.data_dir {
        cfg.data_dir = dir;
    }
    if let Commands::Trade {
        forced_day,
        forced_gap,
        batch_size,
        ..
    } = &cli.command
    {
        cfg.refresh = RefreshSchedule::new(
            forced_day.unwrap_or(cfg.refresh.day),
            forced_gap.unwrap_or(cfg.refresh.gap),
        );
        if let Some(b) = batch_size {
            cfg.batch_size = (*b).max(1);
        }
    }

    let orchestrator = Orchestrator::new(cfg)?;
    let result = run(&orchestrator, cli.command).await;
    if let Err(err) = &result {
        error!(error = ?err, "command failed");
    }
    result
}

async fn run(orchestrator: &Orchestrator, command: Commands) -> Result<()> {
    match command {
        Commands::Trade { max, minify, .. } => {
            match orchestrator.fetch_and_save_trade_values(max, minify).await? {
                Some(saved) => {
                    info!(count = saved.count, path = %saved.latest.display(), "trade values saved")
                }
                None => info!("nothing saved"),
            }
        }
        Commands::Promotions { minify } => {
            let saved = orchestrator.fetch_and_save_promotions(minify).await?;
            info!(count = saved.count, path = %saved.latest.display(), "promotions saved");
        }
        Commands::Search { query } => {
            let snapshot = orchestrator
                .latest_trade_values()?
                .context("no trade value snapshot yet; run `trade-values trade` first")?;
            print_json(&search_records(&snapshot.data, &query))?;
        }
        Commands::Filter { platform, min, max } => {
            let snapshot = orchestrator
                .latest_trade_values()?
                .context("no trade value snapshot yet; run `trade-values trade` first")?;
            print_json(&filter_records(&snapshot.data, platform.as_deref(), min, max))?;
        }
        Commands::Lookup { sku } => {
            let hit = orchestrator.fetcher().search_product(sku).await?;
            print_json(&hit)?;
        }
        Commands::Prune { dataset, keep } => {
            let removed = orchestrator.store().prune(&dataset, keep)?;
            print_json(&removed)?;
        }
    }
    Ok(())
}
