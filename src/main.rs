//! clustercost - Estimate list-price costs of compute clusters

use clap::Parser;
use clustercost::{
    aggregation::ClusterEstimate,
    cli::{Cli, Command, parse_window},
    config::EngineConfig,
    error::Result,
    output::{InstanceInfo, get_formatter},
    service::parse_selection,
    snapshot::{InventorySnapshot, RecordedSpotPrices},
};
use clustercost_core::{CostBreakdown, InstanceKind, SpotPriceSource};
use clustercost_pricing::SnapshotFetcher;
use clustercost_pricing::snapshot_fetcher::resolve_regions;
use clustercost_pricing::spot::NoSpotPrices;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first to check for quiet flag
    let cli = Cli::parse();

    // Initialize logging. The --quiet flag should override RUST_LOG.
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("warn")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("clustercost=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = EngineConfig::from_cli(&cli.engine)?;

    match cli.command {
        Command::Estimate {
            inventory,
            spot_prices,
            clusters,
            json,
            since,
            until,
        } => {
            info!("Estimating clusters from {}", inventory.display());
            let window = parse_window(since.as_deref(), until.as_deref())?;

            let inventory = Arc::new(InventorySnapshot::load(&inventory)?);
            let spot_source: Arc<dyn SpotPriceSource> = match spot_prices {
                Some(path) => Arc::new(RecordedSpotPrices::load(&path)?),
                None => Arc::new(NoSpotPrices),
            };
            let ids = match clusters {
                Some(selection) => parse_selection(&selection),
                None => inventory.cluster_ids(),
            };
            if ids.is_empty() {
                warn!("No clusters selected");
            }

            let service = config
                .build_service(inventory, spot_source)
                .await?
                .with_window(window);

            let show_progress = !json && is_terminal::is_terminal(std::io::stdout());
            let progress = show_progress.then(|| {
                let pb = ProgressBar::new(ids.len() as u64);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} clusters {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                pb
            });

            let mut estimates: Vec<ClusterEstimate> = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(pb) = &progress {
                    pb.set_message(id.to_string());
                }
                estimates.push(service.cluster_estimate(id).await?);
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
            }
            if let Some(pb) = progress {
                pb.finish_and_clear();
            }

            let totals = CostBreakdown::add_costs(estimates.iter().map(|e| &e.breakdown));
            let formatter = get_formatter(json);
            println!("{}", formatter.format_estimates(&estimates, &totals));
        }
        Command::FetchPrices { regions } => {
            let regions = resolve_regions(&regions);
            info!(
                "Fetching {} price lists for {} regions into {}",
                config.platform,
                regions.len(),
                config.resources.display()
            );

            let show_progress = is_terminal::is_terminal(std::io::stdout());
            let written = SnapshotFetcher::new(config.resources.clone(), show_progress)
                .fetch(config.platform, &regions)
                .await?;
            println!(
                "Wrote {} price lists to {}",
                written.len(),
                config.resources.display()
            );
        }
        Command::InstanceInfo { kind, json } => {
            let catalog = config.load_catalog().await?;
            let kind = InstanceKind::new(kind);

            let info = InstanceInfo {
                on_demand_price: catalog.price_for(&kind),
                service_fee: catalog.service_fee_for(&kind),
                attributes: catalog
                    .hardware_specs(&kind)
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                kind,
            };
            println!("{}", get_formatter(json).format_instance_info(&info));
        }
    }

    Ok(())
}
