use clap::{Parser, Subcommand};
use poem::{listener::TcpListener, Server};
use rental_common::FilterQuery;
use rental_index::config::Config;
use rental_index::graphql_client::GraphqlClient;
use rental_index::http::{app, AppContext};
use rental_index::search::search_listings;
use rental_index::sync_service::{IndexSynchronizer, SyncService};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rental-index")]
#[command(about = "Keeps the rentable-car search index in sync and queries it")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API with periodic sync in the background
    Serve,
    /// Run one sync and exit; fails if any listing could not be indexed
    Sync,
    /// Sync periodically until interrupted
    Watch,
    /// Search the index and print matching listings
    Search {
        /// Free-text query; empty matches every listing
        #[arg(long, default_value = "")]
        q: String,
        #[arg(long)]
        min_price: Option<f64>,
        #[arg(long)]
        max_price: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load .env file if it exists
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    match cli.command {
        Commands::Serve => serve_command(&config).await,
        Commands::Sync => sync_command(&config).await,
        Commands::Watch => watch_command(&config).await,
        Commands::Search {
            q,
            min_price,
            max_price,
        } => search_command(&config, q, min_price, max_price).await,
    }
}

async fn build_sync_service(config: &Config) -> anyhow::Result<(SyncService, AppIndex)> {
    let index = rental_index::connect_index(config).await?;
    let store = Arc::new(GraphqlClient::from_config(config).await?);
    let synchronizer =
        IndexSynchronizer::new(index.clone(), config.sync_strategy).with_prune(config.sync_prune);
    tracing::info!(
        "Sync strategy {:?}, prune={}",
        synchronizer.strategy(),
        config.sync_prune
    );
    Ok((
        SyncService::new(store, synchronizer, config.sync_interval),
        index,
    ))
}

type AppIndex = Arc<dyn rental_index::search_index::SearchIndex>;

async fn serve_command(config: &Config) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);
    let (sync, index) = build_sync_service(config).await?;
    let sync = Arc::new(sync);

    let sync_for_task = sync.clone();
    let sync_task = tokio::spawn(async move {
        sync_for_task.run().await;
    });

    tracing::info!("Starting rental index API on {}", addr);
    let ctx = Arc::new(AppContext { index, sync });
    let server_result = Server::new(TcpListener::bind(&addr)).run(app(ctx)).await;

    sync_task.abort();
    server_result.map_err(Into::into)
}

async fn sync_command(config: &Config) -> anyhow::Result<()> {
    let (sync, _) = build_sync_service(config).await?;
    let report = sync.sync_once().await?;
    let report = report.into_result()?;
    println!(
        "Synced {} listings, deleted {} stale",
        report.synced_count(),
        report.deleted.len()
    );
    Ok(())
}

async fn watch_command(config: &Config) -> anyhow::Result<()> {
    let (sync, _) = build_sync_service(config).await?;
    tracing::info!("Syncing every {}s", config.sync_interval.as_secs());
    tokio::select! {
        _ = sync.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping sync loop");
        }
    }
    Ok(())
}

async fn search_command(
    config: &Config,
    q: String,
    min_price: Option<f64>,
    max_price: Option<f64>,
) -> anyhow::Result<()> {
    let index = rental_index::connect_index(config).await?;
    let query = FilterQuery::new(q).with_price_range(min_price, max_price);
    let listings = search_listings(index.as_ref(), &query).await?;

    if listings.is_empty() {
        println!("No listings match.");
        return Ok(());
    }
    for listing in &listings {
        println!(
            "{:<12} {:<24} {:<16} {:>10.2}/day  qty {}",
            listing.id,
            listing.name,
            listing.manufacturer,
            listing.price_per_day,
            listing.available_quantity
        );
    }
    println!("{} listing(s)", listings.len());
    Ok(())
}
