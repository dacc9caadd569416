//! Epochal markets service entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use epochal_markets::api::{create_router, store_router, AppState};
use epochal_markets::backend::{BackendClient, MarketStore, SqliteMarketStore};
use epochal_markets::chain::SimulatedChain;
use epochal_markets::config::Config;
use epochal_markets::market::epoch::{countdown_str, epoch_period_label};
use epochal_markets::market::{compute_epoch, seed_markets, Clock, SystemClock};
use epochal_markets::metrics;
use epochal_markets::reconciler::{MarketReconciler, ReconcilerConfig};
use epochal_markets::signing::{connected_wallet, wallet_address};
use epochal_markets::sports::{SportsClient, TeamBadgeCache};
use epochal_markets::utils::shutdown_signal;

/// Epoch-scoped football prediction market service.
#[derive(Parser, Debug)]
#[command(name = "epochal-markets")]
#[command(about = "Market reconciliation, status API and persistence store for epoch markets")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON logs.
    #[arg(long, global = true, env = "JSON_LOGS")]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the market reconciler and status API (default).
    Run {
        /// HTTP server port for the status API.
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve the persistence store in-process instead of using BACKEND_URL.
        #[arg(long)]
        embedded_store: bool,

        /// Resolve markets against the in-memory contract simulator.
        #[arg(long)]
        simulate_chain: bool,
    },

    /// Serve the persistence store.
    ServeStore {
        /// HTTP server port for the store.
        #[arg(short, long)]
        port: Option<u16>,

        /// SQLite database file (overrides STORE_DB_PATH).
        #[arg(long)]
        db: Option<String>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Show the epoch state of a match (diagnostic).
    Epoch {
        /// Kick-off, unix seconds.
        #[arg(long)]
        start: i64,

        /// Evaluate at this unix time instead of now.
        #[arg(long)]
        at: Option<i64>,
    },

    /// List upcoming matches from the sports feed.
    ListMatches,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("epochal_markets=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if args.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::Epoch { start, at }) => cmd_epoch(start, at),
        Some(Command::ListMatches) => cmd_list_matches().await,
        Some(Command::ServeStore { port, db }) => cmd_serve_store(port, db).await,
        Some(Command::Run {
            port,
            embedded_store,
            simulate_chain,
        }) => cmd_run(port, embedded_store, simulate_chain).await,
        None => cmd_run(None, false, false).await,
    }
}

fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }
    Ok(config)
}

/// Check configuration validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("EPOCHAL MARKETS - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    print!("Checking wallet... ");
    match &config.wallet_private_key {
        Some(key) => match wallet_address(key) {
            Ok(addr) => {
                println!("OK");
                println!("  Wallet address: {}", addr);
            }
            Err(e) => {
                println!("FAILED");
                println!("  Error: {}", e);
                return Err(anyhow::anyhow!("Private key invalid"));
            }
        },
        None => println!("NOT CONNECTED (creation, staking and claims disabled)"),
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Backend URL: {}", config.backend_url);
    println!("  Factory: {}", config.factory_address);
    println!("  Poll Interval: {}s", config.poll_interval_secs);
    println!("  Recategorize Interval: {}s", config.recategorize_interval_secs);
    println!(
        "  Confirmation: {}s timeout, {}ms poll",
        config.confirmation_timeout_secs, config.confirmation_poll_interval_ms
    );
    println!(
        "  Max Resolution Checks: {}",
        config.max_concurrent_resolution_checks
    );
    println!("  Seed Markets: {}", config.seed_markets);
    println!("  Ports: status {} / store {}", config.port, config.store_port);
    println!("  Store Database: {}", config.store_db_path);
    println!(
        "  Logging: {} (verbose: {}, json: {})",
        config.rust_log, config.verbose, config.json_logs
    );
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Print the epoch state of a match.
fn cmd_epoch(start: i64, at: Option<i64>) -> anyhow::Result<()> {
    let now = at.unwrap_or_else(|| SystemClock.now());
    let info = compute_epoch(now, Some(start));
    let minutes = now.saturating_sub(start) as f64 / 60.0;

    println!("======================================================================");
    println!("EPOCH STATE");
    println!("======================================================================");
    println!("  Kick-off: {}", start);
    println!("  At: {} ({:+.1} min from kick-off)", now, minutes);
    match info.epoch {
        Some(epoch) => {
            println!("  Epoch: {}", epoch);
            if let Some(label) = epoch_period_label(epoch) {
                println!("  Period: {}", label);
            }
        }
        None => println!("  Epoch: none"),
    }
    println!("  Status: {}", info.status);
    println!("  Next change: {}", countdown_str(now, Some(start)));
    println!("======================================================================");

    Ok(())
}

/// List upcoming matches from the sports feed.
async fn cmd_list_matches() -> anyhow::Result<()> {
    let config = load_config()?;
    let client = SportsClient::new(&config.sports_api_url, Arc::new(TeamBadgeCache::new()))?;

    println!("======================================================================");
    println!("UPCOMING MATCHES");
    println!("======================================================================");

    let matches = client.upcoming_matches(SystemClock.now()).await;
    if matches.is_empty() {
        println!("No upcoming matches.");
    }
    for m in &matches {
        println!(
            "  [{}] {} vs {} ({}) at {}",
            m.id, m.home_team, m.away_team, m.league, m.match_time
        );
    }
    println!("======================================================================");
    println!("{} matches", matches.len());

    Ok(())
}

/// Serve the persistence store until shutdown.
async fn cmd_serve_store(port: Option<u16>, db: Option<String>) -> anyhow::Result<()> {
    let config = load_config()?;
    let path = db.unwrap_or_else(|| config.store_db_path.clone());
    let store = SqliteMarketStore::open(&path).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(config.store_port)));
    let listener = TcpListener::bind(addr).await?;
    info!(db = %path, "Market store listening on {}", addr);

    axum::serve(listener, store_router(Arc::new(store.clone())))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    info!("Market store stopped");
    Ok(())
}

/// Run the reconciler and status API until shutdown.
async fn cmd_run(
    port: Option<u16>,
    embedded_store: bool,
    simulate_chain: bool,
) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let config = load_config()?;
    let handle = metrics::install_recorder()?;

    let wallet: Option<Address> = connected_wallet(config.wallet_private_key.as_deref())?;
    match wallet {
        Some(addr) => info!(%addr, "Wallet connected"),
        None => warn!("No wallet key configured, write flows disabled"),
    }

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.cancel();
        });
    }

    let store: Arc<dyn MarketStore> = if embedded_store {
        let sqlite = Arc::new(SqliteMarketStore::open(&config.store_db_path).await?);
        let addr = SocketAddr::from(([0, 0, 0, 0], config.store_port));
        let listener = TcpListener::bind(addr).await?;
        info!(db = %config.store_db_path, "Embedded market store listening on {}", addr);

        let router = store_router(sqlite.clone());
        let stop = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(stop.cancelled_owned())
                .await
            {
                error!(error = %e, "Embedded store server failed");
            }
        });
        sqlite
    } else {
        info!(url = %config.backend_url, "Using backend store");
        Arc::new(BackendClient::new(&config.backend_url)?)
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let reconciler_config = ReconcilerConfig::from_config(&config);
    let reconciler = if simulate_chain {
        let factory = config.factory().map_err(|e| anyhow::anyhow!(e))?;
        info!(%factory, "Using simulated contract layer");
        MarketReconciler::new(
            reconciler_config,
            store,
            Arc::new(SimulatedChain::with_factory(factory)),
            clock.clone(),
        )
    } else {
        info!("No contract layer configured, on-chain resolution checks disabled");
        MarketReconciler::without_chain(reconciler_config, store, clock.clone())
    };
    if config.seed_markets {
        reconciler.seed(seed_markets(clock.now()));
    }

    let app_state = AppState::new(reconciler.clone(), clock)
        .with_wallet(wallet)
        .with_metrics(handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(config.port)));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state.clone());
    let stop = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(stop.cancelled_owned())
            .await
    });

    // First poll gates readiness; failures are retried by the timer.
    match reconciler.poll_once().await {
        Ok(changed) => info!(changed, "Initial backend poll complete"),
        Err(e) => warn!(error = %e, "Initial backend poll failed"),
    }
    app_state.set_ready(true);
    reconciler.start();

    info!("========================================");
    info!("EPOCHAL MARKETS STARTED");
    info!("========================================");
    info!("Markets tracked: {}", reconciler.snapshot().len());
    info!("Wallet: {}", wallet.map_or_else(|| "not connected".to_string(), |w| w.to_string()));
    info!("========================================");

    shutdown.cancelled().await;
    app_state.set_ready(false);
    reconciler.shutdown().await;
    if let Err(e) = server.await? {
        error!(error = %e, "HTTP server failed");
    }

    let stats = reconciler.stats();
    info!("========================================");
    info!("SHUTDOWN SUMMARY");
    info!("========================================");
    info!("Polls: {} ({} failed)", stats.polls, stats.poll_failures);
    info!("Resolution checks: {}", stats.resolution_checks);
    info!("Markets resolved: {}", stats.markets_resolved);
    info!("========================================");

    Ok(())
}
