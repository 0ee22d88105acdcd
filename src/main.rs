//! Focus Fee CLI
//!
//! Charge yourself for getting distracted.

use clap::{Parser, Subcommand};
use focus_fee::{
    collector::{check_permission, Collector},
    config::Config,
    core::normalize_blacklist,
    settings::{JsonFileStore, Settings, SettingsStore},
    settlement::{PaymentClient, PaymentConfig, SettlementHandoff, SettlementResult},
    stats::{create_shared_stats_with_persistence, format_cents, SharedUsageStats, UsageStats},
    tracker::{FeeTracker, TrackerConfig},
    FEE_DISCLOSURE, VERSION,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "focus-fee")]
#[command(version = VERSION)]
#[command(about = "Charge yourself a fee for every distracted minute", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a focus session in the foreground
    Run {
        /// Comma-separated blacklist (also saved as the new default)
        #[arg(long)]
        blacklist: Option<String>,

        /// Fee in dollars per distracted minute
        #[arg(long)]
        fee: Option<f64>,

        /// Solana address receiving the fee
        #[arg(long)]
        address: Option<String>,

        /// Report the total without paying it
        #[arg(long)]
        no_settle: bool,
    },

    /// Pause a running session
    Pause,

    /// Resume a paused session
    Resume,

    /// Show configuration and lifetime totals
    Status,

    /// Show or change the blacklist
    Blacklist {
        #[command(subcommand)]
        action: BlacklistAction,
    },

    /// Pay an amount manually, e.g. after a failed settlement
    Settle {
        /// Amount in cents
        #[arg(long)]
        cents: u64,

        /// Solana address (defaults to the configured wallet)
        #[arg(long)]
        address: Option<String>,
    },

    /// Show configuration
    Config,

    /// Run the payment endpoint
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on
        #[arg(long, env = "PORT", default_value = "3000")]
        port: u16,

        /// Solana RPC URL used for devnet airdrops
        #[arg(long, env = "SOLANA_RPC_URL", default_value = focus_fee::payment::DEVNET_RPC_URL)]
        rpc_url: String,

        /// Fixed SOL price in USD
        #[arg(long, env = "MOCK_SOL_PRICE_USD")]
        sol_price_usd: Option<f64>,

        /// Fetch the SOL price from CoinGecko instead of using a fixed one
        #[arg(long, conflicts_with = "sol_price_usd")]
        live_price: bool,

        /// Return simulated signatures instead of transferring
        #[arg(long)]
        simulate: bool,
    },

    /// Display the billing disclosure
    Disclosure,
}

#[derive(Subcommand)]
enum BlacklistAction {
    /// Print the saved blacklist
    Show,
    /// Replace the saved blacklist
    Set {
        /// Comma-separated terms, e.g. "youtube,reddit"
        terms: String,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            blacklist,
            fee,
            address,
            no_settle,
        } => {
            cmd_run(blacklist, fee, address, no_settle);
        }
        Commands::Pause => {
            cmd_pause();
        }
        Commands::Resume => {
            cmd_resume();
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Blacklist { action } => {
            cmd_blacklist(action);
        }
        Commands::Settle { cents, address } => {
            cmd_settle(cents, address);
        }
        Commands::Config => {
            cmd_config();
        }
        #[cfg(feature = "server")]
        Commands::Serve {
            port,
            rpc_url,
            sol_price_usd,
            live_price,
            simulate,
        } => {
            cmd_serve(port, rpc_url, sol_price_usd, live_price, simulate);
        }
        Commands::Disclosure => {
            cmd_disclosure();
        }
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("focus_fee=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {e}");
            std::process::exit(1);
        }
    }
}

fn parse_terms(csv: &str) -> Vec<String> {
    normalize_blacklist(csv.split(','))
}

fn cmd_run(blacklist: Option<String>, fee: Option<f64>, address: Option<String>, no_settle: bool) {
    println!("Focus Fee v{VERSION}");
    println!();

    if !check_permission() {
        eprintln!("Error: Screen Recording permission not granted.");
        eprintln!();
        eprintln!("Window titles are only visible with this permission:");
        eprintln!("1. Open System Settings > Privacy & Security > Screen Recording");
        eprintln!("2. Add this application to the allowed list");
        eprintln!("3. Restart the application");
        std::process::exit(1);
    }

    let config = Config::load().unwrap_or_default();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let address = address.or_else(|| config.wallet().map(str::to_string));
    let fee = fee.unwrap_or(config.fee_per_minute);

    runtime().block_on(run_session(config, blacklist, fee, address, no_settle));
}

async fn run_session(
    config: Config,
    blacklist: Option<String>,
    fee: f64,
    address: Option<String>,
    no_settle: bool,
) {
    let stats = create_shared_stats_with_persistence(config.stats_path());
    let tracker = FeeTracker::new(
        Arc::new(Collector::new()),
        Arc::new(JsonFileStore::default_location()),
        TrackerConfig::from(&config),
    )
    .with_stats(stats.clone());

    let terms = match blacklist {
        Some(csv) => tracker.set_blacklist(parse_terms(&csv)).await.blacklist,
        None => tracker.get_settings().await.blacklist,
    };

    println!("Starting session...");
    println!("  Blacklist: {}", terms.join(", "));
    println!("  Fee: ${fee:.2} per distracted minute");
    println!("  Poll interval: {}ms", config.poll_interval.as_millis());
    match (&address, no_settle) {
        (_, true) => println!("  Settlement: disabled"),
        (Some(address), false) => println!("  Settlement: {} to {address}", config.payment_url),
        (None, false) => println!("  Settlement: no wallet configured"),
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    tracker.start(terms, fee).await;
    let poller = tracker.spawn();
    let printer = tokio::spawn(print_ticks(tracker.clone()));

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    // Support pause/resume from another process by polling the config file.
    let mut paused = config.paused;
    if paused {
        tracker.pause().await;
        println!("Session is paused.");
        println!("Run `focus-fee resume` to start charging.");
        println!();
    }
    let mut last_config_check = std::time::Instant::now();

    while running.load(Ordering::SeqCst) {
        if last_config_check.elapsed() >= Duration::from_secs(1) {
            if let Ok(cfg) = Config::load() {
                if cfg.paused != paused {
                    paused = cfg.paused;
                    if paused {
                        println!();
                        println!("Pausing session...");
                        tracker.pause().await;
                    } else {
                        println!();
                        println!("Resuming session...");
                        tracker.resume().await;
                    }
                }
            }
            last_config_check = std::time::Instant::now();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    println!();
    println!("Stopping session...");
    tracker.shutdown();
    let cents_owed = tracker.stop().await.cents_owed;
    printer.abort();
    let _ = poller.await;

    println!("Total owed: {}", format_cents(cents_owed));

    if !no_settle {
        settle(&config, &stats, cents_owed, address.as_deref()).await;
    }

    println!();
    println!("{}", stats.summary());
}

/// Print a line whenever the distraction state flips.
async fn print_ticks(tracker: FeeTracker) {
    let mut rx = tracker.subscribe();
    let mut last: Option<bool> = None;

    loop {
        match rx.recv().await {
            Ok(update) => {
                if last != Some(update.distracted) {
                    let now = chrono::Local::now().format("%H:%M:%S");
                    let title = if update.active_title.is_empty() {
                        "(no window)"
                    } else {
                        update.active_title.as_str()
                    };
                    if update.distracted {
                        println!(
                            "[{now}] Distracted by \"{title}\" | owed {}",
                            format_cents(update.cents_owed)
                        );
                    } else {
                        println!(
                            "[{now}] Focused on \"{title}\" | owed {}",
                            format_cents(update.cents_owed)
                        );
                    }
                    last = Some(update.distracted);
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn settle(config: &Config, stats: &SharedUsageStats, cents: u64, address: Option<&str>) {
    let handoff = match SettlementHandoff::from_url(&config.payment_url) {
        Ok(handoff) => handoff,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    match handoff.settle(cents, address).await {
        Ok(result) => {
            print_settlement(&result);
            if result.is_settled() {
                stats.record_settled(result.amount_cents);
                if let Err(e) = stats.save() {
                    eprintln!("Warning: Could not save usage stats: {e}");
                }
            }
        }
        Err(e) => {
            eprintln!("Settlement failed: {e}");
            eprintln!(
                "Retry with: focus-fee settle --cents {cents}{}",
                address.map(|a| format!(" --address {a}")).unwrap_or_default()
            );
        }
    }
}

fn print_settlement(result: &SettlementResult) {
    match (&result.transaction_id, result.destination_address.is_empty()) {
        (Some(sig), _) => {
            println!(
                "Settled {} to {}",
                format_cents(result.amount_cents),
                result.destination_address
            );
            println!("  Transaction: {sig}");
            if let Some(url) = &result.explorer_url {
                println!("  Explorer: {url}");
            }
        }
        (None, true) => {
            println!("No wallet configured; nothing was sent.");
            println!("Set one with `--address` or `wallet_address` in {:?}", Config::config_path());
        }
        (None, false) => println!("Nothing owed; nothing was sent."),
    }
}

fn cmd_pause() {
    let mut config = Config::load().unwrap_or_default();
    config.paused = true;
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    println!("Session paused. Use 'focus-fee resume' to continue.");
}

fn cmd_resume() {
    let mut config = Config::load().unwrap_or_default();
    config.paused = false;
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    println!("Session resumed.");
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();
    let settings = JsonFileStore::default_location().load_or_default();

    println!("Focus Fee Status");
    println!("================");
    println!();

    let has_permission = check_permission();
    println!(
        "Screen Recording Permission: {}",
        if has_permission {
            "Granted ✓"
        } else {
            "Not Granted ✗"
        }
    );
    println!();

    println!("Configuration:");
    println!("  Blacklist: {}", settings.blacklist.join(", "));
    println!("  Fee: ${:.2} per minute", config.fee_per_minute);
    println!("  Wallet: {}", config.wallet().unwrap_or("(not set)"));
    println!("  Payment endpoint: {}", config.payment_url);
    println!("  Paused: {}", config.paused);
    println!();

    let reachable = match PaymentClient::new(PaymentConfig::new(&config.payment_url)) {
        Ok(client) => runtime()
            .block_on(client.test_connection())
            .unwrap_or(false),
        Err(_) => false,
    };
    println!(
        "Payment endpoint health ({}): {}",
        PaymentConfig::new(&config.payment_url).health_url(),
        if reachable { "reachable ✓" } else { "unreachable ✗" }
    );
    println!();

    let stats_path = config.stats_path();
    if stats_path.exists() {
        println!("{}", UsageStats::with_persistence(stats_path).summary());
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_blacklist(action: BlacklistAction) {
    let store = JsonFileStore::default_location();

    match action {
        BlacklistAction::Show => {
            let settings = store.load_or_default();
            for term in &settings.blacklist {
                println!("{term}");
            }
        }
        BlacklistAction::Set { terms } => {
            let settings = Settings::new(parse_terms(&terms));
            if let Err(e) = store.save(&settings) {
                eprintln!("Error saving blacklist: {e}");
                std::process::exit(1);
            }
            println!("Blacklist set to: {}", settings.blacklist.join(", "));
        }
    }
}

fn cmd_settle(cents: u64, address: Option<String>) {
    let config = Config::load().unwrap_or_default();
    let address = address.or_else(|| config.wallet().map(str::to_string));
    if address.is_none() {
        eprintln!("Error: No address given and no wallet configured.");
        std::process::exit(1);
    }

    let stats = create_shared_stats_with_persistence(config.stats_path());
    runtime().block_on(settle(&config, &stats, cents, address.as_deref()));
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!("Settings file: {:?}", Config::settings_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

#[cfg(feature = "server")]
fn cmd_serve(
    port: u16,
    rpc_url: String,
    sol_price_usd: Option<f64>,
    live_price: bool,
    simulate: bool,
) {
    use focus_fee::payment::{
        DevnetAirdrop, PriceSource, SimulatedTransfer, TransferBackend, DEFAULT_SOL_PRICE_USD,
    };
    use focus_fee::server::{run, ServerConfig};

    let price = if live_price {
        PriceSource::CoinGecko
    } else {
        PriceSource::Fixed(sol_price_usd.unwrap_or(DEFAULT_SOL_PRICE_USD))
    };

    let backend: Arc<dyn TransferBackend> = if simulate {
        Arc::new(SimulatedTransfer)
    } else {
        match reqwest::Client::builder().build() {
            Ok(client) => Arc::new(DevnetAirdrop::new(rpc_url.as_str(), client)),
            Err(e) => {
                eprintln!("Error: Could not create RPC client: {e}");
                std::process::exit(1);
            }
        }
    };

    println!("Focus Fee payment endpoint v{VERSION}");
    println!("  Price: {price:?}");
    if simulate {
        println!("  Transfers: simulated");
    } else {
        println!("  Transfers: devnet airdrop via {rpc_url}");
    }

    runtime().block_on(async move {
        match run(ServerConfig::new(port, price, Some(backend))).await {
            Ok((addr, shutdown_tx)) => {
                println!("API running at http://{addr}");
                println!("  POST /api/invest");
                println!();
                println!("Press Ctrl+C to stop");

                let _ = tokio::signal::ctrl_c().await;
                let _ = shutdown_tx.send(());
            }
            Err(e) => {
                eprintln!("Error: Could not start server on port {port}: {e}");
                std::process::exit(1);
            }
        }
    });
}

fn cmd_disclosure() {
    println!("{FEE_DISCLOSURE}");
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
