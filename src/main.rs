//! Riptide CLI entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use riptide_trader::adapters::{DexScreenerClient, PaperExecution};
use riptide_trader::application::Orchestrator;
use riptide_trader::config::{load_config, Config, DEFAULT_CONFIG_PATH};
use riptide_trader::domain::{AlertSink, PortfolioStore};
use riptide_trader::ports::{ExecutionPort, MarketDataPort, PerpExecutionPort};

#[derive(Parser)]
#[command(name = "riptide", about = "Momentum / mean-reversion paper trading engine")]
struct Cli {
    /// Verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the trading loop until interrupted
    Run {
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Print the portfolio snapshot from the saved state
    Status {
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Validate the configuration and exit
    CheckConfig {
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

fn init_logging(verbose: bool, config: &Config) {
    let default = if verbose {
        "riptide_trader=debug,riptide=debug".to_string()
    } else {
        format!("riptide_trader={0},riptide={0}", config.logging.level)
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config } => {
            let config = load_config(&config).context("loading configuration")?;
            init_logging(cli.verbose, &config);
            run(config).await
        }
        Command::Status { config } => {
            let config = load_config(&config).context("loading configuration")?;
            init_logging(cli.verbose, &config);
            status(config)
        }
        Command::CheckConfig { config } => {
            let loaded = load_config(&config).context("loading configuration")?;
            println!("config ok: {}", config.display());
            println!("{}", toml::to_string_pretty(&loaded)?);
            Ok(())
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let market = Arc::new(
        DexScreenerClient::default_client(config.strategy.search_queries.clone())
            .context("building market data client")?,
    );
    let paper = Arc::new(PaperExecution::new(
        Arc::clone(&market) as Arc<dyn MarketDataPort>,
        config.execution.slippage_bps,
    ));

    let store = PortfolioStore::load_or_default(
        PathBuf::from(&config.portfolio.state_file),
        config.portfolio.initial_capital_usdc,
    );
    let alerts = AlertSink::new(PathBuf::from(&config.portfolio.alerts_file));

    let orchestrator = Orchestrator::new(
        config,
        market,
        Arc::clone(&paper) as Arc<dyn ExecutionPort>,
        paper as Arc<dyn PerpExecutionPort>,
        store,
        alerts,
    );

    let shutdown = orchestrator.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            shutdown.notify_one();
        }
    });

    orchestrator.run().await;
    Ok(())
}

fn status(config: Config) -> Result<()> {
    let store = PortfolioStore::load_or_default(
        PathBuf::from(&config.portfolio.state_file),
        config.portfolio.initial_capital_usdc,
    );
    let snapshot = store.snapshot();

    println!("capital:       ${:.2}", snapshot.capital_usdc);
    println!("initial:       ${:.2}", snapshot.initial_capital);
    println!("open:          {}", snapshot.open_positions);
    println!(
        "realized pnl:  ${:+.2} ({:+.2}%)",
        snapshot.total_pnl, snapshot.pnl_pct
    );
    println!(
        "closed trades: {} (win rate {:.1}%)",
        snapshot.closed_trades, snapshot.win_rate_pct
    );
    println!("kill switch:   {}", snapshot.kill_switch_triggered);

    let grid = store.grid();
    if !grid.tokens.is_empty() {
        println!(
            "grid:          {} tokens, {} trades, pnl ${:+.2}",
            grid.tokens.len(),
            grid.total_trades,
            grid.total_pnl
        );
    }

    for position in &store.portfolio().positions {
        println!("  open {} ({})", position.id(), position.mint());
    }
    Ok(())
}
