use clap::{
    ArgGroup,
    Parser,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use cookie_crash::{
    GameConfig,
    GameError,
    units::parse_amount,
};
use std::{
    path::PathBuf,
    time::Duration,
};

mod client;
mod ui;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Cash out before the cookie explodes",
    long_about = None,
    group(ArgGroup::new("ledger").args(["demo", "local"]))
)]
struct Args {
    /// Play against an in-memory ledger (default).
    #[arg(long)]
    demo: bool,

    /// Launch a local Fuel node and play against its wallets.
    #[arg(long)]
    local: bool,

    /// JSON game config; `~` is expanded.
    #[arg(short, long)]
    config: Option<String>,

    /// Starting wager in CKIE, e.g. `0.5`.
    #[arg(short, long, value_parser = parse_wager)]
    wager: Option<u64>,

    /// Seed for the crash deadline draw.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "~/.cookie-crash/logs")]
    log_dir: String,

    /// Simulated latency of every in-memory ledger call.
    #[arg(long, default_value_t = 0)]
    ledger_latency_ms: u64,
}

fn parse_wager(raw: &str) -> Result<u64, GameError> {
    parse_amount(raw)
}

fn app_config(args: Args) -> Result<client::AppConfig> {
    let mut game = match &args.config {
        Some(path) => GameConfig::load(path)
            .wrap_err_with(|| format!("loading config from {path}"))?,
        None => GameConfig::default(),
    };
    if args.seed.is_some() {
        game.deadline_seed = args.seed;
    }
    let ledger = if args.local {
        client::LedgerMode::Local
    } else {
        client::LedgerMode::Demo
    };
    let wager = args.wager.unwrap_or(game.min_wager);
    Ok(client::AppConfig {
        wager,
        ledger,
        log_dir: PathBuf::from(shellexpand::tilde(&args.log_dir).into_owned()),
        ledger_latency: Duration::from_millis(args.ledger_latency_ms),
        game,
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let config = app_config(Args::parse())?;
    let _log_guard = client::init_tracing(&config.log_dir)?;
    tracing::info!(ledger = ?config.ledger, "starting cookie-crash");
    client::run_app(config).await
}
