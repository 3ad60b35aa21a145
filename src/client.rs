use crate::ui::{
    self,
    UserEvent,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use cookie_crash::{
    Command,
    GameConfig,
    GameSession,
    InMemoryLedger,
    Ledger,
    SessionHandle,
    clock::RandomDeadlines,
    fuel_ledger::FuelLedger,
    identity::{
        Account,
        StaticIdentity,
    },
    run_session,
    session_channels,
};
use crossterm::event::EventStream;
use futures::StreamExt;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use tracing::{
    info,
    warn,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

const DEMO_ADDRESS: &str =
    "0x7d6f0a3e1c52b9148e0f2ad5c3b6e91f04a8d27c5e3b10f96a4c8d2e71b5f3a9";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LedgerMode {
    Demo,
    Local,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub game: GameConfig,
    pub ledger: LedgerMode,
    pub wager: u64,
    pub log_dir: PathBuf,
    pub ledger_latency: Duration,
}

/// Logs go to a daily file; the terminal belongs to the UI.
pub fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("creating log dir {}", log_dir.display()))?;
    let (writer, guard) =
        tracing_appender::non_blocking(rolling::daily(log_dir, "cookie-crash.log"));
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| eyre!("installing tracing subscriber failed: {e}"))?;
    Ok(guard)
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    match config.ledger {
        LedgerMode::Demo => {
            let account = Account::new(DEMO_ADDRESS);
            let ledger = InMemoryLedger::new(
                account.clone(),
                config.game.demo_balance,
                config.game.airdrop_amount,
            )
            .with_latency(config.ledger_latency);
            run_with(config, ledger, StaticIdentity::connected(account)).await
        }
        LedgerMode::Local => {
            if !config.ledger_latency.is_zero() {
                warn!("--ledger-latency-ms only applies to the in-memory ledger");
            }
            let ledger = FuelLedger::launch_local(
                config.game.local_funding(),
                config.game.airdrop_amount,
            )
            .await
            .wrap_err("starting local fuel node failed")?;
            let identity = StaticIdentity::connected(ledger.identity());
            run_with(config, ledger, identity).await
        }
    }
}

async fn run_with<L>(config: AppConfig, ledger: L, identity: StaticIdentity) -> Result<()>
where
    L: Ledger + Clone + 'static,
{
    let deadlines = RandomDeadlines::new(config.game.deadline_seed);
    let session = GameSession::new(config.game.clone(), identity, deadlines);
    let (handle, endpoints) = session_channels(session.snapshot());
    let mut ui_state = ui::UiState::new(config.wager, config.game.min_wager);

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let driver = run_session(session, ledger, endpoints);
    let (_session, res) = tokio::join!(driver, run_loop(handle, &mut ui_state));
    ui::terminal_exit()?;
    res
}

/// Always shuts the session loop down, even when the UI fails.
async fn run_loop(handle: SessionHandle, ui_state: &mut ui::UiState) -> Result<()> {
    let shutdown = handle.clone();
    let res = ui_loop(handle, ui_state).await;
    shutdown.send(Command::Shutdown);
    res
}

async fn ui_loop(mut handle: SessionHandle, ui_state: &mut ui::UiState) -> Result<()> {
    let mut input = EventStream::new();
    let mut snapshot = handle.snapshot();
    ui::draw(ui_state, &snapshot)?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => { break; }
            changed = handle.changed() => {
                if !changed {
                    warn!("session loop stopped before the UI");
                    break;
                }
                snapshot = handle.snapshot();
                ui::draw(ui_state, &snapshot).wrap_err("draw after session update failed")?;
            }
            event = input.next() => {
                let Some(event) = event else { break; };
                let event = event.wrap_err("reading terminal input failed")?;
                let Some(user_event) = ui::interpret_event(ui_state, &event) else {
                    continue;
                };
                let command = match user_event {
                    UserEvent::Quit => break,
                    UserEvent::Start => Command::Start(ui_state.wager()),
                    UserEvent::Stop => Command::Stop,
                    UserEvent::ClaimAirdrop => Command::ClaimAirdrop,
                    UserEvent::Abandon => Command::Abandon,
                    UserEvent::Refresh => Command::RefreshBalance,
                    UserEvent::Redraw => {
                        // wager changed, nothing for the session
                        ui::draw(ui_state, &snapshot)?;
                        continue;
                    }
                };
                if !handle.send(command) {
                    break;
                }
            }
        }
    }
    Ok(())
}
