//! Async event loop that runs a [`GameSession`] against a [`Ledger`].
//!
//! Everything happens on one task: commands, ledger completions, the clock
//! sampler and the session timers are multiplexed with `tokio::select!`.
//! The sampler only exists while a round is active and is dropped on every
//! path out of that state, including when the loop returns.

use crate::{
    clock::DeadlineSource,
    identity::IdentityProvider,
    ledger::Ledger,
    session::{
        Completion,
        Effect,
        GameSession,
        SessionSnapshot,
    },
};
use futures::{
    FutureExt,
    StreamExt,
    future::LocalBoxFuture,
    stream::FuturesUnordered,
};
use std::time::Duration;
use tokio::{
    sync::{
        mpsc,
        watch,
    },
    time::{
        self,
        Instant,
        Interval,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    info,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start(u64),
    Stop,
    ClaimAirdrop,
    Abandon,
    RefreshBalance,
    Shutdown,
}

type PendingLedgerOps = FuturesUnordered<LocalBoxFuture<'static, Completion>>;

/// Sender side for commands plus the latest published snapshot.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Returns false once the session loop has stopped.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Waits for the next published snapshot. Returns false once the loop is gone.
    pub async fn changed(&mut self) -> bool {
        self.snapshots.changed().await.is_ok()
    }

    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Option<SessionSnapshot> {
        self.snapshots
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .ok()
            .map(|snapshot| snapshot.clone())
    }
}

/// Loop side of the session channels.
pub struct SessionEndpoints {
    commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<SessionSnapshot>,
}

pub fn session_channels(initial: SessionSnapshot) -> (SessionHandle, SessionEndpoints) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(initial);
    (
        SessionHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        },
        SessionEndpoints {
            commands: command_rx,
            snapshots: snapshot_tx,
        },
    )
}

/// Runs until [`Command::Shutdown`] or until every handle is dropped, then
/// hands the session back.
pub async fn run_session<L, I, D>(
    mut session: GameSession<I, D>,
    ledger: L,
    endpoints: SessionEndpoints,
) -> GameSession<I, D>
where
    L: Ledger + Clone + 'static,
    I: IdentityProvider,
    D: DeadlineSource,
{
    let SessionEndpoints {
        mut commands,
        snapshots,
    } = endpoints;
    let tick_period = session.config().tick();
    let mut sampler: Option<(u64, Interval)> = None;
    let mut pending: PendingLedgerOps = FuturesUnordered::new();

    issue(&ledger, &mut pending, session.refresh_balance());
    snapshots.send_replace(session.snapshot());
    info!("session loop started");

    loop {
        sync_sampler(&session, &mut sampler, tick_period);
        let timer = session.next_timer();

        tokio::select! {
            biased;
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                if command == Command::Shutdown {
                    break;
                }
                let effects = apply_command(&mut session, command);
                issue(&ledger, &mut pending, effects);
            }
            Some(completion) = pending.next(), if !pending.is_empty() => {
                let effects = session.on_completion(completion, Instant::now());
                issue(&ledger, &mut pending, effects);
            }
            _ = next_tick(&mut sampler) => {
                session.on_tick(Instant::now());
            }
            _ = wait_until(timer) => {
                session.on_timer(Instant::now());
            }
        }

        snapshots.send_replace(session.snapshot());
    }

    if sampler.take().is_some() {
        debug!("sampler dropped on teardown");
    }
    info!(in_flight = pending.len(), "session loop stopped");
    session
}

fn apply_command<I, D>(session: &mut GameSession<I, D>, command: Command) -> Vec<Effect>
where
    I: IdentityProvider,
    D: DeadlineSource,
{
    let now = Instant::now();
    // rejections are recorded on the session
    let result = match command {
        Command::Start(wager) => session.start(wager, now),
        Command::Stop => session.stop(now),
        Command::ClaimAirdrop => session.claim_airdrop(),
        Command::Abandon => session.abandon_commit(),
        Command::RefreshBalance => Ok(session.refresh_balance()),
        Command::Shutdown => Ok(Vec::new()),
    };
    result.unwrap_or_default()
}

fn issue<L>(ledger: &L, pending: &mut PendingLedgerOps, effects: Vec<Effect>)
where
    L: Ledger + Clone + 'static,
{
    for effect in effects {
        let ledger = ledger.clone();
        let op = match effect {
            Effect::Debit { ticket, amount } => async move {
                let result = ledger.debit(amount).await;
                Completion::Debit { ticket, result }
            }
            .boxed_local(),
            Effect::Credit { ticket, amount } => async move {
                let result = ledger.credit(amount).await;
                Completion::Credit { ticket, result }
            }
            .boxed_local(),
            Effect::ClaimAirdrop => async move {
                let result = ledger.claim_airdrop().await;
                Completion::Airdrop { result }
            }
            .boxed_local(),
            Effect::RefreshBalance { account, seq } => async move {
                let result = ledger.query_balance(&account).await;
                Completion::Balance { seq, result }
            }
            .boxed_local(),
        };
        pending.push(op);
    }
}

/// Keeps the sampler armed exactly while the session has an active round.
fn sync_sampler<I, D>(
    session: &GameSession<I, D>,
    sampler: &mut Option<(u64, Interval)>,
    period: Duration,
) where
    I: IdentityProvider,
    D: DeadlineSource,
{
    if !session.is_active() {
        *sampler = None;
        return;
    }
    let generation = session.generation();
    if sampler.as_ref().is_some_and(|(armed_for, _)| *armed_for == generation) {
        return;
    }
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    *sampler = Some((generation, interval));
}

async fn next_tick(sampler: &mut Option<(u64, Interval)>) -> Instant {
    match sampler {
        Some((_, interval)) => interval.tick().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
