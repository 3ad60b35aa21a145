//! Bet settlement coordinator.
//!
//! `GameSession` is a synchronous state machine. Every transition takes the
//! current instant and returns the ledger work it wants done as [`Effect`]s;
//! the async driver executes them and feeds the results back as
//! [`Completion`]s. Each round-bound effect carries a [`Ticket`] with the
//! session generation, so a completion that arrives after its round was reset
//! cannot touch a newer round.

use crate::{
    balance::BalanceView,
    clock::{
        ClockSample,
        CrashClock,
        DeadlineSource,
    },
    config::GameConfig,
    error::GameError,
    identity::{
        Account,
        IdentityProvider,
    },
    ledger::LedgerError,
    units::{
        format_amount,
        format_multiplier,
        payout_nanos,
    },
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{
    debug,
    error,
    info,
    warn,
};


const ERROR_HISTORY_DEPTH: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

/// Ledger work requested by a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Debit { ticket: Ticket, amount: u64 },
    Credit { ticket: Ticket, amount: u64 },
    ClaimAirdrop,
    RefreshBalance { account: Account, seq: u64 },
}

/// Result of an [`Effect`], delivered exactly once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    Debit {
        ticket: Ticket,
        result: Result<(), LedgerError>,
    },
    Credit {
        ticket: Ticket,
        result: Result<(), LedgerError>,
    },
    Airdrop {
        result: Result<(), LedgerError>,
    },
    Balance {
        seq: u64,
        result: Result<u64, LedgerError>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Outcome {
    Pending,
    CashedOut { multiplier: f64, payout: u64 },
    Crashed { multiplier: f64 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreditStatus {
    /// Crashed rounds owe nothing.
    NotOwed,
    Pending,
    Confirmed,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Round {
    wager: u64,
    clock: CrashClock,
    multiplier: f64,
    outcome: Outcome,
}

impl Round {
    fn new(wager: u64, clock: CrashClock) -> Self {
        Self {
            wager,
            clock,
            multiplier: 1.0,
            outcome: Outcome::Pending,
        }
    }

    pub fn wager(&self) -> u64 {
        self.wager
    }

    pub fn started_at(&self) -> Instant {
        self.clock.started_at()
    }

    pub fn deadline(&self) -> Duration {
        self.clock.deadline()
    }

    /// Last sampled value while running, the final value once settled.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Phase {
    Idle,
    Committing {
        ticket: Ticket,
        wager: u64,
        issued_at: Instant,
        overdue: bool,
    },
    Active {
        ticket: Ticket,
        round: Round,
    },
    Settling {
        ticket: Ticket,
        round: Round,
        credit: CreditStatus,
        until: Instant,
    },
}

/// Externally visible phase of the session.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    Idle,
    Committing { overdue: bool },
    Active,
    Settling { outcome: Outcome, credit: CreditStatus },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub multiplier: f64,
    pub wager: Option<u64>,
    pub balance: Option<u64>,
    pub account: Option<Account>,
    pub claim_pending: bool,
    pub status: String,
    pub errors: Vec<String>,
}

pub struct GameSession<I, D> {
    config: GameConfig,
    identity: I,
    deadlines: D,
    phase: Phase,
    generation: u64,
    balance: BalanceView,
    claim_pending: bool,
    status: String,
    errors: Vec<String>,
    last_error: Option<GameError>,
}

impl<I: IdentityProvider, D: DeadlineSource> GameSession<I, D> {
    pub fn new(config: GameConfig, identity: I, deadlines: D) -> Self {
        Self {
            config,
            identity,
            deadlines,
            phase: Phase::Idle,
            generation: 0,
            balance: BalanceView::default(),
            claim_pending: false,
            status: String::from("Ready"),
            errors: Vec::new(),
            last_error: None,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active { .. })
    }

    pub fn round(&self) -> Option<&Round> {
        match &self.phase {
            Phase::Active { round, .. } | Phase::Settling { round, .. } => Some(round),
            Phase::Idle | Phase::Committing { .. } => None,
        }
    }

    pub fn state(&self) -> SessionState {
        match &self.phase {
            Phase::Idle => SessionState::Idle,
            Phase::Committing { overdue, .. } => SessionState::Committing {
                overdue: *overdue,
            },
            Phase::Active { .. } => SessionState::Active,
            Phase::Settling { round, credit, .. } => SessionState::Settling {
                outcome: round.outcome,
                credit: credit.clone(),
            },
        }
    }

    pub fn balance(&self) -> Option<u64> {
        self.balance.cached()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn last_error(&self) -> Option<&GameError> {
        self.last_error.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let wager = match &self.phase {
            Phase::Idle => None,
            Phase::Committing { wager, .. } => Some(*wager),
            Phase::Active { round, .. } | Phase::Settling { round, .. } => {
                Some(round.wager)
            }
        };
        SessionSnapshot {
            state: self.state(),
            multiplier: self.round().map_or(1.0, Round::multiplier),
            wager,
            balance: self.balance.cached(),
            account: self.identity.current_account(),
            claim_pending: self.claim_pending,
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }

    /// The next instant at which [`Self::on_timer`] has work to do.
    pub fn next_timer(&self) -> Option<Instant> {
        match &self.phase {
            Phase::Committing {
                issued_at,
                overdue: false,
                ..
            } => Some(*issued_at + self.config.ledger_timeout()),
            Phase::Settling { until, .. } => Some(*until),
            _ => None,
        }
    }

    pub fn refresh_balance(&mut self) -> Vec<Effect> {
        let Some(account) = self.identity.current_account() else {
            return Vec::new();
        };
        let seq = self.balance.begin_refresh();
        vec![Effect::RefreshBalance { account, seq }]
    }

    /// `idle -> committing`: validates the wager and asks for the debit.
    pub fn start(&mut self, wager: u64, now: Instant) -> Result<Vec<Effect>, GameError> {
        if !matches!(self.phase, Phase::Idle) {
            return self.reject(GameError::RoundInProgress);
        }
        let Some(account) = self.identity.current_account() else {
            return self.reject(GameError::NoIdentity);
        };
        let minimum = self.config.min_wager;
        if wager < minimum {
            return self.reject(GameError::BelowMinimumWager { wager, minimum });
        }
        let balance = self.balance.cached().unwrap_or(0);
        if wager > balance {
            return self.reject(GameError::InsufficientBalance { wager, balance });
        }

        self.generation += 1;
        let ticket = Ticket {
            generation: self.generation,
        };
        self.phase = Phase::Committing {
            ticket,
            wager,
            issued_at: now,
            overdue: false,
        };
        info!(generation = self.generation, wager, %account, "committing wager");
        self.set_status(format!("Committing wager of {}...", format_amount(wager)));
        Ok(vec![Effect::Debit {
            ticket,
            amount: wager,
        }])
    }

    /// `active -> settling`: cash out at the clock's multiplier for `now`.
    ///
    /// If the deadline has already passed the round crashes instead and no
    /// credit is issued.
    pub fn stop(&mut self, now: Instant) -> Result<Vec<Effect>, GameError> {
        let (ticket, sample) = match &self.phase {
            Phase::Active { ticket, round } => (*ticket, round.clock.stop(now)),
            Phase::Settling { .. } => {
                debug!("stop ignored, round already settled");
                return Ok(Vec::new());
            }
            Phase::Idle | Phase::Committing { .. } => {
                return self.reject(GameError::NotActive);
            }
        };
        match sample {
            ClockSample::Crashed(multiplier) => {
                self.crash(multiplier, now);
                Ok(Vec::new())
            }
            ClockSample::Running(multiplier) => Ok(self.cash_out(ticket, multiplier, now)),
        }
    }

    /// Periodic clock sample while a round is live.
    pub fn on_tick(&mut self, now: Instant) {
        let Phase::Active { round, .. } = &mut self.phase else {
            return;
        };
        match round.clock.sample(now) {
            ClockSample::Running(multiplier) => round.multiplier = multiplier,
            ClockSample::Crashed(multiplier) => self.crash(multiplier, now),
        }
    }

    pub fn on_timer(&mut self, now: Instant) {
        let timeout = self.config.ledger_timeout();
        match &mut self.phase {
            Phase::Committing {
                issued_at, overdue, ..
            } if !*overdue && now >= *issued_at + timeout => {
                *overdue = true;
                warn!(?timeout, "wager debit still unconfirmed");
                self.push_error(format!(
                    "Wager debit unconfirmed after {}s; keep waiting or abandon",
                    timeout.as_secs()
                ));
            }
            Phase::Settling { until, credit, .. } if now >= *until => {
                if *credit == CreditStatus::Pending {
                    warn!("credit still pending when round reset");
                }
                self.generation += 1;
                self.phase = Phase::Idle;
                info!(generation = self.generation, "round reset");
                self.set_status("Ready for the next round");
            }
            _ => {}
        }
    }

    /// Give up on a debit that never confirmed. A late confirmation is
    /// ignored and the wager is lost if it lands.
    pub fn abandon_commit(&mut self) -> Result<Vec<Effect>, GameError> {
        if !matches!(self.phase, Phase::Committing { overdue: true, .. }) {
            return self.reject(GameError::NotOverdue);
        }
        self.generation += 1;
        self.phase = Phase::Idle;
        warn!(generation = self.generation, "abandoned unconfirmed wager");
        self.push_error(
            "Abandoned unconfirmed wager; if the debit lands later it is not refunded",
        );
        Ok(self.refresh_balance())
    }

    pub fn claim_airdrop(&mut self) -> Result<Vec<Effect>, GameError> {
        if self.identity.current_account().is_none() {
            return self.reject(GameError::NoIdentity);
        }
        if self.claim_pending {
            return self.reject(GameError::ClaimInProgress);
        }
        self.claim_pending = true;
        self.set_status("Claiming airdrop...");
        Ok(vec![Effect::ClaimAirdrop])
    }

    pub fn on_completion(&mut self, completion: Completion, now: Instant) -> Vec<Effect> {
        match completion {
            Completion::Debit { ticket, result } => self.on_debit(ticket, result, now),
            Completion::Credit { ticket, result } => self.on_credit(ticket, result),
            Completion::Airdrop { result } => self.on_airdrop(result),
            Completion::Balance { seq, result } => {
                match result {
                    Ok(balance) => {
                        if !self.balance.apply(seq, balance) {
                            debug!(seq, "dropped out-of-order balance refresh");
                        }
                    }
                    Err(err) => {
                        self.push_error(format!("Balance refresh failed: {err}"));
                    }
                }
                Vec::new()
            }
        }
    }

    fn on_debit(
        &mut self,
        ticket: Ticket,
        result: Result<(), LedgerError>,
        now: Instant,
    ) -> Vec<Effect> {
        let wager = match &self.phase {
            Phase::Committing {
                ticket: expected,
                wager,
                ..
            } if *expected == ticket => *wager,
            _ => {
                debug!(generation = ticket.generation, "stale debit completion");
                if result.is_ok() {
                    self.push_error("A debit for an abandoned wager confirmed late");
                    return self.refresh_balance();
                }
                return Vec::new();
            }
        };

        match result {
            Ok(()) => {
                let deadline = self.deadlines.draw(self.config.deadline_window);
                let round = Round::new(wager, CrashClock::new(now, deadline));
                self.phase = Phase::Active { ticket, round };
                info!(generation = ticket.generation, wager, "round started");
                self.set_status("Cookie is baking... cash out before it explodes!");
                self.refresh_balance()
            }
            Err(err) => {
                self.generation += 1;
                self.phase = Phase::Idle;
                let err = GameError::from(err);
                error!(%err, "wager debit failed");
                self.record(format!("Wager failed: {err}"), err);
                Vec::new()
            }
        }
    }

    fn on_credit(&mut self, ticket: Ticket, result: Result<(), LedgerError>) -> Vec<Effect> {
        let current = match &self.phase {
            Phase::Settling {
                ticket: expected,
                credit: CreditStatus::Pending,
                ..
            } => *expected == ticket,
            _ => false,
        };
        if !current {
            return self.on_late_credit(ticket, result);
        }
        let Phase::Settling { credit, .. } = &mut self.phase else {
            return Vec::new();
        };
        match result {
            Ok(()) => {
                *credit = CreditStatus::Confirmed;
                info!(generation = ticket.generation, "credit confirmed");
            }
            Err(err) => {
                *credit = CreditStatus::Failed(err.reason().to_string());
                let err = GameError::from(err);
                error!(%err, "credit failed");
                self.record(
                    format!("Payout failed: {err}; the balance shows what landed"),
                    err,
                );
            }
        }
        self.refresh_balance()
    }

    /// Credit for a round that was already reset. The round is gone but a
    /// failed payout still has to reach the player.
    fn on_late_credit(
        &mut self,
        ticket: Ticket,
        result: Result<(), LedgerError>,
    ) -> Vec<Effect> {
        match result {
            Ok(()) => {
                warn!(generation = ticket.generation, "late credit confirmed");
            }
            Err(err) => {
                let err = GameError::from(err);
                error!(generation = ticket.generation, %err, "late credit failed");
                self.record(
                    format!("Payout failed: {err}; the balance shows what landed"),
                    err,
                );
            }
        }
        self.refresh_balance()
    }

    fn on_airdrop(&mut self, result: Result<(), LedgerError>) -> Vec<Effect> {
        self.claim_pending = false;
        match result {
            Ok(()) => {
                info!(amount = self.config.airdrop_amount, "airdrop claimed");
                self.set_status(format!(
                    "Airdrop of {} claimed",
                    format_amount(self.config.airdrop_amount)
                ));
                self.refresh_balance()
            }
            Err(err) => {
                let err = GameError::from(err);
                warn!(%err, "airdrop claim failed");
                self.record(format!("Airdrop failed: {err}"), err);
                Vec::new()
            }
        }
    }

    fn cash_out(&mut self, ticket: Ticket, multiplier: f64, now: Instant) -> Vec<Effect> {
        let until = now + self.config.cooldown();
        let Phase::Active { round, .. } = &mut self.phase else {
            return Vec::new();
        };
        let payout = payout_nanos(round.wager, multiplier);
        round.multiplier = multiplier;
        round.outcome = Outcome::CashedOut { multiplier, payout };
        let round = round.clone();
        self.phase = Phase::Settling {
            ticket,
            round,
            credit: CreditStatus::Pending,
            until,
        };
        info!(generation = ticket.generation, multiplier, payout, "cashed out");
        self.set_status(format!(
            "Cashed out at {}: won {}",
            format_multiplier(multiplier),
            format_amount(payout)
        ));
        vec![Effect::Credit {
            ticket,
            amount: payout,
        }]
    }

    fn crash(&mut self, multiplier: f64, now: Instant) {
        let until = now + self.config.cooldown();
        let Phase::Active { ticket, round } = &mut self.phase else {
            return;
        };
        round.multiplier = multiplier;
        round.outcome = Outcome::Crashed { multiplier };
        let ticket = *ticket;
        let round = round.clone();
        let wager = round.wager;
        self.phase = Phase::Settling {
            ticket,
            round,
            credit: CreditStatus::NotOwed,
            until,
        };
        // the wager was debited when the round started
        info!(generation = ticket.generation, multiplier, "cookie crashed");
        self.set_status(format!(
            "The cookie exploded at {}: lost {}",
            format_multiplier(multiplier),
            format_amount(wager)
        ));
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    fn reject<T>(&mut self, err: GameError) -> Result<T, GameError> {
        warn!(%err, "action rejected");
        self.record(err.to_string(), err.clone());
        Err(err)
    }

    fn record(&mut self, message: String, err: GameError) {
        self.last_error = Some(err);
        self.push_error(message);
    }

    fn push_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.status = message.clone();
        self.errors.push(message);
        if self.errors.len() > ERROR_HISTORY_DEPTH {
            let drain = self.errors.len() - ERROR_HISTORY_DEPTH;
            self.errors.drain(0..drain);
        }
    }
}
