//! The external ledger seam and an in-process implementation of it.

use crate::identity::Account;
use std::{
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::Duration,
};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The ledger refused or reverted the operation.
    #[error("rejected: {0}")]
    Rejected(String),
    /// The ledger could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    pub fn reason(&self) -> &str {
        match self {
            LedgerError::Rejected(reason) | LedgerError::Unavailable(reason) => reason,
        }
    }
}

/// Wallet-bound ledger client. All amounts are in minor units.
pub trait Ledger {
    /// Destroys `amount` from the player's funds. Irreversible.
    fn debit(&self, amount: u64) -> impl Future<Output = Result<(), LedgerError>>;

    /// Creates `amount` for the player.
    fn credit(&self, amount: u64) -> impl Future<Output = Result<(), LedgerError>>;

    fn query_balance(
        &self,
        account: &Account,
    ) -> impl Future<Output = Result<u64, LedgerError>>;

    /// One-time grant per account.
    fn claim_airdrop(&self) -> impl Future<Output = Result<(), LedgerError>>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerOperation {
    Debit(u64),
    Credit(u64),
    Airdrop(u64),
}

#[derive(Debug)]
struct LedgerState {
    account: Account,
    balance: u64,
    airdrop_amount: u64,
    airdrop_claimed: bool,
    latency: Duration,
    hang_debits: bool,
    fail_next_debit: Option<String>,
    fail_next_credit: Option<String>,
    operations: Vec<LedgerOperation>,
    balance_queries: usize,
}

/// A single-account ledger held in memory.
#[derive(Clone, Debug)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    pub fn new(account: Account, balance: u64, airdrop_amount: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                account,
                balance,
                airdrop_amount,
                airdrop_claimed: false,
                latency: Duration::ZERO,
                hang_debits: false,
                fail_next_debit: None,
                fail_next_credit: None,
                operations: Vec::new(),
                balance_queries: 0,
            })),
        }
    }

    /// Every operation resolves after this delay.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    pub fn fail_next_debit(&self, reason: impl Into<String>) {
        self.lock().fail_next_debit = Some(reason.into());
    }

    pub fn fail_next_credit(&self, reason: impl Into<String>) {
        self.lock().fail_next_credit = Some(reason.into());
    }

    /// Debits issued while set never resolve.
    pub fn hang_debits(&self, hang: bool) {
        self.lock().hang_debits = hang;
    }

    pub fn balance(&self) -> u64 {
        self.lock().balance
    }

    pub fn operations(&self) -> Vec<LedgerOperation> {
        self.lock().operations.clone()
    }

    pub fn balance_queries(&self) -> usize {
        self.lock().balance_queries
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn settle_latency(&self) {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Ledger for InMemoryLedger {
    async fn debit(&self, amount: u64) -> Result<(), LedgerError> {
        let hang = self.lock().hang_debits;
        if hang {
            std::future::pending::<()>().await;
        }
        self.settle_latency().await;
        let mut state = self.lock();
        if let Some(reason) = state.fail_next_debit.take() {
            return Err(LedgerError::Rejected(reason));
        }
        if state.balance < amount {
            return Err(LedgerError::Rejected(format!(
                "insufficient funds: balance {} < {amount}",
                state.balance
            )));
        }
        state.balance -= amount;
        state.operations.push(LedgerOperation::Debit(amount));
        Ok(())
    }

    async fn credit(&self, amount: u64) -> Result<(), LedgerError> {
        self.settle_latency().await;
        let mut state = self.lock();
        if let Some(reason) = state.fail_next_credit.take() {
            return Err(LedgerError::Rejected(reason));
        }
        state.balance = state.balance.saturating_add(amount);
        state.operations.push(LedgerOperation::Credit(amount));
        Ok(())
    }

    async fn query_balance(&self, account: &Account) -> Result<u64, LedgerError> {
        self.settle_latency().await;
        let mut state = self.lock();
        state.balance_queries += 1;
        if *account == state.account {
            Ok(state.balance)
        } else {
            Ok(0)
        }
    }

    async fn claim_airdrop(&self) -> Result<(), LedgerError> {
        self.settle_latency().await;
        let mut state = self.lock();
        if state.airdrop_claimed {
            return Err(LedgerError::Rejected(
                "EAlreadyClaimed: airdrop already claimed for this account".to_string(),
            ));
        }
        state.airdrop_claimed = true;
        let amount = state.airdrop_amount;
        state.balance = state.balance.saturating_add(amount);
        state.operations.push(LedgerOperation::Airdrop(amount));
        Ok(())
    }
}
