use crate::{
    ledger::LedgerError,
    units::format_amount,
};

/// Rejection reasons that identify a duplicate one-time claim.
const ALREADY_CLAIMED_SIGNATURES: [&str; 2] = ["already claimed", "ealreadyclaimed"];

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("connect a wallet first")]
    NoIdentity,
    #[error("wager of {} is below the minimum of {}", amount(.wager), amount(.minimum))]
    BelowMinimumWager { wager: u64, minimum: u64 },
    #[error("wager of {} exceeds the balance of {}", amount(.wager), amount(.balance))]
    InsufficientBalance { wager: u64, balance: u64 },
    #[error("ledger rejected the operation: {0}")]
    LedgerRejected(String),
    #[error("airdrop already claimed: {0}")]
    AlreadyClaimed(String),
    #[error("a round is already in progress")]
    RoundInProgress,
    #[error("no active round to cash out")]
    NotActive,
    #[error("an airdrop claim is already pending")]
    ClaimInProgress,
    #[error("no overdue debit to abandon")]
    NotOverdue,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

fn amount(nanos: &u64) -> String {
    format_amount(*nanos)
}

impl From<LedgerError> for GameError {
    fn from(err: LedgerError) -> Self {
        let reason = err.reason().to_string();
        if is_already_claimed(&reason) {
            GameError::AlreadyClaimed(reason)
        } else {
            GameError::LedgerRejected(reason)
        }
    }
}

pub fn is_already_claimed(reason: &str) -> bool {
    let lowered = reason.to_lowercase();
    ALREADY_CLAIMED_SIGNATURES
        .iter()
        .any(|signature| lowered.contains(signature))
}
