pub mod balance;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod fuel_ledger;
pub mod identity;
pub mod ledger;
pub mod session;
pub mod units;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use config::GameConfig;
pub use driver::{
    Command,
    SessionHandle,
    run_session,
    session_channels,
};
pub use error::GameError;
pub use ledger::{
    InMemoryLedger,
    Ledger,
    LedgerError,
};
pub use session::{
    GameSession,
    Outcome,
    SessionSnapshot,
    SessionState,
};
