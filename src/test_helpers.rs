use crate::{
    clock::{
        DeadlineSource,
        DeadlineWindow,
    },
    config::GameConfig,
    driver::{
        Command,
        SessionHandle,
        run_session,
        session_channels,
    },
    identity::{
        Account,
        StaticIdentity,
    },
    ledger::InMemoryLedger,
    session::GameSession,
    units::NANOS_PER_UNIT,
};
use std::time::Duration;

pub const PLAYER_ADDRESS: &str =
    "0x530561712247f71c361c14555ac789c6790ce24ae432aa2fb4604d7b466b9c99";

pub type TestSession = GameSession<StaticIdentity, FixedDeadline>;

/// Always draws the same deadline.
#[derive(Clone, Copy, Debug)]
pub struct FixedDeadline(pub Duration);

impl FixedDeadline {
    pub fn secs(secs: f64) -> Self {
        Self(Duration::from_secs_f64(secs))
    }
}

impl DeadlineSource for FixedDeadline {
    fn draw(&mut self, _window: DeadlineWindow) -> Duration {
        self.0
    }
}

pub struct TestContext {
    account: Account,
    ledger: InMemoryLedger,
    config: GameConfig,
}

impl TestContext {
    /// A player holding 10 CKIE on an in-memory ledger.
    pub fn new() -> Self {
        Self::with_config(GameConfig::default())
    }

    pub fn with_config(config: GameConfig) -> Self {
        let account = Account::new(PLAYER_ADDRESS);
        let ledger =
            InMemoryLedger::new(account.clone(), 10 * NANOS_PER_UNIT, config.airdrop_amount);
        Self {
            account,
            ledger,
            config,
        }
    }

    pub fn account(&self) -> Account {
        self.account.clone()
    }

    pub fn ledger(&self) -> InMemoryLedger {
        self.ledger.clone()
    }

    pub fn config(&self) -> GameConfig {
        self.config.clone()
    }

    pub fn session(&self, deadline: FixedDeadline) -> TestSession {
        GameSession::new(
            self.config.clone(),
            StaticIdentity::connected(self.account.clone()),
            deadline,
        )
    }

    pub fn disconnected_session(&self, deadline: FixedDeadline) -> TestSession {
        GameSession::new(self.config.clone(), StaticIdentity::disconnected(), deadline)
    }

    /// Runs the session driver next to `script` on the current task and
    /// shuts it down once the script returns.
    pub async fn drive<F, Fut>(&self, session: TestSession, script: F) -> TestSession
    where
        F: FnOnce(SessionHandle) -> Fut,
        Fut: Future<Output = ()>,
    {
        let (handle, endpoints) = session_channels(session.snapshot());
        let driver = run_session(session, self.ledger(), endpoints);
        let script_handle = handle.clone();
        let script = async move {
            script(script_handle).await;
            handle.send(Command::Shutdown);
        };
        let (session, ()) = tokio::join!(driver, script);
        session
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
