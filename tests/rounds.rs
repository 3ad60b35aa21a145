use crate::{
    STARTING_BALANCE,
    TENTH,
};
use cookie_crash::{
    Command,
    GameError,
    Outcome,
    SessionState,
    ledger::LedgerOperation,
    session::CreditStatus,
    test_helpers::{
        FixedDeadline,
        TestContext,
    },
};
use std::time::Duration;
use tokio::time::{
    self,
    Instant,
};

fn is_active(state: &SessionState) -> bool {
    *state == SessionState::Active
}

fn is_crashed(state: &SessionState) -> bool {
    matches!(
        state,
        SessionState::Settling {
            outcome: Outcome::Crashed { .. },
            ..
        }
    )
}

#[tokio::test(start_paused = true)]
async fn stop__before_deadline__credits_payout_to_ledger() {
    // given
    let ctx = TestContext::new();
    let session = ctx.session(FixedDeadline::secs(6.0));

    // when
    let session = ctx
        .drive(session, |mut handle| async move {
            handle.wait_for(|s| s.balance.is_some()).await;
            handle.send(Command::Start(TENTH));
            handle.wait_for(|s| is_active(&s.state)).await;
            time::sleep(Duration::from_secs(5)).await;
            handle.send(Command::Stop);
            handle
                .wait_for(|s| {
                    matches!(
                        s.state,
                        SessionState::Settling {
                            credit: CreditStatus::Confirmed,
                            ..
                        }
                    )
                })
                .await;
        })
        .await;

    // then
    let Some(Outcome::CashedOut { multiplier, payout }) =
        session.round().map(|round| round.outcome())
    else {
        panic!("expected a cash out, got {:?}", session.state());
    };
    assert!((multiplier - 1.4).abs() < 0.01, "multiplier {multiplier}");
    assert_eq!(
        ctx.ledger().operations(),
        vec![LedgerOperation::Debit(TENTH), LedgerOperation::Credit(payout)]
    );
    assert_eq!(ctx.ledger().balance(), STARTING_BALANCE - TENTH + payout);
}

#[tokio::test(start_paused = true)]
async fn clock__reaches_deadline__crashes_without_credit() {
    // given
    let ctx = TestContext::new();
    let session = ctx.session(FixedDeadline::secs(3.0));

    // when
    let session = ctx
        .drive(session, |mut handle| async move {
            handle.wait_for(|s| s.balance.is_some()).await;
            handle.send(Command::Start(TENTH));
            handle.wait_for(|s| is_crashed(&s.state)).await;
        })
        .await;

    // then
    assert_eq!(
        session.round().map(|round| round.outcome()),
        Some(Outcome::Crashed { multiplier: 1.0 })
    );
    assert_eq!(ctx.ledger().operations(), vec![LedgerOperation::Debit(TENTH)]);
    assert_eq!(ctx.ledger().balance(), STARTING_BALANCE - TENTH);
}

#[tokio::test(start_paused = true)]
async fn stop__after_crash__no_credit_issued() {
    // given
    let ctx = TestContext::new();
    let session = ctx.session(FixedDeadline::secs(4.0));

    // when
    let session = ctx
        .drive(session, |mut handle| async move {
            handle.wait_for(|s| s.balance.is_some()).await;
            handle.send(Command::Start(TENTH));
            handle.wait_for(|s| is_active(&s.state)).await;
            time::sleep(Duration::from_millis(4_500)).await;
            handle.send(Command::Stop);
            time::sleep(Duration::from_millis(100)).await;
        })
        .await;

    // then
    assert!(is_crashed(&session.state()));
    assert!(session.errors().is_empty());
    assert_eq!(ctx.ledger().operations(), vec![LedgerOperation::Debit(TENTH)]);
}

#[tokio::test(start_paused = true)]
async fn settled_round__after_cooldown__returns_to_idle() {
    // given
    let ctx = TestContext::new();
    let session = ctx.session(FixedDeadline::secs(3.5));
    let cooldown = ctx.config().cooldown();

    // when
    let (crashed_at, idle_at) = {
        let mut crashed_at = None;
        let mut idle_at = None;
        let crashed = &mut crashed_at;
        let idle = &mut idle_at;
        ctx.drive(session, |mut handle| async move {
            handle.wait_for(|s| s.balance.is_some()).await;
            handle.send(Command::Start(TENTH));
            handle.wait_for(|s| is_crashed(&s.state)).await;
            *crashed = Some(Instant::now());
            handle.wait_for(|s| s.state == SessionState::Idle).await;
            *idle = Some(Instant::now());
        })
        .await;
        (crashed_at.unwrap(), idle_at.unwrap())
    };

    // then
    assert_eq!(idle_at - crashed_at, cooldown);
}

#[tokio::test(start_paused = true)]
async fn start__debit_rejected__back_to_idle_without_round() {
    // given
    let ctx = TestContext::new();
    ctx.ledger().fail_next_debit("reverted");
    let session = ctx.session(FixedDeadline::secs(5.0));

    // when
    let session = ctx
        .drive(session, |mut handle| async move {
            handle.wait_for(|s| s.balance.is_some()).await;
            handle.send(Command::Start(TENTH));
            handle.wait_for(|s| !s.errors.is_empty()).await;
        })
        .await;

    // then
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.round().is_none());
    assert_eq!(
        session.last_error(),
        Some(&GameError::LedgerRejected("reverted".to_string()))
    );
    assert!(ctx.ledger().operations().is_empty());
    assert_eq!(ctx.ledger().balance(), STARTING_BALANCE);
}

#[tokio::test(start_paused = true)]
async fn start__twice_while_committing__single_debit() {
    // given
    let ctx = TestContext::new();
    ctx.ledger().with_latency(Duration::from_millis(300));
    let session = ctx.session(FixedDeadline::secs(5.0));

    // when
    let session = ctx
        .drive(session, |mut handle| async move {
            handle.wait_for(|s| s.balance.is_some()).await;
            handle.send(Command::Start(TENTH));
            handle.send(Command::Start(TENTH));
            handle.wait_for(|s| is_active(&s.state)).await;
        })
        .await;

    // then
    assert_eq!(session.last_error(), Some(&GameError::RoundInProgress));
    assert_eq!(ctx.ledger().operations(), vec![LedgerOperation::Debit(TENTH)]);
}

#[tokio::test(start_paused = true)]
async fn start__debit_never_confirms__overdue_then_abandoned() {
    // given
    let ctx = TestContext::new();
    ctx.ledger().hang_debits(true);
    let session = ctx.session(FixedDeadline::secs(5.0));
    let timeout = ctx.config().ledger_timeout();

    // when
    let (session, waited) = {
        let mut waited = Duration::ZERO;
        let waited_ref = &mut waited;
        let session = ctx
            .drive(session, |mut handle| async move {
                handle.wait_for(|s| s.balance.is_some()).await;
                let started = Instant::now();
                handle.send(Command::Start(TENTH));
                handle
                    .wait_for(|s| s.state == SessionState::Committing { overdue: true })
                    .await;
                *waited_ref = started.elapsed();
                handle.send(Command::Abandon);
                handle.wait_for(|s| s.state == SessionState::Idle).await;
            })
            .await;
        (session, waited)
    };

    // then
    assert_eq!(waited, timeout);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(ctx.ledger().operations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn refresh_balance__repeated__balance_unchanged() {
    // given
    let ctx = TestContext::new();
    let session = ctx.session(FixedDeadline::secs(5.0));

    // when
    let session = ctx
        .drive(session, |mut handle| async move {
            handle.wait_for(|s| s.balance.is_some()).await;
            for _ in 0..3 {
                handle.send(Command::RefreshBalance);
            }
            time::sleep(Duration::from_millis(10)).await;
        })
        .await;

    // then
    assert_eq!(ctx.ledger().balance_queries(), 4);
    assert_eq!(session.balance(), Some(STARTING_BALANCE));
    assert!(ctx.ledger().operations().is_empty());
}
