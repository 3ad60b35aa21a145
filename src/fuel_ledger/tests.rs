#![allow(non_snake_case)]

use super::*;
use crate::{
    config::GameConfig,
    error::is_already_claimed,
    units::NANOS_PER_UNIT,
};

const AIRDROP: u64 = 100 * NANOS_PER_UNIT;
const PLAYER_FUNDS: u64 = 10 * NANOS_PER_UNIT;

async fn launch(house: u64) -> FuelLedger {
    let funding = LocalFunding {
        player: PLAYER_FUNDS,
        house,
    };
    FuelLedger::launch_local(funding, AIRDROP).await.unwrap()
}

async fn default_ledger() -> FuelLedger {
    let config = GameConfig::default();
    FuelLedger::launch_local(config.local_funding(), config.airdrop_amount)
        .await
        .unwrap()
}

async fn player_balance(ledger: &FuelLedger) -> u64 {
    ledger.query_balance(&ledger.identity()).await.unwrap()
}

#[tokio::test]
async fn launch_local__separate_funding__house_covers_requested() {
    // when
    let ledger = launch(1_000 * NANOS_PER_UNIT).await;

    // then
    assert_eq!(player_balance(&ledger).await, PLAYER_FUNDS);
    assert!(ledger.house_balance().await.unwrap() >= 1_000 * NANOS_PER_UNIT);
}

#[tokio::test]
async fn debit__moves_chips_to_house() {
    // given
    let ledger = launch(1_000 * NANOS_PER_UNIT).await;
    let house_before = ledger.house_balance().await.unwrap();

    // when
    ledger.debit(NANOS_PER_UNIT).await.unwrap();

    // then
    assert_eq!(player_balance(&ledger).await, PLAYER_FUNDS - NANOS_PER_UNIT);
    assert_eq!(
        ledger.house_balance().await.unwrap(),
        house_before + NANOS_PER_UNIT
    );
}

#[tokio::test]
async fn credit__moves_chips_to_player() {
    // given
    let ledger = launch(1_000 * NANOS_PER_UNIT).await;

    // when
    ledger.credit(35 * NANOS_PER_UNIT).await.unwrap();

    // then
    assert_eq!(player_balance(&ledger).await, PLAYER_FUNDS + 35 * NANOS_PER_UNIT);
}

#[tokio::test]
async fn debit__more_than_balance__fails_without_change() {
    // given
    let ledger = launch(1_000 * NANOS_PER_UNIT).await;

    // when
    let result = ledger.debit(PLAYER_FUNDS + 1).await;

    // then
    assert!(result.is_err());
    assert_eq!(player_balance(&ledger).await, PLAYER_FUNDS);
}

#[tokio::test]
async fn query_balance__unknown_account__rejected() {
    let ledger = launch(1_000 * NANOS_PER_UNIT).await;
    let err = ledger
        .query_balance(&Account::new("0xother"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Rejected(_)));
}

#[tokio::test]
async fn claim_airdrop__default_config__credits_airdrop() {
    // given
    let ledger = default_ledger().await;
    let config = GameConfig::default();

    // when
    ledger.claim_airdrop().await.unwrap();

    // then
    assert_eq!(
        player_balance(&ledger).await,
        config.local_player_funds + config.airdrop_amount
    );
}

#[tokio::test]
async fn claim_airdrop__second_claim__already_claimed() {
    // given
    let ledger = launch(1_000 * NANOS_PER_UNIT).await;
    ledger.claim_airdrop().await.unwrap();

    // when
    let err = ledger.claim_airdrop().await.unwrap_err();

    // then
    assert!(is_already_claimed(err.reason()));
    assert_eq!(player_balance(&ledger).await, PLAYER_FUNDS + AIRDROP);
}

#[tokio::test]
async fn claim_airdrop__house_short__claim_stays_open() {
    // given
    let airdrop = 15 * NANOS_PER_UNIT;
    let funding = LocalFunding {
        player: PLAYER_FUNDS,
        house: PLAYER_FUNDS,
    };
    let ledger = FuelLedger::launch_local(funding, airdrop).await.unwrap();
    let house = ledger.house_balance().await.unwrap();
    let err = ledger.claim_airdrop().await.unwrap_err();
    assert!(matches!(err, LedgerError::Rejected(_)));
    assert!(!is_already_claimed(err.reason()));

    // when
    let top_up = airdrop - house;
    ledger.debit(top_up).await.unwrap();
    ledger.claim_airdrop().await.unwrap();

    // then
    assert_eq!(
        player_balance(&ledger).await,
        PLAYER_FUNDS - top_up + airdrop
    );
}

#[test]
fn releases_claim__definite_rejection__released() {
    assert!(releases_claim(&Err(LedgerError::Rejected(
        "Revert(123)".to_string()
    ))));
}

#[test]
fn releases_claim__unknown_outcome__kept() {
    assert!(!releases_claim(&Err(LedgerError::Unavailable(
        "connection reset".to_string()
    ))));
    assert!(!releases_claim(&Ok(())));
}
