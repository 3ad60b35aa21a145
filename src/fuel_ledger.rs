//! [`Ledger`] backed by a local Fuel node.
//!
//! Chips are a native asset. A debit moves the wager from the player wallet
//! to the house wallet, a credit or airdrop moves chips the other way.

use crate::{
    identity::Account,
    ledger::{
        Ledger,
        LedgerError,
    },
};
use fuels::{
    accounts::{
        Account as FuelAccount,
        ViewOnlyAccount,
    },
    prelude::{
        AssetConfig,
        AssetId,
        TxPolicies,
        WalletUnlocked,
        WalletsConfig,
        launch_custom_provider_and_get_wallets,
    },
    types::errors::Error as FuelError,
};
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
};
use tracing::{
    debug,
    info,
    warn,
};

#[cfg(test)]
mod tests;

pub const CHIP_ASSET_ID: [u8; 32] = [1u8; 32];

const COINS_PER_WALLET: u64 = 10;
const BASE_ASSET_FUNDS: u64 = 1_000_000_000;

/// Chips each wallet starts with on the local node. The house ends up with
/// at least `house`, the player with exactly `player`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalFunding {
    pub player: u64,
    pub house: u64,
}

#[derive(Clone)]
pub struct FuelLedger {
    player: WalletUnlocked,
    house: WalletUnlocked,
    chip_asset_id: AssetId,
    airdrop_amount: u64,
    airdrop_claimed: Arc<Mutex<bool>>,
}

impl FuelLedger {
    /// Starts an in-process node with a funded player and house wallet.
    pub async fn launch_local(
        funding: LocalFunding,
        airdrop_amount: u64,
    ) -> Result<Self, LedgerError> {
        let chip_asset_id = AssetId::from(CHIP_ASSET_ID);
        // every wallet gets the same coins; the player hands its surplus over below
        let coin_amount = funding
            .player
            .max(funding.house)
            .div_ceil(COINS_PER_WALLET)
            .max(1);
        let base_asset = AssetConfig {
            id: AssetId::zeroed(),
            num_coins: COINS_PER_WALLET,
            coin_amount: BASE_ASSET_FUNDS,
        };
        let chip_asset = AssetConfig {
            id: chip_asset_id,
            num_coins: COINS_PER_WALLET,
            coin_amount,
        };

        let mut wallets = launch_custom_provider_and_get_wallets(
            WalletsConfig::new_multiple_assets(2, vec![base_asset, chip_asset]),
            None,
            None,
        )
        .await
        .map_err(|e| LedgerError::Unavailable(format!("failed to launch node: {e}")))?;

        let house = wallets
            .pop()
            .ok_or_else(|| LedgerError::Unavailable("missing house wallet".to_string()))?;
        let player = wallets
            .pop()
            .ok_or_else(|| LedgerError::Unavailable("missing player wallet".to_string()))?;

        let ledger = Self {
            player,
            house,
            chip_asset_id,
            airdrop_amount,
            airdrop_claimed: Arc::new(Mutex::new(false)),
        };
        let surplus = (coin_amount * COINS_PER_WALLET).saturating_sub(funding.player);
        if surplus > 0 {
            ledger
                .send(&ledger.player, &ledger.house, surplus)
                .await
                .map_err(|e| {
                    LedgerError::Unavailable(format!("funding the house failed: {e}"))
                })?;
        }
        info!(
            player = %ledger.identity(),
            player_funds = funding.player,
            house_funds = funding.house,
            "local fuel node ready"
        );
        Ok(ledger)
    }

    /// The account the session plays as.
    pub fn identity(&self) -> Account {
        Account::new(self.player.address().to_string())
    }

    pub async fn house_balance(&self) -> Result<u64, LedgerError> {
        chip_balance(&self.house, &self.chip_asset_id).await
    }

    async fn send(
        &self,
        from: &WalletUnlocked,
        to: &WalletUnlocked,
        amount: u64,
    ) -> Result<(), LedgerError> {
        from.transfer(to.address(), amount, self.chip_asset_id, TxPolicies::default())
            .await
            .map(|_| ())
            .map_err(classify)
    }

    fn claimed(&self) -> MutexGuard<'_, bool> {
        self.airdrop_claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Only transaction errors say for sure that nothing landed; anything else
/// may have failed after submission.
fn classify(err: FuelError) -> LedgerError {
    match err {
        FuelError::Transaction(reason) => LedgerError::Rejected(reason.to_string()),
        other => LedgerError::Unavailable(other.to_string()),
    }
}

/// A claim is released for another attempt only when it definitely did not pay.
fn releases_claim(result: &Result<(), LedgerError>) -> bool {
    matches!(result, Err(LedgerError::Rejected(_)))
}

async fn chip_balance(wallet: &WalletUnlocked, asset_id: &AssetId) -> Result<u64, LedgerError> {
    let balance = wallet
        .get_asset_balance(asset_id)
        .await
        .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
    u64::try_from(balance)
        .map_err(|_| LedgerError::Rejected("balance overflows u64".to_string()))
}

impl Ledger for FuelLedger {
    async fn debit(&self, amount: u64) -> Result<(), LedgerError> {
        debug!(amount, "debit");
        self.send(&self.player, &self.house, amount).await
    }

    async fn credit(&self, amount: u64) -> Result<(), LedgerError> {
        debug!(amount, "credit");
        self.send(&self.house, &self.player, amount).await
    }

    async fn query_balance(&self, account: &Account) -> Result<u64, LedgerError> {
        if *account != self.identity() {
            return Err(LedgerError::Rejected(format!(
                "no wallet for {}",
                account.short_address()
            )));
        }
        chip_balance(&self.player, &self.chip_asset_id).await
    }

    async fn claim_airdrop(&self) -> Result<(), LedgerError> {
        {
            let mut claimed = self.claimed();
            if *claimed {
                return Err(LedgerError::Rejected(
                    "EAlreadyClaimed: airdrop already claimed for this account".to_string(),
                ));
            }
            *claimed = true;
        }

        let house = match self.house_balance().await {
            Ok(house) => house,
            Err(err) => {
                *self.claimed() = false;
                return Err(err);
            }
        };
        if house < self.airdrop_amount {
            *self.claimed() = false;
            return Err(LedgerError::Rejected(format!(
                "house holds {house}, cannot cover an airdrop of {}",
                self.airdrop_amount
            )));
        }

        let result = self.send(&self.house, &self.player, self.airdrop_amount).await;
        if releases_claim(&result) {
            *self.claimed() = false;
        } else if let Err(err) = &result {
            warn!(%err, "airdrop outcome unknown, claim stays spent");
        }
        result
    }
}
