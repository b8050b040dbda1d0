//! Per-token state held by the engine registry.

use serde::{Deserialize, Serialize};

use wave_content::ContentMarket;
use wave_core::config::DeploymentConfig;
use wave_core::error::WaveError;
use wave_core::traits::Ledger;
use wave_core::types::{Address, Asset, RewardAsset, TokenId};
use wave_curve::{CreditLine, Market};
use wave_rewards::RewardPool;

/// Descriptive fields chosen by the creator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub cover_uri: String,
}

/// Everything the engine tracks for one token.
///
/// Handed out by shared reference only; every change goes through
/// [`Engine`](crate::Engine).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    pub id: TokenId,
    pub creator: Address,
    pub metadata: TokenMetadata,
    pub created_at: u64,
    /// Custody of the real quote reserve not currently lent out.
    pub vault: Address,
    /// Custody of funded, unclaimed rewards in both currencies.
    pub reward_vault: Address,
    pub market: Market,
    pub credit: CreditLine,
    pub content: ContentMarket,
    pub rewards: RewardPool,
}

impl TokenState {
    pub(crate) fn new(
        id: TokenId,
        creator: Address,
        metadata: TokenMetadata,
        market: Market,
        config: &DeploymentConfig,
        now: u64,
    ) -> Self {
        Self {
            id,
            creator,
            metadata,
            created_at: now,
            vault: vault_address(id),
            reward_vault: reward_vault_address(id),
            market,
            credit: CreditLine::new(),
            content: ContentMarket::from_config(&config.content),
            rewards: RewardPool::new(config.rewards.duration_secs),
        }
    }

    pub fn asset(&self) -> Asset {
        Asset::Token(self.id)
    }

    /// Read-only view of the token, plus `account`'s position if given.
    pub fn snapshot<L: Ledger>(
        &self,
        ledger: &L,
        account: Option<&Address>,
        now: u64,
    ) -> Result<TokenSnapshot, WaveError> {
        let mut streams = Vec::with_capacity(RewardAsset::ALL.len());
        for asset in RewardAsset::ALL {
            let stream = self.rewards.stream(asset);
            streams.push(StreamSnapshot {
                asset,
                reward_rate: stream.reward_rate,
                period_finish: stream.period_finish,
                left: self.rewards.left(asset, now)?,
                queued: stream.queued,
                total_unclaimed: stream.total_unclaimed,
            });
        }

        let account = match account {
            Some(address) => Some(self.account_snapshot(ledger, address, now)?),
            None => None,
        };

        Ok(TokenSnapshot {
            id: self.id,
            creator: self.creator,
            metadata: self.metadata.clone(),
            vault: self.vault,
            reward_vault: self.reward_vault,
            virtual_quote_reserve: self.market.virtual_quote_reserve(),
            real_quote_reserve: self.market.real_quote_reserve(),
            token_reserve: self.market.token_reserve(),
            max_supply: self.market.max_supply(),
            circulating_supply: self.market.circulating_supply(),
            market_price: self.market.market_price()?,
            floor_price: self.market.floor_price()?,
            total_debt: self.credit.total_debt(),
            vault_liquidity: self.credit.vault_liquidity(&self.market),
            content_items: self.content.len() as u64,
            total_stake: self.rewards.total_stake(),
            streams,
            account,
        })
    }

    fn account_snapshot<L: Ledger>(
        &self,
        ledger: &L,
        address: &Address,
        now: u64,
    ) -> Result<AccountSnapshot, WaveError> {
        let token_balance = ledger.balance(self.asset(), address);
        Ok(AccountSnapshot {
            address: *address,
            token_balance,
            quote_balance: ledger.balance(Asset::Quote, address),
            debt: self.credit.debt(address),
            credit_limit: self.credit.credit_limit(&self.market, token_balance)?,
            available_credit: self.credit.available_credit(&self.market, address, token_balance)?,
            stake: self.rewards.stake_of(address),
            earned_quote: self.rewards.earned(RewardAsset::Quote, address, now)?,
            earned_token: self.rewards.earned(RewardAsset::Token, address, now)?,
        })
    }
}

/// Market vault address of token `id`.
pub fn vault_address(id: TokenId) -> Address {
    Address::derive("wave/vault", id.0 as u64)
}

/// Reward vault address of token `id`.
pub fn reward_vault_address(id: TokenId) -> Address {
    Address::derive("wave/rewards", id.0 as u64)
}

/// Serializable summary of one reward stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSnapshot {
    pub asset: RewardAsset,
    pub reward_rate: u128,
    pub period_finish: u64,
    pub left: u128,
    pub queued: u128,
    pub total_unclaimed: u128,
}

/// One holder's position in a token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub address: Address,
    pub token_balance: u128,
    pub quote_balance: u128,
    pub debt: u128,
    pub credit_limit: u128,
    pub available_credit: u128,
    pub stake: u128,
    pub earned_quote: u128,
    pub earned_token: u128,
}

/// Everything a front end shows for a token, read in one call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub id: TokenId,
    pub creator: Address,
    pub metadata: TokenMetadata,
    pub vault: Address,
    pub reward_vault: Address,
    pub virtual_quote_reserve: u128,
    pub real_quote_reserve: u128,
    pub token_reserve: u128,
    pub max_supply: u128,
    pub circulating_supply: u128,
    /// Raw quote per whole token.
    pub market_price: u128,
    pub floor_price: u128,
    pub total_debt: u128,
    pub vault_liquidity: u128,
    pub content_items: u64,
    pub total_stake: u128,
    pub streams: Vec<StreamSnapshot>,
    pub account: Option<AccountSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wave_core::constants::{INITIAL_SUPPLY, QUOTE_UNIT, RESERVE_VIRT_QUOTE_RAW};
    use wave_core::ledger::MemoryLedger;

    fn state() -> TokenState {
        let (market, _) =
            Market::launch(RESERVE_VIRT_QUOTE_RAW, INITIAL_SUPPLY, 10 * QUOTE_UNIT, true).unwrap();
        let metadata = TokenMetadata {
            name: "Tide".into(),
            symbol: "TIDE".into(),
            cover_uri: "ipfs://cover".into(),
        };
        TokenState::new(
            TokenId(0),
            Address::from_label("creator"),
            metadata,
            market,
            &DeploymentConfig::default(),
            100,
        )
    }

    #[test]
    fn vaults_are_distinct_per_token() {
        assert_ne!(vault_address(TokenId(0)), reward_vault_address(TokenId(0)));
        assert_ne!(vault_address(TokenId(0)), vault_address(TokenId(1)));
        let s = state();
        assert_eq!(s.vault, vault_address(TokenId(0)));
        assert_eq!(s.reward_vault, reward_vault_address(TokenId(0)));
    }

    #[test]
    fn snapshot_without_account() {
        let s = state();
        let snap = s.snapshot(&MemoryLedger::new(), None, 100).unwrap();
        assert_eq!(snap.real_quote_reserve, 10 * QUOTE_UNIT);
        assert_eq!(snap.circulating_supply, s.market.circulating_supply());
        assert_eq!(snap.streams.len(), 2);
        assert!(snap.account.is_none());
        assert!(snap.market_price > snap.floor_price);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let s = state();
        let who = Address::from_label("alice");
        let snap = s.snapshot(&MemoryLedger::new(), Some(&who), 100).unwrap();
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains(r#""symbol":"TIDE""#));
        assert!(json.contains(r#""token_balance":0"#));
        assert!(json.contains(r#""asset":"quote""#));
        let back: TokenSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
