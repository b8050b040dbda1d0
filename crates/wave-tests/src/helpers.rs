//! Shared helpers for the integration tests.

use wave_core::config::DeploymentConfig;
use wave_core::constants::QUOTE_UNIT;
use wave_core::ledger::MemoryLedger;
use wave_core::traits::Ledger;
use wave_core::types::{Address, Asset, RewardAsset, TokenId};
use wave_engine::{CollectRequest, Engine, SwapRequest, TokenMetadata};

/// Address of a test account.
pub fn user(n: u8) -> Address {
    Address::from_label(&format!("user{n}"))
}

pub fn owner() -> Address {
    Address::from_label("owner")
}

pub fn treasury() -> Address {
    Address::from_label("treasury")
}

/// Raw quote units for `whole` quote.
pub fn quote(whole: u128) -> u128 {
    whole * QUOTE_UNIT
}

/// Engine whose owner and `users` accounts each hold `funding` quote.
pub fn engine_with(users: u8, funding: u128, config: DeploymentConfig) -> Engine<MemoryLedger> {
    let mut ledger = MemoryLedger::new();
    ledger.mint(Asset::Quote, &owner(), funding).unwrap();
    for n in 0..users {
        ledger.mint(Asset::Quote, &user(n), funding).unwrap();
    }
    Engine::new(config, owner(), ledger).unwrap()
}

pub fn metadata(symbol: &str) -> TokenMetadata {
    TokenMetadata {
        name: format!("{symbol} token"),
        symbol: symbol.to_string(),
        cover_uri: format!("ipfs://{symbol}/cover"),
    }
}

/// A swap with no slippage bound, deadline or referrer.
pub fn swap(token: TokenId, trader: Address, amount_in: u128) -> SwapRequest {
    SwapRequest { token, trader, amount_in, min_amount_out: 0, deadline: None, referrer: None }
}

/// A collect accepting any price.
pub fn collect(token: TokenId, item: u64, collector: Address, epoch: u64) -> CollectRequest {
    CollectRequest { token, item, collector, expected_epoch: epoch, deadline: None, max_price: u128::MAX }
}

pub fn token_balance(engine: &Engine<MemoryLedger>, token: TokenId, account: &Address) -> u128 {
    engine.balance(Asset::Token(token), account)
}

pub fn quote_balance(engine: &Engine<MemoryLedger>, account: &Address) -> u128 {
    engine.balance(Asset::Quote, account)
}

/// Check custody and supply bookkeeping of `token`:
///
/// - the market vault holds the real reserve minus outstanding debt
/// - the reward vault holds every stream's unclaimed total
/// - issued tokens equal the circulating supply
pub fn assert_custody(engine: &Engine<MemoryLedger>, token: TokenId) {
    let state = engine.token(token).unwrap();
    assert_eq!(
        quote_balance(engine, &state.vault),
        state.market.real_quote_reserve() - state.credit.total_debt(),
        "vault custody of {token}"
    );
    for asset in RewardAsset::ALL {
        assert_eq!(
            engine.balance(asset.ledger_asset(token), &state.reward_vault),
            state.rewards.total_unclaimed(asset),
            "reward custody of {token} {asset:?}"
        );
    }
    assert_eq!(
        engine.ledger().total_issued(Asset::Token(token)),
        state.market.circulating_supply(),
        "issued supply of {token}"
    );
}

/// Check every debtor of `token` is covered by the floor value of its balance.
pub fn assert_solvent(engine: &Engine<MemoryLedger>, token: TokenId) {
    let state = engine.token(token).unwrap();
    for (account, debt) in state.credit.debtors() {
        let balance = token_balance(engine, token, account);
        let limit = state.market.floor_value(balance).unwrap();
        assert!(*debt <= limit, "{account} owes {debt} against floor value {limit}");
    }
}

/// Both invariant checks.
pub fn assert_invariants(engine: &Engine<MemoryLedger>, token: TokenId) {
    assert_custody(engine, token);
    assert_solvent(engine, token);
}
