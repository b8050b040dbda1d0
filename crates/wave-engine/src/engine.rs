//! Token registry and operation router.
//!
//! [`Engine`] owns every token's components and the host [`Ledger`]. Each
//! operation works in two phases:
//!
//! 1. **Plan**: run every check against copies of the touched components
//!    and collect the ledger [`Movement`]s the operation needs.
//! 2. **Commit**: submit the movements as one batch, then swap the planned
//!    components in.
//!
//! A rejected operation leaves both the ledger and the registry untouched.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use wave_content::{Collection, ContentMarket};
use wave_core::config::DeploymentConfig;
use wave_core::error::{CreditError, MathError, WaveError};
use wave_core::traits::{Ledger, Movement};
use wave_core::types::{Address, Asset, RewardAsset, SwapDirection, TokenId};
use wave_curve::market::check_deadline;
use wave_curve::{CreditLine, FeeBreakdown, FeeSchedule, Market};
use wave_rewards::{FundOutcome, RewardPool};

use crate::token::{TokenMetadata, TokenSnapshot, TokenState};

/// A buy or sell order.
///
/// `amount_in` is gross: quote for a buy, tokens for a sell. The fee is
/// taken from it before the curve sees the rest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub token: TokenId,
    pub trader: Address,
    pub amount_in: u128,
    pub min_amount_out: u128,
    pub deadline: Option<u64>,
    pub referrer: Option<Address>,
}

/// A committed buy or sell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub token: TokenId,
    pub direction: SwapDirection,
    pub trader: Address,
    /// Gross input, fees included.
    pub amount_in: u128,
    pub fees: FeeBreakdown,
    pub amount_out: u128,
    /// What happened to the reward share of the fee.
    pub funding: FundOutcome,
}

/// Fee-inclusive price of a hypothetical swap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub fees: FeeBreakdown,
    pub amount_out: u128,
}

/// Request to collect a content item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectRequest {
    pub token: TokenId,
    pub item: u64,
    pub collector: Address,
    /// Epoch the collector priced against.
    pub expected_epoch: u64,
    pub deadline: Option<u64>,
    pub max_price: u128,
}

/// Effects of an operation, computed before anything is committed.
#[derive(Default)]
struct Plan {
    market: Option<Market>,
    credit: Option<CreditLine>,
    content: Option<ContentMarket>,
    rewards: Option<RewardPool>,
    movements: Vec<Movement>,
}

impl Plan {
    fn transfer(&mut self, asset: Asset, from: Address, to: Address, amount: u128) {
        if amount > 0 {
            self.movements.push(Movement::Transfer { asset, from, to, amount });
        }
    }

    fn mint(&mut self, asset: Asset, to: Address, amount: u128) {
        if amount > 0 {
            self.movements.push(Movement::Mint { asset, to, amount });
        }
    }

    fn burn(&mut self, asset: Asset, from: Address, amount: u128) {
        if amount > 0 {
            self.movements.push(Movement::Burn { asset, from, amount });
        }
    }
}

/// The creator-token engine.
pub struct Engine<L: Ledger> {
    config: DeploymentConfig,
    fees: FeeSchedule,
    owner: Address,
    /// Recipient of the treasury fee share. `None` sends it to rewards.
    treasury: Option<Address>,
    ledger: L,
    tokens: Vec<TokenState>,
}

impl<L: Ledger> Engine<L> {
    /// Build an engine over `ledger`, validating `config` first.
    pub fn new(config: DeploymentConfig, owner: Address, ledger: L) -> Result<Self, WaveError> {
        config.validate()?;
        info!(
            %owner,
            fee_bps = config.fees.fee_bps,
            reward_duration = config.rewards.duration_secs,
            "engine initialized"
        );
        Ok(Self {
            fees: FeeSchedule::from(&config.fees),
            config,
            owner,
            treasury: None,
            ledger,
            tokens: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn treasury(&self) -> Option<Address> {
        self.treasury
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn balance(&self, asset: Asset, account: &Address) -> u128 {
        self.ledger.balance(asset, account)
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn tokens(&self) -> &[TokenState] {
        &self.tokens
    }

    pub fn token(&self, id: TokenId) -> Result<&TokenState, WaveError> {
        self.tokens.get(id.index()).ok_or(WaveError::UnknownToken(id))
    }

    fn token_mut(&mut self, id: TokenId) -> Result<&mut TokenState, WaveError> {
        self.tokens.get_mut(id.index()).ok_or(WaveError::UnknownToken(id))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Tokens out for `amount_in` gross quote, after fees.
    pub fn quote_buy(&self, id: TokenId, amount_in: u128, with_referrer: bool) -> Result<SwapQuote, WaveError> {
        self.quote_swap(id, amount_in, with_referrer, SwapDirection::Buy)
    }

    /// Quote out for `amount_in` gross tokens, after fees.
    pub fn quote_sell(&self, id: TokenId, amount_in: u128, with_referrer: bool) -> Result<SwapQuote, WaveError> {
        self.quote_swap(id, amount_in, with_referrer, SwapDirection::Sell)
    }

    fn quote_swap(
        &self,
        id: TokenId,
        amount_in: u128,
        with_referrer: bool,
        direction: SwapDirection,
    ) -> Result<SwapQuote, WaveError> {
        let token = self.token(id)?;
        let fees = self.fees.split(amount_in, with_referrer, self.treasury.is_some())?;
        let amount_out = token.market.quote(fees.net, direction)?;
        debug!(token = %id, ?direction, amount_in, amount_out, "quoted swap");
        Ok(SwapQuote { fees, amount_out })
    }

    /// Live price of content item `item` at `now`.
    pub fn content_price(&self, id: TokenId, item: u64, now: u64) -> Result<u128, WaveError> {
        Ok(self.token(id)?.content.next_price(item, now)?)
    }

    pub fn earned(&self, id: TokenId, asset: RewardAsset, account: &Address, now: u64) -> Result<u128, WaveError> {
        Ok(self.token(id)?.rewards.earned(asset, account, now)?)
    }

    pub fn debt(&self, id: TokenId, account: &Address) -> Result<u128, WaveError> {
        Ok(self.token(id)?.credit.debt(account))
    }

    pub fn snapshot(&self, id: TokenId, account: Option<&Address>, now: u64) -> Result<TokenSnapshot, WaveError> {
        self.token(id)?.snapshot(&self.ledger, account, now)
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Set or clear the treasury. Owner only.
    pub fn set_treasury(&mut self, caller: Address, treasury: Option<Address>) -> Result<(), WaveError> {
        if caller != self.owner {
            debug!(%caller, "set_treasury rejected");
            return Err(WaveError::Unauthorized(caller));
        }
        self.treasury = treasury;
        match treasury {
            Some(treasury) => info!(%treasury, "treasury set"),
            None => info!("treasury cleared"),
        }
        Ok(())
    }

    /// Replace a token's cover URI. Token creator only.
    pub fn set_cover_uri(&mut self, caller: Address, id: TokenId, uri: impl Into<String>) -> Result<(), WaveError> {
        let token = self.token_mut(id)?;
        if caller != token.creator {
            debug!(token = %id, %caller, "set_cover_uri rejected");
            return Err(WaveError::Unauthorized(caller));
        }
        token.metadata.cover_uri = uri.into();
        info!(token = %id, uri = %token.metadata.cover_uri, "cover uri updated");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Token creation
    // ------------------------------------------------------------------

    /// Register a token and execute the creator's fee-free seed buy.
    pub fn create_token(
        &mut self,
        creator: Address,
        metadata: TokenMetadata,
        seed: u128,
        now: u64,
    ) -> Result<TokenId, WaveError> {
        let result = self.launch(creator, metadata, seed, now);
        if let Err(e) = &result {
            debug!(%creator, seed, error = %e, "create_token rejected");
        }
        result
    }

    fn launch(
        &mut self,
        creator: Address,
        metadata: TokenMetadata,
        seed: u128,
        now: u64,
    ) -> Result<TokenId, WaveError> {
        let id = TokenId(u32::try_from(self.tokens.len()).map_err(|_| MathError::Overflow)?);
        let curve = &self.config.curve;
        let (market, bought) =
            Market::launch(curve.virtual_quote(), curve.initial_supply(), seed, curve.require_seed)?;
        let state = TokenState::new(id, creator, metadata, market, &self.config, now);

        let mut plan = Plan::default();
        plan.transfer(Asset::Quote, creator, state.vault, seed);
        plan.mint(state.asset(), creator, bought);
        self.ledger.apply_batch(&plan.movements)?;

        info!(
            token = %id,
            %creator,
            symbol = %state.metadata.symbol,
            seed,
            bought,
            "token created"
        );
        self.tokens.push(state);
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Trading
    // ------------------------------------------------------------------

    pub fn buy(&mut self, request: &SwapRequest, now: u64) -> Result<Trade, WaveError> {
        let planned = self.plan_buy(request, now);
        let trade = self.execute("buy", request.token, planned)?;
        info!(
            token = %trade.token,
            trader = %trade.trader,
            amount_in = trade.amount_in,
            amount_out = trade.amount_out,
            fee = trade.fees.fee(),
            "buy"
        );
        Ok(trade)
    }

    pub fn sell(&mut self, request: &SwapRequest, now: u64) -> Result<Trade, WaveError> {
        let planned = self.plan_sell(request, now);
        let trade = self.execute("sell", request.token, planned)?;
        info!(
            token = %trade.token,
            trader = %trade.trader,
            amount_in = trade.amount_in,
            amount_out = trade.amount_out,
            fee = trade.fees.fee(),
            "sell"
        );
        Ok(trade)
    }

    fn plan_buy(&self, request: &SwapRequest, now: u64) -> Result<(Plan, Trade), WaveError> {
        let token = self.token(request.token)?;
        check_deadline(request.deadline, now)?;
        let fees = self.fees.split(request.amount_in, request.referrer.is_some(), self.treasury.is_some())?;

        let mut market = token.market.clone();
        let outcome = market.swap(fees.net, request.min_amount_out, SwapDirection::Buy, request.deadline, now)?;
        let mut rewards = token.rewards.clone();
        let funding = rewards.fund(RewardAsset::Quote, fees.rewards, now)?;

        let mut plan = Plan::default();
        plan.transfer(Asset::Quote, request.trader, token.vault, fees.net);
        self.route_fees(&mut plan, Asset::Quote, request, token.reward_vault, &fees);
        plan.mint(token.asset(), request.trader, outcome.amount_out);
        plan.market = Some(market);
        plan.rewards = Some(rewards);

        let trade = Trade {
            token: request.token,
            direction: SwapDirection::Buy,
            trader: request.trader,
            amount_in: request.amount_in,
            fees,
            amount_out: outcome.amount_out,
            funding,
        };
        Ok((plan, trade))
    }

    fn plan_sell(&self, request: &SwapRequest, now: u64) -> Result<(Plan, Trade), WaveError> {
        let token = self.token(request.token)?;
        check_deadline(request.deadline, now)?;
        let asset = token.asset();
        self.ledger.ensure_balance(asset, &request.trader, request.amount_in)?;
        let balance = self.ledger.balance(asset, &request.trader);
        token.credit.ensure_can_release(&token.market, &request.trader, balance, request.amount_in)?;
        let fees = self.fees.split(request.amount_in, request.referrer.is_some(), self.treasury.is_some())?;

        let mut market = token.market.clone();
        let outcome = market.swap(fees.net, request.min_amount_out, SwapDirection::Sell, request.deadline, now)?;
        let available = token.credit.vault_liquidity(&token.market);
        if outcome.amount_out > available {
            return Err(CreditError::InsufficientLiquidity { need: outcome.amount_out, available }.into());
        }
        let mut rewards = token.rewards.clone();
        let funding = rewards.fund(RewardAsset::Token, fees.rewards, now)?;

        let mut plan = Plan::default();
        plan.burn(asset, request.trader, fees.net);
        self.route_fees(&mut plan, asset, request, token.reward_vault, &fees);
        plan.transfer(Asset::Quote, token.vault, request.trader, outcome.amount_out);
        plan.market = Some(market);
        plan.rewards = Some(rewards);

        let trade = Trade {
            token: request.token,
            direction: SwapDirection::Sell,
            trader: request.trader,
            amount_in: request.amount_in,
            fees,
            amount_out: outcome.amount_out,
            funding,
        };
        Ok((plan, trade))
    }

    fn route_fees(
        &self,
        plan: &mut Plan,
        asset: Asset,
        request: &SwapRequest,
        reward_vault: Address,
        fees: &FeeBreakdown,
    ) {
        if let Some(referrer) = request.referrer {
            plan.transfer(asset, request.trader, referrer, fees.referrer);
        }
        if let Some(treasury) = self.treasury {
            plan.transfer(asset, request.trader, treasury, fees.treasury);
        }
        plan.transfer(asset, request.trader, reward_vault, fees.rewards);
    }

    // ------------------------------------------------------------------
    // Balances, credit and supply
    // ------------------------------------------------------------------

    /// Move tokens between holders, gated by the sender's debt.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        id: TokenId,
        amount: u128,
    ) -> Result<(), WaveError> {
        let planned = self.plan_release(&from, id, amount).map(|asset| {
            let mut plan = Plan::default();
            plan.transfer(asset, from, to, amount);
            (plan, ())
        });
        self.execute("transfer", id, planned)?;
        info!(token = %id, %from, %to, amount, "transfer");
        Ok(())
    }

    /// Borrow quote against the floor value of `account`'s balance. Returns the new debt.
    pub fn borrow(&mut self, account: Address, id: TokenId, amount: u128) -> Result<u128, WaveError> {
        let planned = self.plan_borrow(account, id, amount);
        let debt = self.execute("borrow", id, planned)?;
        info!(token = %id, %account, amount, debt, "borrow");
        Ok(debt)
    }

    fn plan_borrow(&self, account: Address, id: TokenId, amount: u128) -> Result<(Plan, u128), WaveError> {
        let token = self.token(id)?;
        let balance = self.ledger.balance(token.asset(), &account);
        let mut credit = token.credit.clone();
        let debt = credit.borrow(&token.market, &account, balance, amount)?;

        let mut plan = Plan::default();
        plan.transfer(Asset::Quote, token.vault, account, amount);
        plan.credit = Some(credit);
        Ok((plan, debt))
    }

    /// `payer` repays up to `amount` of `account`'s debt. Returns the amount repaid.
    pub fn repay(&mut self, payer: Address, account: Address, id: TokenId, amount: u128) -> Result<u128, WaveError> {
        let planned = self.plan_repay(payer, account, id, amount);
        let repaid = self.execute("repay", id, planned)?;
        info!(token = %id, %payer, %account, repaid, "repay");
        Ok(repaid)
    }

    fn plan_repay(
        &self,
        payer: Address,
        account: Address,
        id: TokenId,
        amount: u128,
    ) -> Result<(Plan, u128), WaveError> {
        let token = self.token(id)?;
        let mut credit = token.credit.clone();
        let repaid = credit.repay(&account, amount)?;

        let mut plan = Plan::default();
        plan.transfer(Asset::Quote, payer, token.vault, repaid);
        plan.credit = Some(credit);
        Ok((plan, repaid))
    }

    /// Donate quote to the real reserve, lifting every holder's floor value.
    pub fn heal(&mut self, payer: Address, id: TokenId, amount: u128) -> Result<(), WaveError> {
        let planned = self.token(id).and_then(|token| {
            let mut market = token.market.clone();
            market.heal(amount)?;
            let mut plan = Plan::default();
            plan.transfer(Asset::Quote, payer, token.vault, amount);
            plan.market = Some(market);
            Ok((plan, ()))
        });
        self.execute("heal", id, planned)?;
        info!(token = %id, %payer, amount, "heal");
        Ok(())
    }

    /// Destroy `amount` of `holder`'s tokens without a payout.
    pub fn burn(&mut self, holder: Address, id: TokenId, amount: u128) -> Result<(), WaveError> {
        let planned = self.plan_release(&holder, id, amount).and_then(|asset| {
            let mut market = self.token(id)?.market.clone();
            market.burn(amount)?;
            let mut plan = Plan::default();
            plan.burn(asset, holder, amount);
            plan.market = Some(market);
            Ok((plan, ()))
        });
        self.execute("burn", id, planned)?;
        info!(token = %id, %holder, amount, "burn");
        Ok(())
    }

    /// Check `holder` may give up `amount` tokens. Returns the token's asset.
    fn plan_release(&self, holder: &Address, id: TokenId, amount: u128) -> Result<Asset, WaveError> {
        let token = self.token(id)?;
        let asset = token.asset();
        self.ledger.ensure_balance(asset, holder, amount)?;
        let balance = self.ledger.balance(asset, holder);
        token.credit.ensure_can_release(&token.market, holder, balance, amount)?;
        Ok(asset)
    }

    // ------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------

    /// Register a content item under token `id`. Returns the item id.
    pub fn create_content(
        &mut self,
        creator: Address,
        id: TokenId,
        uri: impl Into<String>,
        now: u64,
    ) -> Result<u64, WaveError> {
        let token = self.token_mut(id)?;
        let item = token.content.create(creator, uri, now);
        info!(token = %id, item, %creator, "content created");
        Ok(item)
    }

    /// Collect a content item at its live price; the price funds the quote stream.
    pub fn collect_content(&mut self, request: &CollectRequest, now: u64) -> Result<Collection, WaveError> {
        let planned = self.plan_collect(request, now);
        let (collection, funding) = self.execute("collect_content", request.token, planned)?;
        info!(
            token = %request.token,
            item = collection.item_id,
            collector = %collection.collector,
            price = collection.price,
            epoch = collection.epoch,
            notified = ?funding.notified,
            "content collected"
        );
        Ok(collection)
    }

    fn plan_collect(
        &self,
        request: &CollectRequest,
        now: u64,
    ) -> Result<(Plan, (Collection, FundOutcome)), WaveError> {
        let token = self.token(request.token)?;
        let mut content = token.content.clone();
        let collection = content.collect(
            request.item,
            request.collector,
            request.expected_epoch,
            request.deadline,
            request.max_price,
            now,
        )?;
        let previous = collection.previous_owner.map(|owner| (owner, collection.previous_price));
        let mut rewards = token.rewards.clone();
        let funding = rewards.record_collection(request.collector, previous, collection.price, now)?;

        let mut plan = Plan::default();
        plan.transfer(Asset::Quote, request.collector, token.reward_vault, collection.price);
        plan.content = Some(content);
        plan.rewards = Some(rewards);
        Ok((plan, (collection, funding)))
    }

    // ------------------------------------------------------------------
    // Rewards
    // ------------------------------------------------------------------

    /// Fund a new reward period from `funder`. Returns the new rate.
    ///
    /// Token funding counts as giving tokens up, so it is gated by the
    /// funder's debt like a transfer.
    pub fn notify_reward(
        &mut self,
        funder: Address,
        id: TokenId,
        asset: RewardAsset,
        amount: u128,
        now: u64,
    ) -> Result<u128, WaveError> {
        let planned = self.token(id).and_then(|token| {
            if asset == RewardAsset::Token {
                self.plan_release(&funder, id, amount)?;
            }
            let mut rewards = token.rewards.clone();
            let rate = rewards.notify(asset, amount, now)?;
            let mut plan = Plan::default();
            plan.transfer(asset.ledger_asset(id), funder, token.reward_vault, amount);
            plan.rewards = Some(rewards);
            Ok((plan, rate))
        });
        let rate = self.execute("notify_reward", id, planned)?;
        info!(token = %id, %funder, ?asset, amount, rate, "reward notified");
        Ok(rate)
    }

    /// Pay out everything `account` earned from token `id`'s pool.
    pub fn claim_rewards(
        &mut self,
        account: Address,
        id: TokenId,
        now: u64,
    ) -> Result<Vec<(RewardAsset, u128)>, WaveError> {
        let planned = self.token(id).and_then(|token| {
            let mut rewards = token.rewards.clone();
            let payouts = rewards.claim(account, now)?;
            let mut plan = Plan::default();
            for (asset, amount) in &payouts {
                plan.transfer(asset.ledger_asset(id), token.reward_vault, account, *amount);
            }
            plan.rewards = Some(rewards);
            Ok((plan, payouts))
        });
        let payouts = self.execute("claim_rewards", id, planned)?;
        info!(token = %id, %account, ?payouts, "rewards claimed");
        Ok(payouts)
    }

    /// Start new periods from queued fee funding that now qualifies.
    ///
    /// Anyone may call this. The queue already sits in the reward vault, so
    /// no funds move.
    pub fn distribute_rewards(&mut self, id: TokenId, now: u64) -> Result<Vec<(RewardAsset, u128)>, WaveError> {
        let planned = self.token(id).and_then(|token| {
            let mut rewards = token.rewards.clone();
            let notified = rewards.distribute(now)?;
            let plan = Plan { rewards: Some(rewards), ..Plan::default() };
            Ok((plan, notified))
        });
        let notified = self.execute("distribute_rewards", id, planned)?;
        if !notified.is_empty() {
            info!(token = %id, ?notified, "queued rewards distributed");
        }
        Ok(notified)
    }

    // ------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------

    /// Commit a planned operation, logging the rejection if either phase fails.
    fn execute<T>(
        &mut self,
        op: &'static str,
        id: TokenId,
        planned: Result<(Plan, T), WaveError>,
    ) -> Result<T, WaveError> {
        let result = planned.and_then(|(plan, out)| {
            self.commit(id, plan)?;
            Ok(out)
        });
        if let Err(e) = &result {
            debug!(op, token = %id, error = %e, "request rejected");
        }
        result
    }

    fn commit(&mut self, id: TokenId, plan: Plan) -> Result<(), WaveError> {
        let token = self.tokens.get_mut(id.index()).ok_or(WaveError::UnknownToken(id))?;
        self.ledger.apply_batch(&plan.movements)?;
        if let Some(market) = plan.market {
            token.market = market;
        }
        if let Some(credit) = plan.credit {
            token.credit = credit;
        }
        if let Some(content) = plan.content {
            token.content = content;
        }
        if let Some(rewards) = plan.rewards {
            token.rewards = rewards;
        }
        Ok(())
    }
}
