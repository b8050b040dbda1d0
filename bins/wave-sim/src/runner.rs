//! Executes a [`Scenario`] against an in-memory engine.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use wave_core::clock::ManualClock;
use wave_core::config::DeploymentConfig;
use wave_core::error::WaveError;
use wave_core::ledger::MemoryLedger;
use wave_core::traits::{Clock, Ledger};
use wave_core::types::{Address, Asset, RewardAsset, TokenId};
use wave_engine::{CollectRequest, Engine, SwapRequest, TokenMetadata};

use crate::scenario::{format_units, parse_units, Action, Scenario, Step, QUOTE_DECIMALS, TOKEN_DECIMALS};

/// What happened at one step.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub index: usize,
    pub now: u64,
    pub op: &'static str,
    pub outcome: String,
}

pub struct Runner {
    engine: Engine<MemoryLedger>,
    clock: ManualClock,
    labels: BTreeMap<Address, String>,
}

impl Runner {
    /// Build the engine and fund the scenario's accounts.
    pub fn new(config: DeploymentConfig, scenario: &Scenario) -> Result<Self> {
        let mut labels = BTreeMap::new();
        let owner = Address::from_label(&scenario.owner);
        labels.insert(owner, scenario.owner.clone());

        let mut ledger = MemoryLedger::new();
        for funding in &scenario.accounts {
            let address = Address::from_label(&funding.label);
            let amount = parse_units(&funding.quote, QUOTE_DECIMALS)
                .with_context(|| format!("Invalid funding for {}", funding.label))?;
            ledger
                .mint(Asset::Quote, &address, amount)
                .with_context(|| format!("Failed to fund {}", funding.label))?;
            labels.insert(address, funding.label.clone());
        }

        let engine = Engine::new(config, owner, ledger).context("Failed to build engine")?;
        Ok(Self { engine, clock: ManualClock::new(scenario.start_time), labels })
    }

    pub fn engine(&self) -> &Engine<MemoryLedger> {
        &self.engine
    }

    /// Run every step in order, stopping at the first unexpected outcome.
    pub fn run(&mut self, scenario: &Scenario) -> Result<Vec<StepReport>> {
        let mut reports = Vec::with_capacity(scenario.steps.len());
        for (index, step) in scenario.steps.iter().enumerate() {
            let report = self
                .step(index, step)
                .with_context(|| format!("Step {index} ({}) failed", step.action.name()))?;
            reports.push(report);
        }
        Ok(reports)
    }

    fn step(&mut self, index: usize, step: &Step) -> Result<StepReport> {
        let now = self.clock.now();
        let op = step.action.name();
        let result = self.apply(&step.action, now)?;
        let outcome = match (result, &step.expect_error) {
            (Ok(outcome), None) => outcome,
            (Ok(outcome), Some(expected)) => {
                bail!("Expected error containing {expected:?}, got success: {outcome}")
            }
            (Err(e), Some(expected)) if e.to_string().contains(expected.as_str()) => {
                info!(index, op, error = %e, "step failed as expected");
                format!("rejected as expected: {e}")
            }
            (Err(e), _) => {
                warn!(index, op, error = %e, "step failed");
                return Err(e.into());
            }
        };
        Ok(StepReport { index, now, op, outcome })
    }

    fn address(&mut self, label: &str) -> Address {
        let address = Address::from_label(label);
        self.labels.entry(address).or_insert_with(|| label.to_string());
        address
    }

    /// Token amount for `holder`; `"all"` is the full balance.
    fn token_amount(&self, text: &str, token: TokenId, holder: &Address) -> Result<u128> {
        if text == "all" {
            return Ok(self.engine.balance(Asset::Token(token), holder));
        }
        parse_units(text, TOKEN_DECIMALS)
    }

    fn optional_units(text: Option<&String>, decimals: u32, default: u128) -> Result<u128> {
        text.map_or(Ok(default), |t| parse_units(t, decimals))
    }

    /// Apply one action. Outer error: malformed step. Inner error: engine rejection.
    fn apply(&mut self, action: &Action, now: u64) -> Result<Result<String, WaveError>> {
        let outcome = match action {
            Action::Advance { secs } => {
                let now = self.clock.advance(*secs);
                Ok(format!("clock at {now}"))
            }
            Action::CreateToken { creator, name, symbol, cover_uri, seed } => {
                let creator = self.address(creator);
                let seed = parse_units(seed, QUOTE_DECIMALS)?;
                let metadata = TokenMetadata {
                    name: name.clone(),
                    symbol: symbol.clone(),
                    cover_uri: cover_uri.clone(),
                };
                self.engine
                    .create_token(creator, metadata, seed, now)
                    .map(|id| format!("created token {id}"))
            }
            Action::Buy { trader, token, amount, min_out, deadline, referrer } => {
                let request = SwapRequest {
                    token: TokenId(*token),
                    trader: self.address(trader),
                    amount_in: parse_units(amount, QUOTE_DECIMALS)?,
                    min_amount_out: Self::optional_units(min_out.as_ref(), TOKEN_DECIMALS, 0)?,
                    deadline: *deadline,
                    referrer: referrer.as_deref().map(|r| self.address(r)),
                };
                self.engine.buy(&request, now).map(|t| {
                    format!(
                        "paid {} quote, got {} tokens (fee {})",
                        format_units(t.amount_in, QUOTE_DECIMALS),
                        format_units(t.amount_out, TOKEN_DECIMALS),
                        format_units(t.fees.fee(), QUOTE_DECIMALS)
                    )
                })
            }
            Action::Sell { trader, token, amount, min_out, deadline, referrer } => {
                let id = TokenId(*token);
                let trader = self.address(trader);
                let request = SwapRequest {
                    token: id,
                    trader,
                    amount_in: self.token_amount(amount, id, &trader)?,
                    min_amount_out: Self::optional_units(min_out.as_ref(), QUOTE_DECIMALS, 0)?,
                    deadline: *deadline,
                    referrer: referrer.as_deref().map(|r| self.address(r)),
                };
                self.engine.sell(&request, now).map(|t| {
                    format!(
                        "sold {} tokens, got {} quote (fee {} tokens)",
                        format_units(t.amount_in, TOKEN_DECIMALS),
                        format_units(t.amount_out, QUOTE_DECIMALS),
                        format_units(t.fees.fee(), TOKEN_DECIMALS)
                    )
                })
            }
            Action::Transfer { from, to, token, amount } => {
                let id = TokenId(*token);
                let (from, to) = (self.address(from), self.address(to));
                let amount = self.token_amount(amount, id, &from)?;
                self.engine
                    .transfer(from, to, id, amount)
                    .map(|()| format!("moved {} tokens", format_units(amount, TOKEN_DECIMALS)))
            }
            Action::Borrow { account, token, amount } => {
                let account = self.address(account);
                let amount = parse_units(amount, QUOTE_DECIMALS)?;
                self.engine
                    .borrow(account, TokenId(*token), amount)
                    .map(|debt| format!("debt now {}", format_units(debt, QUOTE_DECIMALS)))
            }
            Action::Repay { payer, account, token, amount } => {
                let (payer, account) = (self.address(payer), self.address(account));
                let amount = parse_units(amount, QUOTE_DECIMALS)?;
                self.engine
                    .repay(payer, account, TokenId(*token), amount)
                    .map(|repaid| format!("repaid {}", format_units(repaid, QUOTE_DECIMALS)))
            }
            Action::Heal { payer, token, amount } => {
                let payer = self.address(payer);
                let amount = parse_units(amount, QUOTE_DECIMALS)?;
                self.engine
                    .heal(payer, TokenId(*token), amount)
                    .map(|()| format!("healed {}", format_units(amount, QUOTE_DECIMALS)))
            }
            Action::Burn { holder, token, amount } => {
                let id = TokenId(*token);
                let holder = self.address(holder);
                let amount = self.token_amount(amount, id, &holder)?;
                self.engine
                    .burn(holder, id, amount)
                    .map(|()| format!("burned {} tokens", format_units(amount, TOKEN_DECIMALS)))
            }
            Action::CreateContent { creator, token, uri } => {
                let creator = self.address(creator);
                self.engine
                    .create_content(creator, TokenId(*token), uri.as_str(), now)
                    .map(|item| format!("created item {item}"))
            }
            Action::Collect { collector, token, item, epoch, max_price, deadline } => {
                let request = CollectRequest {
                    token: TokenId(*token),
                    item: *item,
                    collector: self.address(collector),
                    expected_epoch: *epoch,
                    deadline: *deadline,
                    max_price: Self::optional_units(max_price.as_ref(), QUOTE_DECIMALS, u128::MAX)?,
                };
                self.engine.collect_content(&request, now).map(|c| {
                    format!(
                        "collected item {} for {} (epoch {})",
                        c.item_id,
                        format_units(c.price, QUOTE_DECIMALS),
                        c.epoch
                    )
                })
            }
            Action::SetCoverUri { caller, token, uri } => {
                let caller = self.address(caller);
                self.engine
                    .set_cover_uri(caller, TokenId(*token), uri.as_str())
                    .map(|()| format!("cover uri {uri}"))
            }
            Action::Notify { funder, token, asset, amount } => {
                let funder = self.address(funder);
                let decimals = match asset {
                    RewardAsset::Quote => QUOTE_DECIMALS,
                    RewardAsset::Token => TOKEN_DECIMALS,
                };
                let amount = parse_units(amount, decimals)?;
                self.engine
                    .notify_reward(funder, TokenId(*token), *asset, amount, now)
                    .map(|rate| format!("reward rate {rate}"))
            }
            Action::Claim { account, token } => {
                let account = self.address(account);
                self.engine.claim_rewards(account, TokenId(*token), now).map(|payouts| {
                    let paid: Vec<String> =
                        payouts.iter().map(|(asset, amount)| format!("{amount} {asset:?}")).collect();
                    format!("claimed [{}]", paid.join(", "))
                })
            }
            Action::Distribute { token } => self.engine.distribute_rewards(TokenId(*token), now).map(|notified| {
                if notified.is_empty() {
                    return "nothing to distribute".to_string();
                }
                let moved: Vec<String> =
                    notified.iter().map(|(asset, amount)| format!("{amount} {asset:?}")).collect();
                format!("distributed [{}]", moved.join(", "))
            }),
            Action::SetTreasury { caller, treasury } => {
                let caller = self.address(caller);
                let treasury = treasury.as_deref().map(|t| self.address(t));
                self.engine.set_treasury(caller, treasury).map(|()| match treasury {
                    Some(t) => format!("treasury {}", self.label(&t)),
                    None => "treasury cleared".to_string(),
                })
            }
            Action::Snapshot { token, account } => {
                let account = account.as_deref().map(|a| self.address(a));
                match self.engine.snapshot(TokenId(*token), account.as_ref(), now) {
                    Ok(snapshot) => Ok(serde_json::to_string_pretty(&snapshot)
                        .context("Failed to render snapshot")?),
                    Err(e) => Err(e),
                }
            }
        };
        Ok(outcome)
    }

    /// Label an address was introduced under, or its hex form.
    pub fn label(&self, address: &Address) -> String {
        self.labels.get(address).cloned().unwrap_or_else(|| address.to_string())
    }

    /// Final quote and token balances of every labelled account.
    pub fn balances(&self) -> Vec<(String, Asset, u128)> {
        let mut rows = Vec::new();
        for (address, label) in &self.labels {
            let quote = self.engine.balance(Asset::Quote, address);
            if quote > 0 {
                rows.push((label.clone(), Asset::Quote, quote));
            }
            for token in self.engine.tokens() {
                let held = self.engine.balance(token.asset(), address);
                if held > 0 {
                    rows.push((label.clone(), token.asset(), held));
                }
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wave_core::constants::QUOTE_UNIT;

    fn scenario(json: &str) -> Scenario {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn bundled_lifecycle_runs_clean() {
        let scenario = scenario(include_str!("../scenarios/lifecycle.json"));
        let mut runner = Runner::new(DeploymentConfig::default(), &scenario).unwrap();
        let reports = runner.run(&scenario).unwrap();
        assert_eq!(reports.len(), scenario.steps.len());
        assert_eq!(runner.engine().token_count(), 2);
    }

    #[test]
    fn unexpected_success_fails_the_run() {
        let scenario = scenario(
            r#"{
                "accounts": [{ "label": "alice", "quote": "100" }],
                "steps": [
                    { "op": "create_token", "creator": "alice", "name": "A", "symbol": "A", "seed": "1",
                      "expect_error": "seed too small" }
                ]
            }"#,
        );
        let mut runner = Runner::new(DeploymentConfig::default(), &scenario).unwrap();
        assert!(runner.run(&scenario).is_err());
    }

    #[test]
    fn expected_rejection_passes() {
        let scenario = scenario(
            r#"{
                "accounts": [{ "label": "alice", "quote": "100" }],
                "steps": [
                    { "op": "create_token", "creator": "alice", "name": "A", "symbol": "A", "seed": "0",
                      "expect_error": "seed too small" },
                    { "op": "set_treasury", "caller": "alice", "treasury": "alice",
                      "expect_error": "unauthorized" }
                ]
            }"#,
        );
        let mut runner = Runner::new(DeploymentConfig::default(), &scenario).unwrap();
        let reports = runner.run(&scenario).unwrap();
        assert!(reports.iter().all(|r| r.outcome.starts_with("rejected as expected")));
        assert_eq!(runner.engine().token_count(), 0);
    }

    #[test]
    fn distribute_waits_for_the_period_to_end() {
        let scenario = scenario(
            r#"{
                "accounts": [{ "label": "alice", "quote": "20000" }],
                "steps": [
                    { "op": "create_token", "creator": "alice", "name": "A", "symbol": "A", "seed": "1000" },
                    { "op": "buy", "trader": "alice", "token": 0, "amount": "10000" },
                    { "op": "buy", "trader": "alice", "token": 0, "amount": "1000" },
                    { "op": "distribute", "token": 0 },
                    { "op": "advance", "secs": 604800 },
                    { "op": "distribute", "token": 0 }
                ]
            }"#,
        );
        let mut runner = Runner::new(DeploymentConfig::default(), &scenario).unwrap();
        let reports = runner.run(&scenario).unwrap();
        assert_eq!(reports[3].outcome, "nothing to distribute");
        assert_eq!(reports[5].outcome, "distributed [10000000 Quote]");
    }

    #[test]
    fn advance_moves_the_clock() {
        let scenario = scenario(
            r#"{ "start_time": 100, "steps": [ { "op": "advance", "secs": 50 }, { "op": "advance", "secs": 0 } ] }"#,
        );
        let mut runner = Runner::new(DeploymentConfig::default(), &scenario).unwrap();
        let reports = runner.run(&scenario).unwrap();
        assert_eq!(reports[0].now, 100);
        assert_eq!(reports[1].now, 150);
    }

    #[test]
    fn balances_list_funded_accounts() {
        let scenario = scenario(r#"{ "accounts": [{ "label": "alice", "quote": "2.5" }], "steps": [] }"#);
        let runner = Runner::new(DeploymentConfig::default(), &scenario).unwrap();
        assert_eq!(runner.balances(), vec![("alice".to_string(), Asset::Quote, 5 * QUOTE_UNIT / 2)]);
    }
}
