//! Reward pool with per-asset streams and a reward-per-stake accumulator.
//!
//! Rates and the accumulator are scaled by [`RATE_PRECISION`]. Time during
//! which the total stake is zero accrues to nobody.
//!
//! Every mutating method settles the streams at `now`, computes the new
//! state into locals, and only assigns once nothing can fail. Settling also
//! notifies a queue that has come to qualify.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use wave_core::constants::RATE_PRECISION;
use wave_core::error::{MathError, RewardError};
use wave_core::math::{add, mul_div, sub};
use wave_core::types::{Address, RewardAsset};

fn slot(asset: RewardAsset) -> usize {
    match asset {
        RewardAsset::Quote => 0,
        RewardAsset::Token => 1,
    }
}

/// One reward currency's payout schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardStream {
    /// Payout per second, scaled by `RATE_PRECISION`.
    pub reward_rate: u128,
    pub period_finish: u64,
    pub last_update: u64,
    /// Accumulated reward per unit of stake, scaled by `RATE_PRECISION`.
    pub reward_per_stake: u128,
    /// Internal funding waiting until it can be notified.
    pub queued: u128,
    /// Funded and not yet claimed, including the queue.
    pub total_unclaimed: u128,
}

impl RewardStream {
    fn last_time_applicable(&self, now: u64) -> u64 {
        now.min(self.period_finish)
    }

    fn reward_per_stake_at(&self, total_stake: u128, now: u64) -> Result<u128, MathError> {
        let until = self.last_time_applicable(now);
        if total_stake == 0 || until <= self.last_update {
            return Ok(self.reward_per_stake);
        }
        let elapsed = (until - self.last_update) as u128;
        add(self.reward_per_stake, mul_div(elapsed, self.reward_rate, total_stake)?)
    }

    /// Stream state with the accumulator brought up to `now`.
    fn settle(&self, total_stake: u128, now: u64) -> Result<Self, MathError> {
        Ok(Self {
            reward_per_stake: self.reward_per_stake_at(total_stake, now)?,
            last_update: self.last_time_applicable(now).max(self.last_update),
            ..*self
        })
    }

    /// Undistributed remainder of the current period.
    pub fn left(&self, now: u64) -> Result<u128, MathError> {
        if now >= self.period_finish {
            return Ok(0);
        }
        mul_div((self.period_finish - now) as u128, self.reward_rate, RATE_PRECISION)
    }

    /// Start a fresh period funded by `amount` plus the remainder.
    fn notified(&self, amount: u128, duration: u64, now: u64) -> Result<Self, RewardError> {
        let left = self.left(now)?;
        let rate = mul_div(add(amount, left)?, RATE_PRECISION, duration as u128)?;
        if now < self.period_finish && (amount < left || rate < self.reward_rate) {
            return Err(RewardError::RewardSmallerThanLeft { amount, left });
        }
        if amount < duration as u128 {
            return Err(RewardError::RewardTooSmall { amount, duration });
        }
        Ok(Self {
            reward_rate: rate,
            last_update: now,
            period_finish: now.checked_add(duration).ok_or(MathError::Overflow)?,
            ..*self
        })
    }

    /// Notify the queue into a new period once it qualifies.
    fn flushed(&self, duration: u64, now: u64) -> Result<Self, MathError> {
        if self.queued == 0 {
            return Ok(*self);
        }
        match self.notified(self.queued, duration, now) {
            Ok(next) => Ok(Self { queued: 0, ..next }),
            Err(RewardError::Math(e)) => Err(e),
            Err(_) => Ok(*self),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Checkpoint {
    paid_per_stake: u128,
    accrued: u128,
}

impl Checkpoint {
    fn earned(&self, stake: u128, reward_per_stake: u128) -> Result<u128, MathError> {
        let delta = sub(reward_per_stake, self.paid_per_stake)?;
        add(self.accrued, mul_div(stake, delta, RATE_PRECISION)?)
    }
}

/// A staker's position across every stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub stake: u128,
    checkpoints: [Checkpoint; 2],
}

impl Position {
    fn is_empty(&self) -> bool {
        self.stake == 0 && self.checkpoints.iter().all(|c| c.accrued == 0)
    }
}

/// What happened to an internal funding top-up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundOutcome {
    /// Amount notified into a new period, if the queue qualified.
    pub notified: Option<u128>,
    /// Amount still waiting in the queue.
    pub queued: u128,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPool {
    duration: u64,
    total_stake: u128,
    streams: [RewardStream; 2],
    positions: BTreeMap<Address, Position>,
}

impl RewardPool {
    pub fn new(duration: u64) -> Self {
        Self {
            duration,
            total_stake: 0,
            streams: [RewardStream::default(); 2],
            positions: BTreeMap::new(),
        }
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn total_stake(&self) -> u128 {
        self.total_stake
    }

    pub fn stake_of(&self, account: &Address) -> u128 {
        self.positions.get(account).map_or(0, |p| p.stake)
    }

    pub fn stream(&self, asset: RewardAsset) -> &RewardStream {
        &self.streams[slot(asset)]
    }

    pub fn reward_rate(&self, asset: RewardAsset) -> u128 {
        self.stream(asset).reward_rate
    }

    pub fn period_finish(&self, asset: RewardAsset) -> u64 {
        self.stream(asset).period_finish
    }

    pub fn total_unclaimed(&self, asset: RewardAsset) -> u128 {
        self.stream(asset).total_unclaimed
    }

    pub fn queued(&self, asset: RewardAsset) -> u128 {
        self.stream(asset).queued
    }

    pub fn left(&self, asset: RewardAsset, now: u64) -> Result<u128, RewardError> {
        Ok(self.stream(asset).left(now)?)
    }

    /// Accrued and unclaimed reward of `account` in `asset` at `now`.
    pub fn earned(&self, asset: RewardAsset, account: &Address, now: u64) -> Result<u128, RewardError> {
        let stream = self.stream(asset).settle(self.total_stake, now)?;
        let position = self.positions.get(account).copied().unwrap_or_default();
        Ok(position.checkpoints[slot(asset)].earned(position.stake, stream.reward_per_stake)?)
    }

    /// Streams settled at `now`, with any queue that now qualifies notified.
    fn settled_streams(&self, now: u64) -> Result<[RewardStream; 2], MathError> {
        let settle = |stream: &RewardStream| {
            stream.settle(self.total_stake, now)?.flushed(self.duration, now)
        };
        Ok([settle(&self.streams[0])?, settle(&self.streams[1])?])
    }

    fn settled_position(
        &self,
        streams: &[RewardStream; 2],
        touched: &BTreeMap<Address, Position>,
        account: &Address,
    ) -> Result<Position, MathError> {
        if let Some(position) = touched.get(account) {
            return Ok(*position);
        }
        let mut position = self.positions.get(account).copied().unwrap_or_default();
        for (checkpoint, stream) in position.checkpoints.iter_mut().zip(streams) {
            checkpoint.accrued = checkpoint.earned(position.stake, stream.reward_per_stake)?;
            checkpoint.paid_per_stake = stream.reward_per_stake;
        }
        Ok(position)
    }

    /// Settle, withdraw then deposit stakes, and return the touched
    /// positions with the new total.
    fn plan_stakes(
        &self,
        streams: &[RewardStream; 2],
        withdrawals: &[(Address, u128)],
        deposits: &[(Address, u128)],
    ) -> Result<(BTreeMap<Address, Position>, u128), RewardError> {
        let mut touched = BTreeMap::new();
        let mut total = self.total_stake;
        for (account, amount) in withdrawals {
            let mut position = self.settled_position(streams, &touched, account)?;
            if position.stake < *amount {
                return Err(RewardError::StakeUnderflow { amount: *amount, stake: position.stake });
            }
            position.stake -= amount;
            total = sub(total, *amount)?;
            touched.insert(*account, position);
        }
        for (account, amount) in deposits {
            let mut position = self.settled_position(streams, &touched, account)?;
            position.stake = add(position.stake, *amount)?;
            total = add(total, *amount)?;
            touched.insert(*account, position);
        }
        Ok((touched, total))
    }

    fn plan_fund(
        &self,
        stream: &RewardStream,
        amount: u128,
        now: u64,
    ) -> Result<(RewardStream, FundOutcome), RewardError> {
        let queued = add(stream.queued, amount)?;
        let pending = RewardStream {
            queued,
            total_unclaimed: add(stream.total_unclaimed, amount)?,
            ..*stream
        };
        let next = pending.flushed(self.duration, now)?;
        let outcome = if next.queued == 0 {
            FundOutcome { notified: Some(queued), queued: 0 }
        } else {
            FundOutcome { notified: None, queued }
        };
        Ok((next, outcome))
    }

    fn commit(&mut self, streams: [RewardStream; 2], touched: BTreeMap<Address, Position>, total: u128) {
        self.streams = streams;
        self.total_stake = total;
        for (account, position) in touched {
            if position.is_empty() {
                self.positions.remove(&account);
            } else {
                self.positions.insert(account, position);
            }
        }
    }

    pub fn deposit(&mut self, account: Address, amount: u128, now: u64) -> Result<(), RewardError> {
        let streams = self.settled_streams(now)?;
        let (touched, total) = self.plan_stakes(&streams, &[], &[(account, amount)])?;
        self.commit(streams, touched, total);
        Ok(())
    }

    pub fn withdraw(&mut self, account: Address, amount: u128, now: u64) -> Result<(), RewardError> {
        let streams = self.settled_streams(now)?;
        let (touched, total) = self.plan_stakes(&streams, &[(account, amount)], &[])?;
        self.commit(streams, touched, total);
        Ok(())
    }

    /// Move an item's stake to its new curator and fund the quote stream
    /// with the price paid.
    ///
    /// `previous` is the prior curator and the stake they held for the item.
    pub fn record_collection(
        &mut self,
        collector: Address,
        previous: Option<(Address, u128)>,
        price: u128,
        now: u64,
    ) -> Result<FundOutcome, RewardError> {
        let mut streams = self.settled_streams(now)?;
        let withdrawals: Vec<_> = previous.into_iter().filter(|(_, stake)| *stake > 0).collect();
        let (touched, total) = self.plan_stakes(&streams, &withdrawals, &[(collector, price)])?;
        let quote = slot(RewardAsset::Quote);
        let mut outcome = FundOutcome { notified: None, queued: streams[quote].queued };
        if price > 0 {
            let (funded, funding) = self.plan_fund(&streams[quote], price, now)?;
            streams[quote] = funded;
            outcome = funding;
        }
        self.commit(streams, touched, total);
        Ok(outcome)
    }

    /// Queue internal funding and notify it once it satisfies the top-up rules.
    ///
    /// Never fails on an under-sized amount; only arithmetic overflow is an error.
    pub fn fund(&mut self, asset: RewardAsset, amount: u128, now: u64) -> Result<FundOutcome, RewardError> {
        if amount == 0 {
            return Ok(FundOutcome { notified: None, queued: self.queued(asset) });
        }
        let mut streams = self.settled_streams(now)?;
        let (funded, outcome) = self.plan_fund(&streams[slot(asset)], amount, now)?;
        streams[slot(asset)] = funded;
        self.streams = streams;
        Ok(outcome)
    }

    /// Start a new period with `amount`. Returns the new rate.
    ///
    /// # Errors
    ///
    /// - [`RewardError::RewardSmallerThanLeft`] while a period runs, if `amount`
    ///   is below the remainder or the new rate would be lower
    /// - [`RewardError::RewardTooSmall`] if `amount` is below the duration
    pub fn notify(&mut self, asset: RewardAsset, amount: u128, now: u64) -> Result<u128, RewardError> {
        let mut streams = self.settled_streams(now)?;
        let current = streams[slot(asset)];
        let next = current.notified(amount, self.duration, now)?;
        let rate = next.reward_rate;
        streams[slot(asset)] = RewardStream {
            total_unclaimed: add(current.total_unclaimed, amount)?,
            ..next
        };
        self.streams = streams;
        Ok(rate)
    }

    /// Notify every queue that qualifies at `now` without new funding.
    ///
    /// Returns the amounts moved into new periods.
    pub fn distribute(&mut self, now: u64) -> Result<Vec<(RewardAsset, u128)>, RewardError> {
        let streams = self.settled_streams(now)?;
        let notified = RewardAsset::ALL
            .into_iter()
            .filter_map(|asset| {
                let before = self.queued(asset);
                (before > 0 && streams[slot(asset)].queued == 0).then_some((asset, before))
            })
            .collect();
        self.streams = streams;
        Ok(notified)
    }

    /// Pay out everything `account` has earned. Returns non-zero payouts.
    pub fn claim(&mut self, account: Address, now: u64) -> Result<Vec<(RewardAsset, u128)>, RewardError> {
        let mut streams = self.settled_streams(now)?;
        let mut position = self.settled_position(&streams, &BTreeMap::new(), &account)?;
        let mut payouts = Vec::new();
        for asset in RewardAsset::ALL {
            let i = slot(asset);
            let amount = position.checkpoints[i].accrued;
            if amount == 0 {
                continue;
            }
            streams[i].total_unclaimed = sub(streams[i].total_unclaimed, amount)?;
            position.checkpoints[i].accrued = 0;
            payouts.push((asset, amount));
        }
        let total = self.total_stake;
        self.commit(streams, BTreeMap::from([(account, position)]), total);
        Ok(payouts)
    }
}
