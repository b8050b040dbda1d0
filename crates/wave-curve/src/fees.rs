//! Trading fee split.
//!
//! The fee is taken from the swap input before the curve sees it. The split
//! is pure: callers decide where each share goes.

use serde::{Deserialize, Serialize};

use wave_core::config::FeeConfig;
use wave_core::constants::{FEE_BPS, REFERRER_SHARE_BPS, TREASURY_SHARE_BPS};
use wave_core::error::MathError;
use wave_core::math::{apply_bps, sub};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub fee_bps: u128,
    pub referrer_share_bps: u128,
    pub treasury_share_bps: u128,
}

/// How a gross input amount is divided.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub referrer: u128,
    pub treasury: u128,
    pub rewards: u128,
    /// What is left for the curve.
    pub net: u128,
}

impl FeeBreakdown {
    pub fn fee(&self) -> u128 {
        self.referrer + self.treasury + self.rewards
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            fee_bps: FEE_BPS,
            referrer_share_bps: REFERRER_SHARE_BPS,
            treasury_share_bps: TREASURY_SHARE_BPS,
        }
    }
}

impl From<&FeeConfig> for FeeSchedule {
    fn from(cfg: &FeeConfig) -> Self {
        Self {
            fee_bps: cfg.fee_bps as u128,
            referrer_share_bps: cfg.referrer_share_bps as u128,
            treasury_share_bps: cfg.treasury_share_bps as u128,
        }
    }
}

impl FeeSchedule {
    /// A schedule that charges nothing.
    pub fn free() -> Self {
        Self { fee_bps: 0, referrer_share_bps: 0, treasury_share_bps: 0 }
    }

    /// Split `amount` into fee shares and the net input.
    ///
    /// A missing referrer or treasury forfeits its share to rewards.
    pub fn split(
        &self,
        amount: u128,
        has_referrer: bool,
        has_treasury: bool,
    ) -> Result<FeeBreakdown, MathError> {
        let fee = apply_bps(amount, self.fee_bps)?;
        let referrer = if has_referrer { apply_bps(fee, self.referrer_share_bps)? } else { 0 };
        let treasury = if has_treasury { apply_bps(fee, self.treasury_share_bps)? } else { 0 };
        let rewards = sub(sub(fee, referrer)?, treasury)?;
        Ok(FeeBreakdown { referrer, treasury, rewards, net: sub(amount, fee)? })
    }
}
