//! Deployment configuration for a Wavefront engine.
//!
//! Provides [`DeploymentConfig`] with defaults from [`crate::constants`].
//! Values can be loaded from a TOML file and overridden by environment
//! variables with the `WAVE__` prefix, e.g. `WAVE__FEES__FEE_BPS=50`.
//!
//! Amounts are stored as `u64` so they survive TOML and environment
//! parsing; accessors widen them to raw `u128` units.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    BPS_PRECISION, CONTENT_CEILING_MULTIPLIER_BPS, CONTENT_DECAY_SECS, CONTENT_MIN_INIT_PRICE,
    FEE_BPS, INITIAL_SUPPLY, PPB_PRECISION, REFERRER_SHARE_BPS, RESERVE_VIRT_QUOTE_RAW,
    REWARD_DURATION_SECS, TOKEN_UNIT, TREASURY_SHARE_BPS,
};
use crate::error::ConfigError;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "WAVE";

/// Immutable per-deployment parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DeploymentConfig {
    pub curve: CurveConfig,
    pub fees: FeeConfig,
    pub content: ContentConfig,
    pub rewards: RewardConfig,
}

/// Bonding-curve parameters applied to every new market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    /// Tokens placed in the curve at creation, in whole tokens.
    pub initial_supply_tokens: u64,
    /// Virtual quote reserve in raw quote units.
    pub virtual_quote: u64,
    /// Reject market creation without a positive seed.
    pub require_seed: bool,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            initial_supply_tokens: (INITIAL_SUPPLY / TOKEN_UNIT) as u64,
            virtual_quote: RESERVE_VIRT_QUOTE_RAW as u64,
            require_seed: true,
        }
    }
}

impl CurveConfig {
    /// Initial supply in raw token units.
    pub fn initial_supply(&self) -> u128 {
        self.initial_supply_tokens as u128 * TOKEN_UNIT
    }

    pub fn virtual_quote(&self) -> u128 {
        self.virtual_quote as u128
    }
}

/// Trading fee and its split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Fee on the input side of a swap.
    pub fee_bps: u64,
    /// Referrer share of the fee.
    pub referrer_share_bps: u64,
    /// Treasury share of the fee.
    pub treasury_share_bps: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            fee_bps: FEE_BPS as u64,
            referrer_share_bps: REFERRER_SHARE_BPS as u64,
            treasury_share_bps: TREASURY_SHARE_BPS as u64,
        }
    }
}

/// How a content item's price falls from its ceiling back to the minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceDecay {
    /// Straight line from ceiling to minimum over `duration_secs`.
    Linear { duration_secs: u64 },
    /// Keeps `retention_ppb / 10^9` of the excess per whole `step_secs`.
    Geometric { step_secs: u64, retention_ppb: u64 },
}

impl Default for PriceDecay {
    fn default() -> Self {
        Self::Linear { duration_secs: CONTENT_DECAY_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Price floor in raw quote units.
    pub min_init_price: u64,
    /// Ceiling after a collection, as bps of the price paid.
    pub ceiling_multiplier_bps: u64,
    pub decay: PriceDecay,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            min_init_price: CONTENT_MIN_INIT_PRICE as u64,
            ceiling_multiplier_bps: CONTENT_CEILING_MULTIPLIER_BPS as u64,
            decay: PriceDecay::default(),
        }
    }
}

impl ContentConfig {
    pub fn min_init_price(&self) -> u128 {
        self.min_init_price as u128
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Length of every reward period.
    pub duration_secs: u64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self { duration_secs: REWARD_DURATION_SECS }
    }
}

impl DeploymentConfig {
    /// Load defaults, then `path` (if any), then `WAVE__*` environment overrides.
    ///
    /// The result is validated before it is returned.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path.to_path_buf())
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: Self = builder
            .build()
            .map_err(|e| ConfigError::Source(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Source(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every parameter is usable.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Invalid`] naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        let bps = BPS_PRECISION as u64;

        if self.curve.initial_supply_tokens == 0 {
            return invalid("curve.initial_supply_tokens must be positive");
        }
        if self.curve.virtual_quote == 0 {
            return invalid("curve.virtual_quote must be positive");
        }
        if self
            .curve
            .virtual_quote()
            .checked_mul(self.curve.initial_supply())
            .is_none()
        {
            return invalid("curve.virtual_quote * initial supply overflows");
        }
        if self.fees.fee_bps >= bps {
            return invalid("fees.fee_bps must be below 10000");
        }
        if self.fees.referrer_share_bps + self.fees.treasury_share_bps > bps {
            return invalid("fees referrer + treasury shares exceed 10000");
        }
        if self.content.min_init_price == 0 {
            return invalid("content.min_init_price must be positive");
        }
        if self.content.ceiling_multiplier_bps < bps {
            return invalid("content.ceiling_multiplier_bps must be at least 10000");
        }
        match self.content.decay {
            PriceDecay::Linear { duration_secs: 0 } => {
                return invalid("content.decay.duration_secs must be positive");
            }
            PriceDecay::Geometric { step_secs, retention_ppb } => {
                if step_secs == 0 {
                    return invalid("content.decay.step_secs must be positive");
                }
                if retention_ppb >= PPB_PRECISION {
                    return invalid("content.decay.retention_ppb must be below 10^9");
                }
            }
            PriceDecay::Linear { .. } => {}
        }
        if self.rewards.duration_secs == 0 {
            return invalid("rewards.duration_secs must be positive");
        }
        Ok(())
    }
}
