//! Scenario files: a JSON script of engine operations.
//!
//! Accounts are named by label and mapped to addresses with
//! [`Address::from_label`]. Amounts are decimal strings in whole units
//! (`"0.001"` quote, `"12.5"` tokens) so they survive JSON without
//! precision loss; `"all"` means the actor's full token balance where a
//! token amount is expected.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use wave_core::types::RewardAsset;

/// Decimal places of the quote currency.
pub const QUOTE_DECIMALS: u32 = 6;
/// Decimal places of every creator token.
pub const TOKEN_DECIMALS: u32 = 18;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    /// Unix time of the first step.
    #[serde(default)]
    pub start_time: u64,
    /// Engine owner label.
    #[serde(default = "default_owner")]
    pub owner: String,
    /// Quote minted to each account before the first step.
    #[serde(default)]
    pub accounts: Vec<Funding>,
    pub steps: Vec<Step>,
}

fn default_owner() -> String {
    "owner".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Funding {
    pub label: String,
    pub quote: String,
}

/// One operation and, optionally, the error it must fail with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,
    /// Substring the error message must contain. The step must fail.
    #[serde(default)]
    pub expect_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    Advance { secs: u64 },
    CreateToken { creator: String, name: String, symbol: String, #[serde(default)] cover_uri: String, seed: String },
    Buy { trader: String, token: u32, amount: String, #[serde(default)] min_out: Option<String>, #[serde(default)] deadline: Option<u64>, #[serde(default)] referrer: Option<String> },
    Sell { trader: String, token: u32, amount: String, #[serde(default)] min_out: Option<String>, #[serde(default)] deadline: Option<u64>, #[serde(default)] referrer: Option<String> },
    Transfer { from: String, to: String, token: u32, amount: String },
    Borrow { account: String, token: u32, amount: String },
    Repay { payer: String, account: String, token: u32, amount: String },
    Heal { payer: String, token: u32, amount: String },
    Burn { holder: String, token: u32, amount: String },
    CreateContent { creator: String, token: u32, uri: String },
    Collect { collector: String, token: u32, item: u64, epoch: u64, #[serde(default)] max_price: Option<String>, #[serde(default)] deadline: Option<u64> },
    SetCoverUri { caller: String, token: u32, uri: String },
    Notify { funder: String, token: u32, asset: RewardAsset, amount: String },
    Claim { account: String, token: u32 },
    Distribute { token: u32 },
    SetTreasury { caller: String, #[serde(default)] treasury: Option<String> },
    Snapshot { token: u32, #[serde(default)] account: Option<String> },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Advance { .. } => "advance",
            Self::CreateToken { .. } => "create_token",
            Self::Buy { .. } => "buy",
            Self::Sell { .. } => "sell",
            Self::Transfer { .. } => "transfer",
            Self::Borrow { .. } => "borrow",
            Self::Repay { .. } => "repay",
            Self::Heal { .. } => "heal",
            Self::Burn { .. } => "burn",
            Self::CreateContent { .. } => "create_content",
            Self::Collect { .. } => "collect",
            Self::SetCoverUri { .. } => "set_cover_uri",
            Self::Notify { .. } => "notify",
            Self::Claim { .. } => "claim",
            Self::Distribute { .. } => "distribute",
            Self::SetTreasury { .. } => "set_treasury",
            Self::Snapshot { .. } => "snapshot",
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse scenario: {}", path.display()))
    }
}

/// Parse a decimal amount in whole units into raw units.
pub fn parse_units(text: &str, decimals: u32) -> Result<u128> {
    let text = text.trim();
    let (whole, frac) = match text.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        bail!("Empty amount");
    }
    if frac.len() > decimals as usize {
        bail!("Amount {text} has more than {decimals} decimals");
    }
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !digits(whole) || !digits(frac) {
        bail!("Invalid amount: {text}");
    }

    let scale = 10u128.pow(decimals);
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().context("Amount too large")? };
    let frac: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = decimals as usize);
        padded.parse().context("Invalid fraction")?
    };
    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac))
        .with_context(|| format!("Amount too large: {text}"))
}

/// Render raw units as a decimal string without trailing zeros.
pub fn format_units(raw: u128, decimals: u32) -> String {
    let scale = 10u128.pow(decimals);
    let whole = raw / scale;
    let frac = raw % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0>width$}", width = decimals as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_units_handles_decimals() {
        assert_eq!(parse_units("10", QUOTE_DECIMALS).unwrap(), 10_000_000);
        assert_eq!(parse_units("0.1", QUOTE_DECIMALS).unwrap(), 100_000);
        assert_eq!(parse_units(".5", QUOTE_DECIMALS).unwrap(), 500_000);
        assert_eq!(parse_units("0.000000001", TOKEN_DECIMALS).unwrap(), 1_000_000_000);
        assert!(parse_units("0.0000001", QUOTE_DECIMALS).is_err());
        assert!(parse_units("1e6", QUOTE_DECIMALS).is_err());
        assert!(parse_units("", QUOTE_DECIMALS).is_err());
        assert!(parse_units("-1", QUOTE_DECIMALS).is_err());
    }

    #[test]
    fn format_units_trims_zeros() {
        assert_eq!(format_units(10_000_000, QUOTE_DECIMALS), "10");
        assert_eq!(format_units(100_000, QUOTE_DECIMALS), "0.1");
        assert_eq!(format_units(1, QUOTE_DECIMALS), "0.000001");
    }

    #[test]
    fn steps_parse_with_expected_errors() {
        let json = r#"{
            "steps": [
                { "op": "advance", "secs": 60 },
                { "op": "notify", "funder": "owner", "token": 0, "asset": "quote", "amount": "1",
                  "expect_error": "reward smaller than left" }
            ]
        }"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        assert_eq!(scenario.owner, "owner");
        assert_eq!(scenario.steps.len(), 2);
        assert!(matches!(scenario.steps[0].action, Action::Advance { secs: 60 }));
        assert_eq!(scenario.steps[1].action.name(), "notify");
        assert_eq!(scenario.steps[1].expect_error.as_deref(), Some("reward smaller than left"));
    }

    #[test]
    fn load_reads_file_and_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.json");
        std::fs::write(
            &path,
            r#"{ "name": "short", "accounts": [{ "label": "alice", "quote": "10" }],
                 "steps": [{ "op": "claim", "account": "alice", "token": 0 }] }"#,
        )
        .unwrap();
        let scenario = Scenario::load(&path).unwrap();
        assert_eq!(scenario.name, "short");
        assert_eq!(scenario.accounts[0].quote, "10");

        std::fs::write(&path, "{ not json").unwrap();
        let err = Scenario::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse scenario"));
        assert!(Scenario::load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn bundled_lifecycle_scenario_parses() {
        let scenario: Scenario =
            serde_json::from_str(include_str!("../scenarios/lifecycle.json")).unwrap();
        assert!(!scenario.steps.is_empty());
    }
}
