//! Core identifiers: account addresses, token ids, assets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 20-byte account address.
///
/// Rendered as `0x`-prefixed lowercase hex. Serialized as that string so
/// configs and scenarios stay human-editable.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Check if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Deterministic address for an engine-owned account.
    ///
    /// BLAKE3 over the domain tag and index, truncated to 20 bytes. Used for
    /// market and reward vaults so custody accounts never collide with
    /// user-supplied addresses in practice.
    pub fn derive(tag: &str, index: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(tag.as_bytes());
        hasher.update(&index.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash.as_bytes()[..20]);
        Self(bytes)
    }

    /// Address derived from a human label (`"alice"`, `"treasury"`).
    pub fn from_label(label: &str) -> Self {
        Self::derive(label, 0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(digits).map_err(|e| format!("invalid address {s}: {e}"))?;
        let bytes: [u8; 20] = raw
            .try_into()
            .map_err(|_| format!("invalid address length: {s}"))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

/// Index of a token in the engine registry.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u32);

impl TokenId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anything the ledger keeps balances of.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    /// The shared quote currency every market is priced in.
    Quote,
    /// A creator token.
    Token(TokenId),
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quote => write!(f, "quote"),
            Self::Token(id) => write!(f, "token{id}"),
        }
    }
}

/// Reward currencies a token's reward pool streams.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RewardAsset {
    Quote,
    Token,
}

impl RewardAsset {
    pub const ALL: [RewardAsset; 2] = [RewardAsset::Quote, RewardAsset::Token];

    /// Ledger asset this reward stream pays out in, for the given token.
    pub fn ledger_asset(&self, token: TokenId) -> Asset {
        match self {
            Self::Quote => Asset::Quote,
            Self::Token => Asset::Token(token),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SwapDirection {
    /// Quote in, token out.
    Buy,
    /// Token in, quote out.
    Sell,
}
