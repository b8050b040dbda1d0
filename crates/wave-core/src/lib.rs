//! # wave-core
//! Foundation types, fixed-point math and collaborator traits for the
//! Wavefront engine.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod math;
pub mod traits;
pub mod types;

pub use clock::{ManualClock, SystemClock};
pub use config::DeploymentConfig;
pub use ledger::MemoryLedger;
pub use traits::{Clock, Ledger, Movement};
pub use types::{Address, Asset, RewardAsset, SwapDirection, TokenId};
