//! # wave-curve — Creator-token market math.
//!
//! All calculations use integer arithmetic only, rounding in favor of the
//! pool.
//!
//! - **Bonding market**: constant-product curve over a virtual quote
//!   reserve plus the real reserve, with fees taken from the input.
//! - **Supply control**: burning shrinks the token reserve in proportion,
//!   healing adds quote without minting; both lift the floor price.
//! - **Credit line**: holders borrow quote against the floor value of
//!   their balance.

pub mod credit;
pub mod fees;
pub mod market;
pub mod supply;

pub use credit::CreditLine;
pub use fees::{FeeBreakdown, FeeSchedule};
pub use market::{Market, SwapOutcome};
