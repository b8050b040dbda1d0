//! # wave-content — Content curation market.
//!
//! Each content item is sold Dutch-auction style: after a collection its
//! price jumps to a ceiling (a multiple of the price paid) and then decays
//! back toward the floor as time passes. Collecting an item makes the
//! collector its curator until someone collects it again.

pub mod decay;
pub mod market;

pub use decay::{decay_factor_ppb, decayed_price};
pub use market::{Collection, ContentItem, ContentMarket};
