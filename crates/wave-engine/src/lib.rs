//! # wave-engine
//! Registry of creator tokens and the router that runs every operation
//! against one token's market, credit line, content market and reward pool
//! as a single atomic step.

pub mod engine;
pub mod token;

pub use engine::{CollectRequest, Engine, SwapQuote, SwapRequest, Trade};
pub use token::{AccountSnapshot, StreamSnapshot, TokenMetadata, TokenSnapshot, TokenState};
