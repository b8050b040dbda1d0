//! End-to-end and property test suite for the Wavefront engine.
//!
//! The integration tests drive whole token lifecycles through the engine
//! and check the solvency and custody invariants after every step.

pub mod helpers;
