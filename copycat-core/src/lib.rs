//! # Copycat Core
//!
//! Shared building blocks for the Copycat analogy engine.
//!
//! This crate provides:
//! - **Error**: the `CopycatError` type every fallible operation returns
//! - **Config**: the tuned constants that steer a trial
//! - **Sampling**: seeded, weighted random choice
//! - **Formulas**: temperature-adjusted values and probabilities
//! - **Traits**: observer hooks into a running trial
//!
//! ## Design Philosophy
//!
//! Copycat does not compute an answer, it *settles* on one. Everything
//! here is deterministic given a seed, so a trial can be replayed.

pub mod config;
pub mod error;
pub mod formulas;
pub mod sampling;
pub mod traits;

// Re-export main types at crate root
pub use config::{CoderackConfig, CopycatConfig, SearchConfig, TemperatureConfig, TrialConfig, UnhappinessConfig};
pub use error::{CopycatError, CopycatResult};
pub use sampling::Randomness;
pub use traits::{NullObserver, TrialObserver};

/// Upper bound of activation, temperature, strength and unhappiness
pub const MAX_VALUE: f64 = 100.0;
