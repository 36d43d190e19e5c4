//! # Copycat Engine
//!
//! Stochastic analogy-making over letter strings: given `abc -> abd`, what
//! does `ijk` become?
//!
//! This crate provides:
//! - **Slipnet**: the static concept graph and per-trial activations
//! - **Workspace**: letters and the structures built over them
//! - **Temperature**: how settled the current interpretation is
//! - **Codelets**: the small probabilistic actions that build structure
//! - **Coderack**: the scheduler that picks which codelet runs next
//! - **Trial**: running many independent trials into a `Distribution`
//!
//! ## Usage
//!
//! ```no_run
//! let distribution = copycat_engine::run_trials("abc", "abd", "ijk", 100)?;
//! if let Some((answer, stats)) = distribution.most_common() {
//!     println!("{} ({} times)", answer, stats.count);
//! }
//! # Ok::<(), copycat_core::CopycatError>(())
//! ```
//!
//! A fixed seed (`CopycatConfig::seeded`) reproduces a distribution
//! exactly, with or without `trials.parallel`.

pub mod codelets;
pub mod coderack;
pub mod slipnet;
pub mod temperature;
pub mod trial;
pub mod workspace;

pub use coderack::{Coderack, SearchState};
pub use trial::{run_trial, run_trials, AnswerStats, Distribution, Engine, Problem, TrialContext, TrialResult};
