//! # Configuration - Copycat's Tuned Constants
//!
//! The thresholds below were calibrated against recorded answer
//! distributions. Changing them shifts which answers a run favours.

use serde::{Deserialize, Serialize};

use crate::error::{CopycatError, CopycatResult};

/// Master configuration for the engine
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CopycatConfig {
    /// Step budget and global update cadence
    pub search: SearchConfig,

    /// Codelet pool settings
    pub coderack: CoderackConfig,

    /// How temperature is derived from the workspace
    pub temperature: TemperatureConfig,

    /// Weight of each structure category in workspace unhappiness
    pub unhappiness: UnhappinessConfig,

    /// Seeding and parallelism across trials
    pub trials: TrialConfig,
}

/// Per-trial search loop
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Hard cap on codelets run in one trial
    pub step_cap: u64,

    /// Codelets between global updates (strengths, slipnet, posting)
    pub update_interval: u64,

    /// Slipnet updates before the initially clamped concepts are released
    pub unclamp_after_updates: u32,

    /// Codelets during which temperature is pinned at 100 at trial start
    pub temperature_clamp_steps: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            step_cap: 50_000,
            update_interval: 5,
            unclamp_after_updates: 50,
            temperature_clamp_steps: 30,
        }
    }
}

/// Coderack (scheduler) settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoderackConfig {
    /// Pool size before old codelets are evicted
    pub capacity: usize,

    /// Number of urgency bins (urgencies are 1..=bins)
    pub urgency_bins: u32,

    /// Waiting steps after which a codelet's effective urgency halves
    pub urgency_half_life: f64,

    /// Initial scouts of each kind posted per workspace object
    pub initial_codelets_per_object: usize,
}

impl Default for CoderackConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            urgency_bins: 7,
            urgency_half_life: 2_000.0,
            initial_codelets_per_object: 2,
        }
    }
}

/// Temperature controller settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemperatureConfig {
    /// Weight of total workspace unhappiness in the blend
    pub unhappiness_weight: f64,

    /// Base weight of rule weakness in the blend
    pub rule_weight: f64,

    /// Extra rule weight at a fully explained workspace
    pub rule_weight_shift: f64,

    /// A translated answer is accepted only at or below this unhappiness
    pub success_unhappiness: f64,

    /// Codelets to re-clamp temperature after a failed translation
    pub clamp_on_failed_translation: u64,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            unhappiness_weight: 0.8,
            rule_weight: 0.2,
            rule_weight_shift: 0.2,
            success_unhappiness: 60.0,
            clamp_on_failed_translation: 100,
        }
    }
}

/// Per-category weights of workspace unhappiness. Each category scores
/// the share of its eligible objects left unaddressed (rule: its weakness).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnhappinessConfig {
    pub bonds: f64,
    pub groups: f64,
    pub correspondences: f64,
    pub rule: f64,
}

impl Default for UnhappinessConfig {
    fn default() -> Self {
        Self {
            bonds: 1.0,
            groups: 1.0,
            correspondences: 1.0,
            rule: 1.0,
        }
    }
}

/// Trial runner settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrialConfig {
    /// Overall seed; trial `i` is seeded from (seed, i). `None` draws one.
    pub seed: Option<u64>,

    /// Run trials on the rayon pool
    pub parallel: bool,
}

impl CopycatConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &str) -> CopycatResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &str) -> CopycatResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Fixed-seed configuration, handy for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        let mut config = Self::default();
        config.trials.seed = Some(seed);
        config
    }

    /// Create config from environment variables
    ///
    /// Reads:
    /// - COPYCAT_SEED: overall seed (default: random)
    /// - COPYCAT_STEP_CAP: codelets per trial (default: 50000)
    /// - COPYCAT_PARALLEL: "1"/"true" to run trials in parallel
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("COPYCAT_SEED") {
            if let Ok(v) = val.parse() {
                config.trials.seed = Some(v);
            }
        }
        if let Ok(val) = std::env::var("COPYCAT_STEP_CAP") {
            if let Ok(v) = val.parse() {
                config.search.step_cap = v;
            }
        }
        if let Ok(val) = std::env::var("COPYCAT_PARALLEL") {
            config.trials.parallel = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        config
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> CopycatResult<()> {
        if self.search.step_cap == 0 {
            return Err(CopycatError::config("step_cap must be positive"));
        }
        if self.search.update_interval == 0 {
            return Err(CopycatError::config("update_interval must be positive"));
        }
        if self.coderack.capacity == 0 {
            return Err(CopycatError::config("coderack capacity must be positive"));
        }
        if self.coderack.urgency_bins == 0 {
            return Err(CopycatError::config("urgency_bins must be positive"));
        }
        if self.coderack.urgency_half_life <= 0.0 {
            return Err(CopycatError::config("urgency_half_life must be positive"));
        }
        let t = &self.temperature;
        if t.unhappiness_weight < 0.0 || t.rule_weight < 0.0 || t.rule_weight_shift < 0.0 {
            return Err(CopycatError::config("temperature weights must be non-negative"));
        }
        if t.unhappiness_weight + t.rule_weight <= 0.0 {
            return Err(CopycatError::config("temperature weights must not all be zero"));
        }
        if !(0.0..100.0).contains(&t.success_unhappiness) {
            return Err(CopycatError::config("success_unhappiness must be within 0..100"));
        }
        let u = &self.unhappiness;
        let weights = [u.bonds, u.groups, u.correspondences, u.rule];
        if weights.iter().any(|&w| w < 0.0) {
            return Err(CopycatError::config("unhappiness weights must be non-negative"));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(CopycatError::config("unhappiness weights must not all be zero"));
        }
        Ok(())
    }
}
