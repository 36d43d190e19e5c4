//! # Temperature - How Sure Copycat Is
//!
//! A single scalar in [0, 100] derived from the workspace: hot while the
//! workspace is unhappy and no good rule exists, cold once a coherent
//! interpretation has formed. Codelets read it to decide how greedily to
//! choose; the coderack reads it to decide how strongly urgency matters.
//!
//! ## Clamping
//!
//! Temperature is pinned at 100 for the first codelets of a trial and again
//! after a rule fails to translate. The failed rule is broken before the
//! clamp, so the ratchet below is released first.
//!
//! ## Ratchet
//!
//! Once a rule is accepted, the computed temperature cannot rise again
//! until a structure is broken or the rule changes.

use copycat_core::formulas::{temperature_adjusted_probability, temperature_adjusted_value, weighted_average};
use copycat_core::{TemperatureConfig, MAX_VALUE};

use crate::workspace::Workspace;

/// (rule revision, breaks) at the time the ratchet was set
type RatchetKey = (u64, u64);

#[derive(Clone, Debug)]
pub struct Temperature {
    config: TemperatureConfig,
    /// Last computed value, ignoring the clamp
    actual: f64,
    clamped_until: u64,
    step: u64,
    ratchet: Option<(RatchetKey, f64)>,
}

impl Temperature {
    /// Start hot and clamped for `clamp_steps` codelets
    pub fn new(config: TemperatureConfig, clamp_steps: u64) -> Self {
        Self {
            config,
            actual: MAX_VALUE,
            clamped_until: clamp_steps,
            step: 0,
            ratchet: None,
        }
    }

    /// Temperature codelets and the coderack see
    pub fn value(&self) -> f64 {
        if self.is_clamped() {
            MAX_VALUE
        } else {
            self.actual
        }
    }

    /// Computed temperature, ignoring the clamp
    pub fn actual(&self) -> f64 {
        self.actual
    }

    pub fn is_clamped(&self) -> bool {
        self.step < self.clamped_until
    }

    /// Pin the temperature at 100 for `steps` codelets after `step`
    pub fn clamp_for(&mut self, step: u64, steps: u64) {
        self.step = step;
        self.clamped_until = self.clamped_until.max(step + steps);
    }

    /// Advance the clock without recomputing
    pub fn tick(&mut self, step: u64) {
        self.step = step;
    }

    /// Recompute from the workspace. Returns the unclamped value.
    pub fn update(&mut self, workspace: &Workspace, step: u64) -> f64 {
        self.step = step;
        let raw = self.raw_value(workspace);
        let key = workspace
            .rule()
            .map(|_| (workspace.rule_revision(), workspace.breaks()));
        self.settle(raw, key)
    }

    fn raw_value(&self, workspace: &Workspace) -> f64 {
        let rule_weakness = match workspace.rule() {
            Some(_) => MAX_VALUE - workspace.current_rule_strength(),
            None => MAX_VALUE,
        };
        let rule_weight = self.config.rule_weight + self.config.rule_weight_shift * workspace.explained_fraction();
        weighted_average(&[
            (workspace.unhappiness().total, self.config.unhappiness_weight),
            (rule_weakness, rule_weight),
        ])
    }

    /// Apply the ratchet for this rule state and store the result
    fn settle(&mut self, raw: f64, key: Option<RatchetKey>) -> f64 {
        let value = match (key, self.ratchet) {
            (Some(key), Some((held, ceiling))) if key == held => raw.min(ceiling),
            _ => raw,
        };
        self.actual = value.clamp(0.0, MAX_VALUE);
        self.ratchet = key.map(|k| (k, self.actual));
        self.actual
    }

    pub fn adjusted_value(&self, value: f64) -> f64 {
        temperature_adjusted_value(self.value(), value)
    }

    pub fn adjusted_probability(&self, probability: f64) -> f64 {
        temperature_adjusted_probability(self.value(), probability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::tests::workspace;
    use copycat_core::UnhappinessConfig;

    fn temperature() -> Temperature {
        Temperature::new(TemperatureConfig::default(), 30)
    }

    #[test]
    fn test_clamped_at_start() {
        let (ws, _) = workspace("abc", "abd", "efg");
        let mut t = temperature();
        let actual = t.update(&ws, 10);
        assert!(t.is_clamped());
        assert_eq!(t.value(), 100.0);
        assert_eq!(t.actual(), actual);
        t.tick(30);
        assert!(!t.is_clamped());
        assert_eq!(t.value(), actual);
    }

    #[test]
    fn test_reclamp() {
        let mut t = temperature();
        t.tick(500);
        t.settle(20.0, None);
        assert_eq!(t.value(), 20.0);
        t.clamp_for(500, 100);
        assert_eq!(t.value(), 100.0);
        t.tick(600);
        assert_eq!(t.value(), 20.0);
    }

    #[test]
    fn test_ratchet_holds_until_break() {
        let mut t = temperature();
        assert_eq!(t.settle(40.0, Some((1, 0))), 40.0);
        assert_eq!(t.settle(55.0, Some((1, 0))), 40.0);
        assert_eq!(t.settle(30.0, Some((1, 0))), 30.0);
        // a break releases it
        assert_eq!(t.settle(55.0, Some((1, 1))), 55.0);
        // and so does a new rule
        assert_eq!(t.settle(35.0, Some((2, 1))), 35.0);
        assert_eq!(t.settle(60.0, None), 60.0);
    }

    #[test]
    fn test_empty_workspace_is_hot() {
        let (mut ws, _) = workspace("abc", "abd", "efg");
        ws.update_unhappiness(&UnhappinessConfig::default());
        let mut t = temperature();
        t.update(&ws, 100);
        assert_eq!(t.value(), 100.0);
    }

    #[test]
    fn test_adjusted_value_uses_clamp() {
        let mut t = temperature();
        t.tick(0);
        assert_eq!(t.adjusted_value(50.0), temperature_adjusted_value(100.0, 50.0));
    }
}
