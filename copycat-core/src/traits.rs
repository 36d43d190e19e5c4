//! # Traits - Hooks into a Running Trial
//!
//! The engine emits nothing but the final distribution. Anything that wants
//! to watch a trial unfold (tests checking the temperature trajectory, a
//! future visualizer) implements `TrialObserver` and is handed to the trial
//! runner. All methods default to doing nothing.

/// Observer of a single trial
pub trait TrialObserver {
    /// A codelet has just run
    fn on_codelet(&mut self, step: u64, codelet: &'static str) {
        let _ = (step, codelet);
    }

    /// Temperature was recomputed
    fn on_temperature(&mut self, step: u64, temperature: f64) {
        let _ = (step, temperature);
    }

    /// A rule was accepted into the workspace
    fn on_rule(&mut self, step: u64, rule: &str) {
        let _ = (step, rule);
    }

    /// A bond, group, correspondence or rule was broken
    fn on_structure_broken(&mut self, step: u64) {
        let _ = step;
    }

    /// The trial ended with this answer
    fn on_answer(&mut self, answer: &str, temperature: f64, steps: u64) {
        let _ = (answer, temperature, steps);
    }
}

/// Observer that ignores everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl TrialObserver for NullObserver {}
