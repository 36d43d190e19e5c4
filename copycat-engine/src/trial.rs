//! # Trials - Running the Search and Counting Answers
//!
//! One trial is one independent run: fresh workspace, slipnet activations,
//! coderack and random stream. A run of many trials folds the answers into
//! a [`Distribution`], which is what Copycat ultimately reports.
//!
//! Trials share nothing but the read-only concept network, so they can run
//! on the rayon pool. Results are folded in trial-index order, so a seeded
//! run gives the same distribution either way.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use copycat_core::sampling::trial_seed;
use copycat_core::{CopycatConfig, CopycatError, CopycatResult, NullObserver, Randomness, TrialObserver};

use crate::coderack::{Coderack, SearchState};
use crate::slipnet::{ConceptNetwork, Slipnet};
use crate::temperature::Temperature;
use crate::workspace::{StringKind, Workspace};

/// The three strings of an analogy problem: initial -> modified, target -> ?
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub initial: String,
    pub modified: String,
    pub target: String,
}

impl Problem {
    /// Validate and case-fold the strings
    pub fn new(initial: &str, modified: &str, target: &str) -> CopycatResult<Self> {
        let fold = |name: &str, text: &str| -> CopycatResult<String> {
            if text.is_empty() {
                return Err(CopycatError::invalid_input(format!("{} string is empty", name)));
            }
            if let Some(c) = text.chars().find(|c| !c.is_ascii_alphabetic()) {
                return Err(CopycatError::invalid_input(format!(
                    "{} string contains '{}', expected letters only",
                    name, c
                )));
            }
            Ok(text.to_ascii_lowercase())
        };
        let problem = Self {
            initial: fold("initial", initial)?,
            modified: fold("modified", modified)?,
            target: fold("target", target)?,
        };
        if problem.initial.len() != problem.modified.len() {
            return Err(CopycatError::invalid_input(format!(
                "initial '{}' and modified '{}' differ in length",
                problem.initial, problem.modified
            )));
        }
        Ok(problem)
    }
}

/// Everything a codelet may read or change during one trial
pub struct TrialContext<'a> {
    pub workspace: Workspace,
    pub slipnet: Slipnet,
    pub temperature: Temperature,
    pub rng: Randomness,
    pub config: &'a CopycatConfig,
    /// Codelets run so far
    pub step: u64,
}

impl<'a> TrialContext<'a> {
    pub fn new(problem: &Problem, config: &'a CopycatConfig, rng: Randomness) -> CopycatResult<Self> {
        let network = ConceptNetwork::shared()?;
        let mut slipnet = Slipnet::new(network, config.search.unclamp_after_updates);
        let workspace = Workspace::new(&problem.initial, &problem.modified, &problem.target, &mut slipnet)?;
        Ok(Self {
            workspace,
            slipnet,
            temperature: Temperature::new(config.temperature.clone(), config.search.temperature_clamp_steps),
            rng,
            config,
            step: 0,
        })
    }
}

/// Outcome of one trial
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub answer: String,
    /// Last computed temperature, ignoring any clamp
    pub temperature: f64,
    /// Codelets run
    pub steps: u64,
    pub state: SearchState,
}

/// Answer for a trial that ran out of steps: the rule applied regardless
/// of temperature, or the target unchanged
fn best_effort_answer(workspace: &Workspace) -> String {
    workspace
        .rule()
        .and_then(|rule| workspace.translate_rule(rule))
        .unwrap_or_else(|| workspace.string(StringKind::Target).text().to_string())
}

/// Run one trial from a seed
pub fn run_trial(
    problem: &Problem,
    config: &CopycatConfig,
    seed: u64,
    observer: &mut dyn TrialObserver,
) -> CopycatResult<TrialResult> {
    let mut ctx = TrialContext::new(problem, config, Randomness::seeded(seed))?;
    let mut coderack = Coderack::new(&config.coderack);
    let state = loop {
        match coderack.step(&mut ctx, observer)? {
            SearchState::Running => continue,
            done => break done,
        }
    };
    let answer = match (state, ctx.workspace.answer()) {
        (SearchState::Succeeded, Some(answer)) => answer.to_string(),
        _ => best_effort_answer(&ctx.workspace),
    };
    let result = TrialResult {
        answer,
        temperature: ctx.temperature.actual(),
        steps: ctx.step,
        state,
    };
    observer.on_answer(&result.answer, result.temperature, result.steps);
    debug!(
        answer = %result.answer,
        temperature = result.temperature,
        steps = result.steps,
        state = ?result.state,
        "trial finished"
    );
    Ok(result)
}

/// Per-answer tally
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerStats {
    pub count: usize,
    pub average_temperature: f64,
    pub average_steps: f64,
}

impl AnswerStats {
    fn record(&mut self, temperature: f64, steps: u64) {
        self.count += 1;
        let n = self.count as f64;
        self.average_temperature += (temperature - self.average_temperature) / n;
        self.average_steps += (steps as f64 - self.average_steps) / n;
    }
}

/// Answers of a run of trials with their counts and averages
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    answers: BTreeMap<String, AnswerStats>,
}

impl Distribution {
    pub fn record(&mut self, result: &TrialResult) {
        self.answers
            .entry(result.answer.clone())
            .or_default()
            .record(result.temperature, result.steps);
    }

    /// Answers in lexical order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &AnswerStats)> {
        self.answers.iter().map(|(a, s)| (a.as_str(), s))
    }

    pub fn get(&self, answer: &str) -> Option<&AnswerStats> {
        self.answers.get(answer)
    }

    pub fn total_count(&self) -> usize {
        self.answers.values().map(|s| s.count).sum()
    }

    /// Most frequent answer; ties go to the lexically first
    pub fn most_common(&self) -> Option<(&str, &AnswerStats)> {
        self.entries()
            .fold(None, |best: Option<(&str, &AnswerStats)>, (answer, stats)| match best {
                Some((_, b)) if b.count >= stats.count => best,
                _ => Some((answer, stats)),
            })
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

/// Runs batches of trials under one configuration
#[derive(Clone, Debug, Default)]
pub struct Engine {
    config: CopycatConfig,
}

impl Engine {
    pub fn new(config: CopycatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CopycatConfig {
        &self.config
    }

    /// Run `trial_count` trials of `initial -> modified; target -> ?`
    pub fn run_trials(
        &self,
        initial: &str,
        modified: &str,
        target: &str,
        trial_count: usize,
    ) -> CopycatResult<Distribution> {
        self.config.validate()?;
        let problem = Problem::new(initial, modified, target)?;
        if trial_count == 0 {
            return Err(CopycatError::invalid_input("trial_count must be positive"));
        }
        let seed = self.config.trials.seed.unwrap_or_else(rand::random::<u64>);
        info!(
            initial = %problem.initial,
            modified = %problem.modified,
            target = %problem.target,
            trial_count,
            seed,
            parallel = self.config.trials.parallel,
            "starting trials"
        );

        let run = |i: usize| run_trial(&problem, &self.config, trial_seed(seed, i as u64), &mut NullObserver);
        let results: Vec<TrialResult> = if self.config.trials.parallel {
            (0..trial_count).into_par_iter().map(run).collect::<CopycatResult<_>>()?
        } else {
            (0..trial_count).map(run).collect::<CopycatResult<_>>()?
        };

        let mut distribution = Distribution::default();
        for (i, result) in results.iter().enumerate() {
            info!(trial = i, answer = %result.answer, temperature = result.temperature, steps = result.steps, "trial result");
            distribution.record(result);
        }
        if let Some((answer, stats)) = distribution.most_common() {
            info!(answers = distribution.len(), most_common = answer, count = stats.count, "trials complete");
        }
        Ok(distribution)
    }
}

/// Run trials with the default configuration
pub fn run_trials(initial: &str, modified: &str, target: &str, trial_count: usize) -> CopycatResult<Distribution> {
    Engine::new(CopycatConfig::default()).run_trials(initial, modified, target, trial_count)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A fresh trial context for codelet tests
    pub(crate) fn context(initial: &str, modified: &str, target: &str, seed: u64) -> TrialContext<'static> {
        let config: &'static CopycatConfig = Box::leak(Box::new(CopycatConfig::default()));
        let problem = Problem::new(initial, modified, target).unwrap();
        TrialContext::new(&problem, config, Randomness::seeded(seed)).unwrap()
    }

    fn quick_config(seed: u64) -> CopycatConfig {
        let mut config = CopycatConfig::seeded(seed);
        config.search.step_cap = 5_000;
        config
    }

    #[test]
    fn test_problem_validation() {
        let p = Problem::new("ABC", "abd", "Ijk").unwrap();
        assert_eq!(p.initial, "abc");
        assert_eq!(p.target, "ijk");
        assert!(Problem::new("", "abd", "ijk").unwrap_err().to_string().contains("empty"));
        assert!(Problem::new("abc", "ab", "ijk").is_err());
        assert!(Problem::new("abc", "abd", "ij k").is_err());
        assert!(Problem::new("abc", "ab1", "ijk").is_err());
    }

    #[test]
    fn test_zero_trials_rejected() {
        let err = run_trials("abc", "abd", "ijk", 0).unwrap_err();
        assert!(!err.is_defect());
    }

    #[test]
    fn test_counts_sum_to_trials() {
        let engine = Engine::new(quick_config(17));
        let distribution = engine.run_trials("abc", "abd", "efg", 8).unwrap();
        assert_eq!(distribution.total_count(), 8);
        for (answer, stats) in distribution.entries() {
            assert!(!answer.is_empty());
            assert!(answer.chars().all(|c| c.is_ascii_lowercase()));
            assert!(answer.len() <= "efg".len() + 2);
            assert!(stats.average_temperature >= 0.0 && stats.average_temperature <= 100.0);
        }
    }

    #[test]
    fn test_seeded_trial_is_reproducible() {
        let config = quick_config(0);
        let problem = Problem::new("abc", "abd", "ijk").unwrap();
        let first = run_trial(&problem, &config, 42, &mut NullObserver).unwrap();
        let second = run_trial(&problem, &config, 42, &mut NullObserver).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = Engine::new(quick_config(5)).run_trials("abc", "abd", "ijk", 6).unwrap();
        let mut config = quick_config(5);
        config.trials.parallel = true;
        let parallel = Engine::new(config).run_trials("abc", "abd", "ijk", 6).unwrap();
        assert_eq!(sequential, parallel);
    }

    /// Records temperatures and structure breaks
    #[derive(Default)]
    struct Trace {
        temperatures: Vec<(u64, f64)>,
        breaks: Vec<u64>,
        rules: Vec<u64>,
        answer: Option<String>,
    }

    impl TrialObserver for Trace {
        fn on_temperature(&mut self, step: u64, temperature: f64) {
            self.temperatures.push((step, temperature));
        }
        fn on_structure_broken(&mut self, step: u64) {
            self.breaks.push(step);
        }
        fn on_rule(&mut self, step: u64, _rule: &str) {
            self.rules.push(step);
        }
        fn on_answer(&mut self, answer: &str, _temperature: f64, _steps: u64) {
            self.answer = Some(answer.to_string());
        }
    }

    #[test]
    fn test_temperature_does_not_rise_under_a_rule() {
        let config = quick_config(0);
        for (target, seed) in [("efg", 0), ("efg", 1), ("xyz", 2), ("xyz", 3)] {
            let problem = Problem::new("abc", "abd", target).unwrap();
            let mut trace = Trace::default();
            let result = run_trial(&problem, &config, seed, &mut trace).unwrap();
            assert_eq!(trace.answer.as_deref(), Some(result.answer.as_str()));
            let Some(&accepted) = trace.rules.first() else { continue };
            let mut previous: Option<f64> = None;
            for &(step, t) in trace.temperatures.iter().filter(|(s, _)| *s >= accepted) {
                let released = trace.breaks.iter().any(|&b| b <= step)
                    || trace.rules.iter().any(|&r| r <= step && r > accepted);
                if released {
                    break;
                }
                if let Some(p) = previous {
                    assert!(t <= p + 1e-9, "temperature rose from {} to {} at step {}", p, t, step);
                }
                previous = Some(t);
            }
        }
    }

    #[test]
    fn test_most_common_breaks_ties_lexically() {
        let mut d = Distribution::default();
        for answer in ["ijl", "ijd", "ijl", "ijd"] {
            d.record(&TrialResult {
                answer: answer.to_string(),
                temperature: 20.0,
                steps: 100,
                state: SearchState::Succeeded,
            });
        }
        assert_eq!(d.most_common().map(|(a, _)| a), Some("ijd"));
        assert_eq!(d.get("ijl").map(|s| s.count), Some(2));
        assert!(d.get("xyz").is_none());

        let json = serde_json::to_string(&d).unwrap();
        let back: Distribution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_incremental_averages() {
        let mut stats = AnswerStats::default();
        stats.record(10.0, 100);
        stats.record(30.0, 300);
        assert_eq!(stats.count, 2);
        assert!((stats.average_temperature - 20.0).abs() < 1e-12);
        assert!((stats.average_steps - 200.0).abs() < 1e-12);
    }

    /// Chi-squared critical values at p = 0.05 by degrees of freedom
    const CHI_SQUARED_05: [f64; 10] = [3.841, 5.991, 7.815, 9.488, 11.071, 12.592, 14.067, 15.507, 16.919, 18.307];

    fn chi_squared(actual: &Distribution, expected: &[(&str, usize)]) -> (f64, usize) {
        let mut keys: Vec<&str> = expected.iter().map(|(a, _)| *a).collect();
        for (answer, _) in actual.entries() {
            if !keys.contains(&answer) {
                keys.push(answer);
            }
        }
        let statistic = keys
            .iter()
            .filter_map(|k| {
                let e = expected.iter().find(|(a, _)| a == k).map(|(_, c)| *c as f64)?;
                let o = actual.get(k).map_or(0.0, |s| s.count as f64);
                Some((o - e).powi(2) / e)
            })
            .sum();
        (statistic, keys.len())
    }

    /// Answers by count, most common first
    fn ranked(distribution: &Distribution) -> Vec<(&str, usize)> {
        let mut ranked: Vec<_> = distribution.entries().map(|(a, s)| (a, s.count)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked
    }

    #[test]
    fn test_efg_matches_reference_distribution() {
        let expected = [("dfg", 1), ("efd", 2), ("efh", 27)];
        let actual = Engine::new(CopycatConfig::seeded(7)).run_trials("abc", "abd", "efg", 30).unwrap();
        assert_eq!(actual.total_count(), 30);
        assert_eq!(actual.most_common().map(|(a, _)| a), Some("efh"));
        let (statistic, degrees) = chi_squared(&actual, &expected);
        let critical = CHI_SQUARED_05[degrees.min(CHI_SQUARED_05.len()) - 1];
        assert!(statistic < critical, "chi-squared {} with {} degrees of freedom", statistic, degrees);
    }

    #[test]
    fn test_ijkk_favours_successor_readings() {
        let actual = Engine::new(CopycatConfig::seeded(2024)).run_trials("abc", "abd", "ijkk", 100).unwrap();
        assert_eq!(actual.total_count(), 100);
        let ranked = ranked(&actual);
        let mut top: Vec<&str> = ranked.iter().take(2).map(|(a, _)| *a).collect();
        top.sort_unstable();
        assert_eq!(top, ["ijkl", "ijll"], "{:?}", ranked);
        let successor_readings: usize = ranked.iter().take(2).map(|(_, c)| c).sum();
        assert!(successor_readings >= 75, "{:?}", ranked);
    }

    #[test]
    fn test_xyz_trials_settle() {
        let actual = Engine::new(CopycatConfig::seeded(11)).run_trials("abc", "abd", "xyz", 30).unwrap();
        assert_eq!(actual.total_count(), 30);
        for (answer, stats) in actual.entries() {
            assert!(!answer.is_empty() && answer.chars().all(|c| c.is_ascii_lowercase()));
            assert!(stats.average_temperature >= 0.0 && stats.average_temperature <= 100.0);
        }
        assert!(actual.get("xyd").is_some(), "{:?}", ranked(&actual));
    }
}
