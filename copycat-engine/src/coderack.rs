//! # Coderack - The Codelet Scheduler
//!
//! A bounded pool of waiting codelets. Each step one is drawn with
//! probability rising with its urgency, sharply so when the workspace is
//! cold and almost uniformly when it is hot. The drawn codelet runs and its
//! follow-ups are posted back.
//!
//! Every `update_interval` steps the whole trial is refreshed: workspace
//! strengths, new bottom-up and top-down codelets, slipnet activation and
//! temperature.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use copycat_core::formulas::urgency_bin;
use copycat_core::{CoderackConfig, CopycatError, CopycatResult, TrialObserver, MAX_VALUE};

use crate::codelets::{self, Codelet, CodeletKind};
use crate::slipnet::TopDownScout;
use crate::trial::TrialContext;
use crate::workspace::weakness;

/// Where a trial's search stands after a step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    Running,
    /// A rule exists and its translation was accepted
    Succeeded,
    /// Ran out of steps
    Exhausted,
}

/// Families sharing a posting policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Family {
    Breaker,
    Description,
    Bond,
    Group,
    Correspondence,
    Replacement,
    Rule,
    Translator,
}

impl Family {
    fn of(kind: &CodeletKind) -> Self {
        use CodeletKind::*;
        match kind {
            Breaker => Family::Breaker,
            BottomUpDescriptionScout
            | TopDownDescriptionScout { .. }
            | DescriptionStrengthTester { .. }
            | DescriptionBuilder { .. } => Family::Description,
            BottomUpBondScout
            | TopDownBondScoutCategory { .. }
            | TopDownBondScoutDirection { .. }
            | BondStrengthTester { .. }
            | BondBuilder { .. } => Family::Bond,
            TopDownGroupScoutCategory { .. }
            | TopDownGroupScoutDirection { .. }
            | GroupScoutWholeString
            | GroupStrengthTester { .. }
            | GroupBuilder { .. } => Family::Group,
            BottomUpCorrespondenceScout
            | ImportantObjectCorrespondenceScout
            | CorrespondenceStrengthTester { .. }
            | CorrespondenceBuilder { .. } => Family::Correspondence,
            ReplacementFinder => Family::Replacement,
            RuleScout | RuleStrengthTester { .. } | RuleBuilder { .. } => Family::Rule,
            RuleTranslator => Family::Translator,
        }
    }
}

/// Codelets posted unprompted on every global update
fn bottom_up_kinds() -> [CodeletKind; 9] {
    [
        CodeletKind::BottomUpDescriptionScout,
        CodeletKind::BottomUpBondScout,
        CodeletKind::GroupScoutWholeString,
        CodeletKind::BottomUpCorrespondenceScout,
        CodeletKind::ImportantObjectCorrespondenceScout,
        CodeletKind::ReplacementFinder,
        CodeletKind::RuleScout,
        CodeletKind::RuleTranslator,
        CodeletKind::Breaker,
    ]
}

/// Chance that one posting attempt for a family succeeds
fn posting_probability(ctx: &TrialContext<'_>, family: Family) -> f64 {
    let ws = &ctx.workspace;
    match family {
        Family::Breaker => 1.0,
        Family::Description => (ctx.temperature.value() / MAX_VALUE).powi(2),
        Family::Correspondence => ws.unhappiness().inter_string / MAX_VALUE,
        Family::Replacement => {
            if ws.unreplaced_letters() > 0 {
                1.0
            } else {
                0.0
            }
        }
        // the translator is posted as readily as a rule scout
        Family::Rule | Family::Translator => match ws.rule() {
            None => 1.0,
            Some(_) => weakness(ws.current_rule_strength()) / MAX_VALUE,
        },
        Family::Bond | Family::Group => ws.unhappiness().intra_string / MAX_VALUE,
    }
}

/// Posting attempts for a family, more while much is left unexplained
fn posting_attempts(ctx: &mut TrialContext<'_>, family: Family) -> usize {
    let ws = &ctx.workspace;
    let unexplained: usize = match family {
        Family::Breaker | Family::Description => return 1,
        Family::Translator => return usize::from(ws.rule().is_some()),
        Family::Rule => return 2,
        Family::Group if ws.bond_count() == 0 => return 0,
        Family::Replacement if ws.rule().is_some() => return 0,
        Family::Bond => ws.unrelated_objects(),
        Family::Group => ws.ungrouped_objects(),
        Family::Replacement => ws.unreplaced_letters(),
        Family::Correspondence => ws.uncorresponding_objects(),
    };
    let unexplained = unexplained as f64;
    if unexplained < ctx.rng.sqrt_blur(2.0) {
        1
    } else if unexplained < ctx.rng.sqrt_blur(4.0) {
        2
    } else {
        3
    }
}

/// The pool of waiting codelets
#[derive(Clone, Debug)]
pub struct Coderack {
    codelets: Vec<Codelet>,
    capacity: usize,
    bins: u32,
    half_life: f64,
}

impl Coderack {
    pub fn new(config: &CoderackConfig) -> Self {
        Self {
            codelets: Vec::with_capacity(config.capacity + 1),
            capacity: config.capacity,
            bins: config.urgency_bins,
            half_life: config.urgency_half_life,
        }
    }

    pub fn len(&self) -> usize {
        self.codelets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codelets.is_empty()
    }

    pub fn codelets(&self) -> &[Codelet] {
        &self.codelets
    }

    /// Add a codelet born now; past capacity an old, low-urgency one goes.
    /// The codelet just posted is never the one evicted.
    pub fn post(&mut self, mut codelet: Codelet, ctx: &mut TrialContext<'_>) {
        codelet.birth = ctx.step;
        if self.codelets.len() >= self.capacity {
            let ceiling = self.bins as f64 + 0.5;
            let weights: Vec<f64> = self
                .codelets
                .iter()
                .map(|c| ctx.step.saturating_sub(c.birth) as f64 * (ceiling - c.urgency))
                .collect();
            if let Some(i) = ctx.rng.weighted_index(&weights) {
                let evicted = self.codelets.swap_remove(i);
                trace!(codelet = evicted.kind.name(), "codelet evicted");
            }
        }
        self.codelets.push(codelet);
    }

    /// Effective urgency: binned urgency sharpened by coldness, halved
    /// every `half_life` steps of waiting
    fn weight(&self, codelet: &Codelet, temperature: f64, step: u64) -> f64 {
        let scale = (MAX_VALUE - temperature + 10.0) / 15.0;
        let age = step.saturating_sub(codelet.birth) as f64;
        codelet.urgency.powf(scale) * 0.5f64.powf(age / self.half_life)
    }

    /// Remove and return a codelet drawn by effective urgency
    pub fn choose(&mut self, ctx: &mut TrialContext<'_>) -> Option<Codelet> {
        let temperature = ctx.temperature.value();
        let weights: Vec<f64> = self
            .codelets
            .iter()
            .map(|c| self.weight(c, temperature, ctx.step))
            .collect();
        let i = ctx.rng.weighted_index(&weights)?;
        Some(self.codelets.swap_remove(i))
    }

    /// Seed an empty rack with bond, replacement and correspondence scouts
    pub fn post_initial(&mut self, ctx: &mut TrialContext<'_>) {
        let per_object = ctx.config.coderack.initial_codelets_per_object;
        let count = ctx.workspace.objects().count() * per_object;
        for kind in [
            CodeletKind::BottomUpBondScout,
            CodeletKind::ReplacementFinder,
            CodeletKind::BottomUpCorrespondenceScout,
        ] {
            for _ in 0..count {
                self.post(Codelet::new(kind.clone(), 1.0), ctx);
            }
        }
    }

    fn post_bottom_up(&mut self, ctx: &mut TrialContext<'_>) {
        let cold = ctx.temperature.value() < 25.0;
        for kind in bottom_up_kinds() {
            let family = Family::of(&kind);
            let probability = posting_probability(ctx, family);
            let attempts = posting_attempts(ctx, family);
            let urgency = match family {
                Family::Breaker => 1.0,
                Family::Translator if cold => 5.0,
                _ => 3.0,
            };
            for _ in 0..attempts {
                if ctx.rng.coin_flip(probability) {
                    self.post(Codelet::new(kind.clone(), urgency), ctx);
                }
            }
        }
    }

    /// Fully active concepts post the scouts that look for them
    fn post_top_down(&mut self, ctx: &mut TrialContext<'_>) {
        let network = ctx.slipnet.network();
        let active: Vec<_> = ctx.slipnet.fully_active_nodes().collect();
        for node in active {
            let concept = network.node(node);
            for scout in &concept.top_down {
                let kind = match scout {
                    TopDownScout::BondCategory => CodeletKind::TopDownBondScoutCategory { category: node },
                    TopDownScout::BondDirection => CodeletKind::TopDownBondScoutDirection { direction: node },
                    TopDownScout::GroupCategory => CodeletKind::TopDownGroupScoutCategory { group_category: node },
                    TopDownScout::GroupDirection => CodeletKind::TopDownGroupScoutDirection { direction: node },
                    TopDownScout::Description => CodeletKind::TopDownDescriptionScout { description_type: node },
                };
                let family = Family::of(&kind);
                let probability = posting_probability(ctx, family);
                let attempts = posting_attempts(ctx, family);
                let urgency = urgency_bin(
                    ctx.slipnet.activation_of(node) * concept.depth / MAX_VALUE,
                    self.bins,
                );
                for _ in 0..attempts {
                    if ctx.rng.coin_flip(probability) {
                        self.post(Codelet::new(kind.clone(), urgency), ctx);
                    }
                }
            }
        }
    }

    /// Refresh strengths, post new codelets, spread activation and
    /// recompute temperature
    fn global_update(&mut self, ctx: &mut TrialContext<'_>) -> f64 {
        ctx.workspace.update_everything(&ctx.slipnet);
        if ctx.step > 0 {
            self.post_top_down(ctx);
            self.post_bottom_up(ctx);
        }
        ctx.slipnet.update(&mut ctx.rng);
        ctx.workspace.update_unhappiness(&ctx.config.unhappiness);
        ctx.temperature.update(&ctx.workspace, ctx.step)
    }

    /// Run one codelet, with a global update first when one is due
    pub fn step(&mut self, ctx: &mut TrialContext<'_>, observer: &mut dyn TrialObserver) -> CopycatResult<SearchState> {
        if ctx.step >= ctx.config.search.step_cap {
            return Ok(SearchState::Exhausted);
        }
        ctx.temperature.tick(ctx.step);
        if ctx.step % ctx.config.search.update_interval == 0 {
            let temperature = self.global_update(ctx);
            observer.on_temperature(ctx.step, temperature);
        }
        if self.is_empty() {
            self.post_initial(ctx);
        }
        let codelet = self
            .choose(ctx)
            .ok_or_else(|| CopycatError::invariant("coderack is empty after posting initial codelets"))?;

        let (revision, breaks, rule_revision) = (
            ctx.workspace.revision(),
            ctx.workspace.breaks(),
            ctx.workspace.rule_revision(),
        );
        for follow_up in codelets::run(ctx, &codelet)? {
            self.post(follow_up, ctx);
        }
        ctx.step += 1;
        observer.on_codelet(ctx.step, codelet.kind.name());

        if ctx.workspace.breaks() != breaks {
            observer.on_structure_broken(ctx.step);
        }
        if ctx.workspace.rule_revision() != rule_revision {
            if let Some(rule) = ctx.workspace.rule() {
                observer.on_rule(ctx.step, &rule.describe(ctx.slipnet.network()));
            }
        }
        if ctx.workspace.revision() != revision {
            ctx.workspace.update_unhappiness(&ctx.config.unhappiness);
            let temperature = ctx.temperature.update(&ctx.workspace, ctx.step);
            observer.on_temperature(ctx.step, temperature);
        }

        if ctx.workspace.rule().is_some() && ctx.workspace.answer().is_some() {
            let unhappiness = ctx.workspace.update_unhappiness(&ctx.config.unhappiness).total;
            if unhappiness <= ctx.config.temperature.success_unhappiness {
                debug!(step = ctx.step, unhappiness, "answer accepted");
                return Ok(SearchState::Succeeded);
            }
            debug!(step = ctx.step, unhappiness, "answer rejected; workspace too unhappy");
            ctx.workspace.clear_answer();
        }
        if ctx.step >= ctx.config.search.step_cap {
            return Ok(SearchState::Exhausted);
        }
        Ok(SearchState::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slipnet::NodeId;
    use crate::trial::tests::context;
    use crate::workspace::Rule;
    use copycat_core::NullObserver;

    #[test]
    fn test_post_respects_capacity() {
        let mut ctx = context("abc", "abd", "efg", 1);
        let mut rack = Coderack::new(&ctx.config.coderack);
        for i in 0..250 {
            ctx.step = i;
            rack.post(Codelet::new(CodeletKind::BottomUpBondScout, 3.0), &mut ctx);
        }
        assert_eq!(rack.len(), ctx.config.coderack.capacity);
        assert!(rack.codelets().iter().any(|c| c.birth == 249));
    }

    #[test]
    fn test_post_keeps_new_codelet_when_all_share_a_step() {
        // every weight is zero here, so eviction falls back to a uniform pick
        for seed in 0..20 {
            let mut ctx = context("abc", "abd", "efg", seed);
            ctx.step = 7;
            let mut rack = Coderack::new(&ctx.config.coderack);
            for _ in 0..ctx.config.coderack.capacity {
                rack.post(Codelet::new(CodeletKind::BottomUpBondScout, 3.0), &mut ctx);
            }
            rack.post(Codelet::new(CodeletKind::RuleTranslator, 5.0), &mut ctx);
            assert_eq!(rack.len(), ctx.config.coderack.capacity);
            assert!(rack
                .codelets()
                .iter()
                .any(|c| matches!(c.kind, CodeletKind::RuleTranslator)));
        }
    }

    #[test]
    fn test_cold_rack_prefers_urgent_codelets() {
        let mut ctx = context("abc", "abd", "efg", 2);
        ctx.temperature.update(&ctx.workspace, 1_000);
        ctx.step = 1_000;
        let mut urgent = 0;
        for _ in 0..200 {
            let mut rack = Coderack::new(&ctx.config.coderack);
            rack.post(Codelet::new(CodeletKind::Breaker, 1.0), &mut ctx);
            rack.post(Codelet::new(CodeletKind::RuleScout, 7.0), &mut ctx);
            if let Some(c) = rack.choose(&mut ctx) {
                if matches!(c.kind, CodeletKind::RuleScout) {
                    urgent += 1;
                }
            }
        }
        assert!(urgent > 180, "{} urgent picks", urgent);
    }

    #[test]
    fn test_old_codelets_lose_urgency() {
        let ctx = context("abc", "abd", "efg", 3);
        let rack = Coderack::new(&ctx.config.coderack);
        let fresh = Codelet {
            kind: CodeletKind::Breaker,
            urgency: 3.0,
            birth: 4_000,
        };
        let stale = Codelet { birth: 0, ..fresh.clone() };
        let half_life = ctx.config.coderack.urgency_half_life;
        let ratio = rack.weight(&stale, 50.0, 4_000) / rack.weight(&fresh, 50.0, 4_000);
        assert!((ratio - 0.5f64.powf(4_000.0 / half_life)).abs() < 1e-9);
    }

    #[test]
    fn test_first_step_seeds_rack() {
        let mut ctx = context("abc", "abd", "efg", 4);
        let mut rack = Coderack::new(&ctx.config.coderack);
        let state = rack.step(&mut ctx, &mut NullObserver).unwrap();
        assert_eq!(state, SearchState::Running);
        assert_eq!(ctx.step, 1);
        // 9 letters x 2 x 3 kinds, less the one that ran, plus at most one follow-up
        assert!(rack.len() >= 53 && rack.len() <= 54);
    }

    #[test]
    fn test_replacements_stop_once_a_rule_exists() {
        let mut ctx = context("abc", "abd", "efg", 5);
        assert!(posting_attempts(&mut ctx, Family::Replacement) > 0);
        let rule = Rule::replace(NodeId::LETTER_CATEGORY, NodeId::RIGHTMOST, NodeId::LETTER, NodeId::SUCCESSOR);
        ctx.workspace.set_rule(rule, &mut ctx.slipnet);
        assert_eq!(posting_attempts(&mut ctx, Family::Replacement), 0);
        assert_eq!(posting_attempts(&mut ctx, Family::Translator), 1);
    }

    #[test]
    fn test_answer_on_unexplained_workspace_is_rejected() {
        let mut ctx = context("abc", "abd", "xyz", 8);
        let rule = Rule::replace(NodeId::LETTER_CATEGORY, NodeId::RIGHTMOST, NodeId::LETTER, NodeId::from_char('d').unwrap());
        ctx.workspace.set_rule(rule, &mut ctx.slipnet);
        ctx.workspace.set_answer("xyd".to_string());
        let mut rack = Coderack::new(&ctx.config.coderack);
        let state = rack.step(&mut ctx, &mut NullObserver).unwrap();
        assert_eq!(state, SearchState::Running);
        assert!(ctx.workspace.answer().is_none());
        let unhappiness = ctx.workspace.unhappiness();
        assert!(unhappiness.total > ctx.config.temperature.success_unhappiness);
        assert_eq!(unhappiness.correspondences, 100.0);
    }

    #[test]
    fn test_step_cap_exhausts() {
        let mut ctx = context("abc", "abd", "efg", 6);
        ctx.step = ctx.config.search.step_cap;
        let mut rack = Coderack::new(&ctx.config.coderack);
        assert_eq!(rack.step(&mut ctx, &mut NullObserver).unwrap(), SearchState::Exhausted);
    }
}
