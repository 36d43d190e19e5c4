//! # Codelets - Small Probabilistic Actions
//!
//! A codelet is one tiny step of perception: look at an object, propose a
//! bond, test a correspondence, build a rule. Each kind is a variant of
//! [`CodeletKind`]; [`run`] dispatches on it with one exhaustive match.
//!
//! ## Lifecycle
//!
//! Most structures go through three codelets:
//!
//! ```text
//!   scout ──proposal──▶ strength tester ──proposal──▶ builder
//!     │                       │                          │
//!   fizzle                  fizzle              fights incompatibles,
//!                                               builds or fizzles
//! ```
//!
//! Every codelet returns the follow-up codelets it wants posted. A codelet
//! that finds nothing to do, or whose structures have vanished, fizzles
//! by returning no follow-ups; that is a normal outcome, not an error.

mod bond;
mod breaker;
mod correspond;
mod describe;
mod group;
mod rule;

use tracing::trace;

use copycat_core::formulas::urgency_bin;
use copycat_core::CopycatResult;

use crate::slipnet::NodeId;
use crate::trial::TrialContext;
use crate::workspace::{
    Bond, Correspondence, Description, GroupProposal, ObjectId, Rule, Salience, StringKind, StructureHandle,
};

/// What a codelet does, with the proposal it carries
#[derive(Clone, Debug)]
pub enum CodeletKind {
    Breaker,
    BottomUpDescriptionScout,
    TopDownDescriptionScout { description_type: NodeId },
    DescriptionStrengthTester { object: ObjectId, description: Description },
    DescriptionBuilder { object: ObjectId, description: Description },
    BottomUpBondScout,
    TopDownBondScoutCategory { category: NodeId },
    TopDownBondScoutDirection { direction: NodeId },
    BondStrengthTester { bond: Bond },
    BondBuilder { bond: Bond },
    TopDownGroupScoutCategory { group_category: NodeId },
    TopDownGroupScoutDirection { direction: NodeId },
    GroupScoutWholeString,
    GroupStrengthTester { proposal: GroupProposal },
    GroupBuilder { proposal: GroupProposal },
    ReplacementFinder,
    BottomUpCorrespondenceScout,
    ImportantObjectCorrespondenceScout,
    CorrespondenceStrengthTester { correspondence: Correspondence },
    CorrespondenceBuilder { correspondence: Correspondence },
    RuleScout,
    RuleStrengthTester { rule: Rule },
    RuleBuilder { rule: Rule },
    RuleTranslator,
}

impl CodeletKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Breaker => "breaker",
            Self::BottomUpDescriptionScout => "bottom-up-description-scout",
            Self::TopDownDescriptionScout { .. } => "top-down-description-scout",
            Self::DescriptionStrengthTester { .. } => "description-strength-tester",
            Self::DescriptionBuilder { .. } => "description-builder",
            Self::BottomUpBondScout => "bottom-up-bond-scout",
            Self::TopDownBondScoutCategory { .. } => "top-down-bond-scout--category",
            Self::TopDownBondScoutDirection { .. } => "top-down-bond-scout--direction",
            Self::BondStrengthTester { .. } => "bond-strength-tester",
            Self::BondBuilder { .. } => "bond-builder",
            Self::TopDownGroupScoutCategory { .. } => "top-down-group-scout--category",
            Self::TopDownGroupScoutDirection { .. } => "top-down-group-scout--direction",
            Self::GroupScoutWholeString => "group-scout--whole-string",
            Self::GroupStrengthTester { .. } => "group-strength-tester",
            Self::GroupBuilder { .. } => "group-builder",
            Self::ReplacementFinder => "replacement-finder",
            Self::BottomUpCorrespondenceScout => "bottom-up-correspondence-scout",
            Self::ImportantObjectCorrespondenceScout => "important-object-correspondence-scout",
            Self::CorrespondenceStrengthTester { .. } => "correspondence-strength-tester",
            Self::CorrespondenceBuilder { .. } => "correspondence-builder",
            Self::RuleScout => "rule-scout",
            Self::RuleStrengthTester { .. } => "rule-strength-tester",
            Self::RuleBuilder { .. } => "rule-builder",
            Self::RuleTranslator => "rule-translator",
        }
    }
}

/// A codelet waiting on the coderack
#[derive(Clone, Debug)]
pub struct Codelet {
    pub kind: CodeletKind,
    /// Urgency bin, 1..=bins
    pub urgency: f64,
    /// Step at which it was posted
    pub birth: u64,
}

impl Codelet {
    /// A codelet with an already binned urgency; the coderack stamps `birth`
    pub fn new(kind: CodeletKind, urgency: f64) -> Self {
        Self { kind, urgency, birth: 0 }
    }
}

/// Run one codelet against the trial, returning its follow-ups
pub fn run(ctx: &mut TrialContext<'_>, codelet: &Codelet) -> CopycatResult<Vec<Codelet>> {
    trace!(codelet = codelet.kind.name(), step = ctx.step, "running codelet");
    match &codelet.kind {
        CodeletKind::Breaker => breaker::breaker(ctx),
        CodeletKind::BottomUpDescriptionScout => describe::bottom_up_scout(ctx),
        CodeletKind::TopDownDescriptionScout { description_type } => describe::top_down_scout(ctx, *description_type),
        CodeletKind::DescriptionStrengthTester { object, description } => {
            describe::strength_tester(ctx, *object, *description)
        }
        CodeletKind::DescriptionBuilder { object, description } => describe::builder(ctx, *object, *description),
        CodeletKind::BottomUpBondScout => bond::bottom_up_scout(ctx),
        CodeletKind::TopDownBondScoutCategory { category } => bond::top_down_category_scout(ctx, *category),
        CodeletKind::TopDownBondScoutDirection { direction } => bond::top_down_direction_scout(ctx, *direction),
        CodeletKind::BondStrengthTester { bond } => bond::strength_tester(ctx, bond),
        CodeletKind::BondBuilder { bond } => bond::builder(ctx, bond),
        CodeletKind::TopDownGroupScoutCategory { group_category } => group::category_scout(ctx, *group_category),
        CodeletKind::TopDownGroupScoutDirection { direction } => group::direction_scout(ctx, *direction),
        CodeletKind::GroupScoutWholeString => group::whole_string_scout(ctx),
        CodeletKind::GroupStrengthTester { proposal } => group::strength_tester(ctx, proposal),
        CodeletKind::GroupBuilder { proposal } => group::builder(ctx, proposal),
        CodeletKind::ReplacementFinder => rule::replacement_finder(ctx),
        CodeletKind::BottomUpCorrespondenceScout => correspond::bottom_up_scout(ctx),
        CodeletKind::ImportantObjectCorrespondenceScout => correspond::important_object_scout(ctx),
        CodeletKind::CorrespondenceStrengthTester { correspondence } => {
            correspond::strength_tester(ctx, correspondence)
        }
        CodeletKind::CorrespondenceBuilder { correspondence } => correspond::builder(ctx, correspondence),
        CodeletKind::RuleScout => rule::scout(ctx),
        CodeletKind::RuleStrengthTester { rule } => rule::strength_tester(ctx, rule),
        CodeletKind::RuleBuilder { rule } => rule::builder(ctx, rule),
        CodeletKind::RuleTranslator => rule::translator(ctx),
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Nothing to do; log why and post nothing
fn fizzle(reason: &'static str) -> CopycatResult<Vec<Codelet>> {
    trace!(reason, "codelet fizzled");
    Ok(Vec::new())
}

/// Post a single follow-up whose urgency comes from a 0..100 value
fn follow_up(ctx: &TrialContext<'_>, kind: CodeletKind, value: f64) -> CopycatResult<Vec<Codelet>> {
    let urgency = urgency_bin(value, ctx.config.coderack.urgency_bins);
    Ok(vec![Codelet::new(kind, urgency)])
}

/// Pick an object by temperature-adjusted salience
fn choose_object(ctx: &mut TrialContext<'_>, candidates: &[ObjectId], salience: Salience) -> Option<ObjectId> {
    let weights: Vec<f64> = candidates
        .iter()
        .map(|&id| {
            ctx.workspace
                .object(id)
                .map_or(0.0, |o| ctx.temperature.adjusted_value(o.salience(salience)))
        })
        .collect();
    ctx.rng.weighted_choice(candidates, &weights).copied()
}

/// Pick an object from the initial or target string
fn choose_unmodified_object(ctx: &mut TrialContext<'_>, salience: Salience) -> Option<ObjectId> {
    let candidates: Vec<ObjectId> = ctx.workspace.unmodified_objects().map(|o| o.id).collect();
    choose_object(ctx, &candidates, salience)
}

/// Pick an object from one string
fn choose_object_in(ctx: &mut TrialContext<'_>, string: StringKind, salience: Salience) -> Option<ObjectId> {
    let candidates: Vec<ObjectId> = ctx.workspace.objects_in(string).map(|o| o.id).collect();
    choose_object(ctx, &candidates, salience)
}

/// Pick one of the objects directly beside `id`
fn choose_neighbour(ctx: &mut TrialContext<'_>, id: ObjectId, side: Option<NodeId>) -> Option<ObjectId> {
    let source = ctx.workspace.object(id)?;
    let candidates: Vec<ObjectId> = ctx
        .workspace
        .objects_in(source.string)
        .filter(|o| match side {
            Some(NodeId::LEFT) => o.right_index + 1 == source.left_index,
            Some(NodeId::RIGHT) => o.left_index == source.right_index + 1,
            _ => source.is_beside(o),
        })
        .map(|o| o.id)
        .collect();
    choose_object(ctx, &candidates, Salience::IntraString)
}

/// Temperature-weighted contest between two strengths; true if the first wins
fn structure_vs_structure(
    ctx: &mut TrialContext<'_>,
    first: f64,
    first_weight: f64,
    second: f64,
    second_weight: f64,
) -> bool {
    let first = ctx.temperature.adjusted_value(first * first_weight);
    let second = ctx.temperature.adjusted_value(second * second_weight);
    ctx.rng.uniform() * (first + second) < first
}

/// The challenger must beat every incumbent
fn fight_all(
    ctx: &mut TrialContext<'_>,
    strength: f64,
    weight: f64,
    incumbents: &[StructureHandle],
    incumbent_weight: f64,
) -> bool {
    incumbents.iter().all(|&handle| {
        let incumbent = ctx.workspace.structure_strength_of(handle).unwrap_or(0.0);
        structure_vs_structure(ctx, strength, weight, incumbent, incumbent_weight)
    })
}

fn break_all(ctx: &mut TrialContext<'_>, handles: &[StructureHandle]) -> CopycatResult<()> {
    for &handle in handles {
        ctx.workspace.break_structure(handle)?;
    }
    Ok(())
}

/// Pick a concept, favouring deep ones when cold
fn choose_by_depth(ctx: &mut TrialContext<'_>, nodes: &[NodeId]) -> Option<NodeId> {
    let network = ctx.slipnet.network();
    let weights: Vec<f64> = nodes
        .iter()
        .map(|&n| ctx.temperature.adjusted_value(network.depth(n)))
        .collect();
    ctx.rng.weighted_choice(nodes, &weights).copied()
}

/// Initial or target, weighted by how relevant `concept` is there and how
/// unhappy the string is
fn choose_scout_string(
    ctx: &mut TrialContext<'_>,
    concept: NodeId,
    relevance: fn(&TrialContext<'_>, StringKind, NodeId) -> f64,
) -> StringKind {
    let initial = relevance(ctx, StringKind::Initial, concept)
        + ctx.workspace.string(StringKind::Initial).intra_string_unhappiness;
    let target = relevance(ctx, StringKind::Target, concept)
        + ctx.workspace.string(StringKind::Target).intra_string_unhappiness;
    if ctx.rng.weighted_greater_than(initial, target) {
        StringKind::Initial
    } else {
        StringKind::Target
    }
}

/// Share of a string's objects whose right bond has this category
fn bond_category_relevance(ctx: &TrialContext<'_>, string: StringKind, category: NodeId) -> f64 {
    right_bond_share(ctx, string, |b| b.category == category)
}

/// Share of a string's objects whose right bond points this way
fn direction_relevance(ctx: &TrialContext<'_>, string: StringKind, direction: NodeId) -> f64 {
    right_bond_share(ctx, string, |b| b.direction == Some(direction))
}

fn right_bond_share(ctx: &TrialContext<'_>, string: StringKind, matches: impl Fn(&Bond) -> bool) -> f64 {
    let objects: Vec<_> = ctx.workspace.objects_in(string).collect();
    if objects.len() < 2 {
        return 0.0;
    }
    let hits = objects
        .iter()
        .filter_map(|o| o.right_bond)
        .filter_map(|id| ctx.workspace.bond(id))
        .filter(|b| matches(b))
        .count();
    100.0 * hits as f64 / (objects.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::tests::context;

    #[test]
    fn test_names_are_distinct() {
        let kinds = [
            CodeletKind::Breaker,
            CodeletKind::BottomUpBondScout,
            CodeletKind::GroupScoutWholeString,
            CodeletKind::ReplacementFinder,
            CodeletKind::RuleScout,
            CodeletKind::RuleTranslator,
        ];
        let mut names: Vec<_> = kinds.iter().map(|k| k.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), kinds.len());
    }

    #[test]
    fn test_strong_structure_usually_wins() {
        let mut ctx = context("abc", "abd", "efg", 5);
        ctx.temperature.update(&ctx.workspace, 1_000);
        let wins = (0..500)
            .filter(|_| structure_vs_structure(&mut ctx, 90.0, 1.0, 10.0, 1.0))
            .count();
        assert!(wins > 400, "{} wins", wins);
    }

    #[test]
    fn test_zero_strength_never_wins() {
        let mut ctx = context("abc", "abd", "efg", 5);
        assert!(!(0..50).any(|_| structure_vs_structure(&mut ctx, 0.0, 1.0, 10.0, 1.0)));
    }

    #[test]
    fn test_choose_neighbour_respects_side() {
        let mut ctx = context("abc", "abd", "efg", 9);
        let f = ctx.workspace.letter_at(StringKind::Target, 1).unwrap();
        let e = ctx.workspace.letter_at(StringKind::Target, 0).unwrap();
        let g = ctx.workspace.letter_at(StringKind::Target, 2).unwrap();
        assert_eq!(choose_neighbour(&mut ctx, f, Some(NodeId::LEFT)), Some(e));
        assert_eq!(choose_neighbour(&mut ctx, f, Some(NodeId::RIGHT)), Some(g));
        assert_eq!(choose_neighbour(&mut ctx, e, Some(NodeId::LEFT)), None);
        let either = choose_neighbour(&mut ctx, f, None).unwrap();
        assert!(either == e || either == g);
    }
}
