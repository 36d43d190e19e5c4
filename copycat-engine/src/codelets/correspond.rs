//! Correspondence scouts, tester and builder.

use copycat_core::CopycatResult;

use crate::trial::TrialContext;
use crate::workspace::{
    apply_slippages, concept_mappings, distinguishing_descriptor, ConceptMapping, Correspondence, ObjectId, Salience,
    StringKind, StructureHandle,
};

use super::{break_all, choose_by_depth, choose_object, choose_object_in, fight_all, fizzle, follow_up, structure_vs_structure, Codelet, CodeletKind};

/// Mappings between the relevant descriptions of both objects, provided
/// the pair is plausible: same spanning status, at least one slippable
/// mapping, and at least one distinguishing one
fn plausible_mappings(ctx: &mut TrialContext<'_>, initial: ObjectId, target: ObjectId) -> Option<Vec<ConceptMapping>> {
    let (i, t) = (ctx.workspace.object(initial)?, ctx.workspace.object(target)?);
    if i.spans_string() != t.spans_string() {
        return None;
    }
    let mappings = concept_mappings(
        ctx.slipnet.network(),
        &ctx.workspace.relevant_descriptions(initial, &ctx.slipnet),
        &ctx.workspace.relevant_descriptions(target, &ctx.slipnet),
    );
    let slippable = mappings.iter().any(|m| {
        let probability = ctx.temperature.adjusted_probability(m.slippability(&ctx.slipnet) / 100.0);
        ctx.rng.coin_flip(probability)
    });
    if !slippable || !mappings.iter().any(|m| m.is_distinguishing()) {
        return None;
    }
    Some(mappings)
}

/// Both descriptions and the relation between them (opposite for
/// rightmost -> leftmost)
fn activate_mapping(ctx: &mut TrialContext<'_>, mapping: &ConceptMapping) {
    for node in [mapping.initial_type, mapping.initial_descriptor, mapping.target_type, mapping.target_descriptor] {
        ctx.slipnet.activate(node);
    }
    if let Some(label) = mapping.label {
        ctx.slipnet.activate(label);
    }
}

fn propose(
    ctx: &mut TrialContext<'_>,
    initial: ObjectId,
    target: ObjectId,
    mappings: Vec<ConceptMapping>,
) -> CopycatResult<Vec<Codelet>> {
    for m in &mappings {
        if m.is_relevant(&ctx.slipnet) {
            activate_mapping(ctx, m);
        }
    }
    let strengths: Vec<f64> = mappings
        .iter()
        .filter(|m| m.is_distinguishing())
        .map(|m| m.strength(&ctx.slipnet))
        .collect();
    let urgency = strengths.iter().sum::<f64>() / strengths.len().max(1) as f64;
    let correspondence = Correspondence::new(initial, target, mappings);
    follow_up(ctx, CodeletKind::CorrespondenceStrengthTester { correspondence }, urgency)
}

/// Pair two salient objects across the strings
pub(super) fn bottom_up_scout(ctx: &mut TrialContext<'_>) -> CopycatResult<Vec<Codelet>> {
    let Some(initial) = choose_object_in(ctx, StringKind::Initial, Salience::InterString) else {
        return fizzle("no initial object");
    };
    let Some(target) = choose_object_in(ctx, StringKind::Target, Salience::InterString) else {
        return fizzle("no target object");
    };
    let Some(mappings) = plausible_mappings(ctx, initial, target) else {
        return fizzle("objects do not map");
    };
    propose(ctx, initial, target, mappings)
}

/// Map an important initial object to a target object sharing one of its
/// distinguishing descriptors, after slippage
pub(super) fn important_object_scout(ctx: &mut TrialContext<'_>) -> CopycatResult<Vec<Codelet>> {
    let Some(initial) = choose_object_in(ctx, StringKind::Initial, Salience::RelativeImportance) else {
        return fizzle("no initial object");
    };
    let descriptors: Vec<_> = ctx
        .workspace
        .relevant_descriptions(initial, &ctx.slipnet)
        .into_iter()
        .map(|d| d.descriptor)
        .filter(|&d| distinguishing_descriptor(d))
        .collect();
    let Some(descriptor) = choose_by_depth(ctx, &descriptors) else {
        return fizzle("nothing distinguishes the object");
    };
    let wanted = apply_slippages(descriptor, &ctx.workspace.slippages());
    let candidates: Vec<ObjectId> = ctx
        .workspace
        .objects_in(StringKind::Target)
        .filter(|o| {
            ctx.workspace
                .relevant_descriptions(o.id, &ctx.slipnet)
                .iter()
                .any(|d| d.descriptor == wanted)
        })
        .map(|o| o.id)
        .collect();
    let Some(target) = choose_object(ctx, &candidates, Salience::InterString) else {
        return fizzle("no target object fits");
    };
    let Some(mappings) = plausible_mappings(ctx, initial, target) else {
        return fizzle("objects do not map");
    };
    propose(ctx, initial, target, mappings)
}

pub(super) fn strength_tester(ctx: &mut TrialContext<'_>, correspondence: &Correspondence) -> CopycatResult<Vec<Codelet>> {
    if !ctx.workspace.contains_object(correspondence.initial) || !ctx.workspace.contains_object(correspondence.target) {
        return fizzle("corresponding object vanished");
    }
    let strength = ctx.workspace.correspondence_strength(correspondence, &ctx.slipnet);
    let probability = ctx.temperature.adjusted_probability(strength / 100.0);
    if !ctx.rng.coin_flip(probability) {
        return fizzle("correspondence too weak");
    }
    for m in &correspondence.concept_mappings {
        activate_mapping(ctx, m);
    }
    follow_up(
        ctx,
        CodeletKind::CorrespondenceBuilder {
            correspondence: correspondence.clone(),
        },
        strength,
    )
}

/// Letters covered by both ends of a correspondence
fn letter_spans(ctx: &TrialContext<'_>, correspondence: &Correspondence) -> f64 {
    [correspondence.initial, correspondence.target]
        .iter()
        .filter_map(|&id| ctx.workspace.object(id))
        .map(|o| o.letter_span() as f64)
        .sum()
}

pub(super) fn builder(ctx: &mut TrialContext<'_>, correspondence: &Correspondence) -> CopycatResult<Vec<Codelet>> {
    let (Some(initial), Some(target)) = (
        ctx.workspace.object(correspondence.initial),
        ctx.workspace.object(correspondence.target),
    ) else {
        return fizzle("corresponding object vanished");
    };
    let at_edges = (initial.is_leftmost() || initial.is_rightmost()) && (target.is_leftmost() || target.is_rightmost());
    let target_group = target.group;

    if ctx.workspace.is_reflexive(correspondence) {
        // already there; fold in any new mappings
        ctx.workspace.add_correspondence(correspondence.clone(), &mut ctx.slipnet)?;
        return Ok(Vec::new());
    }

    let network = ctx.slipnet.network();
    let strength = ctx.workspace.correspondence_strength(correspondence, &ctx.slipnet);
    let spans = letter_spans(ctx, correspondence);
    let mut losers: Vec<StructureHandle> = Vec::new();
    for id in ctx.workspace.incompatible_correspondences(correspondence, network) {
        let Some(other) = ctx.workspace.correspondence(id).cloned() else {
            continue;
        };
        let other_spans = letter_spans(ctx, &other);
        if !structure_vs_structure(ctx, strength, spans, other.strength, other_spans) {
            return fizzle("lost to an incompatible correspondence");
        }
        losers.push(StructureHandle::Correspondence(id));
    }

    if at_edges {
        if let Some(bond) = ctx.workspace.incompatible_bond_for_correspondence(correspondence, network) {
            let bond = [StructureHandle::Bond(bond)];
            if !fight_all(ctx, strength, 3.0, &bond, 2.0) {
                return fizzle("lost to an incompatible bond");
            }
            losers.extend(bond);
            if let Some(group) = target_group {
                let group = [StructureHandle::Group(group)];
                if !fight_all(ctx, strength, 1.0, &group, 1.0) {
                    return fizzle("lost to an incompatible group");
                }
                losers.extend(group);
            }
        }
    }

    let conflicts = ctx
        .workspace
        .rule()
        .map_or(false, |rule| ctx.workspace.rule_conflicts_with(rule, correspondence));
    if conflicts {
        let rule = [StructureHandle::Rule];
        if !fight_all(ctx, strength, 1.0, &rule, 1.0) {
            return fizzle("lost to the rule");
        }
        losers.extend(rule);
    }

    break_all(ctx, &losers)?;
    ctx.workspace.add_correspondence(correspondence.clone(), &mut ctx.slipnet)?;
    Ok(Vec::new())
}
