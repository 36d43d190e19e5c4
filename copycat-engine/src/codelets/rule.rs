//! Replacements, rule scout, tester and builder, and the translator that
//! turns the rule into an answer.

use tracing::debug;

use copycat_core::CopycatResult;

use crate::slipnet::NodeId;
use crate::trial::TrialContext;
use crate::workspace::{
    apply_slippages, distinguishing_descriptor, replacement_relation, ObjectKind, Replacement, Rule, StringKind,
    StructureHandle,
};

use super::{choose_by_depth, fight_all, fizzle, follow_up, Codelet, CodeletKind};

/// Temperature cutoff weights (cutoffs 10, 20, ..., 100) by bond density,
/// densest first. A well-bonded workspace translates only when cool.
const CUTOFF_WEIGHTS: [[f64; 10]; 5] = [
    [5.0, 150.0, 5.0, 2.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
    [1.0, 5.0, 150.0, 5.0, 2.0, 1.0, 1.0, 1.0, 1.0, 1.0],
    [1.0, 2.0, 5.0, 150.0, 5.0, 2.0, 1.0, 1.0, 1.0, 1.0],
    [1.0, 1.0, 2.0, 5.0, 150.0, 5.0, 2.0, 1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0, 2.0, 5.0, 150.0, 5.0, 2.0, 1.0, 1.0],
];

fn letter_char(kind: &ObjectKind) -> Option<char> {
    match kind {
        ObjectKind::Letter(c) => Some(*c),
        ObjectKind::Group(_) => None,
    }
}

/// Pair a random initial letter with the modified letter at its position
pub(super) fn replacement_finder(ctx: &mut TrialContext<'_>) -> CopycatResult<Vec<Codelet>> {
    let letters = ctx.workspace.string(StringKind::Initial).letters().to_vec();
    let Some(&initial) = ctx.rng.choice(&letters) else {
        return fizzle("empty initial string");
    };
    let Some(object) = ctx.workspace.object(initial) else {
        return fizzle("letter vanished");
    };
    if object.replacement.is_some() {
        return fizzle("letter already replaced");
    }
    let Some(modified) = ctx.workspace.letter_at(StringKind::Modified, object.left_index) else {
        return fizzle("no modified letter at that position");
    };
    let from = letter_char(&object.kind);
    let to = ctx.workspace.object(modified).and_then(|o| letter_char(&o.kind));
    let Some((from, to)) = from.zip(to) else {
        return fizzle("replacement between non-letters");
    };
    let relation = replacement_relation(from, to);
    ctx.workspace.set_replacement(initial, Replacement { modified, relation })?;
    Ok(Vec::new())
}

/// Describe the change from initial to modified as a rule
pub(super) fn scout(ctx: &mut TrialContext<'_>) -> CopycatResult<Vec<Codelet>> {
    if ctx.workspace.unreplaced_letters() > 0 {
        return fizzle("replacements still missing");
    }
    let changed: Vec<_> = ctx
        .workspace
        .objects_in(StringKind::Initial)
        .filter(|o| o.changed)
        .map(|o| o.id)
        .collect();
    let changed = match changed.as_slice() {
        [] => return propose(ctx, Rule::no_change()),
        [one] => *one,
        _ => return fizzle("more than one letter changed"),
    };
    let ws = &ctx.workspace;
    let Some(object) = ws.object(changed) else {
        return fizzle("changed letter vanished");
    };

    let mut descriptors = Vec::new();
    match object.descriptor(NodeId::STRING_POSITION_CATEGORY) {
        Some(position) if position != NodeId::WHOLE => descriptors.push(position),
        Some(_) => {}
        None => {
            // the letter itself identifies the object only if it is unique
            if let Some(letter) = object.descriptor(NodeId::LETTER_CATEGORY) {
                let unique = !ws
                    .objects_in(StringKind::Initial)
                    .any(|o| o.id != changed && o.described(letter));
                if unique {
                    descriptors.push(letter);
                }
            }
        }
    }
    if let Some(target) = object
        .correspondence
        .and_then(|id| ws.correspondence(id))
        .and_then(|c| ws.object(c.target))
    {
        let slippages = ws.slippages();
        descriptors.retain(|&d| {
            let slipped = apply_slippages(d, &slippages);
            target.described(slipped) && distinguishing_descriptor(slipped)
        });
    }

    let Some(replacement) = object.replacement else {
        return fizzle("changed letter has no replacement");
    };
    let mut relations = Vec::new();
    relations.extend(replacement.relation);
    relations.extend(
        ws.object(replacement.modified)
            .and_then(|o| o.descriptor(NodeId::LETTER_CATEGORY)),
    );

    let Some(descriptor) = choose_by_depth(ctx, &descriptors) else {
        return fizzle("nothing describes the changed letter");
    };
    let Some(relation) = choose_by_depth(ctx, &relations) else {
        return fizzle("no relation for the change");
    };
    propose(
        ctx,
        Rule::replace(NodeId::LETTER_CATEGORY, descriptor, NodeId::LETTER, relation),
    )
}

fn propose(ctx: &mut TrialContext<'_>, rule: Rule) -> CopycatResult<Vec<Codelet>> {
    let urgency = match rule.change {
        Some(change) => {
            let network = ctx.slipnet.network();
            let depths = network.depth(change.descriptor) + network.depth(change.relation);
            (depths / 200.0).sqrt() * 100.0
        }
        None => 0.0,
    };
    follow_up(ctx, CodeletKind::RuleStrengthTester { rule }, urgency)
}

pub(super) fn strength_tester(ctx: &mut TrialContext<'_>, rule: &Rule) -> CopycatResult<Vec<Codelet>> {
    let strength = ctx.workspace.rule_strength(rule, &ctx.slipnet);
    let probability = ctx.temperature.adjusted_probability(strength / 100.0);
    if !ctx.rng.coin_flip(probability) {
        return fizzle("rule too weak");
    }
    follow_up(ctx, CodeletKind::RuleBuilder { rule: *rule }, strength)
}

pub(super) fn builder(ctx: &mut TrialContext<'_>, rule: &Rule) -> CopycatResult<Vec<Codelet>> {
    if ctx.workspace.rule() == Some(rule) {
        for concept in rule.concepts() {
            ctx.slipnet.activate(concept);
        }
        return fizzle("rule already in place");
    }
    let strength = ctx.workspace.rule_strength(rule, &ctx.slipnet);
    if strength <= 0.0 {
        return fizzle("rule has no strength");
    }
    if ctx.workspace.rule().is_some() && !fight_all(ctx, strength, 1.0, &[StructureHandle::Rule], 1.0) {
        return fizzle("lost to the current rule");
    }
    ctx.workspace.set_rule(*rule, &mut ctx.slipnet);
    Ok(Vec::new())
}

/// Bonds per adjacent pair across initial and target, capped at 1
fn bond_density(ctx: &TrialContext<'_>) -> f64 {
    let ws = &ctx.workspace;
    let initial = ws.string(StringKind::Initial).len();
    let target = ws.string(StringKind::Target).len();
    if initial == 1 && target == 1 {
        return 1.0;
    }
    let bonds = ws.bonds_in(StringKind::Initial).count() + ws.bonds_in(StringKind::Target).count();
    (bonds as f64 / (initial + target - 2) as f64).min(1.0)
}

fn cutoff_weights(density: f64) -> &'static [f64; 10] {
    let row = match density {
        d if d > 0.8 => 0,
        d if d > 0.6 => 1,
        d if d > 0.4 => 2,
        d if d > 0.2 => 3,
        _ => 4,
    };
    &CUTOFF_WEIGHTS[row]
}

/// Apply the rule to the target if the workspace is cool enough
pub(super) fn translator(ctx: &mut TrialContext<'_>) -> CopycatResult<Vec<Codelet>> {
    let Some(rule) = ctx.workspace.rule().copied() else {
        return fizzle("no rule to translate");
    };
    let weights = cutoff_weights(bond_density(ctx));
    let Some(index) = ctx.rng.weighted_index(weights) else {
        return fizzle("no cutoff");
    };
    let cutoff = (index + 1) as f64 * 10.0;
    if cutoff < ctx.temperature.actual() {
        return fizzle("too hot to translate");
    }
    match ctx.workspace.translate_rule(&rule) {
        Some(answer) => {
            debug!(%answer, step = ctx.step, "rule translated");
            ctx.workspace.set_answer(answer);
        }
        None => {
            // a standing rule is never reclamped
            debug!(step = ctx.step, "translation failed; breaking the rule and reclamping");
            ctx.workspace.break_structure(StructureHandle::Rule)?;
            ctx.temperature
                .clamp_for(ctx.step, ctx.config.temperature.clamp_on_failed_translation);
        }
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::tests::context;

    fn replace_all(ctx: &mut TrialContext<'_>) {
        for _ in 0..200 {
            replacement_finder(ctx).unwrap();
        }
        assert_eq!(ctx.workspace.unreplaced_letters(), 0);
    }

    #[test]
    fn test_replacement_finder_marks_change() {
        let mut ctx = context("abc", "abd", "ijk", 7);
        replace_all(&mut ctx);
        let c = ctx.workspace.letter_at(StringKind::Initial, 2).unwrap();
        assert_eq!(ctx.workspace.changed_object(), Some(c));
        let replacement = ctx.workspace.object(c).unwrap().replacement.unwrap();
        assert_eq!(replacement.relation, Some(NodeId::SUCCESSOR));
    }

    #[test]
    fn test_scout_waits_for_replacements() {
        let mut ctx = context("abc", "abd", "ijk", 7);
        assert!(scout(&mut ctx).unwrap().is_empty());
    }

    #[test]
    fn test_scout_proposes_rightmost_rule() {
        for seed in 0..10 {
            let mut ctx = context("abc", "abd", "ijk", seed);
            replace_all(&mut ctx);
            let follow = scout(&mut ctx).unwrap();
            let CodeletKind::RuleStrengthTester { rule } = &follow[0].kind else {
                panic!("unexpected follow-up");
            };
            let change = rule.change.unwrap();
            assert_eq!(change.descriptor, NodeId::RIGHTMOST);
            let d = NodeId::from_char('d').unwrap();
            assert!(change.relation == NodeId::SUCCESSOR || change.relation == d);
        }
    }

    #[test]
    fn test_unchanged_strings_give_no_change_rule() {
        let mut ctx = context("abc", "abc", "ijk", 1);
        replace_all(&mut ctx);
        let follow = scout(&mut ctx).unwrap();
        let CodeletKind::RuleStrengthTester { rule } = &follow[0].kind else {
            panic!("unexpected follow-up");
        };
        assert_eq!(*rule, Rule::no_change());
    }

    #[test]
    fn test_translator_needs_cool_workspace() {
        let mut ctx = context("abc", "abd", "ijk", 3);
        replace_all(&mut ctx);
        let rule = Rule::replace(NodeId::LETTER_CATEGORY, NodeId::RIGHTMOST, NodeId::LETTER, NodeId::SUCCESSOR);
        ctx.workspace.set_rule(rule, &mut ctx.slipnet);
        // fresh temperature is 100: no cutoff reaches it except the top one
        let mut translated = 0;
        for _ in 0..50 {
            translator(&mut ctx).unwrap();
            if ctx.workspace.answer().is_some() {
                translated += 1;
                assert_eq!(ctx.workspace.answer(), Some("ijl"));
                ctx.workspace.clear_answer();
            }
        }
        assert!(translated < 10, "{} translations", translated);
    }

    #[test]
    fn test_failed_translation_releases_the_rule() {
        let mut ctx = context("abc", "abd", "xyz", 5);
        replace_all(&mut ctx);
        let rule = Rule::replace(NodeId::LETTER_CATEGORY, NodeId::RIGHTMOST, NodeId::LETTER, NodeId::SUCCESSOR);
        ctx.workspace.set_rule(rule, &mut ctx.slipnet);
        ctx.step = 1_000;
        ctx.workspace.update_unhappiness(&ctx.config.unhappiness);
        ctx.temperature.update(&ctx.workspace, ctx.step);
        assert!(!ctx.temperature.is_clamped());

        let breaks = ctx.workspace.breaks();
        let mut previous = ctx.temperature.value();
        // only the rare top cutoffs reach a hot workspace
        for _ in 0..5_000 {
            translator(&mut ctx).unwrap();
            if ctx.workspace.rule().is_none() {
                break;
            }
            // same rule, no break: the temperature codelets see must not rise
            assert!(ctx.temperature.value() <= previous);
            previous = ctx.temperature.value();
        }
        // z has no successor
        assert!(ctx.workspace.rule().is_none());
        assert!(ctx.workspace.answer().is_none());
        assert!(ctx.workspace.breaks() > breaks);
        assert_eq!(ctx.temperature.value(), 100.0);
    }

    #[test]
    fn test_cutoff_rows() {
        assert_eq!(cutoff_weights(1.0)[1], 150.0);
        assert_eq!(cutoff_weights(0.0)[5], 150.0);
    }
}
