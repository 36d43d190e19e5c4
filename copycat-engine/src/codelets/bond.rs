//! Bond scouts, tester and builder.

use copycat_core::CopycatResult;

use crate::slipnet::NodeId;
use crate::trial::TrialContext;
use crate::workspace::{Bond, ObjectId, Salience, StringKind, StructureHandle};

use super::{
    bond_category_relevance, break_all, choose_neighbour, choose_object_in, choose_scout_string,
    choose_unmodified_object, direction_relevance, fight_all, fizzle, follow_up, Codelet, CodeletKind,
};

/// Average of a facet's activation and how many objects in the string
/// carry a description of it
fn facet_support(ctx: &TrialContext<'_>, facet: NodeId, string: StringKind) -> f64 {
    let mut objects = 0usize;
    let mut described = 0usize;
    for o in ctx.workspace.objects_in(string) {
        objects += 1;
        described += o.descriptions.iter().filter(|d| d.description_type == facet).count();
    }
    let share = if objects == 0 {
        0.0
    } else {
        described as f64 / objects as f64
    };
    (ctx.slipnet.activation_of(facet) + share) / 2.0
}

/// A facet both objects are described by, chosen by support
fn choose_bond_facet(ctx: &mut TrialContext<'_>, source: ObjectId, destination: ObjectId) -> Option<NodeId> {
    let s = ctx.workspace.object(source)?;
    let d = ctx.workspace.object(destination)?;
    let string = s.string;
    let facets: Vec<NodeId> = NodeId::BOND_FACETS
        .iter()
        .copied()
        .filter(|&f| s.has_description_type(f) && d.has_description_type(f))
        .collect();
    let weights: Vec<f64> = facets.iter().map(|&f| facet_support(ctx, f, string)).collect();
    ctx.rng.weighted_choice(&facets, &weights).copied()
}

/// Descriptors of both ends on a facet
fn descriptors(ctx: &TrialContext<'_>, source: ObjectId, destination: ObjectId, facet: NodeId) -> Option<(NodeId, NodeId)> {
    let s = ctx.workspace.object(source)?.descriptor(facet)?;
    let d = ctx.workspace.object(destination)?.descriptor(facet)?;
    Some((s, d))
}

/// Relation between two descriptors as a bond category
fn bond_category(ctx: &TrialContext<'_>, from: NodeId, to: NodeId) -> Option<NodeId> {
    match ctx.slipnet.network().bond_category(from, to)? {
        NodeId::IDENTITY => Some(NodeId::SAMENESS),
        category => Some(category),
    }
}

fn propose(
    ctx: &mut TrialContext<'_>,
    source: ObjectId,
    destination: ObjectId,
    category: NodeId,
    facet: NodeId,
    source_descriptor: NodeId,
    destination_descriptor: NodeId,
) -> CopycatResult<Vec<Codelet>> {
    for node in [facet, source_descriptor, destination_descriptor] {
        ctx.slipnet.activate(node);
    }
    let bond = ctx
        .workspace
        .make_bond(source, destination, category, facet, source_descriptor, destination_descriptor)?;
    let urgency = ctx.slipnet.bond_degree_of_association(category);
    follow_up(ctx, CodeletKind::BondStrengthTester { bond }, urgency)
}

/// Propose whatever bond relates a salient object to a neighbour
pub(super) fn bottom_up_scout(ctx: &mut TrialContext<'_>) -> CopycatResult<Vec<Codelet>> {
    let Some(source) = choose_unmodified_object(ctx, Salience::IntraString) else {
        return fizzle("no object");
    };
    let Some(destination) = choose_neighbour(ctx, source, None) else {
        return fizzle("object has no neighbour");
    };
    let Some(facet) = choose_bond_facet(ctx, source, destination) else {
        return fizzle("no shared bond facet");
    };
    let Some((sd, dd)) = descriptors(ctx, source, destination, facet) else {
        return fizzle("missing descriptor");
    };
    let Some(category) = bond_category(ctx, sd, dd) else {
        return fizzle("descriptors are unrelated");
    };
    propose(ctx, source, destination, category, facet, sd, dd)
}

/// Look for a bond of one category, read in whichever direction fits
pub(super) fn top_down_category_scout(ctx: &mut TrialContext<'_>, category: NodeId) -> CopycatResult<Vec<Codelet>> {
    let string = choose_scout_string(ctx, category, bond_category_relevance);
    let Some(source) = choose_object_in(ctx, string, Salience::IntraString) else {
        return fizzle("no object");
    };
    let Some(destination) = choose_neighbour(ctx, source, None) else {
        return fizzle("object has no neighbour");
    };
    let Some(facet) = choose_bond_facet(ctx, source, destination) else {
        return fizzle("no shared bond facet");
    };
    let Some((sd, dd)) = descriptors(ctx, source, destination, facet) else {
        return fizzle("missing descriptor");
    };
    let forward = bond_category(ctx, sd, dd);
    let backward = if forward == Some(NodeId::SAMENESS) {
        forward
    } else {
        bond_category(ctx, dd, sd)
    };
    if forward == Some(category) {
        propose(ctx, source, destination, category, facet, sd, dd)
    } else if backward == Some(category) {
        propose(ctx, destination, source, category, facet, dd, sd)
    } else {
        fizzle("neighbours are not related by this category")
    }
}

/// Look for a bond pointing one way
pub(super) fn top_down_direction_scout(ctx: &mut TrialContext<'_>, direction: NodeId) -> CopycatResult<Vec<Codelet>> {
    let string = choose_scout_string(ctx, direction, direction_relevance);
    let Some(source) = choose_object_in(ctx, string, Salience::IntraString) else {
        return fizzle("no object");
    };
    let Some(destination) = choose_neighbour(ctx, source, Some(direction)) else {
        return fizzle("no neighbour on that side");
    };
    let Some(facet) = choose_bond_facet(ctx, source, destination) else {
        return fizzle("no shared bond facet");
    };
    let Some((sd, dd)) = descriptors(ctx, source, destination, facet) else {
        return fizzle("missing descriptor");
    };
    let Some(category) = bond_category(ctx, sd, dd) else {
        return fizzle("descriptors are unrelated");
    };
    propose(ctx, source, destination, category, facet, sd, dd)
}

pub(super) fn strength_tester(ctx: &mut TrialContext<'_>, bond: &Bond) -> CopycatResult<Vec<Codelet>> {
    if !ctx.workspace.contains_object(bond.source) || !ctx.workspace.contains_object(bond.destination) {
        return fizzle("bond end vanished");
    }
    let strength = ctx.workspace.bond_strength(bond, &ctx.slipnet);
    let probability = ctx.temperature.adjusted_probability(strength / 100.0);
    if !ctx.rng.coin_flip(probability) {
        return fizzle("bond too weak");
    }
    for node in [bond.facet, bond.source_descriptor, bond.destination_descriptor] {
        ctx.slipnet.activate(node);
    }
    follow_up(ctx, CodeletKind::BondBuilder { bond: bond.clone() }, strength)
}

/// Build the bond after beating whatever stands in its way
pub(super) fn builder(ctx: &mut TrialContext<'_>, bond: &Bond) -> CopycatResult<Vec<Codelet>> {
    let (Some(left), Some(right)) = (ctx.workspace.object(bond.left), ctx.workspace.object(bond.right)) else {
        return fizzle("bond end vanished");
    };
    let at_edge = left.is_leftmost() || right.is_rightmost();

    if ctx.workspace.existing_bond(bond).is_some() {
        ctx.slipnet.activate(bond.category);
        if let Some(direction) = bond.direction {
            ctx.slipnet.activate(direction);
        }
        return fizzle("bond already exists");
    }

    let strength = ctx.workspace.bond_strength(bond, &ctx.slipnet);
    let bonds: Vec<StructureHandle> = ctx
        .workspace
        .incompatible_bonds(bond)
        .into_iter()
        .map(StructureHandle::Bond)
        .collect();
    if !fight_all(ctx, strength, 1.0, &bonds, 1.0) {
        return fizzle("lost to an incompatible bond");
    }
    let groups: Vec<StructureHandle> = ctx
        .workspace
        .common_groups(bond.source, bond.destination)
        .into_iter()
        .map(StructureHandle::Group)
        .collect();
    if !fight_all(ctx, strength, 1.0, &groups, 1.0) {
        return fizzle("lost to an incompatible group");
    }
    let mut correspondences = Vec::new();
    if at_edge && bond.direction.is_some() {
        correspondences = ctx
            .workspace
            .incompatible_correspondences_for_bond(bond)
            .into_iter()
            .map(StructureHandle::Correspondence)
            .collect();
        if !fight_all(ctx, strength, 2.0, &correspondences, 3.0) {
            return fizzle("lost to an incompatible correspondence");
        }
    }

    break_all(ctx, &bonds)?;
    break_all(ctx, &groups)?;
    break_all(ctx, &correspondences)?;
    ctx.workspace.add_bond(bond.clone(), &mut ctx.slipnet)?;
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::tests::context;

    fn letter_bond(ctx: &TrialContext<'_>, from: usize, to: usize, category: NodeId) -> Bond {
        let text = ctx.workspace.string(StringKind::Target).text().as_bytes().to_vec();
        let a = ctx.workspace.letter_at(StringKind::Target, from).unwrap();
        let b = ctx.workspace.letter_at(StringKind::Target, to).unwrap();
        ctx.workspace
            .make_bond(
                a,
                b,
                category,
                NodeId::LETTER_CATEGORY,
                NodeId::from_char(text[from] as char).unwrap(),
                NodeId::from_char(text[to] as char).unwrap(),
            )
            .unwrap()
    }

    #[test]
    fn test_builder_is_idempotent() {
        let mut ctx = context("abc", "abd", "efg", 1);
        let bond = letter_bond(&ctx, 0, 1, NodeId::SUCCESSOR);
        builder(&mut ctx, &bond).unwrap();
        builder(&mut ctx, &bond).unwrap();
        assert_eq!(ctx.workspace.bonds_in(StringKind::Target).count(), 1);
    }

    #[test]
    fn test_builder_replaces_or_keeps_occupant() {
        for seed in 0..20 {
            let mut ctx = context("abc", "abd", "efg", seed);
            let successor = letter_bond(&ctx, 0, 1, NodeId::SUCCESSOR);
            builder(&mut ctx, &successor).unwrap();
            let predecessor = letter_bond(&ctx, 1, 0, NodeId::PREDECESSOR);
            builder(&mut ctx, &predecessor).unwrap();
            // whichever won, the slot holds exactly one bond
            assert_eq!(ctx.workspace.bonds_in(StringKind::Target).count(), 1);
        }
    }

    #[test]
    fn test_bottom_up_scout_proposes_real_relations() {
        for seed in 0..30 {
            let mut ctx = context("abc", "abd", "xxyz", seed);
            ctx.workspace.update_everything(&ctx.slipnet);
            for codelet in bottom_up_scout(&mut ctx).unwrap() {
                let CodeletKind::BondStrengthTester { bond } = codelet.kind else {
                    panic!("unexpected follow-up");
                };
                assert!([NodeId::SUCCESSOR, NodeId::PREDECESSOR, NodeId::SAMENESS].contains(&bond.category));
                assert_eq!(bond.category == NodeId::SAMENESS, bond.direction.is_none());
            }
        }
    }

    #[test]
    fn test_category_scout_orients_bond() {
        let mut proposed = 0;
        for seed in 0..30 {
            let mut ctx = context("abc", "abd", "efg", seed);
            ctx.workspace.update_everything(&ctx.slipnet);
            for codelet in top_down_category_scout(&mut ctx, NodeId::PREDECESSOR).unwrap() {
                let CodeletKind::BondStrengthTester { bond } = codelet.kind else {
                    panic!("unexpected follow-up");
                };
                assert_eq!(bond.category, NodeId::PREDECESSOR);
                assert_eq!(bond.direction, Some(NodeId::LEFT));
                proposed += 1;
            }
        }
        assert!(proposed > 0);
    }
}
