//! Group scouts, tester and builder.

use copycat_core::CopycatResult;

use crate::slipnet::NodeId;
use crate::trial::TrialContext;
use crate::workspace::{Bond, BondId, GroupProposal, ObjectId, Salience, StringKind, StructureHandle, Workspace};

use super::{
    bond_category_relevance, break_all, choose_object_in, choose_scout_string, direction_relevance, fight_all,
    fizzle, follow_up, Codelet, CodeletKind,
};

/// A maximal run of objects around `start` joined by bonds of one
/// category, direction and facet: (members, bonds, facet)
fn bonded_run(
    ws: &Workspace,
    start: ObjectId,
    category: NodeId,
    direction: Option<NodeId>,
) -> Option<(Vec<ObjectId>, Vec<Bond>, NodeId)> {
    let fits = |bond: &Bond, facet: Option<NodeId>| {
        bond.category == category && bond.direction == direction && facet.map_or(true, |f| f == bond.facet)
    };
    let mut facet = None;
    let mut left = start;
    while let Some(bond) = ws.object(left)?.left_bond.and_then(|id| ws.bond(id)) {
        if !fits(bond, facet) {
            break;
        }
        facet = Some(bond.facet);
        left = bond.left;
    }
    let mut right = start;
    while let Some(bond) = ws.object(right)?.right_bond.and_then(|id| ws.bond(id)) {
        if !fits(bond, facet) {
            break;
        }
        facet = Some(bond.facet);
        right = bond.right;
    }
    if left == right {
        return None;
    }
    let mut members = vec![left];
    let mut bonds = Vec::new();
    let mut current = left;
    while current != right {
        let bond = ws.bond(ws.object(current)?.right_bond?)?;
        bonds.push(bond.clone());
        current = bond.right;
        members.push(current);
    }
    Some((members, bonds, facet?))
}

/// Direction to look in first from an object: inward at the edges,
/// otherwise by activation of left and right
fn initial_side(ctx: &mut TrialContext<'_>, id: ObjectId) -> Option<NodeId> {
    let object = ctx.workspace.object(id)?;
    if object.is_leftmost() {
        return Some(NodeId::RIGHT);
    }
    if object.is_rightmost() {
        return Some(NodeId::LEFT);
    }
    let sides = [NodeId::LEFT, NodeId::RIGHT];
    let weights = [ctx.slipnet.activation_of(NodeId::LEFT), ctx.slipnet.activation_of(NodeId::RIGHT)];
    ctx.rng.weighted_choice(&sides, &weights).copied()
}

fn bond_on_side(ws: &Workspace, id: ObjectId, side: NodeId) -> Option<Bond> {
    let object = ws.object(id)?;
    let bond = if side == NodeId::LEFT {
        object.left_bond
    } else {
        object.right_bond
    };
    ws.bond(bond?).cloned()
}

fn opposite_side(side: NodeId) -> NodeId {
    if side == NodeId::LEFT {
        NodeId::RIGHT
    } else {
        NodeId::LEFT
    }
}

fn propose(
    ctx: &mut TrialContext<'_>,
    string: StringKind,
    members: Vec<ObjectId>,
    bonds: Vec<Bond>,
    group_category: NodeId,
    direction: Option<NodeId>,
    facet: NodeId,
) -> CopycatResult<Vec<Codelet>> {
    if members.len() < 2 {
        return fizzle("a group needs two members");
    }
    let Some(bond_category) = ctx.slipnet.network().related_node(group_category, NodeId::BOND_CATEGORY) else {
        return fizzle("group category has no bond category");
    };
    ctx.slipnet.activate(bond_category);
    if let Some(direction) = direction {
        ctx.slipnet.activate(direction);
    }
    let proposal = GroupProposal {
        string,
        group_category,
        direction,
        facet,
        members,
        bonds,
    };
    let urgency = ctx.slipnet.bond_degree_of_association(bond_category);
    follow_up(ctx, CodeletKind::GroupStrengthTester { proposal }, urgency)
}

/// Look for a run of bonds forming a group of `group_category`
pub(super) fn category_scout(ctx: &mut TrialContext<'_>, group_category: NodeId) -> CopycatResult<Vec<Codelet>> {
    let Some(category) = ctx.slipnet.network().related_node(group_category, NodeId::BOND_CATEGORY) else {
        return fizzle("group category has no bond category");
    };
    let string = choose_scout_string(ctx, category, bond_category_relevance);
    let Some(source) = choose_object_in(ctx, string, Salience::IntraString) else {
        return fizzle("no object");
    };
    let Some(object) = ctx.workspace.object(source) else {
        return fizzle("object vanished");
    };
    if object.spans_string() {
        return fizzle("object already spans its string");
    }
    let Some(side) = initial_side(ctx, source) else {
        return fizzle("no side");
    };
    let first_bond = [side, opposite_side(side)]
        .into_iter()
        .filter_map(|s| bond_on_side(&ctx.workspace, source, s))
        .find(|b| b.category == category);
    let Some(first_bond) = first_bond else {
        return fizzle("no bond of this category");
    };
    let Some((members, bonds, facet)) = bonded_run(&ctx.workspace, source, category, first_bond.direction) else {
        return fizzle("no run of bonds");
    };
    propose(ctx, string, members, bonds, group_category, first_bond.direction, facet)
}

/// Look for a run of bonds pointing one way
pub(super) fn direction_scout(ctx: &mut TrialContext<'_>, direction: NodeId) -> CopycatResult<Vec<Codelet>> {
    let string = choose_scout_string(ctx, direction, direction_relevance);
    let Some(source) = choose_object_in(ctx, string, Salience::IntraString) else {
        return fizzle("no object");
    };
    if ctx.workspace.object(source).map_or(true, |o| o.spans_string()) {
        return fizzle("object already spans its string");
    }
    let Some(side) = initial_side(ctx, source) else {
        return fizzle("no side");
    };
    let mut wanted = Some(direction);
    let mut first_bond = None;
    for s in [side, opposite_side(side)] {
        let Some(bond) = bond_on_side(&ctx.workspace, source, s) else {
            continue;
        };
        // sameness bonds have no direction and are accepted as such
        if bond.direction.is_none() {
            wanted = None;
        }
        if bond.direction == wanted {
            first_bond = Some(bond);
            break;
        }
    }
    let Some(first_bond) = first_bond else {
        return fizzle("no bond pointing that way");
    };
    let category = first_bond.category;
    let Some(group_category) = ctx.slipnet.network().related_node(category, NodeId::GROUP_CATEGORY) else {
        return fizzle("bond category forms no group");
    };
    let Some((members, bonds, facet)) = bonded_run(&ctx.workspace, source, category, wanted) else {
        return fizzle("no run of bonds");
    };
    propose(ctx, string, members, bonds, group_category, wanted, facet)
}

/// Try to group a whole string along its bonds
pub(super) fn whole_string_scout(ctx: &mut TrialContext<'_>) -> CopycatResult<Vec<Codelet>> {
    let string = if ctx.rng.flip() {
        StringKind::Initial
    } else {
        StringKind::Target
    };
    let ws = &ctx.workspace;
    let Some(mut leftmost) = ws.objects_in(string).filter(|o| o.is_leftmost()).last() else {
        return fizzle("empty string");
    };
    while let Some(parent) = leftmost.group.and_then(|g| ws.object(g)) {
        if parent.as_group().map_or(true, |g| g.group_category != NodeId::SAMENESS_GROUP) {
            break;
        }
        leftmost = parent;
    }

    if leftmost.spans_string() {
        let Some(group) = leftmost.as_group() else {
            return fizzle("single letter string");
        };
        let bonds: Option<Vec<Bond>> = group.bonds.iter().map(|&id| ws.bond(id).cloned()).collect();
        let Some(bonds) = bonds else {
            return fizzle("group bond vanished");
        };
        let (members, category, direction, facet) =
            (group.members.clone(), group.group_category, group.direction, group.facet);
        return propose(ctx, string, members, bonds, category, direction, facet);
    }

    let mut members = vec![leftmost.id];
    let mut bonds: Vec<Bond> = Vec::new();
    let mut current = leftmost;
    while let Some(bond) = current.right_bond.and_then(|id| ws.bond(id)) {
        let Some(next) = ws.object(bond.right) else { break };
        bonds.push(bond.clone());
        members.push(next.id);
        current = next;
    }
    if !current.is_rightmost() {
        return fizzle("bonds do not reach across the string");
    }
    let Some(chosen) = ctx.rng.choice(&bonds).cloned() else {
        return fizzle("no bonds");
    };
    let Some(bonds_fitting) = ctx
        .workspace
        .possible_group_bonds(chosen.category, chosen.direction, &bonds)?
    else {
        return fizzle("sameness bond in the way");
    };
    if bonds_fitting.len() != bonds.len() {
        return fizzle("bonds cannot all be read one way");
    }
    let Some(group_category) = ctx
        .slipnet
        .network()
        .related_node(chosen.category, NodeId::GROUP_CATEGORY)
    else {
        return fizzle("bond category forms no group");
    };
    propose(ctx, string, members, bonds_fitting, group_category, chosen.direction, chosen.facet)
}

pub(super) fn strength_tester(ctx: &mut TrialContext<'_>, proposal: &GroupProposal) -> CopycatResult<Vec<Codelet>> {
    let Some(shape) = ctx.workspace.proposal_shape(proposal) else {
        return fizzle("group member vanished");
    };
    let strength = ctx.workspace.group_strength(&shape, &ctx.slipnet);
    let probability = ctx.temperature.adjusted_probability(strength / 100.0);
    if !ctx.rng.coin_flip(probability) {
        return fizzle("group too weak");
    }
    if let Some(bond_category) = ctx
        .slipnet
        .network()
        .related_node(proposal.group_category, NodeId::BOND_CATEGORY)
    {
        ctx.slipnet.activate(bond_category);
    }
    if let Some(direction) = proposal.direction {
        ctx.slipnet.activate(direction);
    }
    follow_up(ctx, CodeletKind::GroupBuilder { proposal: proposal.clone() }, strength)
}

/// A consecutive pair's bond: already built, or still to build
enum PairBond {
    Built(BondId),
    Missing(Bond),
}

/// Build the group, bonding any consecutive members that are not yet bonded
pub(super) fn builder(ctx: &mut TrialContext<'_>, proposal: &GroupProposal) -> CopycatResult<Vec<Codelet>> {
    if let Some(existing) = ctx.workspace.equivalent_group(proposal) {
        if let Some(descriptions) = ctx.workspace.group_descriptions(proposal, false) {
            for d in descriptions {
                ctx.workspace.add_description(existing, d, &mut ctx.slipnet)?;
            }
        }
        return fizzle("group already exists");
    }
    if proposal.members.iter().any(|&m| !ctx.workspace.contains_object(m)) {
        return fizzle("group member vanished");
    }
    let Some(bond_category) = ctx
        .slipnet
        .network()
        .related_node(proposal.group_category, NodeId::BOND_CATEGORY)
    else {
        return fizzle("group category has no bond category");
    };
    let Some(shape) = ctx.workspace.proposal_shape(proposal) else {
        return fizzle("group member vanished");
    };

    let mut plan = Vec::with_capacity(proposal.members.len().saturating_sub(1));
    for pair in proposal.members.windows(2) {
        let ws = &ctx.workspace;
        let existing = ws.object(pair[0]).and_then(|o| o.right_bond).filter(|&id| {
            ws.bond(id).map_or(false, |b| {
                b.connects(pair[0], pair[1]) && b.category == bond_category && b.direction == proposal.direction
            })
        });
        if let Some(id) = existing {
            plan.push(PairBond::Built(id));
            continue;
        }
        let (source, destination) = if proposal.direction == Some(NodeId::LEFT) {
            (pair[1], pair[0])
        } else {
            (pair[0], pair[1])
        };
        let descriptors = ws
            .object(source)
            .and_then(|o| o.descriptor(proposal.facet))
            .zip(ws.object(destination).and_then(|o| o.descriptor(proposal.facet)));
        let Some((sd, dd)) = descriptors else {
            return fizzle("member lacks the group facet");
        };
        plan.push(PairBond::Missing(ws.make_bond(
            source,
            destination,
            bond_category,
            proposal.facet,
            sd,
            dd,
        )?));
    }

    let strength = ctx.workspace.group_strength(&shape, &ctx.slipnet);
    let bonds: Vec<StructureHandle> = ctx
        .workspace
        .incompatible_bonds_for_group(proposal, bond_category)
        .into_iter()
        .map(StructureHandle::Bond)
        .collect();
    if !fight_all(ctx, strength, 1.0, &bonds, 1.0) {
        return fizzle("lost to an incompatible bond");
    }
    let groups: Vec<StructureHandle> = ctx
        .workspace
        .incompatible_groups(proposal)
        .into_iter()
        .map(StructureHandle::Group)
        .collect();
    if !fight_all(ctx, strength, 1.0, &groups, 1.0) {
        return fizzle("lost to an incompatible group");
    }
    break_all(ctx, &bonds)?;
    break_all(ctx, &groups)?;

    let mut bond_ids = Vec::with_capacity(plan.len());
    for step in plan {
        let id = match step {
            PairBond::Built(id) if ctx.workspace.bond(id).is_some() => id,
            PairBond::Built(_) => return fizzle("member bond vanished"),
            PairBond::Missing(bond) => ctx.workspace.add_bond(bond, &mut ctx.slipnet)?,
        };
        bond_ids.push(id);
    }

    let temperature = ctx.temperature.value();
    let length_probability = Workspace::length_description_probability(proposal.members.len(), &ctx.slipnet, temperature);
    let with_length = ctx.rng.coin_flip(length_probability);
    let Some(descriptions) = ctx.workspace.group_descriptions(proposal, with_length) else {
        return fizzle("group member vanished");
    };
    ctx.workspace.add_group(proposal, bond_ids, descriptions, &mut ctx.slipnet)?;
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::tests::context;

    fn bond_all(ctx: &mut TrialContext<'_>, string: StringKind, category: NodeId) {
        let text: Vec<char> = ctx.workspace.string(string).text().chars().collect();
        for i in 0..text.len() - 1 {
            let a = ctx.workspace.letter_at(string, i).unwrap();
            let b = ctx.workspace.letter_at(string, i + 1).unwrap();
            let bond = ctx
                .workspace
                .make_bond(
                    a,
                    b,
                    category,
                    NodeId::LETTER_CATEGORY,
                    NodeId::from_char(text[i]).unwrap(),
                    NodeId::from_char(text[i + 1]).unwrap(),
                )
                .unwrap();
            ctx.workspace.add_bond(bond, &mut ctx.slipnet).unwrap();
        }
    }

    #[test]
    fn test_bonded_run_spans_matching_bonds() {
        let mut ctx = context("abc", "abd", "efg", 2);
        bond_all(&mut ctx, StringKind::Target, NodeId::SUCCESSOR);
        let f = ctx.workspace.letter_at(StringKind::Target, 1).unwrap();
        let (members, bonds, facet) =
            bonded_run(&ctx.workspace, f, NodeId::SUCCESSOR, Some(NodeId::RIGHT)).unwrap();
        assert_eq!(members.len(), 3);
        assert_eq!(bonds.len(), 2);
        assert_eq!(facet, NodeId::LETTER_CATEGORY);
        assert!(bonded_run(&ctx.workspace, f, NodeId::PREDECESSOR, Some(NodeId::LEFT)).is_none());
    }

    #[test]
    fn test_builder_builds_missing_bonds() {
        let mut ctx = context("abc", "abd", "iijj", 4);
        let members: Vec<_> = (0..2).map(|i| ctx.workspace.letter_at(StringKind::Target, i).unwrap()).collect();
        let proposal = GroupProposal {
            string: StringKind::Target,
            group_category: NodeId::SAMENESS_GROUP,
            direction: None,
            facet: NodeId::LETTER_CATEGORY,
            members: members.clone(),
            bonds: Vec::new(),
        };
        builder(&mut ctx, &proposal).unwrap();
        let group = ctx.workspace.object(members[0]).unwrap().group.unwrap();
        let g = ctx.workspace.object(group).unwrap();
        assert!(g.described(NodeId::LEFTMOST));
        assert!(g.described(NodeId::from_char('i').unwrap()));
        assert_eq!(ctx.workspace.bonds_in(StringKind::Target).count(), 1);

        // building it again only refreshes descriptions
        builder(&mut ctx, &proposal).unwrap();
        assert_eq!(ctx.workspace.objects_in(StringKind::Target).filter(|o| o.as_group().is_some()).count(), 1);
    }

    #[test]
    fn test_whole_string_scout_proposes_spanning_group() {
        let mut proposed = false;
        for seed in 0..10 {
            let mut ctx = context("abc", "abd", "efg", seed);
            bond_all(&mut ctx, StringKind::Target, NodeId::SUCCESSOR);
            bond_all(&mut ctx, StringKind::Initial, NodeId::SUCCESSOR);
            for codelet in whole_string_scout(&mut ctx).unwrap() {
                let CodeletKind::GroupStrengthTester { proposal } = codelet.kind else {
                    panic!("unexpected follow-up");
                };
                assert_eq!(proposal.members.len(), 3);
                assert_eq!(proposal.group_category, NodeId::SUCCESSOR_GROUP);
                proposed = true;
            }
        }
        assert!(proposed);
    }
}
