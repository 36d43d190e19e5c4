//! Description scouts, tester and builder.

use copycat_core::CopycatResult;

use crate::slipnet::{LinkKind, NodeId};
use crate::trial::TrialContext;
use crate::workspace::{Description, ObjectId, Salience};

use super::{choose_unmodified_object, fizzle, follow_up, Codelet, CodeletKind};

/// Descriptor's category becomes the description type
fn propose(ctx: &mut TrialContext<'_>, object: ObjectId, descriptor: NodeId) -> CopycatResult<Vec<Codelet>> {
    let network = ctx.slipnet.network();
    let Some(description_type) = network.category_of(descriptor) else {
        return fizzle("descriptor has no category");
    };
    ctx.slipnet.activate(descriptor);
    let urgency = ctx.slipnet.activation_of(description_type);
    let description = Description::new(description_type, descriptor);
    follow_up(ctx, CodeletKind::DescriptionStrengthTester { object, description }, urgency)
}

/// Follow a property link from one of an object's active descriptions
pub(super) fn bottom_up_scout(ctx: &mut TrialContext<'_>) -> CopycatResult<Vec<Codelet>> {
    let Some(object) = choose_unmodified_object(ctx, Salience::Total) else {
        return fizzle("no object");
    };
    let descriptions = ctx.workspace.relevant_descriptions(object, &ctx.slipnet);
    let weights: Vec<f64> = descriptions
        .iter()
        .map(|d| ctx.slipnet.activation_of(d.descriptor))
        .collect();
    let Some(description) = ctx.rng.weighted_choice(&descriptions, &weights).copied() else {
        return fizzle("no relevant description");
    };

    let network = ctx.slipnet.network();
    let mut properties = Vec::new();
    for link in network.links_of(description.descriptor, LinkKind::Property) {
        let association = ctx.slipnet.link_degree_of_association(link);
        let probability = ctx.temperature.adjusted_probability(association / 100.0);
        if ctx.rng.coin_flip(probability) {
            properties.push((link.destination, association));
        }
    }
    let weights: Vec<f64> = properties
        .iter()
        .map(|&(node, association)| association * ctx.slipnet.activation_of(node))
        .collect();
    let Some(&(property, _)) = ctx.rng.weighted_choice(&properties, &weights) else {
        return fizzle("no similar property");
    };
    propose(ctx, object, property)
}

/// Look for an instance of `description_type` that fits an object
pub(super) fn top_down_scout(ctx: &mut TrialContext<'_>, description_type: NodeId) -> CopycatResult<Vec<Codelet>> {
    let Some(id) = choose_unmodified_object(ctx, Salience::Total) else {
        return fizzle("no object");
    };
    let Some(object) = ctx.workspace.object(id) else {
        return fizzle("object vanished");
    };
    let network = ctx.slipnet.network();
    let first_letter = NodeId::letter(0);
    let last_letter = NodeId::letter(25);
    let candidates: Vec<NodeId> = network
        .instances_of(description_type)
        .filter(|&node| match node {
            NodeId::FIRST => first_letter.map_or(false, |a| object.described(a)),
            NodeId::LAST => last_letter.map_or(false, |z| object.described(z)),
            NodeId::MIDDLE => ctx
                .workspace
                .is_middle(object.string, object.left_index, object.right_index),
            n if n.is_number() => object
                .as_group()
                .map_or(false, |g| Some(g.members.len()) == n.as_number()),
            _ => false,
        })
        .collect();
    let weights: Vec<f64> = candidates.iter().map(|&n| ctx.slipnet.activation_of(n)).collect();
    let Some(&descriptor) = ctx.rng.weighted_choice(&candidates, &weights) else {
        return fizzle("no possible description");
    };
    propose(ctx, id, descriptor)
}

pub(super) fn strength_tester(
    ctx: &mut TrialContext<'_>,
    object: ObjectId,
    description: Description,
) -> CopycatResult<Vec<Codelet>> {
    if !ctx.workspace.contains_object(object) {
        return fizzle("described object vanished");
    }
    ctx.slipnet.activate(description.descriptor);
    let strength = ctx.workspace.description_strength(object, description, &ctx.slipnet);
    let probability = ctx.temperature.adjusted_probability(strength / 100.0);
    if !ctx.rng.coin_flip(probability) {
        return fizzle("description too weak");
    }
    follow_up(ctx, CodeletKind::DescriptionBuilder { object, description }, strength)
}

pub(super) fn builder(
    ctx: &mut TrialContext<'_>,
    object: ObjectId,
    description: Description,
) -> CopycatResult<Vec<Codelet>> {
    if !ctx.workspace.contains_object(object) {
        return fizzle("described object vanished");
    }
    // an existing description is only reinforced
    ctx.workspace.add_description(object, description, &mut ctx.slipnet)?;
    Ok(Vec::new())
}
