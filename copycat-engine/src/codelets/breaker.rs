//! The breaker: knocks down a random structure, more often when hot.

use copycat_core::{CopycatResult, MAX_VALUE};

use crate::trial::TrialContext;
use crate::workspace::StructureHandle;

use super::{break_all, fizzle, Codelet};

pub(super) fn breaker(ctx: &mut TrialContext<'_>) -> CopycatResult<Vec<Codelet>> {
    let fizzle_probability = (MAX_VALUE - ctx.temperature.value()) / MAX_VALUE;
    if ctx.rng.coin_flip(fizzle_probability) {
        return fizzle("too cold to break anything");
    }
    let structures = ctx.workspace.breakable_structures();
    let Some(&chosen) = ctx.rng.choice(&structures) else {
        return fizzle("nothing to break");
    };
    let mut targets = vec![chosen];
    // a bond inside a group takes the group down with it
    if let StructureHandle::Bond(id) = chosen {
        let enclosing = ctx.workspace.bond(id).and_then(|b| {
            let source = ctx.workspace.object(b.source)?.group?;
            let destination = ctx.workspace.object(b.destination)?.group?;
            (source == destination).then_some(source)
        });
        targets.extend(enclosing.map(StructureHandle::Group));
    }
    for &target in &targets {
        let strength = ctx.workspace.structure_strength_of(target).unwrap_or(0.0);
        let probability = ctx.temperature.adjusted_probability(strength / 100.0);
        if ctx.rng.coin_flip(probability) {
            return fizzle("structure held");
        }
    }
    break_all(ctx, &targets)?;
    Ok(Vec::new())
}
