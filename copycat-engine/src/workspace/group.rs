//! Groups: runs of objects joined by bonds of one category.

use copycat_core::formulas::{temperature_adjusted_probability, weighted_average};
use copycat_core::CopycatResult;

use crate::slipnet::{NodeId, Slipnet};

use super::bond::{Bond, BondId};
use super::object::Description;
use super::{structure_strength, ObjectId, StringKind, Workspace};

/// Group-specific part of a workspace object
#[derive(Clone, Debug)]
pub struct Group {
    /// successorGroup, predecessorGroup or samenessGroup
    pub group_category: NodeId,
    pub direction: Option<NodeId>,
    pub facet: NodeId,
    pub members: Vec<ObjectId>,
    pub bonds: Vec<BondId>,
    /// Descriptions of the bonds inside (facet and bond category)
    pub bond_descriptions: Vec<Description>,
    pub strength: f64,
}

/// A group a scout has found but that has not been built
#[derive(Clone, Debug)]
pub struct GroupProposal {
    pub string: StringKind,
    pub group_category: NodeId,
    pub direction: Option<NodeId>,
    pub facet: NodeId,
    /// Left to right
    pub members: Vec<ObjectId>,
    /// Bonds between consecutive members; may include bonds not yet built
    pub bonds: Vec<Bond>,
}

/// What group strength depends on
#[derive(Clone, Copy, Debug)]
pub struct GroupShape {
    pub string: StringKind,
    pub group_category: NodeId,
    pub direction: Option<NodeId>,
    pub left_index: usize,
    pub right_index: usize,
    pub length: usize,
}

impl Workspace {
    /// Shape of a proposal, or `None` if a member no longer exists
    pub fn proposal_shape(&self, proposal: &GroupProposal) -> Option<GroupShape> {
        let first = self.object(*proposal.members.first()?)?;
        let last = self.object(*proposal.members.last()?)?;
        Some(GroupShape {
            string: proposal.string,
            group_category: proposal.group_category,
            direction: proposal.direction,
            left_index: first.left_index,
            right_index: last.right_index,
            length: proposal.members.len(),
        })
    }

    /// Shape of a built group
    pub fn group_shape(&self, id: ObjectId) -> Option<GroupShape> {
        let object = self.object(id)?;
        let group = object.as_group()?;
        Some(GroupShape {
            string: object.string,
            group_category: group.group_category,
            direction: group.direction,
            left_index: object.left_index,
            right_index: object.right_index,
            length: group.members.len(),
        })
    }

    pub fn group_strength(&self, shape: &GroupShape, slipnet: &Slipnet) -> f64 {
        let bond_category = slipnet
            .network()
            .related_node(shape.group_category, NodeId::BOND_CATEGORY)
            .unwrap_or(NodeId::SAMENESS);
        let association = slipnet.degree_of_association(bond_category);
        let bond_weight = association.max(0.0).powf(0.98);
        let length_factor = match shape.length {
            1 => 5.0,
            2 => 20.0,
            3 => 60.0,
            _ => 90.0,
        };
        let internal = weighted_average(&[
            (association, bond_weight),
            (length_factor, 100.0 - bond_weight),
        ]);

        let spans = shape.left_index == 0 && shape.right_index + 1 == self.string(shape.string).len();
        let external = if spans {
            100.0
        } else {
            self.group_local_support(shape)
        };
        structure_strength(internal, external)
    }

    /// Groups of the same kind elsewhere in the string
    fn local_supporting_groups(&self, shape: &GroupShape) -> usize {
        self.objects_in(shape.string)
            .filter(|o| o.right_index < shape.left_index || o.left_index > shape.right_index)
            .filter_map(|o| o.as_group())
            .filter(|g| g.group_category == shape.group_category && g.direction == shape.direction)
            .count()
    }

    fn group_local_support(&self, shape: &GroupShape) -> f64 {
        let supporters = self.local_supporting_groups(shape) as f64;
        if supporters == 0.0 {
            return 0.0;
        }
        let half_length = self.string(shape.string).len() as f64 / 2.0;
        let density = 100.0 * supporters / half_length;
        let support_factor = 0.6f64.powf(1.0 / supporters.powi(3)).min(1.0);
        100.0 * (density / 100.0).sqrt() * support_factor
    }

    /// Chance that a new group is also described by its length
    pub fn length_description_probability(length: usize, slipnet: &Slipnet, temperature: f64) -> f64 {
        if length > 5 {
            return 0.0;
        }
        let cubed = (length * length * length) as f64;
        let p = 0.5f64.powf(cubed * (100.0 - slipnet.activation_of(NodeId::LENGTH)) / 100.0);
        let value = temperature_adjusted_probability(temperature, p);
        if value < 0.06 {
            0.0
        } else {
            value
        }
    }

    /// A built group covering the same letters the same way
    pub fn equivalent_group(&self, proposal: &GroupProposal) -> Option<ObjectId> {
        let shape = self.proposal_shape(proposal)?;
        self.objects_in(proposal.string)
            .find(|o| {
                o.left_index == shape.left_index
                    && o.right_index == shape.right_index
                    && o.as_group().map_or(false, |g| {
                        g.group_category == proposal.group_category
                            && g.direction == proposal.direction
                            && g.facet == proposal.facet
                    })
            })
            .map(|o| o.id)
    }

    /// Groups the proposal's members already belong to
    pub fn incompatible_groups(&self, proposal: &GroupProposal) -> Vec<ObjectId> {
        let mut found = Vec::new();
        for &member in &proposal.members {
            if let Some(group) = self.object(member).and_then(|o| o.group) {
                if !found.contains(&group) {
                    found.push(group);
                }
            }
        }
        found
    }

    /// Bonds between consecutive members that disagree with the group
    pub fn incompatible_bonds_for_group(&self, proposal: &GroupProposal, bond_category: NodeId) -> Vec<BondId> {
        let mut found = Vec::new();
        for pair in proposal.members.windows(2) {
            let (Some(left), Some(right)) = (self.object(pair[0]), self.object(pair[1])) else {
                continue;
            };
            for id in [left.right_bond, right.left_bond].into_iter().flatten() {
                let Some(bond) = self.bond(id) else { continue };
                let fits = bond.connects(pair[0], pair[1])
                    && bond.category == bond_category
                    && bond.direction == proposal.direction;
                if !fits && !found.contains(&id) {
                    found.push(id);
                }
            }
        }
        found
    }

    /// Restrict `bonds` to ones fitting the category and direction, flipping
    /// those that can be read the other way. `None` if a sameness bond is in
    /// the way.
    pub fn possible_group_bonds(
        &self,
        category: NodeId,
        direction: Option<NodeId>,
        bonds: &[Bond],
    ) -> CopycatResult<Option<Vec<Bond>>> {
        let mut result = Vec::new();
        for bond in bonds {
            if bond.category == category && bond.direction == direction {
                result.push(bond.clone());
                continue;
            }
            if category == NodeId::SAMENESS || bond.category == NodeId::SAMENESS {
                return Ok(None);
            }
            let flipped = self.flipped_bond(bond, category)?;
            if flipped.direction == direction {
                result.push(flipped);
            }
        }
        Ok(Some(result))
    }

    /// Descriptions a newly built group carries
    pub fn group_descriptions(&self, proposal: &GroupProposal, with_length: bool) -> Option<Vec<Description>> {
        let shape = self.proposal_shape(proposal)?;
        let mut descriptions = vec![
            Description::new(NodeId::OBJECT_CATEGORY, NodeId::GROUP),
            Description::new(NodeId::GROUP_CATEGORY, proposal.group_category),
        ];
        match proposal.direction {
            Some(direction) => {
                descriptions.push(Description::new(NodeId::DIRECTION_CATEGORY, direction))
            }
            None => {
                let first = self.object(proposal.members[0])?;
                if let Some(letter) = first.descriptor(proposal.facet) {
                    descriptions.push(Description::new(proposal.facet, letter));
                }
            }
        }
        let last = self.string(proposal.string).len() - 1;
        let position = if shape.left_index == 0 && shape.right_index == last {
            Some(NodeId::WHOLE)
        } else if shape.left_index == 0 {
            Some(NodeId::LEFTMOST)
        } else if shape.right_index == last {
            Some(NodeId::RIGHTMOST)
        } else if self.is_middle(proposal.string, shape.left_index, shape.right_index) {
            Some(NodeId::MIDDLE)
        } else {
            None
        };
        if let Some(position) = position {
            descriptions.push(Description::new(NodeId::STRING_POSITION_CATEGORY, position));
        }
        if with_length {
            if let Some(number) = NodeId::number(proposal.members.len()) {
                descriptions.push(Description::new(NodeId::LENGTH, number));
            }
        }
        Some(descriptions)
    }

    /// Span is flanked by a leftmost object and a rightmost object
    pub fn is_middle(&self, string: StringKind, left_index: usize, right_index: usize) -> bool {
        if left_index == 0 {
            return false;
        }
        let mut left_is_leftmost = false;
        let mut right_is_rightmost = false;
        for o in self.objects_in(string) {
            if o.is_leftmost() && o.right_index + 1 == left_index {
                left_is_leftmost = true;
            }
            if o.is_rightmost() && o.left_index == right_index + 1 {
                right_is_rightmost = true;
            }
        }
        left_is_leftmost && right_is_rightmost
    }
}
