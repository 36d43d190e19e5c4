//! Bonds between adjacent objects of one string.

use serde::{Deserialize, Serialize};

use copycat_core::{CopycatError, CopycatResult, MAX_VALUE};

use crate::slipnet::{NodeId, Slipnet};

use super::{structure_strength, CorrespondenceId, ObjectId, StringKind, Workspace};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BondId(pub u32);

impl BondId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A relation such as "b is the successor of a" between neighbours
#[derive(Clone, Debug)]
pub struct Bond {
    pub string: StringKind,
    pub source: ObjectId,
    pub destination: ObjectId,
    pub left: ObjectId,
    pub right: ObjectId,
    /// successor, predecessor or sameness
    pub category: NodeId,
    /// letterCategory or length
    pub facet: NodeId,
    pub source_descriptor: NodeId,
    pub destination_descriptor: NodeId,
    /// left or right; none for sameness
    pub direction: Option<NodeId>,
    pub strength: f64,
}

impl Bond {
    pub fn same_neighbours(&self, other: &Bond) -> bool {
        self.left == other.left && self.right == other.right
    }

    pub fn same_categories(&self, other: &Bond) -> bool {
        self.category == other.category && self.direction == other.direction
    }

    /// Joins exactly these two objects, in either order
    pub fn connects(&self, a: ObjectId, b: ObjectId) -> bool {
        (self.left == a && self.right == b) || (self.left == b && self.right == a)
    }
}

impl Workspace {
    /// Assemble a bond from `source` to `destination`, working out which end
    /// is on the left and the bond's direction
    pub fn make_bond(
        &self,
        source: ObjectId,
        destination: ObjectId,
        category: NodeId,
        facet: NodeId,
        source_descriptor: NodeId,
        destination_descriptor: NodeId,
    ) -> CopycatResult<Bond> {
        let s = self.require_object(source)?;
        let d = self.require_object(destination)?;
        if s.string != d.string {
            return Err(CopycatError::invariant("bond ends lie in different strings"));
        }
        let source_on_right = s.left_index > d.right_index;
        let (left, right) = if source_on_right {
            (destination, source)
        } else {
            (source, destination)
        };
        let direction = if category == NodeId::SAMENESS {
            None
        } else if source_on_right {
            Some(NodeId::LEFT)
        } else {
            Some(NodeId::RIGHT)
        };
        Ok(Bond {
            string: s.string,
            source,
            destination,
            left,
            right,
            category,
            facet,
            source_descriptor,
            destination_descriptor,
            direction,
            strength: 0.0,
        })
    }

    /// The same bond read the other way round, labelled `category`
    pub fn flipped_bond(&self, bond: &Bond, category: NodeId) -> CopycatResult<Bond> {
        self.make_bond(
            bond.destination,
            bond.source,
            category,
            bond.facet,
            bond.destination_descriptor,
            bond.source_descriptor,
        )
    }

    /// A live bond with the same ends and categories
    pub fn existing_bond(&self, bond: &Bond) -> Option<BondId> {
        self.bonds_in(bond.string)
            .find(|(_, b)| b.same_neighbours(bond) && b.same_categories(bond))
            .map(|(id, _)| id)
    }

    pub fn bond_strength(&self, bond: &Bond, slipnet: &Slipnet) -> f64 {
        let internal = self.bond_internal_strength(bond, slipnet);
        let external = self.bond_external_strength(bond);
        structure_strength(internal, external)
    }

    fn bond_internal_strength(&self, bond: &Bond, slipnet: &Slipnet) -> f64 {
        let spans_letters = |id: ObjectId| {
            self.object(id)
                .map(|o| o.left_index != o.right_index)
                .unwrap_or(false)
        };
        // letter-letter and group-group bonds beat mixed ones
        let member_compatibility = if spans_letters(bond.source) == spans_letters(bond.destination) {
            1.0
        } else {
            0.7
        };
        let facet_factor = if bond.facet == NodeId::LETTER_CATEGORY {
            1.0
        } else {
            0.7
        };
        (member_compatibility * facet_factor * slipnet.bond_degree_of_association(bond.category))
            .min(MAX_VALUE)
    }

    fn bond_external_strength(&self, bond: &Bond) -> f64 {
        if self.local_supporting_bonds(bond) == 0 {
            return 0.0;
        }
        (self.local_bond_density(bond) / 100.0).sqrt() * 100.0
    }

    /// Bonds elsewhere in the string with the same category and direction
    fn local_supporting_bonds(&self, bond: &Bond) -> usize {
        let (Some(left), Some(right)) = (self.object(bond.left), self.object(bond.right)) else {
            return 0;
        };
        self.bonds_in(bond.string)
            .filter(|(_, other)| {
                let (Some(ol), Some(or)) = (self.object(other.left), self.object(other.right)) else {
                    return false;
                };
                left.letter_distance(ol) != 0
                    && right.letter_distance(or) != 0
                    && bond.same_categories(other)
            })
            .count()
    }

    /// Share of neighbouring slots in the string filled by a bond like this one
    fn local_bond_density(&self, bond: &Bond) -> f64 {
        let objects: Vec<_> = self.objects_in(bond.string).collect();
        let mut slots = 0.0;
        let mut support = 0.0;
        for a in &objects {
            for b in &objects {
                if !a.is_beside(b) {
                    continue;
                }
                slots += 1.0;
                support += self
                    .bonds_in(bond.string)
                    .filter(|(_, other)| {
                        !other.same_neighbours(bond)
                            && bond.same_categories(other)
                            && other.connects(a.id, b.id)
                    })
                    .count() as f64;
            }
        }
        if slots == 0.0 {
            0.0
        } else {
            100.0 * support / slots
        }
    }

    /// Bonds already sitting in the slots this bond wants
    pub fn incompatible_bonds(&self, bond: &Bond) -> Vec<BondId> {
        let mut found = Vec::new();
        let occupants = [
            self.object(bond.left).and_then(|o| o.right_bond),
            self.object(bond.right).and_then(|o| o.left_bond),
        ];
        for id in occupants.into_iter().flatten() {
            if !found.contains(&id) {
                found.push(id);
            }
        }
        found
    }

    /// Groups containing both ends of the bond
    pub fn common_groups(&self, a: ObjectId, b: ObjectId) -> Vec<ObjectId> {
        let (Some(a), Some(b)) = (self.object(a), self.object(b)) else {
            return Vec::new();
        };
        self.objects_in(a.string)
            .filter(|g| g.as_group().is_some() && a.is_within(g) && b.is_within(g))
            .map(|g| g.id)
            .collect()
    }

    /// Edge correspondences whose partner bond points the other way
    pub fn incompatible_correspondences_for_bond(&self, bond: &Bond) -> Vec<CorrespondenceId> {
        let mut found = Vec::new();
        let (Some(left), Some(right)) = (self.object(bond.left), self.object(bond.right)) else {
            return found;
        };
        let ends = [(left, true), (right, false)];
        for (end, at_left) in ends {
            let at_edge = if at_left { end.is_leftmost() } else { end.is_rightmost() };
            let Some(cid) = end.correspondence.filter(|_| at_edge) else {
                continue;
            };
            let Some(correspondence) = self.correspondence(cid) else {
                continue;
            };
            let partner = if bond.string == StringKind::Initial {
                correspondence.target
            } else {
                correspondence.initial
            };
            let Some(partner) = self.object(partner) else {
                continue;
            };
            let (partner_at_edge, partner_bond) = if at_left {
                (partner.is_leftmost(), partner.right_bond)
            } else {
                (partner.is_rightmost(), partner.left_bond)
            };
            if !partner_at_edge {
                continue;
            }
            let clashes = partner_bond
                .and_then(|id| self.bond(id))
                .and_then(|b| b.direction)
                .map(|d| Some(d) != bond.direction)
                .unwrap_or(false);
            if clashes && !found.contains(&cid) {
                found.push(cid);
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::tests::workspace;

    #[test]
    fn test_make_bond_direction() {
        let (ws, _) = workspace("abc", "abd", "efg");
        let e = ws.letter_at(StringKind::Target, 0).unwrap();
        let f = ws.letter_at(StringKind::Target, 1).unwrap();
        let ed = NodeId::from_char('e').unwrap();
        let fd = NodeId::from_char('f').unwrap();
        let right = ws
            .make_bond(e, f, NodeId::SUCCESSOR, NodeId::LETTER_CATEGORY, ed, fd)
            .unwrap();
        assert_eq!(right.direction, Some(NodeId::RIGHT));
        assert_eq!((right.left, right.right), (e, f));

        let left = ws
            .make_bond(f, e, NodeId::PREDECESSOR, NodeId::LETTER_CATEGORY, fd, ed)
            .unwrap();
        assert_eq!(left.direction, Some(NodeId::LEFT));
        assert_eq!((left.left, left.right), (e, f));

        let same = ws
            .make_bond(f, e, NodeId::SAMENESS, NodeId::LETTER_CATEGORY, fd, fd)
            .unwrap();
        assert_eq!(same.direction, None);
    }

    #[test]
    fn test_cross_string_bond_rejected() {
        let (ws, _) = workspace("abc", "abd", "efg");
        let a = ws.letter_at(StringKind::Initial, 2).unwrap();
        let e = ws.letter_at(StringKind::Target, 0).unwrap();
        let err = ws
            .make_bond(a, e, NodeId::SAMENESS, NodeId::LETTER_CATEGORY, NodeId::LETTER, NodeId::LETTER)
            .unwrap_err();
        assert!(err.is_defect());
    }

    #[test]
    fn test_supported_bond_is_stronger() {
        let (mut ws, mut slipnet) = workspace("abc", "abd", "efg");
        let ids: Vec<_> = (0..3).map(|i| ws.letter_at(StringKind::Target, i).unwrap()).collect();
        let d = |c| NodeId::from_char(c).unwrap();
        let ef = ws
            .make_bond(ids[0], ids[1], NodeId::SUCCESSOR, NodeId::LETTER_CATEGORY, d('e'), d('f'))
            .unwrap();
        let fg = ws
            .make_bond(ids[1], ids[2], NodeId::SUCCESSOR, NodeId::LETTER_CATEGORY, d('f'), d('g'))
            .unwrap();
        let alone = ws.bond_strength(&fg, &slipnet);
        ws.add_bond(ef, &mut slipnet).unwrap();
        let supported = ws.bond_strength(&fg, &slipnet);
        assert!(supported > alone, "{} <= {}", supported, alone);
    }
}
