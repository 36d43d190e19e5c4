//! Correspondences between the initial and target strings, and the concept
//! mappings that justify them.

use serde::{Deserialize, Serialize};

use copycat_core::MAX_VALUE;

use crate::slipnet::{ConceptNetwork, NodeId, Slipnet};

use super::bond::BondId;
use super::object::{distinguishing_descriptor, Description};
use super::{structure_strength, ObjectId, Workspace};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrespondenceId(pub u32);

impl CorrespondenceId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One description of an initial object seen as one of a target object,
/// e.g. rightmost -> leftmost (labelled opposite)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConceptMapping {
    pub initial_type: NodeId,
    pub target_type: NodeId,
    pub initial_descriptor: NodeId,
    pub target_descriptor: NodeId,
    pub label: Option<NodeId>,
}

impl ConceptMapping {
    pub fn new(network: &ConceptNetwork, initial: Description, target: Description) -> Self {
        Self {
            initial_type: initial.description_type,
            target_type: target.description_type,
            initial_descriptor: initial.descriptor,
            target_descriptor: target.descriptor,
            label: network.bond_category(initial.descriptor, target.descriptor),
        }
    }

    /// Anything other than "the same thing"
    pub fn is_slippage(&self) -> bool {
        self.label != Some(NodeId::SAMENESS) && self.label != Some(NodeId::IDENTITY)
    }

    pub fn is_distinguishing(&self) -> bool {
        if self.initial_descriptor == NodeId::WHOLE && self.target_descriptor == NodeId::WHOLE {
            return false;
        }
        distinguishing_descriptor(self.initial_descriptor) && distinguishing_descriptor(self.target_descriptor)
    }

    pub fn is_relevant(&self, slipnet: &Slipnet) -> bool {
        slipnet.is_fully_active(self.initial_type) && slipnet.is_fully_active(self.target_type)
    }

    fn degree_of_association(&self, slipnet: &Slipnet) -> f64 {
        MAX_VALUE - slipnet.distance(self.initial_descriptor, self.target_descriptor)
    }

    fn depth(&self, network: &ConceptNetwork) -> f64 {
        (network.depth(self.initial_descriptor) + network.depth(self.target_descriptor)) / 2.0
    }

    /// Deep slippages are harder to make but stronger once made
    pub fn strength(&self, slipnet: &Slipnet) -> f64 {
        let association = self.degree_of_association(slipnet);
        if association == MAX_VALUE {
            return MAX_VALUE;
        }
        let depth = self.depth(slipnet.network()) / 100.0;
        association * (1.0 + depth * depth)
    }

    pub fn slippability(&self, slipnet: &Slipnet) -> f64 {
        let association = self.degree_of_association(slipnet);
        if association == MAX_VALUE {
            return MAX_VALUE;
        }
        let depth = self.depth(slipnet.network()) / 100.0;
        association * (1.0 - depth * depth)
    }

    pub fn same_types(&self, other: &ConceptMapping) -> bool {
        self.initial_type == other.initial_type && self.target_type == other.target_type
    }

    pub fn same_descriptors(&self, other: &ConceptMapping) -> bool {
        self.initial_descriptor == other.initial_descriptor && self.target_descriptor == other.target_descriptor
    }

    fn related(&self, network: &ConceptNetwork, other: &ConceptMapping) -> bool {
        network.related(self.initial_descriptor, other.initial_descriptor)
            || network.related(self.target_descriptor, other.target_descriptor)
    }

    /// Related descriptors mapped by different relations, e.g.
    /// rightmost -> leftmost against right -> right
    pub fn is_incompatible(&self, network: &ConceptNetwork, other: &ConceptMapping) -> bool {
        if !self.related(network, other) {
            return false;
        }
        match (self.label, other.label) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        }
    }

    /// Related descriptors mapped by the same relation, or the same mapping
    pub fn supports(&self, network: &ConceptNetwork, other: &ConceptMapping) -> bool {
        if self.same_descriptors(other) && self.same_types(other) {
            return true;
        }
        if !self.related(network, other) {
            return false;
        }
        match (self.label, other.label) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// The mapping read from target to initial
    pub fn symmetric_version(&self, network: &ConceptNetwork) -> ConceptMapping {
        if !self.is_slippage() {
            return *self;
        }
        if network.bond_category(self.target_descriptor, self.initial_descriptor) == self.label {
            return *self;
        }
        ConceptMapping {
            initial_type: self.target_type,
            target_type: self.initial_type,
            initial_descriptor: self.target_descriptor,
            target_descriptor: self.initial_descriptor,
            label: self.label,
        }
    }

    pub fn is_contained_by(&self, mappings: &[ConceptMapping]) -> bool {
        mappings
            .iter()
            .any(|m| m.same_types(self) && m.same_descriptors(self) && m.label == self.label)
    }

    pub fn is_nearly_contained_by(&self, mappings: &[ConceptMapping]) -> bool {
        mappings.iter().any(|m| m.same_descriptors(self))
    }
}

/// Mappings between every pair of descriptions of the same type whose
/// descriptors are identical or a slippage apart
pub fn concept_mappings(
    network: &ConceptNetwork,
    initial: &[Description],
    target: &[Description],
) -> Vec<ConceptMapping> {
    let mut mappings = Vec::new();
    for i in initial {
        for t in target {
            if i.description_type != t.description_type {
                continue;
            }
            if i.descriptor == t.descriptor || network.is_slip_linked(i.descriptor, t.descriptor) {
                mappings.push(ConceptMapping::new(network, *i, *t));
            }
        }
    }
    mappings
}

/// Replace `node` by the target of the first slippage starting there
pub fn apply_slippages(node: NodeId, slippages: &[ConceptMapping]) -> NodeId {
    slippages
        .iter()
        .find(|m| m.initial_descriptor == node)
        .map(|m| m.target_descriptor)
        .unwrap_or(node)
}

#[derive(Clone, Debug)]
pub struct Correspondence {
    pub initial: ObjectId,
    pub target: ObjectId,
    pub concept_mappings: Vec<ConceptMapping>,
    /// Symmetric versions of slippages and bond-description mappings,
    /// filled in when the correspondence is built
    pub accessory_mappings: Vec<ConceptMapping>,
    pub strength: f64,
}

impl Correspondence {
    pub fn new(initial: ObjectId, target: ObjectId, concept_mappings: Vec<ConceptMapping>) -> Self {
        Self {
            initial,
            target,
            concept_mappings,
            accessory_mappings: Vec::new(),
            strength: 0.0,
        }
    }

    pub fn distinguishing_mappings(&self) -> impl Iterator<Item = &ConceptMapping> {
        self.concept_mappings.iter().filter(|m| m.is_distinguishing())
    }

    pub fn relevant_distinguishing_mappings<'a>(
        &'a self,
        slipnet: &'a Slipnet,
    ) -> impl Iterator<Item = &'a ConceptMapping> + 'a {
        self.distinguishing_mappings().filter(move |m| m.is_relevant(slipnet))
    }

    /// Concept and accessory mappings that are slippages
    pub fn slippages(&self) -> impl Iterator<Item = &ConceptMapping> {
        self.concept_mappings
            .iter()
            .chain(self.accessory_mappings.iter())
            .filter(|m| m.is_slippage())
    }

    /// Same object on either side, or clashing mappings
    pub fn is_incompatible(&self, network: &ConceptNetwork, other: &Correspondence) -> bool {
        if self.initial == other.initial || self.target == other.target {
            return true;
        }
        self.concept_mappings
            .iter()
            .any(|m| other.concept_mappings.iter().any(|o| m.is_incompatible(network, o)))
    }

    fn is_supported_by(&self, network: &ConceptNetwork, other: &Correspondence) -> bool {
        if self.initial == other.initial || self.target == other.target {
            return false;
        }
        if self.is_incompatible(network, other) {
            return false;
        }
        self.distinguishing_mappings()
            .any(|m| other.distinguishing_mappings().any(|o| m.supports(network, o)))
    }
}

impl Workspace {
    pub fn correspondence_strength(&self, correspondence: &Correspondence, slipnet: &Slipnet) -> f64 {
        let internal = self.correspondence_internal_strength(correspondence, slipnet);
        let external = self.correspondence_support(correspondence, slipnet.network());
        structure_strength(internal, external)
    }

    fn correspondence_internal_strength(&self, correspondence: &Correspondence, slipnet: &Slipnet) -> f64 {
        let mappings: Vec<_> = correspondence.relevant_distinguishing_mappings(slipnet).collect();
        if mappings.is_empty() {
            return 0.0;
        }
        let network = slipnet.network();
        let average = mappings.iter().map(|m| m.strength(slipnet)).sum::<f64>() / mappings.len() as f64;
        let count_factor = match mappings.len() {
            1 => 0.8,
            2 => 1.2,
            _ => 1.6,
        };
        let coherent = mappings.iter().enumerate().any(|(i, a)| {
            mappings
                .iter()
                .enumerate()
                .any(|(j, b)| i != j && a.supports(network, b))
        });
        let coherence_factor = if coherent { 2.5 } else { 1.0 };
        (average * coherence_factor * count_factor).min(MAX_VALUE)
    }

    fn correspondence_support(&self, correspondence: &Correspondence, network: &ConceptNetwork) -> f64 {
        for id in [correspondence.initial, correspondence.target] {
            if self.object(id).map_or(false, |o| o.is_letter() && o.spans_string()) {
                return MAX_VALUE;
            }
        }
        let total: f64 = self
            .correspondences()
            .filter(|(_, other)| correspondence.is_supported_by(network, other))
            .map(|(_, other)| other.strength)
            .sum();
        total.min(MAX_VALUE)
    }

    /// The initial object already corresponds to this target object
    pub fn is_reflexive(&self, correspondence: &Correspondence) -> bool {
        self.object(correspondence.initial)
            .and_then(|o| o.correspondence)
            .and_then(|id| self.correspondence(id))
            .map_or(false, |existing| existing.target == correspondence.target)
    }

    pub fn incompatible_correspondences(
        &self,
        correspondence: &Correspondence,
        network: &ConceptNetwork,
    ) -> Vec<CorrespondenceId> {
        self.correspondences()
            .filter(|(_, other)| correspondence.is_incompatible(network, other))
            .map(|(id, _)| id)
            .collect()
    }

    /// A target bond whose direction clashes with the correspondence's
    /// mappings, for correspondences between string edges
    pub fn incompatible_bond_for_correspondence(
        &self,
        correspondence: &Correspondence,
        network: &ConceptNetwork,
    ) -> Option<BondId> {
        let initial = self.object(correspondence.initial)?;
        let target = self.object(correspondence.target)?;
        let initial_bond = if initial.is_leftmost() {
            initial.right_bond
        } else {
            initial.left_bond
        };
        let target_bond_id = if target.is_leftmost() {
            target.right_bond
        } else {
            target.left_bond
        }?;
        let initial_direction = self.bond(initial_bond?)?.direction?;
        let target_direction = self.bond(target_bond_id)?.direction?;
        let mapping = ConceptMapping::new(
            network,
            Description::new(NodeId::DIRECTION_CATEGORY, initial_direction),
            Description::new(NodeId::DIRECTION_CATEGORY, target_direction),
        );
        correspondence
            .concept_mappings
            .iter()
            .any(|m| m.is_incompatible(network, &mapping))
            .then_some(target_bond_id)
    }

    /// Slippages in force: those of the changed object's correspondence,
    /// then any others from initial-string correspondences
    pub fn slippages(&self) -> Vec<ConceptMapping> {
        let mut result: Vec<ConceptMapping> = self
            .changed_object()
            .and_then(|id| self.object(id))
            .and_then(|o| o.correspondence)
            .and_then(|id| self.correspondence(id))
            .map(|c| c.concept_mappings.clone())
            .unwrap_or_default();
        for object in self.objects_in(super::StringKind::Initial) {
            let Some(c) = object.correspondence.and_then(|id| self.correspondence(id)) else {
                continue;
            };
            for m in c.slippages() {
                if !m.is_nearly_contained_by(&result) {
                    result.push(*m);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net() -> &'static ConceptNetwork {
        ConceptNetwork::shared().unwrap()
    }

    fn position(descriptor: NodeId) -> Description {
        Description::new(NodeId::STRING_POSITION_CATEGORY, descriptor)
    }

    #[test]
    fn test_mapping_labels() {
        let same = ConceptMapping::new(net(), position(NodeId::RIGHTMOST), position(NodeId::RIGHTMOST));
        assert_eq!(same.label, Some(NodeId::IDENTITY));
        assert!(!same.is_slippage());
        let flip = ConceptMapping::new(net(), position(NodeId::RIGHTMOST), position(NodeId::LEFTMOST));
        assert_eq!(flip.label, Some(NodeId::OPPOSITE));
        assert!(flip.is_slippage());
    }

    #[test]
    fn test_incompatible_and_supporting() {
        let flip = ConceptMapping::new(net(), position(NodeId::RIGHTMOST), position(NodeId::LEFTMOST));
        let direction = |d| Description::new(NodeId::DIRECTION_CATEGORY, d);
        let right_right = ConceptMapping::new(net(), direction(NodeId::RIGHT), direction(NodeId::RIGHT));
        let right_left = ConceptMapping::new(net(), direction(NodeId::RIGHT), direction(NodeId::LEFT));
        assert!(flip.is_incompatible(net(), &right_right));
        assert!(flip.supports(net(), &right_left));
        assert!(flip.supports(net(), &flip));
    }

    #[test]
    fn test_concept_mappings_only_pair_slippable_descriptors() {
        let initial = [position(NodeId::RIGHTMOST), Description::new(NodeId::OBJECT_CATEGORY, NodeId::LETTER)];
        let target = [
            position(NodeId::LEFTMOST),
            position(NodeId::MIDDLE),
            Description::new(NodeId::OBJECT_CATEGORY, NodeId::GROUP),
        ];
        let mappings = concept_mappings(net(), &initial, &target);
        assert_eq!(mappings.len(), 2);
        assert!(mappings.iter().any(|m| m.target_descriptor == NodeId::GROUP && m.label.is_none()));
    }

    #[test]
    fn test_mapping_strength_follows_distance() {
        let mut slipnet = Slipnet::new(net(), 50);
        let flip = ConceptMapping::new(net(), position(NodeId::RIGHTMOST), position(NodeId::LEFTMOST));
        let same = ConceptMapping::new(net(), position(NodeId::RIGHTMOST), position(NodeId::RIGHTMOST));
        assert_eq!(same.strength(&slipnet), MAX_VALUE);

        // both positions have depth 40
        let priced = |s: &Slipnet| (MAX_VALUE - s.distance(NodeId::RIGHTMOST, NodeId::LEFTMOST)) * 1.16;
        assert!((flip.strength(&slipnet) - priced(&slipnet)).abs() < 1e-9);
        slipnet.set_activation(NodeId::OPPOSITE, MAX_VALUE);
        assert!((flip.strength(&slipnet) - priced(&slipnet)).abs() < 1e-9);
        assert!(flip.slippability(&slipnet) > 0.0);
    }

    #[test]
    fn test_apply_slippages() {
        let flip = ConceptMapping::new(net(), position(NodeId::RIGHTMOST), position(NodeId::LEFTMOST));
        assert_eq!(apply_slippages(NodeId::RIGHTMOST, &[flip]), NodeId::LEFTMOST);
        assert_eq!(apply_slippages(NodeId::SUCCESSOR, &[flip]), NodeId::SUCCESSOR);
    }

    #[test]
    fn test_distinguishing() {
        let whole = ConceptMapping::new(net(), position(NodeId::WHOLE), position(NodeId::WHOLE));
        assert!(!whole.is_distinguishing());
        let letter = Description::new(NodeId::OBJECT_CATEGORY, NodeId::LETTER);
        assert!(!ConceptMapping::new(net(), letter, letter).is_distinguishing());
    }
}
