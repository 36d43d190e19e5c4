//! # Workspace - Copycat's Short-Term Memory
//!
//! Per-trial store of the three strings and every structure built over
//! them. The workspace exclusively owns all objects, bonds and
//! correspondences in flat arenas; everything else refers to them by id.
//!
//! ## Ids and stale references
//!
//! Arena slots are never reused. Breaking a structure empties its slot, so
//! a codelet still holding the id finds nothing there and fizzles. An id
//! past the end of an arena was never handed out by this workspace and is
//! reported as an [`CopycatError::InternalInvariantViolation`].
//!
//! ```text
//!   initial:  a ─succ─▶ b ─succ─▶ c        modified: a b d
//!             │                   │
//!          corr                 corr ◀── rule: replace rightmost letter by successor
//!             │                   │
//!   target:   e ─succ─▶ f ─succ─▶ g
//! ```

mod bond;
mod correspondence;
mod group;
mod object;
mod rule;

pub use bond::{Bond, BondId};
pub use correspondence::{apply_slippages, concept_mappings, ConceptMapping, Correspondence, CorrespondenceId};
pub use group::{Group, GroupProposal, GroupShape};
pub use object::{distinguishing_descriptor, Description, ObjectId, ObjectKind, ObjectValues, Salience, WorkspaceObject};
pub use rule::{replacement_relation, Replacement, Rule, RuleChange};

use serde::{Deserialize, Serialize};
use tracing::debug;

use copycat_core::formulas::weighted_average;
use copycat_core::{CopycatError, CopycatResult, UnhappinessConfig, MAX_VALUE};

use crate::slipnet::{NodeId, Slipnet};

/// Total strength from internal and external strength; the more internally
/// strong a structure is, the less its surroundings matter
pub fn structure_strength(internal: f64, external: f64) -> f64 {
    weighted_average(&[(internal, internal), (external, 100.0 - internal)])
}

/// Weakness derived from total strength
pub fn weakness(strength: f64) -> f64 {
    100.0 - strength.max(0.0).powf(0.95)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StringKind {
    Initial,
    Modified,
    Target,
}

/// One of the three input strings
#[derive(Clone, Debug)]
pub struct WorkspaceString {
    pub kind: StringKind,
    text: String,
    letters: Vec<ObjectId>,
    /// Average intra-string unhappiness of its objects
    pub intra_string_unhappiness: f64,
}

impl WorkspaceString {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.letters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }

    pub fn letters(&self) -> &[ObjectId] {
        &self.letters
    }
}

/// Something `break_structure` can remove
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StructureHandle {
    Bond(BondId),
    Group(ObjectId),
    Correspondence(CorrespondenceId),
    Rule,
}

/// Unhappiness over the initial and target strings, 0 to 100 per category
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Unhappiness {
    /// Share of objects with an open bond slot beside a neighbour
    pub bonds: f64,
    /// Share of objects not in any group
    pub groups: f64,
    /// Share of objects not mapped, directly or through a group
    pub correspondences: f64,
    /// Rule weakness; 100 without a rule
    pub rule: f64,
    /// Bonds and groups
    pub intra_string: f64,
    pub inter_string: f64,
    /// All four categories, by their configured weights
    pub total: f64,
}

#[derive(Clone, Debug)]
pub struct Workspace {
    initial: WorkspaceString,
    modified: WorkspaceString,
    target: WorkspaceString,
    objects: Vec<Option<WorkspaceObject>>,
    bonds: Vec<Option<Bond>>,
    correspondences: Vec<Option<Correspondence>>,
    rule: Option<Rule>,
    rule_strength: f64,
    changed_object: Option<ObjectId>,
    answer: Option<String>,
    unhappiness: Unhappiness,
    /// Bumped on every structural change
    revision: u64,
    /// Bumped whenever a structure is broken
    breaks: u64,
    /// Bumped whenever the rule is set or broken
    rule_revision: u64,
}

impl Workspace {
    /// Lay out the three strings as letters and activate their descriptions
    pub fn new(initial: &str, modified: &str, target: &str, slipnet: &mut Slipnet) -> CopycatResult<Self> {
        let mut ws = Self {
            initial: Self::empty_string(StringKind::Initial),
            modified: Self::empty_string(StringKind::Modified),
            target: Self::empty_string(StringKind::Target),
            objects: Vec::new(),
            bonds: Vec::new(),
            correspondences: Vec::new(),
            rule: None,
            rule_strength: 0.0,
            changed_object: None,
            answer: None,
            unhappiness: Unhappiness::default(),
            revision: 0,
            breaks: 0,
            rule_revision: 0,
        };
        for (kind, text) in [
            (StringKind::Initial, initial),
            (StringKind::Modified, modified),
            (StringKind::Target, target),
        ] {
            ws.add_letters(kind, text, slipnet)?;
        }
        Ok(ws)
    }

    fn empty_string(kind: StringKind) -> WorkspaceString {
        WorkspaceString {
            kind,
            text: String::new(),
            letters: Vec::new(),
            intra_string_unhappiness: 0.0,
        }
    }

    fn add_letters(&mut self, kind: StringKind, text: &str, slipnet: &mut Slipnet) -> CopycatResult<()> {
        if text.is_empty() {
            return Err(CopycatError::invalid_input(format!("{:?} string is empty", kind)));
        }
        let length = text.chars().count();
        let mut letters = Vec::with_capacity(length);
        for (position, c) in text.chars().enumerate() {
            let node = NodeId::from_char(c)
                .ok_or_else(|| CopycatError::invalid_input(format!("'{}' is not a lowercase letter", c)))?;
            let mut descriptions = vec![
                Description::new(NodeId::OBJECT_CATEGORY, NodeId::LETTER),
                Description::new(NodeId::LETTER_CATEGORY, node),
            ];
            let positions = [
                (length == 1, NodeId::SINGLE),
                (position == 0 && length > 1, NodeId::LEFTMOST),
                (position + 1 == length && length > 1, NodeId::RIGHTMOST),
                (length > 2 && (position + 1) * 2 == length + 1, NodeId::MIDDLE),
            ];
            for (applies, descriptor) in positions {
                if applies {
                    descriptions.push(Description::new(NodeId::STRING_POSITION_CATEGORY, descriptor));
                }
            }
            for d in &descriptions {
                slipnet.activate(d.description_type);
                slipnet.activate(d.descriptor);
            }
            let id = ObjectId(self.objects.len() as u32);
            self.objects.push(Some(WorkspaceObject {
                id,
                string: kind,
                left_index: position,
                right_index: position,
                kind: ObjectKind::Letter(c),
                descriptions,
                left_bond: None,
                right_bond: None,
                group: None,
                correspondence: None,
                replacement: None,
                changed: false,
                values: ObjectValues::default(),
                string_length: length,
            }));
            letters.push(id);
        }
        let string = self.string_mut(kind);
        string.text = text.to_string();
        string.letters = letters;
        Ok(())
    }

    // ========================================================================
    // LOOKUP
    // ========================================================================

    pub fn string(&self, kind: StringKind) -> &WorkspaceString {
        match kind {
            StringKind::Initial => &self.initial,
            StringKind::Modified => &self.modified,
            StringKind::Target => &self.target,
        }
    }

    fn string_mut(&mut self, kind: StringKind) -> &mut WorkspaceString {
        match kind {
            StringKind::Initial => &mut self.initial,
            StringKind::Modified => &mut self.modified,
            StringKind::Target => &mut self.target,
        }
    }

    /// Letter at a position of a string
    pub fn letter_at(&self, kind: StringKind, position: usize) -> Option<ObjectId> {
        self.string(kind).letters.get(position).copied()
    }

    /// A live object; `None` if it was broken or never existed
    pub fn object(&self, id: ObjectId) -> Option<&WorkspaceObject> {
        self.objects.get(id.index()).and_then(|o| o.as_ref())
    }

    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.object(id).is_some()
    }

    /// A live object, or an invariant violation
    pub fn require_object(&self, id: ObjectId) -> CopycatResult<&WorkspaceObject> {
        match self.objects.get(id.index()) {
            None => Err(CopycatError::invariant(format!("object {:?} was never in this workspace", id))),
            Some(None) => Err(CopycatError::invariant(format!("object {:?} no longer exists", id))),
            Some(Some(o)) => Ok(o),
        }
    }

    fn object_mut(&mut self, id: ObjectId) -> CopycatResult<&mut WorkspaceObject> {
        match self.objects.get_mut(id.index()) {
            Some(Some(o)) => Ok(o),
            _ => Err(CopycatError::invariant(format!("object {:?} is not live", id))),
        }
    }

    /// Live objects of all strings, letters first
    pub fn objects(&self) -> impl Iterator<Item = &WorkspaceObject> {
        self.objects.iter().flatten()
    }

    /// Live objects of one string
    pub fn objects_in(&self, kind: StringKind) -> impl Iterator<Item = &WorkspaceObject> {
        self.objects().filter(move |o| o.string == kind)
    }

    /// Live objects of the initial and target strings
    pub fn unmodified_objects(&self) -> impl Iterator<Item = &WorkspaceObject> {
        self.objects().filter(|o| o.string != StringKind::Modified)
    }

    pub fn bond(&self, id: BondId) -> Option<&Bond> {
        self.bonds.get(id.index()).and_then(|b| b.as_ref())
    }

    pub fn bonds_in(&self, kind: StringKind) -> impl Iterator<Item = (BondId, &Bond)> {
        self.bonds
            .iter()
            .enumerate()
            .filter_map(move |(i, b)| b.as_ref().filter(|b| b.string == kind).map(|b| (BondId(i as u32), b)))
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.iter().flatten().count()
    }

    pub fn correspondence(&self, id: CorrespondenceId) -> Option<&Correspondence> {
        self.correspondences.get(id.index()).and_then(|c| c.as_ref())
    }

    pub fn correspondences(&self) -> impl Iterator<Item = (CorrespondenceId, &Correspondence)> {
        self.correspondences
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (CorrespondenceId(i as u32), c)))
    }

    /// Correspondence between exactly this pair of objects
    pub fn correspondence_between(&self, initial: ObjectId, target: ObjectId) -> Option<CorrespondenceId> {
        self.correspondences()
            .find(|(_, c)| c.initial == initial && c.target == target)
            .map(|(id, _)| id)
    }

    /// Live breakable structures: bonds, groups and correspondences
    pub fn breakable_structures(&self) -> Vec<StructureHandle> {
        let bonds = self
            .bonds
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_some())
            .map(|(i, _)| StructureHandle::Bond(BondId(i as u32)));
        let groups = self
            .objects()
            .filter(|o| o.as_group().is_some())
            .map(|o| StructureHandle::Group(o.id));
        let correspondences = self
            .correspondences()
            .map(|(id, _)| StructureHandle::Correspondence(id));
        bonds.chain(groups).chain(correspondences).collect()
    }

    /// Current strength of a live bond, group or correspondence
    pub fn structure_strength_of(&self, handle: StructureHandle) -> Option<f64> {
        match handle {
            StructureHandle::Bond(id) => self.bond(id).map(|b| b.strength),
            StructureHandle::Group(id) => self.object(id).and_then(|o| o.as_group()).map(|g| g.strength),
            StructureHandle::Correspondence(id) => self.correspondence(id).map(|c| c.strength),
            StructureHandle::Rule => self.rule.map(|_| self.rule_strength),
        }
    }

    pub fn rule(&self) -> Option<&Rule> {
        self.rule.as_ref()
    }

    /// Strength of the built rule, 0 when there is none
    pub fn current_rule_strength(&self) -> f64 {
        self.rule.map_or(0.0, |_| self.rule_strength)
    }

    pub fn changed_object(&self) -> Option<ObjectId> {
        self.changed_object
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    pub fn set_answer(&mut self, answer: String) {
        self.answer = Some(answer);
    }

    pub fn clear_answer(&mut self) {
        self.answer = None;
    }

    pub fn unhappiness(&self) -> Unhappiness {
        self.unhappiness
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn breaks(&self) -> u64 {
        self.breaks
    }

    pub fn rule_revision(&self) -> u64 {
        self.rule_revision
    }

    /// Descriptions whose type is fully active
    pub fn relevant_descriptions(&self, id: ObjectId, slipnet: &Slipnet) -> Vec<Description> {
        self.object(id)
            .map(|o| {
                o.descriptions
                    .iter()
                    .filter(|d| slipnet.is_fully_active(d.description_type))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    // ========================================================================
    // BUILDING
    // ========================================================================

    /// Attach a description; returns false if the object already had it
    pub fn add_description(
        &mut self,
        id: ObjectId,
        description: Description,
        slipnet: &mut Slipnet,
    ) -> CopycatResult<bool> {
        slipnet.activate(description.description_type);
        slipnet.activate(description.descriptor);
        let object = self.object_mut(id)?;
        if object.described(description.descriptor) {
            return Ok(false);
        }
        object.descriptions.push(description);
        self.revision += 1;
        Ok(true)
    }

    /// Record how an initial-string letter became its modified counterpart
    pub fn set_replacement(&mut self, id: ObjectId, replacement: Replacement) -> CopycatResult<()> {
        let modified = self.require_object(replacement.modified)?;
        if modified.string != StringKind::Modified || !modified.is_letter() {
            return Err(CopycatError::invariant("replacement must point at a modified-string letter"));
        }
        let object = self.object_mut(id)?;
        if object.string != StringKind::Initial || !object.is_letter() {
            return Err(CopycatError::invariant("only initial-string letters are replaced"));
        }
        object.replacement = Some(replacement);
        if replacement.relation != Some(NodeId::SAMENESS) {
            object.changed = true;
            self.changed_object = Some(id);
        }
        self.revision += 1;
        Ok(())
    }

    /// Build a bond. An identical live bond is returned instead of a
    /// duplicate; an occupied slot is a caller bug.
    pub fn add_bond(&mut self, mut bond: Bond, slipnet: &mut Slipnet) -> CopycatResult<BondId> {
        slipnet.activate(bond.category);
        if let Some(direction) = bond.direction {
            slipnet.activate(direction);
        }
        let left = self.require_object(bond.left)?;
        let right = self.require_object(bond.right)?;
        if left.string != right.string || left.right_index + 1 != right.left_index {
            return Err(CopycatError::invariant("bond ends are not neighbours"));
        }
        if let Some(existing) = self.existing_bond(&bond) {
            return Ok(existing);
        }
        if left.right_bond.is_some() || right.left_bond.is_some() {
            return Err(CopycatError::invariant("bond slot already occupied"));
        }
        bond.strength = self.bond_strength(&bond, slipnet);
        let id = BondId(self.bonds.len() as u32);
        let (l, r) = (bond.left, bond.right);
        self.bonds.push(Some(bond));
        self.object_mut(l)?.right_bond = Some(id);
        self.object_mut(r)?.left_bond = Some(id);
        self.revision += 1;
        debug!(?id, "bond built");
        Ok(id)
    }

    /// Build a group from a proposal whose bonds are all built. An
    /// equivalent live group absorbs the descriptions instead.
    pub fn add_group(
        &mut self,
        proposal: &GroupProposal,
        bonds: Vec<BondId>,
        descriptions: Vec<Description>,
        slipnet: &mut Slipnet,
    ) -> CopycatResult<ObjectId> {
        for d in &descriptions {
            slipnet.activate(d.description_type);
            slipnet.activate(d.descriptor);
        }
        if let Some(existing) = self.equivalent_group(proposal) {
            for d in descriptions {
                self.add_description(existing, d, slipnet)?;
            }
            return Ok(existing);
        }
        if proposal.members.len() < 2 {
            return Err(CopycatError::invariant("a group needs at least two members"));
        }
        let bond_category = slipnet
            .network()
            .related_node(proposal.group_category, NodeId::BOND_CATEGORY)
            .ok_or_else(|| CopycatError::invariant("group category has no bond category"))?;
        for &member in &proposal.members {
            let object = self.require_object(member)?;
            if object.string != proposal.string {
                return Err(CopycatError::invariant("group member from another string"));
            }
            if object.group.is_some() {
                return Err(CopycatError::invariant("group member already grouped"));
            }
        }
        for (pair, bond_id) in proposal.members.windows(2).zip(&bonds) {
            let bond = self
                .bond(*bond_id)
                .ok_or_else(|| CopycatError::invariant("group bond is not live"))?;
            if !bond.connects(pair[0], pair[1]) || bond.category != bond_category {
                return Err(CopycatError::invariant("group members are not bonded consistently"));
            }
        }
        if bonds.len() + 1 != proposal.members.len() {
            return Err(CopycatError::invariant("group bond count does not match its members"));
        }

        let shape = self
            .proposal_shape(proposal)
            .ok_or_else(|| CopycatError::invariant("group member vanished"))?;
        let mut bond_descriptions = Vec::new();
        if let Some(first) = bonds.first().and_then(|&id| self.bond(id)) {
            bond_descriptions.push(Description::new(NodeId::BOND_FACET, first.facet));
        }
        bond_descriptions.push(Description::new(NodeId::BOND_CATEGORY, bond_category));

        let id = ObjectId(self.objects.len() as u32);
        let group = Group {
            group_category: proposal.group_category,
            direction: proposal.direction,
            facet: proposal.facet,
            members: proposal.members.clone(),
            bonds,
            bond_descriptions,
            strength: self.group_strength(&shape, slipnet),
        };
        self.objects.push(Some(WorkspaceObject {
            id,
            string: proposal.string,
            left_index: shape.left_index,
            right_index: shape.right_index,
            kind: ObjectKind::Group(group),
            descriptions,
            left_bond: None,
            right_bond: None,
            group: None,
            correspondence: None,
            replacement: None,
            changed: false,
            values: ObjectValues::default(),
            string_length: self.string(proposal.string).len(),
        }));
        for &member in &proposal.members {
            self.object_mut(member)?.group = Some(id);
        }
        self.revision += 1;
        debug!(?id, left = shape.left_index, right = shape.right_index, "group built");
        Ok(id)
    }

    /// Build a correspondence. Proposing an existing pair merges the new
    /// mappings into it; either end's other correspondence is broken.
    pub fn add_correspondence(
        &mut self,
        mut correspondence: Correspondence,
        slipnet: &mut Slipnet,
    ) -> CopycatResult<CorrespondenceId> {
        let network = slipnet.network();
        let initial = self.require_object(correspondence.initial)?;
        let target = self.require_object(correspondence.target)?;
        if initial.string != StringKind::Initial || target.string != StringKind::Target {
            return Err(CopycatError::invariant("correspondence must map initial to target"));
        }
        let both_groups = initial.as_group().zip(target.as_group()).map(|(i, t)| {
            (i.bond_descriptions.clone(), t.bond_descriptions.clone())
        });

        for m in &correspondence.concept_mappings {
            if let Some(label) = m.label {
                slipnet.set_activation(label, MAX_VALUE);
            }
        }

        if let Some(existing) = self.correspondence_between(correspondence.initial, correspondence.target) {
            let mut added = false;
            if let Some(Some(c)) = self.correspondences.get_mut(existing.index()) {
                for m in correspondence.concept_mappings {
                    if !m.is_contained_by(&c.concept_mappings) {
                        c.concept_mappings.push(m);
                        added = true;
                    }
                }
            }
            if added {
                self.revision += 1;
            }
            return Ok(existing);
        }

        for end in [correspondence.initial, correspondence.target] {
            if let Some(old) = self.object(end).and_then(|o| o.correspondence) {
                self.break_structure(StructureHandle::Correspondence(old))?;
            }
        }

        let mut accessory = Vec::new();
        for m in correspondence.relevant_distinguishing_mappings(slipnet) {
            if m.is_slippage() {
                accessory.push(m.symmetric_version(network));
            }
        }
        if let Some((initial_bonds, target_bonds)) = both_groups {
            for m in concept_mappings(network, &initial_bonds, &target_bonds) {
                accessory.push(m);
                if m.is_slippage() {
                    accessory.push(m.symmetric_version(network));
                }
            }
        }
        correspondence.accessory_mappings = accessory;
        correspondence.strength = self.correspondence_strength(&correspondence, slipnet);

        let id = CorrespondenceId(self.correspondences.len() as u32);
        let (i, t) = (correspondence.initial, correspondence.target);
        self.correspondences.push(Some(correspondence));
        self.object_mut(i)?.correspondence = Some(id);
        self.object_mut(t)?.correspondence = Some(id);
        self.revision += 1;
        debug!(?id, "correspondence built");
        Ok(id)
    }

    /// Make `rule` the current rule, replacing any previous one
    pub fn set_rule(&mut self, rule: Rule, slipnet: &mut Slipnet) {
        for concept in rule.concepts() {
            slipnet.activate(concept);
        }
        self.rule_strength = self.rule_strength(&rule, slipnet);
        debug!(rule = %rule.describe(slipnet.network()), "rule built");
        self.rule = Some(rule);
        self.rule_revision += 1;
        self.revision += 1;
    }

    // ========================================================================
    // BREAKING
    // ========================================================================

    /// Remove a structure. Returns false if it was already gone.
    pub fn break_structure(&mut self, handle: StructureHandle) -> CopycatResult<bool> {
        let broken = match handle {
            StructureHandle::Bond(id) => self.break_bond(id)?,
            StructureHandle::Group(id) => self.break_group(id)?,
            StructureHandle::Correspondence(id) => self.break_correspondence(id)?,
            StructureHandle::Rule => {
                self.rule_strength = 0.0;
                self.rule.take().is_some()
            }
        };
        if broken {
            if handle == StructureHandle::Rule {
                self.rule_revision += 1;
            }
            self.breaks += 1;
            self.revision += 1;
            debug!(?handle, "structure broken");
        }
        Ok(broken)
    }

    fn break_bond(&mut self, id: BondId) -> CopycatResult<bool> {
        let slot = self
            .bonds
            .get_mut(id.index())
            .ok_or_else(|| CopycatError::invariant(format!("bond {:?} was never built", id)))?;
        let Some(bond) = slot.take() else {
            return Ok(false);
        };
        if let Ok(left) = self.object_mut(bond.left) {
            if left.right_bond == Some(id) {
                left.right_bond = None;
            }
        }
        if let Ok(right) = self.object_mut(bond.right) {
            if right.left_bond == Some(id) {
                right.left_bond = None;
            }
        }
        Ok(true)
    }

    fn break_group(&mut self, id: ObjectId) -> CopycatResult<bool> {
        let slot = self
            .objects
            .get(id.index())
            .ok_or_else(|| CopycatError::invariant(format!("group {:?} was never built", id)))?;
        match slot {
            None => return Ok(false),
            Some(o) if o.as_group().is_none() => {
                return Err(CopycatError::invariant("letters cannot be broken"));
            }
            Some(_) => {}
        }
        let Some(object) = self.objects[id.index()].take() else {
            return Ok(false);
        };
        if let ObjectKind::Group(group) = &object.kind {
            for &member in &group.members {
                if let Ok(m) = self.object_mut(member) {
                    if m.group == Some(id) {
                        m.group = None;
                    }
                }
            }
        }
        if let Some(parent) = object.group {
            self.break_structure(StructureHandle::Group(parent))?;
        }
        if let Some(c) = object.correspondence {
            self.break_structure(StructureHandle::Correspondence(c))?;
        }
        for b in object.bonds() {
            self.break_structure(StructureHandle::Bond(b))?;
        }
        Ok(true)
    }

    fn break_correspondence(&mut self, id: CorrespondenceId) -> CopycatResult<bool> {
        let slot = self
            .correspondences
            .get_mut(id.index())
            .ok_or_else(|| CopycatError::invariant(format!("correspondence {:?} was never built", id)))?;
        let Some(c) = slot.take() else {
            return Ok(false);
        };
        for end in [c.initial, c.target] {
            if let Ok(o) = self.object_mut(end) {
                if o.correspondence == Some(id) {
                    o.correspondence = None;
                }
            }
        }
        Ok(true)
    }

    // ========================================================================
    // STRENGTHS AND UNHAPPINESS
    // ========================================================================

    /// Description strength: deep descriptors, and descriptions other
    /// objects in the string share
    pub fn description_strength(&self, id: ObjectId, description: Description, slipnet: &Slipnet) -> f64 {
        let internal = slipnet.network().depth(description.descriptor);
        let Some(object) = self.object(id) else {
            return 0.0;
        };
        let described_alike = self
            .objects_in(object.string)
            .filter(|other| other.id != id && !object.is_within(other) && !other.is_within(object))
            .map(|other| {
                other
                    .descriptions
                    .iter()
                    .filter(|d| d.description_type == description.description_type)
                    .count()
            })
            .sum::<usize>();
        let local_support = match described_alike {
            0 => 0.0,
            1 => 20.0,
            2 => 60.0,
            3 => 90.0,
            _ => 100.0,
        };
        let external = (local_support + slipnet.activation_of(description.description_type)) / 2.0;
        structure_strength(internal, external)
    }

    /// Refresh every strength, then object importance, happiness and salience
    pub fn update_everything(&mut self, slipnet: &Slipnet) {
        let bond_strengths: Vec<_> = self
            .bonds
            .iter()
            .map(|b| b.as_ref().map(|b| self.bond_strength(b, slipnet)))
            .collect();
        for (slot, strength) in self.bonds.iter_mut().zip(bond_strengths) {
            if let (Some(b), Some(s)) = (slot.as_mut(), strength) {
                b.strength = s;
            }
        }

        let group_strengths: Vec<_> = self
            .objects
            .iter()
            .map(|o| {
                o.as_ref()
                    .and_then(|o| self.group_shape(o.id))
                    .map(|shape| self.group_strength(&shape, slipnet))
            })
            .collect();
        for (slot, strength) in self.objects.iter_mut().zip(group_strengths) {
            if let (Some(o), Some(s)) = (slot.as_mut(), strength) {
                if let ObjectKind::Group(g) = &mut o.kind {
                    g.strength = s;
                }
            }
        }

        let correspondence_strengths: Vec<_> = self
            .correspondences
            .iter()
            .map(|c| c.as_ref().map(|c| self.correspondence_strength(c, slipnet)))
            .collect();
        for (slot, strength) in self.correspondences.iter_mut().zip(correspondence_strengths) {
            if let (Some(c), Some(s)) = (slot.as_mut(), strength) {
                c.strength = s;
            }
        }

        if let Some(rule) = self.rule {
            self.rule_strength = self.rule_strength(&rule, slipnet);
        }

        let values: Vec<_> = self
            .objects
            .iter()
            .map(|o| o.as_ref().map(|o| self.object_values(o, slipnet)))
            .collect();
        for (slot, v) in self.objects.iter_mut().zip(values) {
            if let (Some(o), Some(v)) = (slot.as_mut(), v) {
                o.values = v;
            }
        }

        for kind in [StringKind::Initial, StringKind::Modified, StringKind::Target] {
            self.update_relative_importance(kind);
        }
        for kind in [StringKind::Initial, StringKind::Target] {
            let (sum, count) = self
                .objects_in(kind)
                .fold((0.0, 0usize), |(s, n), o| (s + o.values.intra_string_unhappiness, n + 1));
            self.string_mut(kind).intra_string_unhappiness = if count == 0 { 0.0 } else { sum / count as f64 };
        }
    }

    fn object_values(&self, object: &WorkspaceObject, slipnet: &Slipnet) -> ObjectValues {
        let mut raw: f64 = object
            .descriptions
            .iter()
            .filter(|d| slipnet.is_fully_active(d.description_type))
            .map(|d| slipnet.activation_of(d.descriptor))
            .sum();
        if object.group.is_some() {
            raw *= 2.0 / 3.0;
        }
        if object.changed {
            raw *= 2.0;
        }

        let intra_happiness = if object.spans_string() {
            100.0
        } else if let Some(group) = object.group.and_then(|g| self.object(g)).and_then(|g| g.as_group()) {
            group.strength
        } else {
            object.bonds().filter_map(|b| self.bond(b)).map(|b| b.strength).sum::<f64>() / 6.0
        };
        let inter_happiness = object
            .correspondence
            .and_then(|c| self.correspondence(c))
            .map_or(0.0, |c| c.strength);

        let relative_importance = object.values.relative_importance;
        let intra_unhappiness = 100.0 - intra_happiness;
        let inter_unhappiness = 100.0 - inter_happiness;
        let intra_salience = weighted_average(&[(relative_importance, 0.2), (intra_unhappiness, 0.8)]);
        let inter_salience = weighted_average(&[(relative_importance, 0.8), (inter_unhappiness, 0.2)]);
        ObjectValues {
            raw_importance: raw,
            relative_importance,
            intra_string_happiness: intra_happiness,
            inter_string_happiness: inter_happiness,
            intra_string_unhappiness: intra_unhappiness,
            intra_string_salience: intra_salience,
            inter_string_salience: inter_salience,
            total_salience: (intra_salience + inter_salience) / 2.0,
        }
    }

    fn update_relative_importance(&mut self, kind: StringKind) {
        let total: f64 = self.objects_in(kind).map(|o| o.values.raw_importance).sum();
        for o in self.objects.iter_mut().flatten().filter(|o| o.string == kind) {
            o.values.relative_importance = if total > 0.0 {
                o.values.raw_importance / total
            } else {
                0.0
            };
        }
    }

    /// Recompute unhappiness from the structures built so far
    pub fn update_unhappiness(&mut self, weights: &UnhappinessConfig) -> Unhappiness {
        let share = |unaddressed: usize, eligible: usize| {
            if eligible == 0 {
                0.0
            } else {
                MAX_VALUE * unaddressed as f64 / eligible as f64
            }
        };
        let partial = self.unmodified_objects().filter(|o| !o.spans_string()).count();
        let all = self.unmodified_objects().count();
        let bonds = share(self.unrelated_objects(), partial);
        let groups = share(self.ungrouped_objects(), partial);
        let correspondences = share(self.unmapped_objects(), all);
        let rule = MAX_VALUE - self.current_rule_strength();
        self.unhappiness = Unhappiness {
            bonds,
            groups,
            correspondences,
            rule,
            intra_string: weighted_average(&[(bonds, weights.bonds), (groups, weights.groups)]),
            inter_string: correspondences,
            total: weighted_average(&[
                (bonds, weights.bonds),
                (groups, weights.groups),
                (correspondences, weights.correspondences),
                (rule, weights.rule),
            ])
            .min(MAX_VALUE),
        };
        self.unhappiness
    }

    // ========================================================================
    // COUNTS
    // ========================================================================

    /// Objects with an open bond slot on a side that has a neighbour
    pub fn unrelated_objects(&self) -> usize {
        self.unmodified_objects()
            .filter(|o| !o.spans_string())
            .filter(|o| (o.left_bond.is_none() && !o.is_leftmost()) || (o.right_bond.is_none() && !o.is_rightmost()))
            .count()
    }

    pub fn ungrouped_objects(&self) -> usize {
        self.unmodified_objects()
            .filter(|o| !o.spans_string() && o.group.is_none())
            .count()
    }

    pub fn unreplaced_letters(&self) -> usize {
        self.objects_in(StringKind::Initial)
            .filter(|o| o.is_letter() && o.replacement.is_none())
            .count()
    }

    pub fn uncorresponding_objects(&self) -> usize {
        self.unmodified_objects().filter(|o| o.correspondence.is_none()).count()
    }

    /// Objects without a correspondence of their own or of an enclosing group
    pub fn unmapped_objects(&self) -> usize {
        self.unmodified_objects().filter(|o| !self.is_mapped(o)).count()
    }

    fn is_mapped(&self, object: &WorkspaceObject) -> bool {
        let mut current = Some(object);
        while let Some(o) = current {
            if o.correspondence.is_some() {
                return true;
            }
            current = o.group.and_then(|g| self.object(g));
        }
        false
    }

    /// Share of initial and target objects that have a correspondence
    pub fn explained_fraction(&self) -> f64 {
        let (explained, total) = self
            .unmodified_objects()
            .fold((0usize, 0usize), |(e, t), o| (e + o.correspondence.is_some() as usize, t + 1));
        if total == 0 {
            0.0
        } else {
            explained as f64 / total as f64
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::slipnet::ConceptNetwork;

    pub(crate) fn workspace(initial: &str, modified: &str, target: &str) -> (Workspace, Slipnet) {
        let mut slipnet = Slipnet::new(ConceptNetwork::shared().unwrap(), 50);
        let ws = Workspace::new(initial, modified, target, &mut slipnet).unwrap();
        (ws, slipnet)
    }

    fn successor_bond(ws: &Workspace, kind: StringKind, from: usize) -> Bond {
        let a = ws.letter_at(kind, from).unwrap();
        let b = ws.letter_at(kind, from + 1).unwrap();
        let text = ws.string(kind).text().as_bytes();
        ws.make_bond(
            a,
            b,
            NodeId::SUCCESSOR,
            NodeId::LETTER_CATEGORY,
            NodeId::from_char(text[from] as char).unwrap(),
            NodeId::from_char(text[from + 1] as char).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_letters_and_descriptions() {
        let (ws, _) = workspace("abc", "abd", "ijkk");
        assert_eq!(ws.string(StringKind::Target).len(), 4);
        let b = ws.object(ws.letter_at(StringKind::Initial, 1).unwrap()).unwrap();
        assert!(b.described(NodeId::MIDDLE));
        let k = ws.object(ws.letter_at(StringKind::Target, 3).unwrap()).unwrap();
        assert!(k.described(NodeId::RIGHTMOST));
        assert!(!ws
            .objects_in(StringKind::Target)
            .any(|o| o.described(NodeId::MIDDLE)));
    }

    #[test]
    fn test_invalid_strings() {
        let mut slipnet = Slipnet::new(ConceptNetwork::shared().unwrap(), 50);
        assert!(matches!(
            Workspace::new("abc", "abd", "", &mut slipnet),
            Err(CopycatError::InvalidInput(_))
        ));
        assert!(matches!(
            Workspace::new("ab1", "abd", "xyz", &mut slipnet),
            Err(CopycatError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_add_bond_is_idempotent() {
        let (mut ws, mut slipnet) = workspace("abc", "abd", "efg");
        let bond = successor_bond(&ws, StringKind::Target, 0);
        let first = ws.add_bond(bond.clone(), &mut slipnet).unwrap();
        let second = ws.add_bond(bond, &mut slipnet).unwrap();
        assert_eq!(first, second);
        assert_eq!(ws.bond_count(), 1);
    }

    #[test]
    fn test_occupied_slot_is_a_defect() {
        let (mut ws, mut slipnet) = workspace("abc", "abd", "efg");
        let ef = successor_bond(&ws, StringKind::Target, 0);
        ws.add_bond(ef, &mut slipnet).unwrap();
        let e = ws.letter_at(StringKind::Target, 0).unwrap();
        let f = ws.letter_at(StringKind::Target, 1).unwrap();
        let clash = ws
            .make_bond(f, e, NodeId::PREDECESSOR, NodeId::LETTER_CATEGORY, NodeId::LETTER, NodeId::LETTER)
            .unwrap();
        assert!(ws.add_bond(clash, &mut slipnet).unwrap_err().is_defect());
    }

    #[test]
    fn test_break_bond_frees_slots() {
        let (mut ws, mut slipnet) = workspace("abc", "abd", "efg");
        let ef = successor_bond(&ws, StringKind::Target, 0);
        let id = ws.add_bond(ef, &mut slipnet).unwrap();
        assert!(ws.break_structure(StructureHandle::Bond(id)).unwrap());
        assert!(!ws.break_structure(StructureHandle::Bond(id)).unwrap());
        let e = ws.object(ws.letter_at(StringKind::Target, 0).unwrap()).unwrap();
        assert!(e.right_bond.is_none());
        assert_eq!(ws.breaks(), 1);
        assert!(ws.break_structure(StructureHandle::Bond(BondId(99))).unwrap_err().is_defect());
    }

    fn build_successor_group(ws: &mut Workspace, slipnet: &mut Slipnet) -> ObjectId {
        let ef = successor_bond(ws, StringKind::Target, 0);
        let fg = successor_bond(ws, StringKind::Target, 1);
        let b0 = ws.add_bond(ef, slipnet).unwrap();
        let b1 = ws.add_bond(fg, slipnet).unwrap();
        let members: Vec<_> = (0..3).map(|i| ws.letter_at(StringKind::Target, i).unwrap()).collect();
        let proposal = GroupProposal {
            string: StringKind::Target,
            group_category: NodeId::SUCCESSOR_GROUP,
            direction: Some(NodeId::RIGHT),
            facet: NodeId::LETTER_CATEGORY,
            members,
            bonds: Vec::new(),
        };
        let descriptions = ws.group_descriptions(&proposal, false).unwrap();
        ws.add_group(&proposal, vec![b0, b1], descriptions, slipnet).unwrap()
    }

    #[test]
    fn test_group_break_keeps_member_bonds() {
        let (mut ws, mut slipnet) = workspace("abc", "abd", "efg");
        let group = build_successor_group(&mut ws, &mut slipnet);
        let g = ws.object(group).unwrap();
        assert!(g.spans_string());
        assert!(g.described(NodeId::WHOLE));
        assert_eq!(ws.bond_count(), 2);

        ws.break_structure(StructureHandle::Group(group)).unwrap();
        assert!(ws.object(group).is_none());
        assert_eq!(ws.bond_count(), 2);
        assert!(ws.objects_in(StringKind::Target).all(|o| o.group.is_none()));
    }

    #[test]
    fn test_group_requires_consistent_bonds() {
        let (mut ws, mut slipnet) = workspace("abc", "abd", "efg");
        let ef = successor_bond(&ws, StringKind::Target, 0);
        let b0 = ws.add_bond(ef, &mut slipnet).unwrap();
        let members: Vec<_> = (0..3).map(|i| ws.letter_at(StringKind::Target, i).unwrap()).collect();
        let proposal = GroupProposal {
            string: StringKind::Target,
            group_category: NodeId::SUCCESSOR_GROUP,
            direction: Some(NodeId::RIGHT),
            facet: NodeId::LETTER_CATEGORY,
            members,
            bonds: Vec::new(),
        };
        let err = ws.add_group(&proposal, vec![b0], Vec::new(), &mut slipnet).unwrap_err();
        assert!(err.is_defect());
    }

    #[test]
    fn test_group_needs_two_members() {
        let (mut ws, mut slipnet) = workspace("abc", "abd", "ijkk");
        let k = ws.letter_at(StringKind::Target, 3).unwrap();
        let proposal = GroupProposal {
            string: StringKind::Target,
            group_category: NodeId::SAMENESS_GROUP,
            direction: None,
            facet: NodeId::LETTER_CATEGORY,
            members: vec![k],
            bonds: Vec::new(),
        };
        let err = ws.add_group(&proposal, Vec::new(), Vec::new(), &mut slipnet).unwrap_err();
        assert!(err.is_defect());
        assert!(ws.object(k).unwrap().group.is_none());
    }

    #[test]
    fn test_correspondence_dedup() {
        let (mut ws, mut slipnet) = workspace("abc", "abd", "efg");
        let c = ws.letter_at(StringKind::Initial, 2).unwrap();
        let g = ws.letter_at(StringKind::Target, 2).unwrap();
        let network = slipnet.network();
        let rightmost = Description::new(NodeId::STRING_POSITION_CATEGORY, NodeId::RIGHTMOST);
        let letter = Description::new(NodeId::OBJECT_CATEGORY, NodeId::LETTER);
        let first = ws
            .add_correspondence(
                Correspondence::new(c, g, vec![ConceptMapping::new(network, rightmost, rightmost)]),
                &mut slipnet,
            )
            .unwrap();
        let second = ws
            .add_correspondence(
                Correspondence::new(c, g, vec![ConceptMapping::new(network, letter, letter)]),
                &mut slipnet,
            )
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(ws.correspondences().count(), 1);
        assert_eq!(ws.correspondence(first).unwrap().concept_mappings.len(), 2);
    }

    #[test]
    fn test_new_correspondence_replaces_old_one() {
        let (mut ws, mut slipnet) = workspace("abc", "abd", "efg");
        let c = ws.letter_at(StringKind::Initial, 2).unwrap();
        let g = ws.letter_at(StringKind::Target, 2).unwrap();
        let f = ws.letter_at(StringKind::Target, 1).unwrap();
        let first = ws.add_correspondence(Correspondence::new(c, g, Vec::new()), &mut slipnet).unwrap();
        ws.add_correspondence(Correspondence::new(c, f, Vec::new()), &mut slipnet).unwrap();
        assert!(ws.correspondence(first).is_none());
        assert!(ws.object(g).unwrap().correspondence.is_none());
        assert_eq!(ws.correspondences().count(), 1);
    }

    #[test]
    fn test_replacement_marks_change() {
        let (mut ws, _) = workspace("abc", "abd", "efg");
        let c = ws.letter_at(StringKind::Initial, 2).unwrap();
        let d = ws.letter_at(StringKind::Modified, 2).unwrap();
        ws.set_replacement(
            c,
            Replacement {
                modified: d,
                relation: replacement_relation('c', 'd'),
            },
        )
        .unwrap();
        assert_eq!(ws.changed_object(), Some(c));
        assert_eq!(ws.unreplaced_letters(), 2);
        assert!(ws
            .set_replacement(d, Replacement { modified: c, relation: None })
            .unwrap_err()
            .is_defect());
    }

    #[test]
    fn test_unhappiness_drops_with_structure() {
        let (mut ws, mut slipnet) = workspace("abc", "abd", "efg");
        let weights = UnhappinessConfig::default();
        let before = ws.update_unhappiness(&weights);
        assert_eq!(before.bonds, 100.0);
        assert_eq!(before.groups, 100.0);
        assert_eq!(before.correspondences, 100.0);
        assert_eq!(before.total, 100.0);

        build_successor_group(&mut ws, &mut slipnet);
        let after = ws.update_unhappiness(&weights);
        // efg is bonded and grouped, abc is neither
        assert_eq!(after.bonds, 50.0);
        assert_eq!(after.groups, 50.0);
        assert!(after.intra_string < before.intra_string);
        assert!(after.total < before.total);
    }

    #[test]
    fn test_group_correspondence_maps_its_members() {
        let (mut ws, mut slipnet) = workspace("abc", "abd", "efg");
        let weights = UnhappinessConfig::default();
        let efg = build_successor_group(&mut ws, &mut slipnet);
        let a = ws.letter_at(StringKind::Initial, 0).unwrap();
        let c = ws.letter_at(StringKind::Initial, 2).unwrap();
        let ab = successor_bond(&ws, StringKind::Initial, 0);
        let bc = successor_bond(&ws, StringKind::Initial, 1);
        let b0 = ws.add_bond(ab, &mut slipnet).unwrap();
        let b1 = ws.add_bond(bc, &mut slipnet).unwrap();
        let proposal = GroupProposal {
            string: StringKind::Initial,
            group_category: NodeId::SUCCESSOR_GROUP,
            direction: Some(NodeId::RIGHT),
            facet: NodeId::LETTER_CATEGORY,
            members: vec![a, ws.letter_at(StringKind::Initial, 1).unwrap(), c],
            bonds: Vec::new(),
        };
        let descriptions = ws.group_descriptions(&proposal, false).unwrap();
        let abc = ws.add_group(&proposal, vec![b0, b1], descriptions, &mut slipnet).unwrap();
        assert_eq!(ws.update_unhappiness(&weights).correspondences, 100.0);

        let whole = Description::new(NodeId::STRING_POSITION_CATEGORY, NodeId::WHOLE);
        let group = Description::new(NodeId::OBJECT_CATEGORY, NodeId::GROUP);
        let mappings = concept_mappings(slipnet.network(), &[whole, group], &[whole, group]);
        ws.add_correspondence(Correspondence::new(abc, efg, mappings), &mut slipnet)
            .unwrap();
        let u = ws.update_unhappiness(&weights);
        assert_eq!(u.correspondences, 0.0);
        assert_eq!(u.bonds, 0.0);
        assert_eq!(u.groups, 0.0);
        // only the missing rule is left
        assert_eq!(u.total, 25.0);
        assert_eq!(ws.uncorresponding_objects(), 6);
    }

    #[test]
    fn test_counts() {
        let (ws, _) = workspace("abc", "abd", "efg");
        assert_eq!(ws.unrelated_objects(), 6);
        assert_eq!(ws.ungrouped_objects(), 6);
        assert_eq!(ws.uncorresponding_objects(), 6);
        assert_eq!(ws.unreplaced_letters(), 3);
        assert_eq!(ws.explained_fraction(), 0.0);
    }

    #[test]
    fn test_structure_strength() {
        assert_eq!(structure_strength(100.0, 0.0), 100.0);
        assert_eq!(structure_strength(0.0, 40.0), 40.0);
        assert!(weakness(100.0) < 25.0);
        assert_eq!(weakness(0.0), 100.0);
    }
}
