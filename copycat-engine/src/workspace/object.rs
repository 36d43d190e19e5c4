//! Workspace objects: letters and the groups built over them.

use serde::{Deserialize, Serialize};

use crate::slipnet::NodeId;

use super::group::Group;
use super::rule::Replacement;
use super::{BondId, CorrespondenceId, StringKind};

/// Index of a letter or group in the workspace arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl ObjectId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A (description type, descriptor) pair such as (stringPositionCategory, rightmost)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Description {
    pub description_type: NodeId,
    pub descriptor: NodeId,
}

impl Description {
    pub fn new(description_type: NodeId, descriptor: NodeId) -> Self {
        Self {
            description_type,
            descriptor,
        }
    }
}

#[derive(Clone, Debug)]
pub enum ObjectKind {
    Letter(char),
    Group(Group),
}

/// Importance, happiness and salience, refreshed on every global update
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectValues {
    pub raw_importance: f64,
    /// Share of its string's raw importance, 0..=1
    pub relative_importance: f64,
    pub intra_string_happiness: f64,
    pub inter_string_happiness: f64,
    pub intra_string_unhappiness: f64,
    pub intra_string_salience: f64,
    pub inter_string_salience: f64,
    pub total_salience: f64,
}

/// Which salience a scout weighs objects by
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Salience {
    IntraString,
    InterString,
    Total,
    RelativeImportance,
}

#[derive(Clone, Debug)]
pub struct WorkspaceObject {
    pub id: ObjectId,
    pub string: StringKind,
    /// First letter position covered (0-based)
    pub left_index: usize,
    /// Last letter position covered
    pub right_index: usize,
    pub kind: ObjectKind,
    pub descriptions: Vec<Description>,
    pub left_bond: Option<BondId>,
    pub right_bond: Option<BondId>,
    pub group: Option<ObjectId>,
    pub correspondence: Option<CorrespondenceId>,
    pub replacement: Option<Replacement>,
    pub changed: bool,
    pub values: ObjectValues,
    pub(crate) string_length: usize,
}

impl WorkspaceObject {
    pub fn is_letter(&self) -> bool {
        matches!(self.kind, ObjectKind::Letter(_))
    }

    pub fn as_group(&self) -> Option<&Group> {
        match &self.kind {
            ObjectKind::Group(g) => Some(g),
            ObjectKind::Letter(_) => None,
        }
    }

    pub fn is_leftmost(&self) -> bool {
        self.left_index == 0
    }

    pub fn is_rightmost(&self) -> bool {
        self.right_index + 1 == self.string_length
    }

    pub fn spans_string(&self) -> bool {
        self.is_leftmost() && self.is_rightmost()
    }

    /// Number of letters covered
    pub fn letter_span(&self) -> usize {
        self.right_index - self.left_index + 1
    }

    /// Covered entirely by `other`
    pub fn is_within(&self, other: &WorkspaceObject) -> bool {
        self.string == other.string
            && self.left_index >= other.left_index
            && self.right_index <= other.right_index
    }

    /// Adjacent in the same string without overlapping
    pub fn is_beside(&self, other: &WorkspaceObject) -> bool {
        self.string == other.string
            && (other.left_index == self.right_index + 1 || self.left_index == other.right_index + 1)
    }

    /// Letters between the two objects; 0 when they overlap
    pub fn letter_distance(&self, other: &WorkspaceObject) -> usize {
        if other.left_index > self.right_index {
            other.left_index - self.right_index
        } else if self.left_index > other.right_index {
            self.left_index - other.right_index
        } else {
            0
        }
    }

    pub fn described(&self, descriptor: NodeId) -> bool {
        self.descriptions.iter().any(|d| d.descriptor == descriptor)
    }

    pub fn has_description_type(&self, description_type: NodeId) -> bool {
        self.descriptions.iter().any(|d| d.description_type == description_type)
    }

    /// Descriptor filed under a description type
    pub fn descriptor(&self, description_type: NodeId) -> Option<NodeId> {
        self.descriptions
            .iter()
            .find(|d| d.description_type == description_type)
            .map(|d| d.descriptor)
    }

    pub fn bonds(&self) -> impl Iterator<Item = BondId> {
        self.left_bond.into_iter().chain(self.right_bond)
    }

    pub fn salience(&self, kind: Salience) -> f64 {
        match kind {
            Salience::IntraString => self.values.intra_string_salience,
            Salience::InterString => self.values.inter_string_salience,
            Salience::Total => self.values.total_salience,
            Salience::RelativeImportance => self.values.relative_importance,
        }
    }
}

/// False for descriptors every object of a kind shares (letter, group, lengths)
pub fn distinguishing_descriptor(descriptor: NodeId) -> bool {
    descriptor != NodeId::LETTER && descriptor != NodeId::GROUP && !descriptor.is_number()
}
