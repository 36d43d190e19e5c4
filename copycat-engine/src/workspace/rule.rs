//! Replacements (what changed between initial and modified) and the rule
//! describing that change.

use std::fmt;

use copycat_core::formulas::weighted_average;
use copycat_core::MAX_VALUE;

use crate::slipnet::{ConceptNetwork, NodeId, Slipnet};

use super::correspondence::{apply_slippages, Correspondence};
use super::{ObjectId, StringKind, Workspace};

/// Links an initial-string letter to the modified-string letter at the same
/// position
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Replacement {
    pub modified: ObjectId,
    /// sameness, successor or predecessor; `None` for any other change
    pub relation: Option<NodeId>,
}

/// Relation between an initial character and its modified counterpart
pub fn replacement_relation(initial: char, modified: char) -> Option<NodeId> {
    match initial as i32 - modified as i32 {
        0 => Some(NodeId::SAMENESS),
        -1 => Some(NodeId::SUCCESSOR),
        1 => Some(NodeId::PREDECESSOR),
        _ => None,
    }
}

/// "Replace <descriptor> <category> by <relation>", judged on `facet`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuleChange {
    pub facet: NodeId,
    pub descriptor: NodeId,
    pub category: NodeId,
    pub relation: NodeId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rule {
    /// `None` is the rule "nothing changed"
    pub change: Option<RuleChange>,
}

impl Rule {
    pub fn no_change() -> Self {
        Self { change: None }
    }

    pub fn replace(facet: NodeId, descriptor: NodeId, category: NodeId, relation: NodeId) -> Self {
        Self {
            change: Some(RuleChange {
                facet,
                descriptor,
                category,
                relation,
            }),
        }
    }

    /// Concepts a built rule activates
    pub fn concepts(&self) -> Vec<NodeId> {
        match self.change {
            Some(c) => vec![c.relation, c.facet, c.category, c.descriptor],
            None => Vec::new(),
        }
    }

    pub fn describe(&self, network: &ConceptNetwork) -> String {
        RuleDisplay { rule: self, network }.to_string()
    }
}

struct RuleDisplay<'a> {
    rule: &'a Rule,
    network: &'a ConceptNetwork,
}

impl fmt::Display for RuleDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rule.change {
            None => write!(f, "no change"),
            Some(c) => {
                write!(
                    f,
                    "replace {} of {} {} by {}",
                    self.network.name(c.facet),
                    self.network.name(c.descriptor),
                    self.network.name(c.category),
                    self.network.name(c.relation)
                )
            }
        }
    }
}

/// Apply a relation to the slice of the target a rule picked out
fn change_string(text: &str, facet: NodeId, relation: NodeId) -> Option<String> {
    if facet == NodeId::LENGTH {
        return match relation {
            NodeId::PREDECESSOR => Some(text[..text.len().saturating_sub(1)].to_string()),
            NodeId::SUCCESSOR => Some(format!("{}{}", text, &text[..1.min(text.len())])),
            _ => Some(text.to_string()),
        };
    }
    match relation {
        NodeId::PREDECESSOR => {
            if text.contains('a') {
                return None;
            }
            Some(text.chars().map(|c| (c as u8 - 1) as char).collect())
        }
        NodeId::SUCCESSOR => {
            if text.contains('z') {
                return None;
            }
            Some(text.chars().map(|c| (c as u8 + 1) as char).collect())
        }
        letter => letter.as_char().map(String::from),
    }
}

impl Workspace {
    /// Rule strength: deep, closely matched descriptor and relation, and a
    /// descriptor the changed object's counterpart actually has
    pub fn rule_strength(&self, rule: &Rule, slipnet: &Slipnet) -> f64 {
        let Some(change) = rule.change else {
            return 50.0;
        };
        let network = slipnet.network();
        let descriptor_depth = network.depth(change.descriptor);
        let relation_depth = network.depth(change.relation);
        let average_depth = ((descriptor_depth + relation_depth) / 2.0).powf(1.1);

        let mut shared_descriptor_term = 0.0;
        let counterpart = self
            .changed_object()
            .and_then(|id| self.object(id))
            .and_then(|o| o.correspondence)
            .and_then(|id| self.correspondence(id))
            .and_then(|c| self.object(c.target));
        if let Some(target) = counterpart {
            let slipped = apply_slippages(change.descriptor, &self.slippages());
            if !target.described(slipped) {
                return 0.0;
            }
            shared_descriptor_term = 100.0;
        }
        let shared_descriptor_weight = ((100.0 - descriptor_depth) / 10.0).powf(1.4);
        let depth_difference = 100.0 - (descriptor_depth - relation_depth).abs();
        weighted_average(&[
            (depth_difference, 12.0),
            (average_depth, 18.0),
            (shared_descriptor_term, shared_descriptor_weight),
        ])
        .min(MAX_VALUE)
    }

    /// A correspondence from the changed object that does not carry the
    /// rule's descriptor contradicts the rule
    pub fn rule_conflicts_with(&self, rule: &Rule, correspondence: &Correspondence) -> bool {
        let Some(change) = rule.change else {
            return false;
        };
        if self.changed_object() != Some(correspondence.initial) {
            return false;
        }
        !correspondence
            .concept_mappings
            .iter()
            .any(|m| m.initial_descriptor == change.descriptor)
    }

    /// Carry the rule over to the target through the slippages in force.
    ///
    /// `None` when the translated rule cannot be applied: more than one
    /// target object fits its description, or the relation runs off the
    /// alphabet.
    pub fn translate_rule(&self, rule: &Rule) -> Option<String> {
        let target_text = self.string(StringKind::Target).text();
        let Some(change) = rule.change else {
            return Some(target_text.to_string());
        };
        let slippages = self.slippages();
        let facet = apply_slippages(change.facet, &slippages);
        let descriptor = apply_slippages(change.descriptor, &slippages);
        let category = apply_slippages(change.category, &slippages);
        let relation = apply_slippages(change.relation, &slippages);

        let changed: Vec<_> = self
            .objects_in(StringKind::Target)
            .filter(|o| o.described(descriptor) && o.described(category))
            .collect();
        let object = match changed.as_slice() {
            [] => return Some(target_text.to_string()),
            [one] => *one,
            _ => return None,
        };
        let (left, right) = (object.left_index, object.right_index + 1);
        let middle = change_string(&target_text[left..right], facet, relation)?;
        if middle.is_empty() {
            return None;
        }
        Some(format!("{}{}{}", &target_text[..left], middle, &target_text[right..]))
    }
}
