//! # Slipnet - Copycat's Long-Term Concepts
//!
//! A fixed graph of 59 concepts (letters, numbers, positions, directions,
//! bond and group types, and the categories above them) joined by typed,
//! weighted links. The graph never changes once built; what changes during
//! a trial is how *active* each concept is, and that lives in the per-trial
//! [`Slipnet`] state.
//!
//! ## Layout
//!
//! Nodes sit in a flat arena indexed by [`NodeId`]. Links refer to nodes by
//! id, so the many cycles in the graph (successor/predecessor chains,
//! opposites, category/instance pairs) never become ownership cycles.
//!
//! ```text
//!   letterCategory ──instance──▶ a ──successor──▶ b ──successor──▶ c ...
//!          ▲                     │ ◀─predecessor─┘
//!          └──────category───────┘
//! ```

mod activation;

pub use activation::Slipnet;

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use copycat_core::{CopycatError, CopycatResult};

/// Stable index of a concept node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u16);

const LETTER_COUNT: u16 = 26;
const NUMBER_COUNT: u16 = 5;

impl NodeId {
    pub const LEFTMOST: NodeId = NodeId(31);
    pub const RIGHTMOST: NodeId = NodeId(32);
    pub const MIDDLE: NodeId = NodeId(33);
    pub const SINGLE: NodeId = NodeId(34);
    pub const WHOLE: NodeId = NodeId(35);
    pub const FIRST: NodeId = NodeId(36);
    pub const LAST: NodeId = NodeId(37);
    pub const LEFT: NodeId = NodeId(38);
    pub const RIGHT: NodeId = NodeId(39);
    pub const PREDECESSOR: NodeId = NodeId(40);
    pub const SUCCESSOR: NodeId = NodeId(41);
    pub const SAMENESS: NodeId = NodeId(42);
    pub const PREDECESSOR_GROUP: NodeId = NodeId(43);
    pub const SUCCESSOR_GROUP: NodeId = NodeId(44);
    pub const SAMENESS_GROUP: NodeId = NodeId(45);
    pub const IDENTITY: NodeId = NodeId(46);
    pub const OPPOSITE: NodeId = NodeId(47);
    pub const LETTER: NodeId = NodeId(48);
    pub const GROUP: NodeId = NodeId(49);
    pub const LETTER_CATEGORY: NodeId = NodeId(50);
    pub const STRING_POSITION_CATEGORY: NodeId = NodeId(51);
    pub const ALPHABETIC_POSITION_CATEGORY: NodeId = NodeId(52);
    pub const DIRECTION_CATEGORY: NodeId = NodeId(53);
    pub const BOND_CATEGORY: NodeId = NodeId(54);
    pub const GROUP_CATEGORY: NodeId = NodeId(55);
    pub const LENGTH: NodeId = NodeId(56);
    pub const OBJECT_CATEGORY: NodeId = NodeId(57);
    pub const BOND_FACET: NodeId = NodeId(58);

    /// Total number of concepts
    pub const COUNT: usize = 59;

    /// The letter node for `a` + `offset`
    pub fn letter(offset: usize) -> Option<NodeId> {
        (offset < LETTER_COUNT as usize).then(|| NodeId(offset as u16))
    }

    /// The letter node for a lowercase ASCII character
    pub fn from_char(c: char) -> Option<NodeId> {
        if c.is_ascii_lowercase() {
            Self::letter((c as u8 - b'a') as usize)
        } else {
            None
        }
    }

    /// The number node for `n` in 1..=5
    pub fn number(n: usize) -> Option<NodeId> {
        (1..=NUMBER_COUNT as usize)
            .contains(&n)
            .then(|| NodeId(LETTER_COUNT + n as u16 - 1))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_letter(self) -> bool {
        self.0 < LETTER_COUNT
    }

    pub fn is_number(self) -> bool {
        (LETTER_COUNT..LETTER_COUNT + NUMBER_COUNT).contains(&self.0)
    }

    /// The character a letter node stands for
    pub fn as_char(self) -> Option<char> {
        self.is_letter().then(|| (b'a' + self.0 as u8) as char)
    }

    /// The count a number node stands for
    pub fn as_number(self) -> Option<usize> {
        self.is_number().then(|| (self.0 - LETTER_COUNT + 1) as usize)
    }

    /// The two bond facets objects can be compared on
    pub const BOND_FACETS: [NodeId; 2] = [NodeId::LETTER_CATEGORY, NodeId::LENGTH];

    /// Concepts clamped at full activation when a trial starts
    pub const INITIALLY_CLAMPED: [NodeId; 2] =
        [NodeId::LETTER_CATEGORY, NodeId::STRING_POSITION_CATEGORY];
}

/// How a link relates its endpoints
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkKind {
    /// Member to its category (a -> letterCategory)
    Category,
    /// Category to a member (letterCategory -> a)
    Instance,
    /// Object to a property it has (a -> first)
    Property,
    /// A slippage is possible along this link (leftmost -> rightmost)
    LateralSlip,
    /// Related, but not a slippage (a -> b)
    LateralNonSlip,
}

/// A directed, typed link between two concepts
#[derive(Clone, Debug)]
pub struct ConceptLink {
    pub source: NodeId,
    pub destination: NodeId,
    /// Concept naming the relation (successor, opposite, ...)
    pub label: Option<NodeId>,
    /// Fixed semantic distance; 0 means "use the label's length"
    pub fixed_length: f64,
    pub kind: LinkKind,
}

/// Top-down scouts a concept spawns while fully active
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopDownScout {
    BondCategory,
    BondDirection,
    GroupCategory,
    GroupDirection,
    Description,
}

/// A concept node
#[derive(Clone, Debug)]
pub struct ConceptNode {
    pub id: NodeId,
    pub name: &'static str,
    /// Intrinsic abstractness, 0..=100
    pub depth: f64,
    /// Distance this concept puts between things it links
    pub link_length: f64,
    /// Indices into the network's link table
    pub outgoing: Vec<usize>,
    pub top_down: Vec<TopDownScout>,
}

impl ConceptNode {
    /// Link length once the node is fully active
    pub fn shrunk_link_length(&self) -> f64 {
        self.link_length * 0.4
    }
}

/// The static concept graph
#[derive(Debug)]
pub struct ConceptNetwork {
    nodes: Vec<ConceptNode>,
    links: Vec<ConceptLink>,
}

const LETTER_NAMES: [&str; 26] = [
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r",
    "s", "t", "u", "v", "w", "x", "y", "z",
];

const NUMBER_NAMES: [&str; 5] = ["1", "2", "3", "4", "5"];

/// (id, name, depth, link length, top-down scouts) for every non-letter,
/// non-number concept, in id order
const NAMED_NODES: [(NodeId, &str, f64, f64, &[TopDownScout]); 28] = [
    (NodeId::LEFTMOST, "leftmost", 40.0, 0.0, &[]),
    (NodeId::RIGHTMOST, "rightmost", 40.0, 0.0, &[]),
    (NodeId::MIDDLE, "middle", 40.0, 0.0, &[]),
    (NodeId::SINGLE, "single", 40.0, 0.0, &[]),
    (NodeId::WHOLE, "whole", 40.0, 0.0, &[]),
    (NodeId::FIRST, "first", 60.0, 0.0, &[]),
    (NodeId::LAST, "last", 60.0, 0.0, &[]),
    (NodeId::LEFT, "left", 40.0, 0.0, &[TopDownScout::BondDirection, TopDownScout::GroupDirection]),
    (NodeId::RIGHT, "right", 40.0, 0.0, &[TopDownScout::BondDirection, TopDownScout::GroupDirection]),
    (NodeId::PREDECESSOR, "predecessor", 50.0, 60.0, &[TopDownScout::BondCategory]),
    (NodeId::SUCCESSOR, "successor", 50.0, 60.0, &[TopDownScout::BondCategory]),
    (NodeId::SAMENESS, "sameness", 80.0, 0.0, &[TopDownScout::BondCategory]),
    (NodeId::PREDECESSOR_GROUP, "predecessorGroup", 50.0, 0.0, &[TopDownScout::GroupCategory]),
    (NodeId::SUCCESSOR_GROUP, "successorGroup", 50.0, 0.0, &[TopDownScout::GroupCategory]),
    (NodeId::SAMENESS_GROUP, "samenessGroup", 80.0, 0.0, &[TopDownScout::GroupCategory]),
    (NodeId::IDENTITY, "identity", 90.0, 0.0, &[]),
    (NodeId::OPPOSITE, "opposite", 90.0, 80.0, &[]),
    (NodeId::LETTER, "letter", 20.0, 0.0, &[]),
    (NodeId::GROUP, "group", 80.0, 0.0, &[]),
    (NodeId::LETTER_CATEGORY, "letterCategory", 30.0, 0.0, &[]),
    (NodeId::STRING_POSITION_CATEGORY, "stringPositionCategory", 70.0, 0.0, &[TopDownScout::Description]),
    (NodeId::ALPHABETIC_POSITION_CATEGORY, "alphabeticPositionCategory", 80.0, 0.0, &[TopDownScout::Description]),
    (NodeId::DIRECTION_CATEGORY, "directionCategory", 70.0, 0.0, &[]),
    (NodeId::BOND_CATEGORY, "bondCategory", 80.0, 0.0, &[]),
    (NodeId::GROUP_CATEGORY, "groupCategory", 80.0, 0.0, &[]),
    (NodeId::LENGTH, "length", 60.0, 0.0, &[]),
    (NodeId::OBJECT_CATEGORY, "objectCategory", 90.0, 0.0, &[]),
    (NodeId::BOND_FACET, "bondFacet", 90.0, 0.0, &[]),
];

impl ConceptNetwork {
    /// The process-wide network, built and validated on first use
    pub fn shared() -> CopycatResult<&'static ConceptNetwork> {
        static NETWORK: OnceLock<Result<ConceptNetwork, String>> = OnceLock::new();
        NETWORK
            .get_or_init(|| ConceptNetwork::build().map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| CopycatError::invariant(e.clone()))
    }

    /// Build and validate the concept graph
    pub fn build() -> CopycatResult<Self> {
        let mut b = NetworkBuilder::default();

        for name in LETTER_NAMES {
            b.node(name, 10.0, 0.0, &[]);
        }
        for name in NUMBER_NAMES {
            b.node(name, 30.0, 0.0, &[]);
        }
        for (id, name, depth, length, scouts) in NAMED_NODES {
            let got = b.node(name, depth, length, scouts);
            if got != id {
                return Err(CopycatError::invariant(format!(
                    "concept '{}' landed at {:?}, expected {:?}",
                    name, got, id
                )));
            }
        }

        let letters: Vec<NodeId> = (0..LETTER_COUNT).map(NodeId).collect();
        let numbers: Vec<NodeId> = (LETTER_COUNT..LETTER_COUNT + NUMBER_COUNT).map(NodeId).collect();

        b.chain(&letters);
        b.chain(&numbers);

        for &letter in &letters {
            b.instance(NodeId::LETTER_CATEGORY, letter, 97.0);
        }
        b.category(NodeId::SAMENESS_GROUP, NodeId::LETTER_CATEGORY, 50.0);

        for &number in &numbers {
            b.instance(NodeId::LENGTH, number, 100.0);
        }
        for group in [NodeId::PREDECESSOR_GROUP, NodeId::SUCCESSOR_GROUP, NodeId::SAMENESS_GROUP] {
            b.non_slip(group, NodeId::LENGTH, None, 95.0);
        }

        for (x, y) in [
            (NodeId::FIRST, NodeId::LAST),
            (NodeId::LEFTMOST, NodeId::RIGHTMOST),
            (NodeId::LEFT, NodeId::RIGHT),
            (NodeId::SUCCESSOR, NodeId::PREDECESSOR),
            (NodeId::SUCCESSOR_GROUP, NodeId::PREDECESSOR_GROUP),
        ] {
            b.opposite(x, y);
        }

        b.property(letters[0], NodeId::FIRST, 75.0);
        b.property(letters[letters.len() - 1], NodeId::LAST, 75.0);

        for (category, member) in [
            (NodeId::OBJECT_CATEGORY, NodeId::LETTER),
            (NodeId::OBJECT_CATEGORY, NodeId::GROUP),
            (NodeId::STRING_POSITION_CATEGORY, NodeId::LEFTMOST),
            (NodeId::STRING_POSITION_CATEGORY, NodeId::RIGHTMOST),
            (NodeId::STRING_POSITION_CATEGORY, NodeId::MIDDLE),
            (NodeId::STRING_POSITION_CATEGORY, NodeId::SINGLE),
            (NodeId::STRING_POSITION_CATEGORY, NodeId::WHOLE),
            (NodeId::ALPHABETIC_POSITION_CATEGORY, NodeId::FIRST),
            (NodeId::ALPHABETIC_POSITION_CATEGORY, NodeId::LAST),
            (NodeId::DIRECTION_CATEGORY, NodeId::LEFT),
            (NodeId::DIRECTION_CATEGORY, NodeId::RIGHT),
            (NodeId::BOND_CATEGORY, NodeId::PREDECESSOR),
            (NodeId::BOND_CATEGORY, NodeId::SUCCESSOR),
            (NodeId::BOND_CATEGORY, NodeId::SAMENESS),
            (NodeId::GROUP_CATEGORY, NodeId::PREDECESSOR_GROUP),
            (NodeId::GROUP_CATEGORY, NodeId::SUCCESSOR_GROUP),
            (NodeId::GROUP_CATEGORY, NodeId::SAMENESS_GROUP),
            (NodeId::BOND_FACET, NodeId::LETTER_CATEGORY),
            (NodeId::BOND_FACET, NodeId::LENGTH),
        ] {
            b.instance(category, member, 100.0);
        }

        // bond types <-> the groups they form
        let group_category = Some(NodeId::GROUP_CATEGORY);
        let bond_category = Some(NodeId::BOND_CATEGORY);
        b.non_slip(NodeId::SAMENESS, NodeId::SAMENESS_GROUP, group_category, 30.0);
        b.non_slip(NodeId::SUCCESSOR, NodeId::SUCCESSOR_GROUP, group_category, 60.0);
        b.non_slip(NodeId::PREDECESSOR, NodeId::PREDECESSOR_GROUP, group_category, 60.0);
        b.non_slip(NodeId::SAMENESS_GROUP, NodeId::SAMENESS, bond_category, 90.0);
        b.non_slip(NodeId::SUCCESSOR_GROUP, NodeId::SUCCESSOR, bond_category, 90.0);
        b.non_slip(NodeId::PREDECESSOR_GROUP, NodeId::PREDECESSOR, bond_category, 90.0);

        b.slip(NodeId::LETTER_CATEGORY, NodeId::LENGTH, None, 95.0);
        b.slip(NodeId::LENGTH, NodeId::LETTER_CATEGORY, None, 95.0);
        b.slip(NodeId::LETTER, NodeId::GROUP, None, 90.0);
        b.slip(NodeId::GROUP, NodeId::LETTER, None, 90.0);

        b.bidirectional(NodeId::LEFT, NodeId::LEFTMOST, 90.0);
        b.bidirectional(NodeId::RIGHT, NodeId::RIGHTMOST, 90.0);
        b.bidirectional(NodeId::RIGHT, NodeId::LEFTMOST, 100.0);
        b.bidirectional(NodeId::LEFT, NodeId::RIGHTMOST, 100.0);
        b.bidirectional(NodeId::LEFTMOST, NodeId::FIRST, 100.0);
        b.bidirectional(NodeId::RIGHTMOST, NodeId::FIRST, 100.0);
        b.bidirectional(NodeId::LEFTMOST, NodeId::LAST, 100.0);
        b.bidirectional(NodeId::RIGHTMOST, NodeId::LAST, 100.0);

        b.slip(NodeId::SINGLE, NodeId::WHOLE, None, 90.0);
        b.slip(NodeId::WHOLE, NodeId::SINGLE, None, 90.0);

        let network = ConceptNetwork {
            nodes: b.nodes,
            links: b.links,
        };
        network.validate()?;
        Ok(network)
    }

    fn validate(&self) -> CopycatResult<()> {
        if self.nodes.len() != NodeId::COUNT {
            return Err(CopycatError::invariant(format!(
                "concept graph has {} nodes, expected {}",
                self.nodes.len(),
                NodeId::COUNT
            )));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.id.index() != i {
                return Err(CopycatError::invariant(format!("node '{}' out of order", node.name)));
            }
            if !(0.0..=100.0).contains(&node.depth) {
                return Err(CopycatError::invariant(format!(
                    "node '{}' has depth {} outside 0..=100",
                    node.name, node.depth
                )));
            }
            if node.outgoing.iter().any(|&l| l >= self.links.len()) {
                return Err(CopycatError::invariant(format!("node '{}' has a dangling link", node.name)));
            }
        }
        for link in &self.links {
            let ends = [Some(link.source), Some(link.destination), link.label];
            if ends.iter().flatten().any(|id| id.index() >= self.nodes.len()) {
                return Err(CopycatError::invariant("link references an unknown concept"));
            }
        }
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> &ConceptNode {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> &[ConceptNode] {
        &self.nodes
    }

    pub fn name(&self, id: NodeId) -> &'static str {
        self.nodes[id.index()].name
    }

    pub fn depth(&self, id: NodeId) -> f64 {
        self.nodes[id.index()].depth
    }

    /// All outgoing links of a node
    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &ConceptLink> {
        self.nodes[id.index()].outgoing.iter().map(move |&l| &self.links[l])
    }

    /// Outgoing links of one kind
    pub fn links_of(&self, id: NodeId, kind: LinkKind) -> impl Iterator<Item = &ConceptLink> {
        self.outgoing(id).filter(move |l| l.kind == kind)
    }

    /// The category a node belongs to (first category link)
    pub fn category_of(&self, id: NodeId) -> Option<NodeId> {
        self.links_of(id, LinkKind::Category).next().map(|l| l.destination)
    }

    /// Members of a category, in link order
    pub fn instances_of(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.links_of(id, LinkKind::Instance).map(|l| l.destination)
    }

    /// Any outgoing link reaches `other`
    pub fn is_linked(&self, id: NodeId, other: NodeId) -> bool {
        self.outgoing(id).any(|l| l.destination == other)
    }

    /// A lateral slip link reaches `other`
    pub fn is_slip_linked(&self, id: NodeId, other: NodeId) -> bool {
        self.links_of(id, LinkKind::LateralSlip).any(|l| l.destination == other)
    }

    /// Same node, or directly linked
    pub fn related(&self, id: NodeId, other: NodeId) -> bool {
        id == other || self.is_linked(id, other)
    }

    /// The node reached from `id` along a link labelled `relation`
    ///
    /// `identity` relates every node to itself.
    pub fn related_node(&self, id: NodeId, relation: NodeId) -> Option<NodeId> {
        if relation == NodeId::IDENTITY {
            return Some(id);
        }
        self.outgoing(id)
            .find(|l| l.label == Some(relation))
            .map(|l| l.destination)
    }

    /// The relation labelling the link from `id` to `destination`
    ///
    /// Identical nodes are related by identity.
    pub fn bond_category(&self, id: NodeId, destination: NodeId) -> Option<NodeId> {
        if id == destination {
            return Some(NodeId::IDENTITY);
        }
        self.outgoing(id)
            .find(|l| l.destination == destination)
            .and_then(|l| l.label)
    }

    /// Association strength used when spreading activation
    pub fn intrinsic_degree_of_association(&self, link: &ConceptLink) -> f64 {
        if link.fixed_length > 1.0 {
            return 100.0 - link.fixed_length;
        }
        match link.label {
            Some(label) => 100.0 - self.node(label).link_length,
            None => 0.0,
        }
    }
}

#[derive(Default)]
struct NetworkBuilder {
    nodes: Vec<ConceptNode>,
    links: Vec<ConceptLink>,
}

impl NetworkBuilder {
    fn node(&mut self, name: &'static str, depth: f64, link_length: f64, scouts: &[TopDownScout]) -> NodeId {
        let id = NodeId(self.nodes.len() as u16);
        self.nodes.push(ConceptNode {
            id,
            name,
            depth,
            link_length,
            outgoing: Vec::new(),
            top_down: scouts.to_vec(),
        });
        id
    }

    fn link(&mut self, source: NodeId, destination: NodeId, label: Option<NodeId>, length: f64, kind: LinkKind) {
        let index = self.links.len();
        self.links.push(ConceptLink {
            source,
            destination,
            label,
            fixed_length: length,
            kind,
        });
        self.nodes[source.index()].outgoing.push(index);
    }

    fn slip(&mut self, source: NodeId, destination: NodeId, label: Option<NodeId>, length: f64) {
        self.link(source, destination, label, length, LinkKind::LateralSlip);
    }

    fn non_slip(&mut self, source: NodeId, destination: NodeId, label: Option<NodeId>, length: f64) {
        self.link(source, destination, label, length, LinkKind::LateralNonSlip);
    }

    fn bidirectional(&mut self, a: NodeId, b: NodeId, length: f64) {
        self.non_slip(a, b, None, length);
        self.non_slip(b, a, None, length);
    }

    fn category(&mut self, member: NodeId, category: NodeId, length: f64) {
        self.link(member, category, None, length, LinkKind::Category);
    }

    fn instance(&mut self, category: NodeId, member: NodeId, length: f64) {
        let category_length = self.nodes[category.index()].depth - self.nodes[member.index()].depth;
        self.category(member, category, category_length);
        self.link(category, member, None, length, LinkKind::Instance);
    }

    fn property(&mut self, source: NodeId, destination: NodeId, length: f64) {
        self.link(source, destination, None, length, LinkKind::Property);
    }

    fn opposite(&mut self, a: NodeId, b: NodeId) {
        self.slip(a, b, Some(NodeId::OPPOSITE), 0.0);
        self.slip(b, a, Some(NodeId::OPPOSITE), 0.0);
    }

    fn chain(&mut self, items: &[NodeId]) {
        for pair in items.windows(2) {
            self.non_slip(pair[0], pair[1], Some(NodeId::SUCCESSOR), 0.0);
            self.non_slip(pair[1], pair[0], Some(NodeId::PREDECESSOR), 0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_builds() {
        let net = ConceptNetwork::shared().unwrap();
        assert_eq!(net.nodes().len(), NodeId::COUNT);
        assert_eq!(net.name(NodeId::SUCCESSOR_GROUP), "successorGroup");
        assert_eq!(net.name(NodeId::from_char('q').unwrap()), "q");
        assert_eq!(net.name(NodeId::number(3).unwrap()), "3");
    }

    #[test]
    fn test_letter_relations() {
        let net = ConceptNetwork::shared().unwrap();
        let a = NodeId::from_char('a').unwrap();
        let b = NodeId::from_char('b').unwrap();
        let z = NodeId::from_char('z').unwrap();
        assert_eq!(net.related_node(a, NodeId::SUCCESSOR), Some(b));
        assert_eq!(net.related_node(b, NodeId::PREDECESSOR), Some(a));
        assert_eq!(net.related_node(z, NodeId::SUCCESSOR), None);
        assert_eq!(net.bond_category(a, b), Some(NodeId::SUCCESSOR));
        assert_eq!(net.bond_category(b, a), Some(NodeId::PREDECESSOR));
        assert_eq!(net.bond_category(a, a), Some(NodeId::IDENTITY));
        assert_eq!(net.bond_category(a, z), None);
        assert_eq!(net.category_of(a), Some(NodeId::LETTER_CATEGORY));
    }

    #[test]
    fn test_opposites_are_slip_links() {
        let net = ConceptNetwork::shared().unwrap();
        assert!(net.is_slip_linked(NodeId::LEFTMOST, NodeId::RIGHTMOST));
        assert!(net.is_slip_linked(NodeId::SUCCESSOR, NodeId::PREDECESSOR));
        assert_eq!(net.bond_category(NodeId::LEFT, NodeId::RIGHT), Some(NodeId::OPPOSITE));
        assert_eq!(net.related_node(NodeId::SUCCESSOR_GROUP, NodeId::OPPOSITE), Some(NodeId::PREDECESSOR_GROUP));
        assert!(!net.is_slip_linked(NodeId::LEFT, NodeId::LEFTMOST));
    }

    #[test]
    fn test_groups_know_their_bonds() {
        let net = ConceptNetwork::shared().unwrap();
        assert_eq!(net.related_node(NodeId::SAMENESS_GROUP, NodeId::BOND_CATEGORY), Some(NodeId::SAMENESS));
        assert_eq!(net.related_node(NodeId::SUCCESSOR, NodeId::GROUP_CATEGORY), Some(NodeId::SUCCESSOR_GROUP));
    }

    #[test]
    fn test_instance_links_carry_depth_difference() {
        let net = ConceptNetwork::shared().unwrap();
        let link = net
            .links_of(NodeId::LEFTMOST, LinkKind::Category)
            .next()
            .unwrap();
        assert_eq!(link.destination, NodeId::STRING_POSITION_CATEGORY);
        assert_eq!(link.fixed_length, 30.0);
        let positions: Vec<_> = net.instances_of(NodeId::STRING_POSITION_CATEGORY).collect();
        assert_eq!(positions.len(), 5);
    }

    #[test]
    fn test_node_id_helpers() {
        assert_eq!(NodeId::from_char('c').unwrap().as_char(), Some('c'));
        assert_eq!(NodeId::number(5).unwrap().as_number(), Some(5));
        assert!(NodeId::number(6).is_none());
        assert!(NodeId::from_char('A').is_none());
        assert!(!NodeId::SAMENESS.is_letter());
    }
}
