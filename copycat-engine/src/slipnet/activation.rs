//! Per-trial activation state over the shared concept graph.

use copycat_core::{Randomness, MAX_VALUE};

use super::{ConceptLink, ConceptNetwork, LinkKind, NodeId};

/// Activation at or above this counts as fully active
const FULL_ACTIVATION: f64 = 99.9;

/// Nodes above this activation may jump straight to 100
const JUMP_THRESHOLD: f64 = 55.0;

/// Activation levels of every concept for one trial
#[derive(Clone, Debug)]
pub struct Slipnet {
    network: &'static ConceptNetwork,
    activation: Vec<f64>,
    buffer: Vec<f64>,
    clamped: Vec<bool>,
    updates: u32,
    unclamp_after: u32,
}

impl Slipnet {
    pub fn new(network: &'static ConceptNetwork, unclamp_after: u32) -> Self {
        let mut slipnet = Self {
            network,
            activation: vec![0.0; NodeId::COUNT],
            buffer: vec![0.0; NodeId::COUNT],
            clamped: vec![false; NodeId::COUNT],
            updates: 0,
            unclamp_after,
        };
        slipnet.reset();
        slipnet
    }

    /// Back to the start-of-trial state
    pub fn reset(&mut self) {
        self.activation.iter_mut().for_each(|a| *a = 0.0);
        self.buffer.iter_mut().for_each(|b| *b = 0.0);
        self.clamped.iter_mut().for_each(|c| *c = false);
        self.updates = 0;
        for id in NodeId::INITIALLY_CLAMPED {
            self.clamped[id.index()] = true;
            self.activation[id.index()] = MAX_VALUE;
        }
    }

    pub fn network(&self) -> &'static ConceptNetwork {
        self.network
    }

    pub fn activation_of(&self, id: NodeId) -> f64 {
        self.activation[id.index()]
    }

    pub fn is_fully_active(&self, id: NodeId) -> bool {
        self.activation[id.index()] >= FULL_ACTIVATION
    }

    pub fn is_clamped(&self, id: NodeId) -> bool {
        self.clamped[id.index()]
    }

    pub fn updates(&self) -> u32 {
        self.updates
    }

    /// Queue activation for the next update
    pub fn spread_activation(&mut self, id: NodeId, amount: f64) {
        self.buffer[id.index()] += amount;
    }

    /// Make sure the node reaches full activation at the next update
    pub fn activate(&mut self, id: NodeId) {
        let b = &mut self.buffer[id.index()];
        *b = b.max(MAX_VALUE);
    }

    /// Set activation directly, bypassing the buffer
    pub fn set_activation(&mut self, id: NodeId, value: f64) {
        self.activation[id.index()] = value.clamp(0.0, MAX_VALUE);
    }

    /// One round of decay, spreading and jumping
    pub fn update(&mut self, rng: &mut Randomness) {
        self.updates += 1;
        if self.updates == self.unclamp_after {
            for id in NodeId::INITIALLY_CLAMPED {
                self.clamped[id.index()] = false;
            }
        }

        for node in self.network.nodes() {
            let i = node.id.index();
            self.buffer[i] -= self.activation[i] * (100.0 - node.depth) / 100.0;
        }

        let network = self.network;
        for node in network.nodes() {
            if !self.is_fully_active(node.id) {
                continue;
            }
            for link in network.outgoing(node.id) {
                self.spread_activation(link.destination, network.intrinsic_degree_of_association(link));
            }
        }

        for i in 0..NodeId::COUNT {
            if !self.clamped[i] {
                self.activation[i] = (self.activation[i] + self.buffer[i]).clamp(0.0, MAX_VALUE);
            }
            self.buffer[i] = 0.0;
        }

        for i in 0..NodeId::COUNT {
            let a = self.activation[i];
            if self.clamped[i] || a <= JUMP_THRESHOLD {
                continue;
            }
            if rng.coin_flip((a / 100.0).powi(3)) {
                self.activation[i] = MAX_VALUE;
            }
        }
    }

    /// Link length of a node, shrunk while it is fully active
    pub fn link_length(&self, id: NodeId) -> f64 {
        let node = self.network.node(id);
        if self.is_fully_active(id) {
            node.shrunk_link_length()
        } else {
            node.link_length
        }
    }

    /// How readily a node's label lets things be seen as alike
    pub fn degree_of_association(&self, id: NodeId) -> f64 {
        100.0 - self.link_length(id)
    }

    /// Association used when pricing bonds labelled by this node
    pub fn bond_degree_of_association(&self, id: NodeId) -> f64 {
        (self.degree_of_association(id).max(0.0).sqrt() * 11.0).min(MAX_VALUE)
    }

    pub fn link_degree_of_association(&self, link: &ConceptLink) -> f64 {
        match link.label {
            Some(label) if link.fixed_length <= 0.0 => self.degree_of_association(label),
            _ => 100.0 - link.fixed_length,
        }
    }

    /// How far `a` has to slip to become `b`: 0 for the same node, 100
    /// when no slip link joins them. Shrinks while the link's label is
    /// fully active.
    pub fn distance(&self, a: NodeId, b: NodeId) -> f64 {
        if a == b {
            return 0.0;
        }
        self.network
            .links_of(a, LinkKind::LateralSlip)
            .find(|l| l.destination == b)
            .map(|l| MAX_VALUE - self.link_degree_of_association(l))
            .unwrap_or(MAX_VALUE)
    }

    /// Fully active nodes, in id order
    pub fn fully_active_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.network
            .nodes()
            .iter()
            .map(|n| n.id)
            .filter(move |&id| self.is_fully_active(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slipnet() -> Slipnet {
        Slipnet::new(ConceptNetwork::shared().unwrap(), 50)
    }

    #[test]
    fn test_initial_clamps() {
        let s = slipnet();
        assert!(s.is_fully_active(NodeId::LETTER_CATEGORY));
        assert!(s.is_clamped(NodeId::STRING_POSITION_CATEGORY));
        assert_eq!(s.activation_of(NodeId::SUCCESSOR), 0.0);
    }

    #[test]
    fn test_activation_stays_in_range() {
        let mut s = slipnet();
        let mut rng = Randomness::seeded(5);
        s.spread_activation(NodeId::SUCCESSOR, 500.0);
        s.spread_activation(NodeId::LEFTMOST, -300.0);
        for _ in 0..80 {
            s.update(&mut rng);
            for node in s.network().nodes() {
                let a = s.activation_of(node.id);
                assert!((0.0..=100.0).contains(&a), "{} = {}", node.name, a);
            }
        }
    }

    #[test]
    fn test_unclamp_after_updates() {
        let mut s = Slipnet::new(ConceptNetwork::shared().unwrap(), 3);
        let mut rng = Randomness::seeded(1);
        s.update(&mut rng);
        s.update(&mut rng);
        assert!(s.is_clamped(NodeId::LETTER_CATEGORY));
        s.update(&mut rng);
        assert!(!s.is_clamped(NodeId::LETTER_CATEGORY));
    }

    #[test]
    fn test_spreading_reaches_neighbours() {
        let mut s = slipnet();
        let mut rng = Randomness::seeded(2);
        s.update(&mut rng);
        // letterCategory is clamped at 100 and feeds every letter
        assert!(s.activation_of(NodeId::from_char('m').unwrap()) > 0.0);
    }

    #[test]
    fn test_decay_of_shallow_nodes() {
        let mut s = slipnet();
        let mut rng = Randomness::seeded(3);
        let b = NodeId::from_char('b').unwrap();
        s.set_activation(b, 40.0);
        s.update(&mut rng);
        // depth 10 loses 90% of 40, gains 3 from letterCategory
        assert!(s.activation_of(b) < 10.0);
    }

    #[test]
    fn test_distance() {
        let mut s = slipnet();
        assert_eq!(s.distance(NodeId::LEFTMOST, NodeId::LEFTMOST), 0.0);
        assert_eq!(s.distance(NodeId::SUCCESSOR, NodeId::IDENTITY), 100.0);
        let cold = s.distance(NodeId::LEFTMOST, NodeId::RIGHTMOST);
        assert_eq!(cold, 80.0);
        s.set_activation(NodeId::OPPOSITE, 100.0);
        assert_eq!(s.distance(NodeId::LEFTMOST, NodeId::RIGHTMOST), 32.0);
        // related, but not a slippage
        assert_eq!(s.distance(NodeId::LEFTMOST, NodeId::FIRST), 100.0);
    }

    #[test]
    fn test_degree_of_association() {
        let mut s = slipnet();
        assert_eq!(s.degree_of_association(NodeId::SAMENESS), 100.0);
        assert_eq!(s.degree_of_association(NodeId::SUCCESSOR), 40.0);
        s.set_activation(NodeId::SUCCESSOR, 100.0);
        assert_eq!(s.degree_of_association(NodeId::SUCCESSOR), 76.0);
        assert_eq!(s.bond_degree_of_association(NodeId::SAMENESS), 100.0);
    }
}
