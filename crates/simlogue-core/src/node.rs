//! Node representation for circuit graphs.

use std::fmt;

/// Unique identifier for a node in the circuit (index into the circuit's
/// node table). Ground is always node 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The ground node (node 0).
    pub const GROUND: NodeId = NodeId(0);

    /// Create a new NodeId from a raw value.
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }

    /// Get the raw node ID value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Index into the circuit's node table.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Check if this is the ground node.
    pub fn is_ground(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// An electrical junction shared by device pins.
///
/// Nodes are owned by the circuit; devices refer to them by [`NodeId`].
/// The `row` is the node's index in the MNA system, assigned when the
/// circuit is assembled (`None` for ground and for nodes absorbed by a
/// connection merge).
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    /// Voltage from the most recent solve.
    pub voltage: f64,
    /// MNA row assigned at assembly; `None` for ground.
    pub row: Option<usize>,
    /// Still referenced by at least one pin. Cleared when a connection
    /// fuses this node into another.
    pub(crate) alive: bool,
}

impl Node {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            voltage: 0.0,
            row: None,
            alive: true,
        }
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Check if this is the ground node.
    pub fn is_ground(&self) -> bool {
        self.id.is_ground()
    }
}

/// Look up the MNA row of a node, `None` for ground.
pub fn row_of(nodes: &[Node], id: NodeId) -> Option<usize> {
    nodes[id.index()].row
}

/// Look up the last solved voltage of a node (0 for ground).
pub fn voltage_of(nodes: &[Node], id: NodeId) -> f64 {
    nodes[id.index()].voltage
}
