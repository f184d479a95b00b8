//! Circuit graph: devices over shared nodes.
//!
//! The circuit owns the node table and the devices. Devices refer to nodes
//! only through [`NodeId`]s held in their pins; nodes never refer back to
//! devices. Connecting two pins either shares an existing node or fuses two
//! nodes into one.

use indexmap::IndexMap;

use crate::element::Element;
use crate::error::{Error, Result};
use crate::node::{Node, NodeId};

/// A device terminal, addressed by device index and local pin index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinRef {
    pub device: usize,
    pub pin: usize,
}

impl PinRef {
    pub fn new(device: usize, pin: usize) -> Self {
        Self { device, pin }
    }
}

/// Row layout of the assembled MNA system.
#[derive(Debug, Clone, Copy)]
pub struct Dims {
    /// Rows `[0, node_rows)` carry node voltages.
    pub node_rows: usize,
    /// Total system size; rows `[node_rows, size)` are device branch rows.
    pub size: usize,
}

/// A circuit containing nodes and devices.
#[derive(Debug)]
pub struct Circuit<D: Element> {
    nodes: Vec<Node>,
    devices: Vec<D>,
    names: IndexMap<String, usize>,
}

impl<D: Element> Default for Circuit<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Element> Circuit<D> {
    /// Create an empty circuit. The ground node always exists.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeId::GROUND)],
            devices: Vec::new(),
            names: IndexMap::new(),
        }
    }

    /// The ground node.
    pub fn ground(&self) -> NodeId {
        NodeId::GROUND
    }

    /// Add a device, returning its index. Device names must be unique.
    pub fn add_device(&mut self, device: D) -> Result<usize> {
        let name = device.name().to_string();
        if self.names.contains_key(&name) {
            return Err(Error::DuplicateDevice(name));
        }
        let index = self.devices.len();
        self.names.insert(name, index);
        self.devices.push(device);
        Ok(index)
    }

    /// Look up a device index by name.
    pub fn device_index(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn device(&self, index: usize) -> &D {
        &self.devices[index]
    }

    pub fn device_mut(&mut self, index: usize) -> &mut D {
        &mut self.devices[index]
    }

    pub fn devices(&self) -> &[D] {
        &self.devices
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Split borrow for the step loop: node table and devices at once.
    pub fn split_mut(&mut self) -> (&mut [Node], &mut [D]) {
        (&mut self.nodes, &mut self.devices)
    }

    /// Create a fresh unconnected node.
    pub fn create_node(&mut self) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(Node::new(id));
        id
    }

    /// Node a pin is attached to, `None` while floating.
    pub fn pin(&self, p: PinRef) -> Option<NodeId> {
        self.devices[p.device].pin_node(p.pin)
    }

    /// Attach a pin directly to a node.
    pub fn attach(&mut self, p: PinRef, node: NodeId) {
        self.devices[p.device].set_pin_node(p.pin, node);
    }

    /// Connect two pins. Creates a shared node when both are floating,
    /// adopts the existing node when one is, and fuses the two nodes when
    /// both already have one. Ground always survives a fuse.
    pub fn connect(&mut self, a: PinRef, b: PinRef) {
        match (self.pin(a), self.pin(b)) {
            (None, None) => {
                let node = self.create_node();
                self.attach(a, node);
                self.attach(b, node);
            }
            (Some(node), None) => self.attach(b, node),
            (None, Some(node)) => self.attach(a, node),
            (Some(na), Some(nb)) if na == nb => {}
            (Some(na), Some(nb)) => {
                let (keep, lose) = if nb.is_ground() { (nb, na) } else { (na, nb) };
                self.fuse(keep, lose);
            }
        }
    }

    /// Re-point every pin on `lose` to `keep` and retire `lose`.
    fn fuse(&mut self, keep: NodeId, lose: NodeId) {
        for device in &mut self.devices {
            for pin in 0..device.pin_count() {
                if device.pin_node(pin) == Some(lose) {
                    device.set_pin_node(pin, keep);
                }
            }
        }
        self.nodes[lose.index()].alive = false;
    }

    /// Count of live non-ground nodes.
    pub fn node_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.alive && !n.is_ground())
            .count()
    }

    /// Finalise the topology: validate devices, check that no pin is
    /// floating and no node dangles, then assign MNA rows — node rows
    /// first, device branch rows after.
    pub fn assign_rows(&mut self) -> Result<Dims> {
        let mut referenced = vec![false; self.nodes.len()];
        for device in &self.devices {
            device.validate()?;
            for pin in 0..device.pin_count() {
                match device.pin_node(pin) {
                    Some(node) => referenced[node.index()] = true,
                    None => {
                        return Err(Error::FloatingPin {
                            device: device.name().to_string(),
                            pin,
                        })
                    }
                }
            }
        }

        let mut row = 0;
        for node in &mut self.nodes {
            node.row = None;
            if node.is_ground() || !node.alive {
                continue;
            }
            if !referenced[node.id().index()] {
                return Err(Error::DisconnectedNode(node.id().as_u32()));
            }
            node.row = Some(row);
            row += 1;
        }
        let node_rows = row;

        for device in &mut self.devices {
            let reserved = device.reserved_rows(&self.nodes);
            if reserved > 0 {
                device.set_first_reserved_row(row);
                row += reserved;
            }
        }

        Ok(Dims {
            node_rows,
            size: row,
        })
    }
}
