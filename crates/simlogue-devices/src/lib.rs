//! Device models for the SimLogue circuit simulator.
//!
//! Each device kind is its own struct implementing
//! [`simlogue_core::Element`]; the [`Device`] enum is the closed union the
//! rest of the simulator stores and dispatches over.

pub mod opamp;
pub mod passive;
pub mod sources;
pub mod switch;

pub use opamp::OpAmp;
pub use passive::{Capacitor, Inductor, Resistor};
pub use sources::{
    AcVoltageSource, AcVoltageSource2, CurrentSource, VoltageSource, VoltageSource2,
};
pub use switch::Switch;

use nalgebra::DVector;
use simlogue_core::mna::CscMatrix;
use simlogue_core::{Element, Node, NodeId, StepContext, StepEvent};

/// The ground pseudo-device: one pin, forced onto the ground node,
/// contributing no rows and no stamps.
#[derive(Debug, Clone)]
pub struct Ground {
    name: String,
    pins: [Option<NodeId>; 1],
}

impl Ground {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pins: [None],
        }
    }
}

impl Element for Ground {
    fn name(&self) -> &str {
        &self.name
    }

    fn pin_count(&self) -> usize {
        1
    }

    fn pin_node(&self, pin: usize) -> Option<NodeId> {
        self.pins[pin]
    }

    fn set_pin_node(&mut self, pin: usize, node: NodeId) {
        self.pins[pin] = Some(node);
    }

    fn structural_entries(&self, _nodes: &[Node], _entries: &mut Vec<(usize, usize)>) {}

    fn stamp_matrix(&mut self, _matrix: &mut CscMatrix, _nodes: &[Node], _ctx: &StepContext) {}

    fn stamp_rhs(&self, _rhs: &mut DVector<f64>, _nodes: &[Node], _ctx: &StepContext) {}

    fn current_between(&self, _a: usize, _b: usize) -> f64 {
        0.0
    }
}

/// The closed set of device kinds a circuit can contain.
#[derive(Debug, Clone)]
pub enum Device {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    CurrentSource(CurrentSource),
    VoltageSource(VoltageSource),
    VoltageSource2(VoltageSource2),
    AcVoltageSource(AcVoltageSource),
    AcVoltageSource2(AcVoltageSource2),
    Switch(Switch),
    OpAmp(OpAmp),
    Ground(Ground),
}

impl Device {
    /// Access the switch behind this device, for schedule commands.
    pub fn as_switch_mut(&mut self) -> Option<&mut Switch> {
        match self {
            Device::Switch(sw) => Some(sw),
            _ => None,
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            Device::Resistor($inner) => $body,
            Device::Capacitor($inner) => $body,
            Device::Inductor($inner) => $body,
            Device::CurrentSource($inner) => $body,
            Device::VoltageSource($inner) => $body,
            Device::VoltageSource2($inner) => $body,
            Device::AcVoltageSource($inner) => $body,
            Device::AcVoltageSource2($inner) => $body,
            Device::Switch($inner) => $body,
            Device::OpAmp($inner) => $body,
            Device::Ground($inner) => $body,
        }
    };
}

impl Element for Device {
    fn name(&self) -> &str {
        dispatch!(self, d => d.name())
    }

    fn pin_count(&self) -> usize {
        dispatch!(self, d => d.pin_count())
    }

    fn pin_node(&self, pin: usize) -> Option<NodeId> {
        dispatch!(self, d => d.pin_node(pin))
    }

    fn set_pin_node(&mut self, pin: usize, node: NodeId) {
        dispatch!(self, d => d.set_pin_node(pin, node))
    }

    fn pin_named(&self, name: &str) -> Option<usize> {
        dispatch!(self, d => d.pin_named(name))
    }

    fn validate(&self) -> simlogue_core::Result<()> {
        dispatch!(self, d => d.validate())
    }

    fn reserved_rows(&self, nodes: &[Node]) -> usize {
        dispatch!(self, d => d.reserved_rows(nodes))
    }

    fn set_first_reserved_row(&mut self, row: usize) {
        dispatch!(self, d => d.set_first_reserved_row(row))
    }

    fn first_reserved_row(&self) -> Option<usize> {
        dispatch!(self, d => d.first_reserved_row())
    }

    fn structural_entries(&self, nodes: &[Node], entries: &mut Vec<(usize, usize)>) {
        dispatch!(self, d => d.structural_entries(nodes, entries))
    }

    fn stamp_matrix(&mut self, matrix: &mut CscMatrix, nodes: &[Node], ctx: &StepContext) {
        dispatch!(self, d => d.stamp_matrix(matrix, nodes, ctx))
    }

    fn stamp_rhs(&self, rhs: &mut DVector<f64>, nodes: &[Node], ctx: &StepContext) {
        dispatch!(self, d => d.stamp_rhs(rhs, nodes, ctx))
    }

    fn observe(&mut self, solution: &DVector<f64>, nodes: &[Node]) {
        dispatch!(self, d => d.observe(solution, nodes))
    }

    fn advance(&mut self, nodes: &[Node], ctx: &StepContext) -> StepEvent {
        dispatch!(self, d => d.advance(nodes, ctx))
    }

    fn current_between(&self, a: usize, b: usize) -> f64 {
        dispatch!(self, d => d.current_between(a, b))
    }
}

macro_rules! device_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Device {
                fn from(inner: $variant) -> Self {
                    Device::$variant(inner)
                }
            }
        )*
    };
}

device_from!(
    Resistor,
    Capacitor,
    Inductor,
    CurrentSource,
    VoltageSource,
    VoltageSource2,
    AcVoltageSource,
    AcVoltageSource2,
    Switch,
    OpAmp,
    Ground,
);
