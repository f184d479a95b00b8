//! Probes ("scopes"): named observers sampling a voltage difference or a
//! device current once per step.

use crate::circuit::PinRef;
use crate::element::Element;
use crate::node::{voltage_of, Node};

/// What a scope measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Voltage,
    Current,
}

/// A probe with an append-only sample buffer.
///
/// Voltage scopes record `V(a) − V(b)`; current scopes record the current
/// through the device between its two probed pins, so both pins must
/// belong to the same device.
#[derive(Debug, Clone)]
pub struct Scope {
    name: String,
    kind: ScopeKind,
    a: PinRef,
    b: PinRef,
    samples: Vec<(f64, f64)>,
}

impl Scope {
    pub fn voltage(name: impl Into<String>, a: PinRef, b: PinRef) -> Self {
        Self {
            name: name.into(),
            kind: ScopeKind::Voltage,
            a,
            b,
            samples: Vec::new(),
        }
    }

    pub fn current(name: impl Into<String>, a: PinRef, b: PinRef) -> Self {
        debug_assert_eq!(a.device, b.device, "current scopes probe one device");
        Self {
            name: name.into(),
            kind: ScopeKind::Current,
            a,
            b,
            samples: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Unit symbol of the sampled scalar.
    pub fn unit(&self) -> &'static str {
        match self.kind {
            ScopeKind::Voltage => "V",
            ScopeKind::Current => "A",
        }
    }

    /// Recorded (time, value) pairs, in step order.
    pub fn samples(&self) -> &[(f64, f64)] {
        &self.samples
    }

    /// Sample the probed quantity at the given time.
    pub fn record<D: Element>(&mut self, nodes: &[Node], devices: &[D], time: f64) {
        let value = match self.kind {
            ScopeKind::Voltage => {
                let va = self.pin_voltage(nodes, devices, self.a);
                let vb = self.pin_voltage(nodes, devices, self.b);
                va - vb
            }
            ScopeKind::Current => devices[self.a.device].current_between(self.a.pin, self.b.pin),
        };
        self.samples.push((time, value));
    }

    fn pin_voltage<D: Element>(&self, nodes: &[Node], devices: &[D], pin: PinRef) -> f64 {
        devices[pin.device]
            .pin_node(pin.pin)
            .map(|node| voltage_of(nodes, node))
            .unwrap_or(0.0)
    }
}
