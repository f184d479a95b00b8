//! Operational amplifier with saturation and hysteresis.
//!
//! Three pins: `plus` (non-inverting input), `minus` (inverting input),
//! `out`. In the linear region the branch row enforces
//! `V(out) = A·(V+ − V−)`; saturated, it pins the output to a rail and
//! the input couplings drop out of the stamped values. Mode changes are
//! decided after each solve, with a hysteresis band to stop chatter on
//! the saturation boundary.

use nalgebra::DVector;

use simlogue_core::mna::CscMatrix;
use simlogue_core::{row_of, voltage_of, Element, Node, NodeId, StepContext, StepEvent};

/// Dead band around the saturation boundaries (V).
const HYSTERESIS: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Linear,
    SatHigh,
    SatLow,
}

/// Pin indices of [`OpAmp`].
pub mod pins {
    pub const PLUS: usize = 0;
    pub const MINUS: usize = 1;
    pub const OUT: usize = 2;
}

/// An operational amplifier with output rails and finite open-loop gain.
#[derive(Debug, Clone)]
pub struct OpAmp {
    name: String,
    pins: [Option<NodeId>; 3],
    v_min: f64,
    v_max: f64,
    gain: f64,
    mode: Mode,
    branch_row: Option<usize>,
    current: f64,
}

impl OpAmp {
    pub fn new(name: impl Into<String>, v_min: f64, v_max: f64, gain: f64) -> Self {
        Self {
            name: name.into(),
            pins: [None, None, None],
            v_min,
            v_max,
            gain,
            mode: Mode::Linear,
            branch_row: None,
            current: 0.0,
        }
    }

    fn input_diff(&self, nodes: &[Node]) -> f64 {
        let vp = self.pins[pins::PLUS]
            .map(|n| voltage_of(nodes, n))
            .unwrap_or(0.0);
        let vm = self.pins[pins::MINUS]
            .map(|n| voltage_of(nodes, n))
            .unwrap_or(0.0);
        vp - vm
    }
}

impl Element for OpAmp {
    fn name(&self) -> &str {
        &self.name
    }

    fn pin_count(&self) -> usize {
        3
    }

    fn pin_node(&self, pin: usize) -> Option<NodeId> {
        self.pins[pin]
    }

    fn set_pin_node(&mut self, pin: usize, node: NodeId) {
        self.pins[pin] = Some(node);
    }

    fn pin_named(&self, name: &str) -> Option<usize> {
        match name {
            "plus" => Some(pins::PLUS),
            "minus" => Some(pins::MINUS),
            "out" => Some(pins::OUT),
            _ => None,
        }
    }

    fn validate(&self) -> simlogue_core::Result<()> {
        if !self.gain.is_finite() || self.gain == 0.0 {
            return Err(simlogue_core::Error::NumericOverflow {
                device: self.name.clone(),
                detail: format!("open-loop gain {} is degenerate", self.gain),
            });
        }
        Ok(())
    }

    fn reserved_rows(&self, nodes: &[Node]) -> usize {
        // An output pinned to ground leaves nothing to solve for.
        match self.pins[pins::OUT].map(|n| row_of(nodes, n)) {
            Some(Some(_)) => 1,
            _ => 0,
        }
    }

    fn set_first_reserved_row(&mut self, row: usize) {
        self.branch_row = Some(row);
    }

    fn first_reserved_row(&self) -> Option<usize> {
        self.branch_row
    }

    fn structural_entries(&self, nodes: &[Node], entries: &mut Vec<(usize, usize)>) {
        let Some(r) = self.branch_row else { return };
        let out = self.pins[pins::OUT]
            .and_then(|n| row_of(nodes, n))
            .expect("op-amp with a branch row has a non-ground output");
        entries.push((out, r));
        entries.push((r, out));
        // Input couplings exist only in linear mode but stay in the
        // pattern so a mode change never alters it.
        for input in [pins::PLUS, pins::MINUS] {
            if let Some(row) = self.pins[input].and_then(|n| row_of(nodes, n)) {
                entries.push((r, row));
            }
        }
    }

    fn stamp_matrix(&mut self, matrix: &mut CscMatrix, nodes: &[Node], _ctx: &StepContext) {
        let Some(r) = self.branch_row else { return };
        let out = self.pins[pins::OUT]
            .and_then(|n| row_of(nodes, n))
            .expect("op-amp with a branch row has a non-ground output");
        matrix.add(out, r, 1.0);
        matrix.add(r, out, 1.0);
        if self.mode == Mode::Linear {
            if let Some(plus) = self.pins[pins::PLUS].and_then(|n| row_of(nodes, n)) {
                matrix.add(r, plus, -self.gain);
            }
            if let Some(minus) = self.pins[pins::MINUS].and_then(|n| row_of(nodes, n)) {
                matrix.add(r, minus, self.gain);
            }
        }
    }

    fn stamp_rhs(&self, rhs: &mut DVector<f64>, _nodes: &[Node], _ctx: &StepContext) {
        let Some(r) = self.branch_row else { return };
        match self.mode {
            Mode::Linear => {}
            Mode::SatHigh => rhs[r] += self.v_max,
            Mode::SatLow => rhs[r] += self.v_min,
        }
    }

    fn observe(&mut self, solution: &DVector<f64>, _nodes: &[Node]) {
        if let Some(r) = self.branch_row {
            self.current = solution[r];
        }
    }

    fn advance(&mut self, nodes: &[Node], _ctx: &StepContext) -> StepEvent {
        let diff = self.gain * self.input_diff(nodes);
        let next = match self.mode {
            Mode::Linear if diff > self.v_max + HYSTERESIS => Mode::SatHigh,
            Mode::Linear if diff < self.v_min - HYSTERESIS => Mode::SatLow,
            Mode::SatHigh if diff < self.v_max - HYSTERESIS => Mode::Linear,
            Mode::SatLow if diff > self.v_min + HYSTERESIS => Mode::Linear,
            mode => mode,
        };
        if next != self.mode {
            self.mode = next;
            StepEvent::Structural
        } else {
            StepEvent::None
        }
    }

    fn current_between(&self, a: usize, b: usize) -> f64 {
        // Only the output carries current; the inputs are ideal.
        if a == pins::OUT {
            self.current
        } else if b == pins::OUT {
            -self.current
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Device;
    use simlogue_core::{Circuit, PinRef};

    fn rigged() -> (Circuit<Device>, usize, NodeId, NodeId, NodeId) {
        let mut circuit: Circuit<Device> = Circuit::new();
        let op = circuit
            .add_device(OpAmp::new("OP1", -12.0, 12.0, 1e5).into())
            .unwrap();
        let plus = circuit.create_node();
        let minus = circuit.create_node();
        let out = circuit.create_node();
        circuit.attach(PinRef::new(op, pins::PLUS), plus);
        circuit.attach(PinRef::new(op, pins::MINUS), minus);
        circuit.attach(PinRef::new(op, pins::OUT), out);
        (circuit, op, plus, minus, out)
    }

    #[test]
    fn test_pin_names() {
        let op = OpAmp::new("OP1", -12.0, 12.0, 1e5);
        assert_eq!(op.pin_named("plus"), Some(0));
        assert_eq!(op.pin_named("minus"), Some(1));
        assert_eq!(op.pin_named("out"), Some(2));
        assert_eq!(op.pin_named("gate"), None);
    }

    #[test]
    fn test_linear_stamp() {
        let (mut circuit, op, ..) = rigged();
        let dims = circuit.assign_rows().unwrap();
        assert_eq!(dims.size, 4);
        let r = 3;

        let ctx = StepContext::new(0.0, 1e-3);
        let mut entries = Vec::new();
        let (nodes, devices) = circuit.split_mut();
        devices[op].structural_entries(nodes, &mut entries);
        let mut matrix = CscMatrix::from_pattern(dims.size, &entries);
        devices[op].stamp_matrix(&mut matrix, nodes, &ctx);

        assert_eq!(matrix.get(2, r), 1.0);
        assert_eq!(matrix.get(r, 2), 1.0);
        assert_eq!(matrix.get(r, 0), -1e5);
        assert_eq!(matrix.get(r, 1), 1e5);
    }

    #[test]
    fn test_saturation_and_recovery() {
        let (mut circuit, op, plus, ..) = rigged();
        circuit.assign_rows().unwrap();
        let ctx = StepContext::new(0.0, 1e-3);

        // Overdriven input saturates high.
        let (nodes, devices) = circuit.split_mut();
        nodes[plus.index()].voltage = 0.2;
        assert_eq!(devices[op].advance(nodes, &ctx), StepEvent::Structural);

        // Saturated: only the output coupling is stamped, the rail goes
        // to the RHS.
        let mut entries = Vec::new();
        devices[op].structural_entries(nodes, &mut entries);
        let mut matrix = CscMatrix::from_pattern(4, &entries);
        devices[op].stamp_matrix(&mut matrix, nodes, &ctx);
        assert_eq!(matrix.get(3, 0), 0.0);
        let mut rhs = DVector::zeros(4);
        devices[op].stamp_rhs(&mut rhs, nodes, &ctx);
        assert_eq!(rhs[3], 12.0);

        // Within the hysteresis band the mode holds.
        nodes[plus.index()].voltage = 12.0 / 1e5;
        assert_eq!(devices[op].advance(nodes, &ctx), StepEvent::None);

        // Back inside the linear region.
        nodes[plus.index()].voltage = 0.0;
        assert_eq!(devices[op].advance(nodes, &ctx), StepEvent::Structural);
        rhs.fill(0.0);
        devices[op].stamp_rhs(&mut rhs, nodes, &ctx);
        assert_eq!(rhs[3], 0.0);
    }

    #[test]
    fn test_saturates_low_on_negative_drive() {
        let (mut circuit, op, _, minus, _) = rigged();
        circuit.assign_rows().unwrap();
        let ctx = StepContext::new(0.0, 1e-3);

        let (nodes, devices) = circuit.split_mut();
        nodes[minus.index()].voltage = 0.2;
        assert_eq!(devices[op].advance(nodes, &ctx), StepEvent::Structural);

        let mut rhs = DVector::zeros(4);
        devices[op].stamp_rhs(&mut rhs, nodes, &ctx);
        assert_eq!(rhs[3], -12.0);
    }
}
