//! Passive device models: Resistor, Capacitor, Inductor.

use nalgebra::DVector;

use simlogue_core::mna::CscMatrix;
use simlogue_core::{row_of, voltage_of, Element, Error, Node, NodeId, StepContext};

/// Current through a two-pin device, signed from pin `a` to pin `b` given
/// the pin-0 -> pin-1 reference current.
pub(crate) fn signed(a: usize, i: f64) -> f64 {
    if a == 0 {
        i
    } else {
        -i
    }
}

/// Push the four-entry conductance pattern for a two-pin device, dropping
/// any position that refers to ground.
pub(crate) fn conductance_pattern(
    nodes: &[Node],
    a: Option<NodeId>,
    b: Option<NodeId>,
    entries: &mut Vec<(usize, usize)>,
) {
    let ra = a.and_then(|n| row_of(nodes, n));
    let rb = b.and_then(|n| row_of(nodes, n));
    if let Some(i) = ra {
        entries.push((i, i));
    }
    if let Some(j) = rb {
        entries.push((j, j));
    }
    if let (Some(i), Some(j)) = (ra, rb) {
        entries.push((i, j));
        entries.push((j, i));
    }
}

/// Stamp a conductance `g` between the rows of two nodes.
pub(crate) fn stamp_conductance(
    matrix: &mut CscMatrix,
    nodes: &[Node],
    a: Option<NodeId>,
    b: Option<NodeId>,
    g: f64,
) {
    let ra = a.and_then(|n| row_of(nodes, n));
    let rb = b.and_then(|n| row_of(nodes, n));
    if let Some(i) = ra {
        matrix.add(i, i, g);
    }
    if let Some(j) = rb {
        matrix.add(j, j, g);
    }
    if let (Some(i), Some(j)) = (ra, rb) {
        matrix.add(i, j, -g);
        matrix.add(j, i, -g);
    }
}

/// An ideal resistor.
#[derive(Debug, Clone)]
pub struct Resistor {
    name: String,
    pins: [Option<NodeId>; 2],
    resistance: f64,
    conductance: f64,
    last_i: f64,
}

impl Resistor {
    pub fn new(name: impl Into<String>, resistance: f64) -> Self {
        Self {
            name: name.into(),
            pins: [None, None],
            resistance,
            conductance: 0.0,
            last_i: 0.0,
        }
    }

    pub fn resistance(&self) -> f64 {
        self.resistance
    }
}

impl Element for Resistor {
    fn name(&self) -> &str {
        &self.name
    }

    fn pin_count(&self) -> usize {
        2
    }

    fn pin_node(&self, pin: usize) -> Option<NodeId> {
        self.pins[pin]
    }

    fn set_pin_node(&mut self, pin: usize, node: NodeId) {
        self.pins[pin] = Some(node);
    }

    fn validate(&self) -> simlogue_core::Result<()> {
        if !self.resistance.is_finite() || self.resistance == 0.0 {
            return Err(Error::NumericOverflow {
                device: self.name.clone(),
                detail: format!("resistance {} has no finite conductance", self.resistance),
            });
        }
        Ok(())
    }

    fn structural_entries(&self, nodes: &[Node], entries: &mut Vec<(usize, usize)>) {
        conductance_pattern(nodes, self.pins[0], self.pins[1], entries);
    }

    fn stamp_matrix(&mut self, matrix: &mut CscMatrix, nodes: &[Node], _ctx: &StepContext) {
        self.conductance = 1.0 / self.resistance;
        stamp_conductance(matrix, nodes, self.pins[0], self.pins[1], self.conductance);
    }

    fn stamp_rhs(&self, _rhs: &mut DVector<f64>, _nodes: &[Node], _ctx: &StepContext) {}

    fn observe(&mut self, _solution: &DVector<f64>, nodes: &[Node]) {
        let va = self.pins[0].map(|n| voltage_of(nodes, n)).unwrap_or(0.0);
        let vb = self.pins[1].map(|n| voltage_of(nodes, n)).unwrap_or(0.0);
        self.last_i = self.conductance * (va - vb);
    }

    fn current_between(&self, a: usize, _b: usize) -> f64 {
        signed(a, self.last_i)
    }
}

/// A capacitor, discretised with the backward-Euler companion model:
/// an admittance `C/Δt` in parallel with a history current `C/Δt · V_prev`.
#[derive(Debug, Clone)]
pub struct Capacitor {
    name: String,
    pins: [Option<NodeId>; 2],
    capacitance: f64,
    admittance: f64,
    last_v: f64,
    last_i: f64,
}

impl Capacitor {
    pub fn new(name: impl Into<String>, capacitance: f64) -> Self {
        Self {
            name: name.into(),
            pins: [None, None],
            capacitance,
            admittance: 0.0,
            last_v: 0.0,
            last_i: 0.0,
        }
    }

    fn voltage(&self, nodes: &[Node]) -> f64 {
        let va = self.pins[0].map(|n| voltage_of(nodes, n)).unwrap_or(0.0);
        let vb = self.pins[1].map(|n| voltage_of(nodes, n)).unwrap_or(0.0);
        va - vb
    }
}

impl Element for Capacitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn pin_count(&self) -> usize {
        2
    }

    fn pin_node(&self, pin: usize) -> Option<NodeId> {
        self.pins[pin]
    }

    fn set_pin_node(&mut self, pin: usize, node: NodeId) {
        self.pins[pin] = Some(node);
    }

    fn validate(&self) -> simlogue_core::Result<()> {
        if !self.capacitance.is_finite() || self.capacitance < 0.0 {
            return Err(Error::NumericOverflow {
                device: self.name.clone(),
                detail: format!("capacitance {} is not representable", self.capacitance),
            });
        }
        Ok(())
    }

    fn structural_entries(&self, nodes: &[Node], entries: &mut Vec<(usize, usize)>) {
        conductance_pattern(nodes, self.pins[0], self.pins[1], entries);
    }

    fn stamp_matrix(&mut self, matrix: &mut CscMatrix, nodes: &[Node], ctx: &StepContext) {
        self.admittance = self.capacitance * ctx.inv_dt;
        stamp_conductance(matrix, nodes, self.pins[0], self.pins[1], self.admittance);
    }

    fn stamp_rhs(&self, rhs: &mut DVector<f64>, nodes: &[Node], _ctx: &StepContext) {
        let history = self.admittance * self.last_v;
        if let Some(i) = self.pins[0].and_then(|n| row_of(nodes, n)) {
            rhs[i] += history;
        }
        if let Some(j) = self.pins[1].and_then(|n| row_of(nodes, n)) {
            rhs[j] -= history;
        }
    }

    fn observe(&mut self, _solution: &DVector<f64>, nodes: &[Node]) {
        self.last_i = self.admittance * (self.voltage(nodes) - self.last_v);
    }

    fn advance(&mut self, nodes: &[Node], _ctx: &StepContext) -> simlogue_core::StepEvent {
        self.last_v = self.voltage(nodes);
        simlogue_core::StepEvent::None
    }

    fn current_between(&self, a: usize, _b: usize) -> f64 {
        signed(a, self.last_i)
    }
}

/// An inductor. Keeps its own branch row carrying the discretised
/// `V(a) − V(b) − (L/Δt)·I = −(L/Δt)·I_prev` equation.
#[derive(Debug, Clone)]
pub struct Inductor {
    name: String,
    pins: [Option<NodeId>; 2],
    inductance: f64,
    branch_row: Option<usize>,
    last_i: f64,
}

impl Inductor {
    pub fn new(name: impl Into<String>, inductance: f64) -> Self {
        Self {
            name: name.into(),
            pins: [None, None],
            inductance,
            branch_row: None,
            last_i: 0.0,
        }
    }
}

impl Element for Inductor {
    fn name(&self) -> &str {
        &self.name
    }

    fn pin_count(&self) -> usize {
        2
    }

    fn pin_node(&self, pin: usize) -> Option<NodeId> {
        self.pins[pin]
    }

    fn set_pin_node(&mut self, pin: usize, node: NodeId) {
        self.pins[pin] = Some(node);
    }

    fn validate(&self) -> simlogue_core::Result<()> {
        if !self.inductance.is_finite() || self.inductance < 0.0 {
            return Err(Error::NumericOverflow {
                device: self.name.clone(),
                detail: format!("inductance {} is not representable", self.inductance),
            });
        }
        Ok(())
    }

    fn reserved_rows(&self, _nodes: &[Node]) -> usize {
        1
    }

    fn set_first_reserved_row(&mut self, row: usize) {
        self.branch_row = Some(row);
    }

    fn first_reserved_row(&self) -> Option<usize> {
        self.branch_row
    }

    fn structural_entries(&self, nodes: &[Node], entries: &mut Vec<(usize, usize)>) {
        let r = self.branch_row.expect("assembled");
        entries.push((r, r));
        for pin in self.pins {
            if let Some(row) = pin.and_then(|n| row_of(nodes, n)) {
                entries.push((row, r));
                entries.push((r, row));
            }
        }
    }

    fn stamp_matrix(&mut self, matrix: &mut CscMatrix, nodes: &[Node], ctx: &StepContext) {
        let r = self.branch_row.expect("assembled");
        matrix.add(r, r, -self.inductance * ctx.inv_dt);
        if let Some(a) = self.pins[0].and_then(|n| row_of(nodes, n)) {
            matrix.add(a, r, 1.0);
            matrix.add(r, a, 1.0);
        }
        if let Some(b) = self.pins[1].and_then(|n| row_of(nodes, n)) {
            matrix.add(b, r, -1.0);
            matrix.add(r, b, -1.0);
        }
    }

    fn stamp_rhs(&self, rhs: &mut DVector<f64>, _nodes: &[Node], ctx: &StepContext) {
        let r = self.branch_row.expect("assembled");
        rhs[r] -= self.inductance * ctx.inv_dt * self.last_i;
    }

    fn observe(&mut self, solution: &DVector<f64>, _nodes: &[Node]) {
        let r = self.branch_row.expect("assembled");
        self.last_i = solution[r];
    }

    fn current_between(&self, a: usize, _b: usize) -> f64 {
        signed(a, self.last_i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Device;
    use simlogue_core::{Circuit, PinRef};

    fn ctx() -> StepContext {
        StepContext::new(0.0, 1e-3)
    }

    #[test]
    fn test_resistor_stamp() {
        let mut circuit: Circuit<Device> = Circuit::new();
        let r = circuit
            .add_device(Resistor::new("R1", 1000.0).into())
            .unwrap();
        let n1 = circuit.create_node();
        let n2 = circuit.create_node();
        circuit.attach(PinRef::new(r, 0), n1);
        circuit.attach(PinRef::new(r, 1), n2);
        let dims = circuit.assign_rows().unwrap();
        assert_eq!(dims.size, 2);

        let mut entries = Vec::new();
        let (nodes, devices) = circuit.split_mut();
        devices[r].structural_entries(nodes, &mut entries);
        let mut matrix = CscMatrix::from_pattern(dims.size, &entries);
        devices[r].stamp_matrix(&mut matrix, nodes, &ctx());

        let g = 1e-3;
        assert!((matrix.get(0, 0) - g).abs() < 1e-15);
        assert!((matrix.get(1, 1) - g).abs() < 1e-15);
        assert!((matrix.get(0, 1) + g).abs() < 1e-15);
        assert!((matrix.get(1, 0) + g).abs() < 1e-15);
    }

    #[test]
    fn test_resistor_to_ground_stamps_diagonal_only() {
        let mut circuit: Circuit<Device> = Circuit::new();
        let r = circuit
            .add_device(Resistor::new("R1", 100.0).into())
            .unwrap();
        let n1 = circuit.create_node();
        circuit.attach(PinRef::new(r, 0), n1);
        circuit.attach(PinRef::new(r, 1), circuit.ground());
        let dims = circuit.assign_rows().unwrap();
        assert_eq!(dims.size, 1);

        let mut entries = Vec::new();
        let (nodes, devices) = circuit.split_mut();
        devices[r].structural_entries(nodes, &mut entries);
        assert_eq!(entries, vec![(0, 0)]);

        let mut matrix = CscMatrix::from_pattern(1, &entries);
        devices[r].stamp_matrix(&mut matrix, nodes, &ctx());
        assert!((matrix.get(0, 0) - 0.01).abs() < 1e-15);
    }

    #[test]
    fn test_zero_resistance_fails_validation() {
        let mut circuit: Circuit<Device> = Circuit::new();
        let r = circuit.add_device(Resistor::new("R1", 0.0).into()).unwrap();
        let n1 = circuit.create_node();
        circuit.attach(PinRef::new(r, 0), n1);
        circuit.attach(PinRef::new(r, 1), circuit.ground());

        let err = circuit.assign_rows().unwrap_err();
        assert!(matches!(err, Error::NumericOverflow { .. }));
    }

    #[test]
    fn test_capacitor_companion_stamp_and_history() {
        let dt = 1e-3;
        let mut circuit: Circuit<Device> = Circuit::new();
        let c = circuit
            .add_device(Capacitor::new("C1", 1e-6).into())
            .unwrap();
        let n1 = circuit.create_node();
        circuit.attach(PinRef::new(c, 0), n1);
        circuit.attach(PinRef::new(c, 1), circuit.ground());
        let dims = circuit.assign_rows().unwrap();

        let step = StepContext::new(0.0, dt);
        let mut entries = Vec::new();
        let (nodes, devices) = circuit.split_mut();
        devices[c].structural_entries(nodes, &mut entries);
        let mut matrix = CscMatrix::from_pattern(dims.size, &entries);
        devices[c].stamp_matrix(&mut matrix, nodes, &step);

        let g = 1e-6 / dt;
        assert!((matrix.get(0, 0) - g).abs() < 1e-12);

        // No history yet: RHS term is zero.
        let mut rhs = DVector::zeros(dims.size);
        devices[c].stamp_rhs(&mut rhs, nodes, &step);
        assert_eq!(rhs[0], 0.0);

        // Solve put 2 V on the node; advance rolls the history forward.
        nodes[n1.index()].voltage = 2.0;
        let solution = DVector::from_element(dims.size, 2.0);
        devices[c].observe(&solution, nodes);
        assert!((devices[c].current_between(0, 1) - g * 2.0).abs() < 1e-12);
        devices[c].advance(nodes, &step);

        rhs.fill(0.0);
        devices[c].stamp_rhs(&mut rhs, nodes, &step);
        assert!((rhs[0] - g * 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_inductor_branch_stamp() {
        let dt = 1e-3;
        let mut circuit: Circuit<Device> = Circuit::new();
        let l = circuit.add_device(Inductor::new("L1", 0.5).into()).unwrap();
        let n1 = circuit.create_node();
        circuit.attach(PinRef::new(l, 0), n1);
        circuit.attach(PinRef::new(l, 1), circuit.ground());
        let dims = circuit.assign_rows().unwrap();
        assert_eq!(dims.size, 2);
        let r = 1;

        let step = StepContext::new(0.0, dt);
        let mut entries = Vec::new();
        let (nodes, devices) = circuit.split_mut();
        devices[l].structural_entries(nodes, &mut entries);
        let mut matrix = CscMatrix::from_pattern(dims.size, &entries);
        devices[l].stamp_matrix(&mut matrix, nodes, &step);

        assert_eq!(matrix.get(0, r), 1.0);
        assert_eq!(matrix.get(r, 0), 1.0);
        assert!((matrix.get(r, r) + 0.5 / dt).abs() < 1e-9);

        // History current shows up on the branch row RHS.
        let solution = {
            let mut x = DVector::zeros(dims.size);
            x[r] = 0.25;
            x
        };
        devices[l].observe(&solution, nodes);
        assert_eq!(devices[l].current_between(0, 1), 0.25);
        assert_eq!(devices[l].current_between(1, 0), -0.25);

        let mut rhs = DVector::zeros(dims.size);
        devices[l].stamp_rhs(&mut rhs, nodes, &step);
        assert!((rhs[r] + 0.5 / dt * 0.25).abs() < 1e-9);
    }
}
