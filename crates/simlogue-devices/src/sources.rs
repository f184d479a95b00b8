//! Independent source models: current source, DC and AC voltage sources.
//!
//! Voltage sources come in a one-pin form (potential relative to ground)
//! and a two-pin form. Each reserves a branch row carrying the
//! `V(a) − V(b) = V_source` constraint; the solved branch variable is the
//! source current. A source whose every pin sits on ground degenerates to
//! nothing and reserves no row.

use std::f64::consts::TAU;

use nalgebra::DVector;

use simlogue_core::mna::CscMatrix;
use simlogue_core::{row_of, Element, Node, NodeId, StepContext};

use crate::passive::signed;

/// True when every attached pin of the device sits on the ground node.
pub(crate) fn fully_grounded(nodes: &[Node], pins: &[Option<NodeId>]) -> bool {
    pins.iter()
        .all(|pin| pin.map(|n| row_of(nodes, n).is_none()).unwrap_or(false))
}

/// Push the voltage-source coupling pattern for a branch row: `(a, r)`,
/// `(r, a)` positive side, `(b, r)`, `(r, b)` negative side.
fn source_pattern(
    nodes: &[Node],
    pins: &[Option<NodeId>],
    r: usize,
    entries: &mut Vec<(usize, usize)>,
) {
    for pin in pins {
        if let Some(row) = pin.and_then(|n| row_of(nodes, n)) {
            entries.push((row, r));
            entries.push((r, row));
        }
    }
}

/// Stamp the ±1 couplings of a voltage-source branch row.
fn stamp_source(
    matrix: &mut CscMatrix,
    nodes: &[Node],
    pins: &[Option<NodeId>],
    r: usize,
) {
    let signs = [1.0, -1.0];
    for (pin, sign) in pins.iter().zip(signs) {
        if let Some(row) = pin.and_then(|n| row_of(nodes, n)) {
            matrix.add(row, r, sign);
            matrix.add(r, row, sign);
        }
    }
}

/// An independent current source driving current from pin 0 to pin 1.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    name: String,
    pins: [Option<NodeId>; 2],
    current: f64,
}

impl CurrentSource {
    pub fn new(name: impl Into<String>, current: f64) -> Self {
        Self {
            name: name.into(),
            pins: [None, None],
            current,
        }
    }
}

impl Element for CurrentSource {
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

    fn structural_entries(&self, _nodes: &[Node], _entries: &mut Vec<(usize, usize)>) {}

    fn stamp_matrix(&mut self, _matrix: &mut CscMatrix, _nodes: &[Node], _ctx: &StepContext) {}

    fn stamp_rhs(&self, rhs: &mut DVector<f64>, nodes: &[Node], _ctx: &StepContext) {
        if let Some(a) = self.pins[0].and_then(|n| row_of(nodes, n)) {
            rhs[a] -= self.current;
        }
        if let Some(b) = self.pins[1].and_then(|n| row_of(nodes, n)) {
            rhs[b] += self.current;
        }
    }

    fn current_between(&self, a: usize, _b: usize) -> f64 {
        signed(a, self.current)
    }
}

/// A one-pin DC voltage source: forces its node to `voltage` relative to
/// ground.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    name: String,
    pins: [Option<NodeId>; 1],
    voltage: f64,
    branch_row: Option<usize>,
    current: f64,
}

impl VoltageSource {
    pub fn new(name: impl Into<String>, voltage: f64) -> Self {
        Self {
            name: name.into(),
            pins: [None],
            voltage,
            branch_row: None,
            current: 0.0,
        }
    }

    pub fn voltage(&self) -> f64 {
        self.voltage
    }
}

impl Element for VoltageSource {
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

    fn reserved_rows(&self, nodes: &[Node]) -> usize {
        if fully_grounded(nodes, &self.pins) {
            0
        } else {
            1
        }
    }

    fn set_first_reserved_row(&mut self, row: usize) {
        self.branch_row = Some(row);
    }

    fn first_reserved_row(&self) -> Option<usize> {
        self.branch_row
    }

    fn structural_entries(&self, nodes: &[Node], entries: &mut Vec<(usize, usize)>) {
        if let Some(r) = self.branch_row {
            source_pattern(nodes, &self.pins, r, entries);
        }
    }

    fn stamp_matrix(&mut self, matrix: &mut CscMatrix, nodes: &[Node], _ctx: &StepContext) {
        if let Some(r) = self.branch_row {
            stamp_source(matrix, nodes, &self.pins, r);
        }
    }

    fn stamp_rhs(&self, rhs: &mut DVector<f64>, _nodes: &[Node], _ctx: &StepContext) {
        if let Some(r) = self.branch_row {
            rhs[r] += self.voltage;
        }
    }

    fn observe(&mut self, solution: &DVector<f64>, _nodes: &[Node]) {
        if let Some(r) = self.branch_row {
            self.current = solution[r];
        }
    }

    fn current_between(&self, _a: usize, _b: usize) -> f64 {
        self.current
    }
}

/// A two-pin DC voltage source enforcing `V(pin0) − V(pin1) = voltage`.
#[derive(Debug, Clone)]
pub struct VoltageSource2 {
    name: String,
    pins: [Option<NodeId>; 2],
    voltage: f64,
    branch_row: Option<usize>,
    current: f64,
}

impl VoltageSource2 {
    pub fn new(name: impl Into<String>, voltage: f64) -> Self {
        Self {
            name: name.into(),
            pins: [None, None],
            voltage,
            branch_row: None,
            current: 0.0,
        }
    }

    pub fn voltage(&self) -> f64 {
        self.voltage
    }
}

impl Element for VoltageSource2 {
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

    fn reserved_rows(&self, nodes: &[Node]) -> usize {
        if fully_grounded(nodes, &self.pins) {
            0
        } else {
            1
        }
    }

    fn set_first_reserved_row(&mut self, row: usize) {
        self.branch_row = Some(row);
    }

    fn first_reserved_row(&self) -> Option<usize> {
        self.branch_row
    }

    fn structural_entries(&self, nodes: &[Node], entries: &mut Vec<(usize, usize)>) {
        if let Some(r) = self.branch_row {
            source_pattern(nodes, &self.pins, r, entries);
        }
    }

    fn stamp_matrix(&mut self, matrix: &mut CscMatrix, nodes: &[Node], _ctx: &StepContext) {
        if let Some(r) = self.branch_row {
            stamp_source(matrix, nodes, &self.pins, r);
        }
    }

    fn stamp_rhs(&self, rhs: &mut DVector<f64>, _nodes: &[Node], _ctx: &StepContext) {
        if let Some(r) = self.branch_row {
            rhs[r] += self.voltage;
        }
    }

    fn observe(&mut self, solution: &DVector<f64>, _nodes: &[Node]) {
        if let Some(r) = self.branch_row {
            self.current = solution[r];
        }
    }

    fn current_between(&self, a: usize, _b: usize) -> f64 {
        signed(a, self.current)
    }
}

/// Sinusoidal voltage state shared by the AC source variants.
#[derive(Debug, Clone)]
struct AcState {
    amplitude: f64,
    angular_vel: f64,
    phase: f64,
    /// Source value for the step about to be solved.
    voltage: f64,
}

impl AcState {
    fn new(frequency: f64, amplitude: f64, phase: f64) -> Self {
        Self {
            amplitude,
            angular_vel: TAU * frequency,
            phase,
            voltage: amplitude * phase.sin(),
        }
    }

    /// Value for the coming step at `time + dt`.
    fn advance(&mut self, ctx: &StepContext) {
        let t_next = ctx.time + ctx.dt;
        self.voltage = self.amplitude * (self.angular_vel * t_next + self.phase).sin();
    }
}

/// A one-pin AC voltage source: `V(pin) = A·sin(ωt + φ)` against ground.
#[derive(Debug, Clone)]
pub struct AcVoltageSource {
    name: String,
    pins: [Option<NodeId>; 1],
    state: AcState,
    branch_row: Option<usize>,
    current: f64,
}

impl AcVoltageSource {
    pub fn new(name: impl Into<String>, frequency: f64, amplitude: f64, phase: f64) -> Self {
        Self {
            name: name.into(),
            pins: [None],
            state: AcState::new(frequency, amplitude, phase),
            branch_row: None,
            current: 0.0,
        }
    }
}

impl Element for AcVoltageSource {
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

    fn reserved_rows(&self, nodes: &[Node]) -> usize {
        if fully_grounded(nodes, &self.pins) {
            0
        } else {
            1
        }
    }

    fn set_first_reserved_row(&mut self, row: usize) {
        self.branch_row = Some(row);
    }

    fn first_reserved_row(&self) -> Option<usize> {
        self.branch_row
    }

    fn structural_entries(&self, nodes: &[Node], entries: &mut Vec<(usize, usize)>) {
        if let Some(r) = self.branch_row {
            source_pattern(nodes, &self.pins, r, entries);
        }
    }

    fn stamp_matrix(&mut self, matrix: &mut CscMatrix, nodes: &[Node], _ctx: &StepContext) {
        if let Some(r) = self.branch_row {
            stamp_source(matrix, nodes, &self.pins, r);
        }
    }

    fn stamp_rhs(&self, rhs: &mut DVector<f64>, _nodes: &[Node], _ctx: &StepContext) {
        if let Some(r) = self.branch_row {
            rhs[r] += self.state.voltage;
        }
    }

    fn observe(&mut self, solution: &DVector<f64>, _nodes: &[Node]) {
        if let Some(r) = self.branch_row {
            self.current = solution[r];
        }
    }

    fn advance(&mut self, _nodes: &[Node], ctx: &StepContext) -> simlogue_core::StepEvent {
        self.state.advance(ctx);
        simlogue_core::StepEvent::None
    }

    fn current_between(&self, _a: usize, _b: usize) -> f64 {
        self.current
    }
}

/// A two-pin AC voltage source enforcing `V(pin0) − V(pin1) = A·sin(ωt + φ)`.
#[derive(Debug, Clone)]
pub struct AcVoltageSource2 {
    name: String,
    pins: [Option<NodeId>; 2],
    state: AcState,
    branch_row: Option<usize>,
    current: f64,
}

impl AcVoltageSource2 {
    pub fn new(name: impl Into<String>, frequency: f64, amplitude: f64, phase: f64) -> Self {
        Self {
            name: name.into(),
            pins: [None, None],
            state: AcState::new(frequency, amplitude, phase),
            branch_row: None,
            current: 0.0,
        }
    }
}

impl Element for AcVoltageSource2 {
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

    fn reserved_rows(&self, nodes: &[Node]) -> usize {
        if fully_grounded(nodes, &self.pins) {
            0
        } else {
            1
        }
    }

    fn set_first_reserved_row(&mut self, row: usize) {
        self.branch_row = Some(row);
    }

    fn first_reserved_row(&self) -> Option<usize> {
        self.branch_row
    }

    fn structural_entries(&self, nodes: &[Node], entries: &mut Vec<(usize, usize)>) {
        if let Some(r) = self.branch_row {
            source_pattern(nodes, &self.pins, r, entries);
        }
    }

    fn stamp_matrix(&mut self, matrix: &mut CscMatrix, nodes: &[Node], _ctx: &StepContext) {
        if let Some(r) = self.branch_row {
            stamp_source(matrix, nodes, &self.pins, r);
        }
    }

    fn stamp_rhs(&self, rhs: &mut DVector<f64>, _nodes: &[Node], _ctx: &StepContext) {
        if let Some(r) = self.branch_row {
            rhs[r] += self.state.voltage;
        }
    }

    fn observe(&mut self, solution: &DVector<f64>, _nodes: &[Node]) {
        if let Some(r) = self.branch_row {
            self.current = solution[r];
        }
    }

    fn advance(&mut self, _nodes: &[Node], ctx: &StepContext) -> simlogue_core::StepEvent {
        self.state.advance(ctx);
        simlogue_core::StepEvent::None
    }

    fn current_between(&self, a: usize, _b: usize) -> f64 {
        signed(a, self.current)
    }
}
