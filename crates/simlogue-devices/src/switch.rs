//! An ideal switch driven by scheduled `turn on` / `turn off` commands.
//!
//! Closed, the switch is a 0 V source: its branch row enforces
//! `V(a) = V(b)` and the branch variable is the contact current. Open, the
//! same row carries `I = 0` so the matrix pattern never changes across a
//! toggle; only the stamped values do, which is what makes a toggle a
//! plain re-stamp + re-factor event.

use nalgebra::DVector;

use simlogue_core::mna::CscMatrix;
use simlogue_core::{row_of, Element, Node, NodeId, StepContext, StepEvent};

use crate::passive::signed;
use crate::sources::fully_grounded;

#[derive(Debug, Clone, Copy)]
struct SwitchEvent {
    time: f64,
    closed: bool,
}

/// A two-pin ideal switch, open by default.
#[derive(Debug, Clone)]
pub struct Switch {
    name: String,
    pins: [Option<NodeId>; 2],
    closed: bool,
    branch_row: Option<usize>,
    current: f64,
    /// Pending toggles, ordered by time.
    schedule: Vec<SwitchEvent>,
}

impl Switch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pins: [None, None],
            closed: false,
            branch_row: None,
            current: 0.0,
            schedule: Vec::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Schedule `turn on <name> at <time>`.
    pub fn schedule_on(&mut self, time: f64) {
        self.schedule(time, true);
    }

    /// Schedule `turn off <name> at <time>`.
    pub fn schedule_off(&mut self, time: f64) {
        self.schedule(time, false);
    }

    fn schedule(&mut self, time: f64, closed: bool) {
        if time <= 0.0 {
            // Commands at or before t = 0 define the initial state.
            self.closed = closed;
            return;
        }
        let at = self
            .schedule
            .partition_point(|event| event.time <= time);
        self.schedule.insert(at, SwitchEvent { time, closed });
    }

    /// Apply every event due by the coming sample time. An event fires on
    /// the step whose sample time is nearest its scheduled time.
    fn drain_due(&mut self, ctx: &StepContext) -> bool {
        let next_time = ctx.time + ctx.dt;
        let mut changed = false;
        while let Some(event) = self.schedule.first() {
            if event.time > next_time + 0.5 * ctx.dt {
                break;
            }
            if self.closed != event.closed {
                self.closed = event.closed;
                changed = true;
            }
            self.schedule.remove(0);
        }
        changed
    }
}

impl Element for Switch {
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
        let Some(r) = self.branch_row else { return };
        // Union over both modes: couplings plus the open-mode diagonal.
        entries.push((r, r));
        for pin in self.pins {
            if let Some(row) = pin.and_then(|n| row_of(nodes, n)) {
                entries.push((row, r));
                entries.push((r, row));
            }
        }
    }

    fn stamp_matrix(&mut self, matrix: &mut CscMatrix, nodes: &[Node], _ctx: &StepContext) {
        let Some(r) = self.branch_row else { return };
        let ra = self.pins[0].and_then(|n| row_of(nodes, n));
        let rb = self.pins[1].and_then(|n| row_of(nodes, n));
        if let Some(a) = ra {
            matrix.add(a, r, 1.0);
        }
        if let Some(b) = rb {
            matrix.add(b, r, -1.0);
        }
        if self.closed {
            if let Some(a) = ra {
                matrix.add(r, a, 1.0);
            }
            if let Some(b) = rb {
                matrix.add(r, b, -1.0);
            }
        } else {
            matrix.add(r, r, 1.0);
        }
    }

    fn stamp_rhs(&self, _rhs: &mut DVector<f64>, _nodes: &[Node], _ctx: &StepContext) {}

    fn observe(&mut self, solution: &DVector<f64>, _nodes: &[Node]) {
        self.current = match self.branch_row {
            Some(r) if self.closed => solution[r],
            _ => 0.0,
        };
    }

    fn advance(&mut self, _nodes: &[Node], ctx: &StepContext) -> StepEvent {
        if self.drain_due(ctx) {
            StepEvent::Structural
        } else {
            StepEvent::None
        }
    }

    fn current_between(&self, a: usize, _b: usize) -> f64 {
        signed(a, self.current)
    }
}
