//! The contract every device satisfies to participate in simulation.

use nalgebra::DVector;

use crate::error::Result;
use crate::mna::CscMatrix;
use crate::node::{Node, NodeId};

/// Per-step timing information handed to devices.
#[derive(Debug, Clone, Copy)]
pub struct StepContext {
    /// Sample time of the step being computed (s).
    pub time: f64,
    /// Sampling period Δt (s).
    pub dt: f64,
    /// 1/Δt, precomputed once per run.
    pub inv_dt: f64,
}

impl StepContext {
    pub fn new(time: f64, dt: f64) -> Self {
        Self {
            time,
            dt,
            inv_dt: 1.0 / dt,
        }
    }
}

/// What a device reports from [`Element::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    /// Nothing changed that the solver needs to know about.
    None,
    /// The device's matrix contribution changed (switch toggle, op-amp
    /// mode change); the driver must re-stamp and re-factor before the
    /// next step.
    Structural,
}

/// Trait for devices that live in a circuit and stamp into the MNA system.
///
/// The engine drives each device through a fixed lifecycle: topology
/// queries while the circuit is being built, `structural_entries` +
/// `stamp_matrix` at assembly (and again after a structural event), then
/// per step `stamp_rhs` → solve → `observe` → `advance`.
pub trait Element: std::fmt::Debug {
    /// Device name (e.g. "R1", "SW2").
    fn name(&self) -> &str;

    /// Number of external terminals. Fixed per device kind.
    fn pin_count(&self) -> usize;

    /// Node the given pin is attached to, `None` while floating.
    fn pin_node(&self, pin: usize) -> Option<NodeId>;

    /// Attach the given pin to a node (used by circuit connection fusing).
    fn set_pin_node(&mut self, pin: usize, node: NodeId);

    /// Resolve a symbolic pin name ("plus", "out", ...) to a pin index.
    fn pin_named(&self, _name: &str) -> Option<usize> {
        None
    }

    /// Check device parameters before assembly. The place where degenerate
    /// values (R = 0) surface as [`crate::Error::NumericOverflow`].
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Number of private MNA rows this device needs, given the final
    /// topology. Voltage-source-like devices answer 0 when every pin sits
    /// on ground.
    fn reserved_rows(&self, _nodes: &[Node]) -> usize {
        0
    }

    /// The engine assigns the block `[row, row + reserved_rows)`.
    fn set_first_reserved_row(&mut self, _row: usize) {}

    /// First row of the reserved block, if any was assigned.
    fn first_reserved_row(&self) -> Option<usize> {
        None
    }

    /// Append every (row, col) position this device will ever write to,
    /// across all of its modes. Called once at assembly to fix the CSC
    /// pattern.
    fn structural_entries(&self, nodes: &[Node], entries: &mut Vec<(usize, usize)>);

    /// Write numeric matrix contributions. Called after assembly and again
    /// whenever any device reported a structural event (the matrix values
    /// are zeroed first).
    fn stamp_matrix(&mut self, matrix: &mut CscMatrix, nodes: &[Node], ctx: &StepContext);

    /// Write per-step contributions to the right-hand side.
    fn stamp_rhs(&self, rhs: &mut DVector<f64>, nodes: &[Node], ctx: &StepContext);

    /// Read back solved quantities (branch currents, pin voltages) into
    /// internal state. Runs before probes sample.
    fn observe(&mut self, _solution: &DVector<f64>, _nodes: &[Node]) {}

    /// Update internal state for the coming step (history of C/L, AC
    /// phase, switch schedule, op-amp mode).
    fn advance(&mut self, _nodes: &[Node], _ctx: &StepContext) -> StepEvent {
        StepEvent::None
    }

    /// Most recent current flowing from pin `a` to pin `b` through this
    /// device, for probes.
    fn current_between(&self, a: usize, b: usize) -> f64;
}
