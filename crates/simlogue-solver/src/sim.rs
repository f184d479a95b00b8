//! Transient simulation driver.
//!
//! Owns the circuit, the assembled MNA matrix and its LU factors, and
//! walks the fixed-Δt step loop:
//!
//! 1. refresh the RHS from every device,
//! 2. solve `A x = b` with the cached factors,
//! 3. scatter node voltages, let devices observe branch results,
//! 4. sample the probes,
//! 5. advance device state; if any device reports a structural event
//!    (switch toggle, op-amp mode change) the matrix values are
//!    re-stamped and re-factored before the next step.
//!
//! The matrix pattern itself never changes after assembly, so structural
//! events are value-only updates under a fixed sparsity structure.

use nalgebra::DVector;

use simlogue_core::mna::CscMatrix;
use simlogue_core::{Circuit, Dims, Element, NodeId, PinRef, Scope, StepContext, StepEvent};

use crate::error::{Error, Result};
use crate::lu::{self, LuFactors};
use crate::pivot;

/// Driver lifecycle, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Building,
    Assembled,
    Factored,
    Running,
    Terminated,
}

/// A transient simulator over a finished circuit.
#[derive(Debug)]
pub struct Simulator<D: Element> {
    circuit: Circuit<D>,
    scopes: Vec<Scope>,
    dt: f64,
    dims: Dims,
    matrix: Option<CscMatrix>,
    factors: Option<LuFactors>,
    rhs: DVector<f64>,
    solution: DVector<f64>,
    step: usize,
    phase: Phase,
}

impl<D: Element> Simulator<D> {
    /// Wrap a circuit for simulation at the given sampling period.
    pub fn new(circuit: Circuit<D>, dt: f64) -> Self {
        assert!(dt > 0.0, "sampling period must be positive");
        Self {
            circuit,
            scopes: Vec::new(),
            dt,
            dims: Dims {
                node_rows: 0,
                size: 0,
            },
            matrix: None,
            factors: None,
            rhs: DVector::zeros(0),
            solution: DVector::zeros(0),
            step: 0,
            phase: Phase::Building,
        }
    }

    /// Register a probe. Probes sample once per step, after the solve.
    pub fn add_scope(&mut self, scope: Scope) {
        self.scopes.push(scope);
    }

    /// Finalise the topology and build the matrix structure: assign MNA
    /// rows, collect every device's structural entries into one coalesced
    /// CSC pattern, and stamp the initial values.
    pub fn assemble(&mut self) -> Result<()> {
        debug_assert_eq!(self.phase, Phase::Building);
        self.dims = self.circuit.assign_rows()?;

        let ctx = self.context();
        let (nodes, devices) = self.circuit.split_mut();
        let mut entries = Vec::new();
        for device in devices.iter() {
            device.structural_entries(nodes, &mut entries);
        }
        let mut matrix = CscMatrix::from_pattern(self.dims.size, &entries);
        for device in devices.iter_mut() {
            device.stamp_matrix(&mut matrix, nodes, &ctx);
        }

        self.rhs = DVector::zeros(self.dims.size);
        self.solution = DVector::zeros(self.dims.size);
        self.matrix = Some(matrix);
        self.phase = Phase::Assembled;
        Ok(())
    }

    /// Compute fill-reducing permutations and factorise.
    fn factor(&mut self) -> Result<()> {
        let matrix = self.matrix.as_ref().expect("assembled");
        let (row_perm, col_perm) = pivot::fill_reducing(matrix);
        match lu::factor(matrix, &row_perm, &col_perm) {
            Ok(factors) => {
                self.factors = Some(factors);
                self.phase = Phase::Factored;
                Ok(())
            }
            Err(Error::SingularMatrix) => {
                self.phase = Phase::Terminated;
                Err(Error::Singular {
                    step: self.step,
                    time: self.time(),
                })
            }
            Err(other) => Err(other),
        }
    }

    /// Zero the matrix values and stamp every device again, at the
    /// current step's context. Used after structural events.
    fn restamp(&mut self) {
        let ctx = self.context();
        let matrix = self.matrix.as_mut().expect("assembled");
        matrix.reset_values();
        let (nodes, devices) = self.circuit.split_mut();
        for device in devices.iter_mut() {
            device.stamp_matrix(matrix, nodes, &ctx);
        }
    }

    fn context(&self) -> StepContext {
        StepContext::new(self.step as f64 * self.dt, self.dt)
    }

    /// Run a single step. Assembles and factors lazily on first use.
    pub fn step(&mut self) -> Result<()> {
        match self.phase {
            Phase::Building => {
                self.assemble()?;
                self.factor()?;
            }
            Phase::Assembled => self.factor()?,
            Phase::Factored | Phase::Running => {}
            Phase::Terminated => return Err(Error::Terminated),
        }
        self.phase = Phase::Running;

        let ctx = self.context();

        // RHS refresh.
        self.rhs.fill(0.0);
        {
            let (nodes, devices) = self.circuit.split_mut();
            for device in devices.iter() {
                device.stamp_rhs(&mut self.rhs, nodes, &ctx);
            }
        }

        // Solve under the fixed factors.
        let x = self
            .factors
            .as_ref()
            .expect("factored")
            .solve(&self.rhs)?;

        // Scatter results: node voltages first, then device read-backs,
        // then the probes, so every probe sees this step's state.
        let mut structural = false;
        {
            let (nodes, devices) = self.circuit.split_mut();
            for node in nodes.iter_mut() {
                node.voltage = match node.row {
                    Some(row) => x[row],
                    None => 0.0,
                };
            }
            for device in devices.iter_mut() {
                device.observe(&x, nodes);
            }
            for scope in &mut self.scopes {
                scope.record(nodes, devices, ctx.time);
            }
            for device in devices.iter_mut() {
                if device.advance(nodes, &ctx) == StepEvent::Structural {
                    structural = true;
                }
            }
        }
        self.solution = x;
        self.step += 1;

        // All same-step toggles were applied above; one re-factor covers
        // them together.
        if structural {
            self.restamp();
            self.factor()?;
            self.phase = Phase::Running;
        }
        Ok(())
    }

    /// Run the requested number of steps, then terminate.
    pub fn run_for_steps(&mut self, steps: usize) -> Result<()> {
        for _ in 0..steps {
            self.step()?;
        }
        self.phase = Phase::Terminated;
        Ok(())
    }

    /// Run for a duration, at `duration / Δt` whole steps.
    pub fn run_for_seconds(&mut self, duration: f64) -> Result<()> {
        self.run_for_steps((duration / self.dt) as usize)
    }

    /// Sample time of the step about to run.
    pub fn time(&self) -> f64 {
        self.step as f64 * self.dt
    }

    /// Steps completed so far.
    pub fn steps_done(&self) -> usize {
        self.step
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn circuit(&self) -> &Circuit<D> {
        &self.circuit
    }

    pub fn circuit_mut(&mut self) -> &mut Circuit<D> {
        &mut self.circuit
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Voltage at a node from the most recent solve.
    pub fn node_voltage(&self, node: NodeId) -> f64 {
        self.circuit.nodes()[node.index()].voltage
    }

    /// Voltage at a pin from the most recent solve (0 while floating).
    pub fn pin_voltage(&self, pin: PinRef) -> f64 {
        self.circuit
            .device(pin.device)
            .pin_node(pin.pin)
            .map(|node| self.node_voltage(node))
            .unwrap_or(0.0)
    }

    /// The assembled coefficient matrix (values as of the last stamp).
    pub fn matrix(&self) -> Option<&CscMatrix> {
        self.matrix.as_ref()
    }

    /// The RHS of the most recent solve.
    pub fn rhs(&self) -> &DVector<f64> {
        &self.rhs
    }

    /// The most recent solution vector.
    pub fn solution(&self) -> &DVector<f64> {
        &self.solution
    }

    /// Row layout of the assembled system.
    pub fn dims(&self) -> Dims {
        self.dims
    }
}
