//! Core circuit representation and MNA matrix structures for SimLogue.
//!
//! This crate provides the data model shared by the whole simulator:
//!
//! - [`NodeId`] / [`Node`] - electrical junctions; ground is node 0
//! - [`Circuit`] - devices over shared nodes, with pin connection fusing
//! - [`Element`] - the contract every device satisfies
//! - [`mna::CscMatrix`] - the fixed-pattern sparse MNA coefficient matrix
//! - [`Scope`] - voltage/current probes with per-step sample buffers
//! - [`units`] - netlist value-with-unit parsing
//!
//! # Modified Nodal Analysis (MNA)
//!
//! The simulator formulates each timestep as a linear system `Ax = b`. The
//! unknowns `x` are the non-ground node voltages (rows `[0, K)`) followed
//! by one branch current per voltage-defining device (voltage sources,
//! inductors, closed switches, op-amp outputs). Devices contribute
//! "stamps": fixed positions in `A`'s sparsity pattern, numeric matrix
//! coefficients, and per-step right-hand-side terms.
//!
//! # Example: assembling a stamped matrix
//!
//! ```rust
//! use simlogue_core::mna::CscMatrix;
//!
//! // Conductance stamp of a 1 kOhm resistor between rows 0 and 1.
//! let g = 1.0 / 1000.0;
//! let mut a = CscMatrix::from_pattern(2, &[(0, 0), (0, 1), (1, 0), (1, 1)]);
//! a.add(0, 0, g);
//! a.add(1, 1, g);
//! a.add(0, 1, -g);
//! a.add(1, 0, -g);
//! assert_eq!(a.get(0, 0), g);
//!
//! // Per-step refresh keeps the pattern, zeroes the values.
//! a.reset_values();
//! assert_eq!(a.nnz(), 4);
//! ```

pub mod circuit;
pub mod element;
pub mod error;
pub mod mna;
pub mod node;
pub mod scope;
pub mod units;

pub use circuit::{Circuit, Dims, PinRef};
pub use element::{Element, StepContext, StepEvent};
pub use error::{Error, Result};
pub use node::{row_of, voltage_of, Node, NodeId};
pub use scope::{Scope, ScopeKind};
pub use units::Quantity;
