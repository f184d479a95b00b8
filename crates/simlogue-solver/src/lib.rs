//! Sparse direct solver and transient driver for SimLogue.
//!
//! Three layers, bottom up:
//!
//! - [`pivot`] - Markowitz fill-reducing row/column ordering
//! - [`lu`] - left-looking sparse LU factorisation and the per-step
//!   forward/backward substitution
//! - [`sim::Simulator`] - the fixed-Δt step loop driving devices,
//!   probes and re-factorisation on structural events
//!
//! The factorisation runs once per matrix structure; each timestep then
//! costs one RHS refresh and one pair of triangular solves. Only a switch
//! toggle or an op-amp mode change forces a re-stamp and re-factor.

pub mod error;
pub mod lu;
pub mod pivot;
pub mod sim;

pub use error::{Error, Result};
pub use lu::{factor, LuFactors};
pub use pivot::fill_reducing;
pub use sim::Simulator;
