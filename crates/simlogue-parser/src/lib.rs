//! Netlist interpreter for the SimLogue circuit simulator.
//!
//! Turns a `.simlog` netlist into a connected [`simlogue_core::Circuit`]
//! of [`simlogue_devices::Device`]s, a list of probes, and per-switch
//! schedules:
//!
//! ```text
//! // a loaded divider
//! voltage_source V1 : 5_V
//! resistor R1 : 10k_Ohm
//! resistor R2 : 10k_Ohm
//! V1 - R1.0
//! R1.1 - R2.0
//! R2.1 - GND
//! scope voltage of R2
//! ```
//!
//! Statements are line-oriented: device declarations
//! (`<kind> <name> : <params>`), pin connections (`pin - pin - ...`),
//! probes (`scope ...`) and switch commands (`turn on|off ... at <time>`).

pub mod error;
pub mod lexer;
pub mod parser;

pub use error::{Error, Result};
pub use lexer::{Lexer, Line, Token};
pub use parser::{parse, Netlist};
