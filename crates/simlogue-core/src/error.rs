//! Error types for simlogue-core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("pin {pin} of device {device} is floating")]
    FloatingPin { device: String, pin: usize },

    #[error("node {0} is not connected to any device")]
    DisconnectedNode(u32),

    #[error("numeric overflow stamping device {device}: {detail}")]
    NumericOverflow { device: String, detail: String },

    #[error("duplicate device name: {0}")]
    DuplicateDevice(String),
}

pub type Result<T> = std::result::Result<T, Error>;
