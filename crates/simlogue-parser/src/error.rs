//! Error types for simlogue-parser.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("name error on line {line}: {message}")]
    Name { line: usize, message: String },

    #[error("value error on line {line}: {message}")]
    Value { line: usize, message: String },

    #[error(transparent)]
    Circuit(#[from] simlogue_core::Error),
}

impl Error {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        Error::Syntax {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn name(line: usize, message: impl Into<String>) -> Self {
        Error::Name {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn value(line: usize, message: impl Into<String>) -> Self {
        Error::Value {
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
