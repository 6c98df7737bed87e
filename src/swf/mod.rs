//! Interpreter for the AVM2 bytecode embedded in compressed SWF files
//!
//! Only the subset of the instruction set needed to run small string
//! scrambling routines is implemented. Anything else fails with
//! [`SwfError::NotImplemented`] instead of producing a wrong answer.

pub mod abc;
pub mod container;
pub mod interp;
pub mod value;

use thiserror::Error;

pub use container::{extract_abc, DOABC_TAG};
pub use interp::{Function, NativeFn, SwfInterpreter};
pub use value::Value;

pub type Result<T> = std::result::Result<T, SwfError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SwfError {
    /// Malformed container or bytecode; `offset` is where decoding stopped
    #[error("{message} (at offset {offset})")]
    Structural { offset: usize, message: String },

    #[error("{0}")]
    Unsupported(String),

    #[error("{0} is not yet implemented")]
    NotImplemented(String),

    #[error("Class {0:?} not found")]
    ClassNotFound(String),

    #[error("Cannot find function {class}.{name}")]
    FunctionNotFound { class: String, name: String },

    #[error("Type error: {0}")]
    Type(String),
}

impl SwfError {
    pub(crate) fn structural(offset: usize, message: impl Into<String>) -> Self {
        SwfError::Structural {
            offset,
            message: message.into(),
        }
    }
}
