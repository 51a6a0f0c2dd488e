use std::io;

use thiserror::Error;

use crate::bus::BusError;

/// Failures raised by the fixed-point / signed-integer codec.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CodecError {
    /// Value does not fit the integer part of the requested format.
    #[error("need {min} <= value < {max}, got {value}")]
    OutOfRange {
        /// Rejected value.
        value: f64,
        /// Inclusive lower bound of the integer part.
        min: f64,
        /// Exclusive upper bound of the integer part.
        max: f64,
    },
    /// Bit widths that cannot describe a two's-complement word of at most 64 bits.
    #[error("invalid q-format {n_bits_a}.{n_bits_b}: total width must be 1..=64 with a sign bit")]
    InvalidFormat {
        /// Integer part width including the sign bit.
        n_bits_a: u32,
        /// Fractional part width.
        n_bits_b: u32,
    },
}

/// Failures raised by the element/register/map model and its persistence formats.
#[derive(Debug, Error)]
pub enum RegmapError {
    /// A key that must be unique appeared twice.
    #[error("{field} values are not unique: '{key}' appears more than once")]
    DuplicateKey {
        /// Attribute that carried the collision (`name`, `address`, ...).
        field: &'static str,
        /// Rendered colliding key.
        key: String,
    },
    /// No element with this name exists in the map.
    #[error("unknown element '{0}'")]
    UnknownElement(String),
    /// No register with this name exists in the map.
    #[error("unknown register '{0}'")]
    UnknownRegister(String),
    /// No register lives at this address.
    #[error("no register at address {0}")]
    UnknownAddress(u32),
    /// Element geometry does not describe a field inside a 64-bit word.
    #[error("invalid element '{name}': {reason}")]
    InvalidElement {
        /// Element name.
        name: String,
        /// Human-readable description of the violated constraint.
        reason: &'static str,
    },
    /// The elements of a register add up to more than a 64-bit word.
    #[error("register '{name}' spans {n_bits} bits, at most 64 are supported")]
    RegisterTooWide {
        /// Register name.
        name: String,
        /// Sum of element widths.
        n_bits: u32,
    },
    /// A field reaches past the bytes its register is transferred in.
    #[error("register '{name}' has a field ending at bit {end_bit}, past its {n_bytes}-byte word")]
    FieldPastRegisterBytes {
        /// Register name.
        name: String,
        /// Exclusive end bit of the highest field.
        end_bit: u32,
        /// `ceil(n_bits / 8)` for the register.
        n_bytes: u32,
    },
    /// Malformed line in a plain-text register dump.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-indexed line number.
        line: usize,
        /// Description of the problem.
        message: String,
    },
    /// Transport failure reported by a [`crate::RegisterBus`].
    #[error(transparent)]
    Bus(#[from] BusError),
    /// File-system failure while reading or writing a dump.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Malformed or schema-violating JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the register model.
pub type Result<T, E = RegmapError> = std::result::Result<T, E>;
