//! Register map model and fixed-point codec for memory-mapped device registers.

/// Error taxonomy for the codec and the register model.
pub mod error;
pub use error::{CodecError, RegmapError, Result};

/// Non-fatal diagnostics and the sink trait they are delivered through.
pub mod diag;
pub use diag::{Diagnostic, DiagnosticSink, LogSink};

/// Two's-complement and Q-format bit packing.
pub mod numeric;
pub use numeric::{
    be_bytes_to_bits, bits_to_be_bytes, bits_to_integer, bits_to_value, bytes_to_value,
    integer_to_bits, value_to_bits, value_to_bytes, Number, QFormat, MAX_WORD_BITS,
};

/// Unique-key index construction.
pub mod index;
pub use index::unique_index_by;

/// Bitfield elements and registers.
pub mod register;
pub use register::{Element, Register};

/// Register collection with name, address, and element indexes.
pub mod map;
pub use map::RegistersMap;

/// Plain-text register dump format and file persistence.
pub mod dump;
pub use dump::{
    format_register_dump, parse_hex_value, parse_register_dump, read_file, COMMENT_PREFIX,
};

/// Comparison of two captured register states.
pub mod compare;
pub use compare::{values_comparison, ValueComparison};

/// Device transport contract.
pub mod bus;
pub use bus::{BusError, RegisterBus, VirtualBus};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tempfile as _;
