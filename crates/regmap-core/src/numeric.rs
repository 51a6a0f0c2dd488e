//! Two's-complement and fixed-point (Q-format) bit packing.
//!
//! A [`QFormat`] splits a word of `n_bits_a + n_bits_b` bits into a signed
//! integer part (sign bit included) and a fractional part. Values are scaled
//! by `2^n_bits_b`, truncated toward zero, and stored as two's complement.
//! Byte sequences are big-endian and `ceil(total / 8)` bytes long.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use std::fmt;

use crate::diag::{Diagnostic, DiagnosticSink, LogSink};
use crate::error::CodecError;

/// Widest word the codec packs into.
pub const MAX_WORD_BITS: u32 = u64::BITS;

/// Integer/fraction split of a fixed-width two's-complement word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QFormat {
    n_bits_a: u32,
    n_bits_b: u32,
}

impl QFormat {
    /// Q9.23 fixed-point profile: 32-bit word, 23 fractional bits.
    pub const Q9_23: Self = Self {
        n_bits_a: 9,
        n_bits_b: 23,
    };

    /// Plain 32-bit signed integer profile.
    pub const INT32: Self = Self {
        n_bits_a: 32,
        n_bits_b: 0,
    };

    /// Creates a format with `n_bits_a` integer bits (sign included) and
    /// `n_bits_b` fractional bits.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidFormat`] when the integer part is empty or
    /// the total width exceeds [`MAX_WORD_BITS`].
    pub const fn new(n_bits_a: u32, n_bits_b: u32) -> Result<Self, CodecError> {
        if n_bits_a == 0 || n_bits_a > MAX_WORD_BITS || n_bits_b > MAX_WORD_BITS - n_bits_a {
            return Err(CodecError::InvalidFormat { n_bits_a, n_bits_b });
        }
        Ok(Self { n_bits_a, n_bits_b })
    }

    /// Creates a pure signed-integer format of `n_bits` bits.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidFormat`] when `n_bits` is not in `1..=64`.
    pub const fn integer(n_bits: u32) -> Result<Self, CodecError> {
        Self::new(n_bits, 0)
    }

    /// Integer part width, sign bit included.
    #[must_use]
    pub const fn n_bits_a(self) -> u32 {
        self.n_bits_a
    }

    /// Fractional part width.
    #[must_use]
    pub const fn n_bits_b(self) -> u32 {
        self.n_bits_b
    }

    /// Total word width.
    #[must_use]
    pub const fn n_bits(self) -> u32 {
        self.n_bits_a + self.n_bits_b
    }

    /// Number of bytes in the big-endian encoding.
    #[must_use]
    pub const fn n_bytes(self) -> usize {
        self.n_bits().div_ceil(8) as usize
    }

    /// `true` when there is no fractional part.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        self.n_bits_b == 0
    }

    /// Exclusive magnitude bound of the integer part, `2^(n_bits_a - 1)`.
    #[must_use]
    pub const fn limit(self) -> i128 {
        1_i128 << (self.n_bits_a - 1)
    }

    /// Checks `-limit <= value < limit` against the integer part width.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::OutOfRange`] when the value does not fit, including NaN.
    pub fn limit_guard(self, value: f64) -> Result<(), CodecError> {
        let max = self.limit() as f64;
        let min = -max;
        if min <= value && value < max {
            Ok(())
        } else {
            Err(CodecError::OutOfRange { value, min, max })
        }
    }

    const fn word_mask(self) -> u64 {
        u64::MAX >> (u64::BITS - self.n_bits())
    }

    // Largest double strictly below the exclusive upper bound.
    fn max_value(self) -> f64 {
        let bound = self.limit() as f64;
        f64::from_bits(bound.to_bits() - 1)
    }

    const fn sign_mask(self) -> u64 {
        1_u64 << (self.n_bits() - 1)
    }

    fn scale(self) -> f64 {
        (1_u128 << self.n_bits_b) as f64
    }
}

impl Default for QFormat {
    fn default() -> Self {
        Self::Q9_23
    }
}

impl fmt::Display for QFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}.{}", self.n_bits_a, self.n_bits_b)
    }
}

/// Decodes a two's-complement word into a real value.
///
/// Bits above the format width are ignored. Words wider than the 53-bit `f64`
/// mantissa round to the nearest double, which for the largest positive words
/// is the exclusive upper bound itself; [`Number::from_bits_with`] reports and
/// clamps that case.
#[must_use]
pub fn bits_to_value(bits: u64, format: QFormat) -> f64 {
    signed_numerator(bits, format) as f64 / format.scale()
}

/// Encodes a real value into a two's-complement word.
///
/// The value is scaled by `2^n_bits_b` and truncated toward zero.
///
/// # Errors
///
/// Returns [`CodecError::OutOfRange`] when the integer part does not fit.
pub fn value_to_bits(value: f64, format: QFormat) -> Result<u64, CodecError> {
    format.limit_guard(value)?;
    Ok(encode_in_range(value, format))
}

/// Decodes a two's-complement word of `format.n_bits()` bits into an integer,
/// discarding any fractional bits.
#[must_use]
pub fn bits_to_integer(bits: u64, format: QFormat) -> i64 {
    (signed_numerator(bits, format) >> format.n_bits_b) as i64
}

/// Encodes an integer into a two's-complement word without a float round trip.
///
/// # Errors
///
/// Returns [`CodecError::OutOfRange`] when `value` does not fit the integer part.
pub fn integer_to_bits(value: i64, format: QFormat) -> Result<u64, CodecError> {
    let limit = format.limit();
    let wide = i128::from(value);
    if wide < -limit || wide >= limit {
        return Err(CodecError::OutOfRange {
            value: value as f64,
            min: -limit as f64,
            max: limit as f64,
        });
    }
    Ok(bias(wide << format.n_bits_b, format))
}

/// Decodes a big-endian byte sequence into a real value.
///
/// Only the trailing eight bytes can contribute to a 64-bit word.
#[must_use]
pub fn bytes_to_value(bytes: &[u8], format: QFormat) -> f64 {
    bits_to_value(be_bytes_to_bits(bytes), format)
}

/// Encodes a real value into `format.n_bytes()` big-endian bytes.
///
/// # Errors
///
/// Returns [`CodecError::OutOfRange`] when the integer part does not fit.
pub fn value_to_bytes(value: f64, format: QFormat) -> Result<Vec<u8>, CodecError> {
    let bits = value_to_bits(value, format)?;
    Ok(bits_to_be_bytes(bits, format.n_bytes()))
}

/// Folds a big-endian byte sequence into a word; leading bytes past eight shift out.
#[must_use]
pub fn be_bytes_to_bits(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0_u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

/// Returns the low `n_bytes` bytes of `bits` in big-endian order.
///
/// `n_bytes` is clamped to eight.
#[must_use]
pub fn bits_to_be_bytes(bits: u64, n_bytes: usize) -> Vec<u8> {
    let all = bits.to_be_bytes();
    all[all.len() - n_bytes.min(all.len())..].to_vec()
}

// (bits & (sign - 1)) - (bits & sign): negative exactly when the sign bit is set.
fn signed_numerator(bits: u64, format: QFormat) -> i128 {
    let sign_mask = format.sign_mask();
    i128::from(bits & (sign_mask - 1)) - i128::from(bits & sign_mask)
}

fn encode_in_range(value: f64, format: QFormat) -> u64 {
    let numerator = (value * format.scale()).trunc() as i128;
    bias(numerator, format)
}

fn bias(numerator: i128, format: QFormat) -> u64 {
    if numerator < 0 {
        (numerator + (1_i128 << format.n_bits())) as u64
    } else {
        numerator as u64
    }
}

/// A real value bound to the [`QFormat`] it is encoded with.
///
/// Construction enforces the range guard, so the encoders on an existing
/// `Number` cannot fail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Number {
    value: f64,
    format: QFormat,
}

impl Number {
    /// Creates a number, reporting truncation to the `log` facade.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::OutOfRange`] when `value` does not fit `format`.
    pub fn new(value: f64, format: QFormat) -> Result<Self, CodecError> {
        Self::with_sink(value, format, &mut LogSink)
    }

    /// Creates a number, reporting truncation to `sink`.
    ///
    /// Integer profiles hold whole numbers only; a fractional `value` is
    /// truncated toward zero and a [`Diagnostic::Truncation`] is raised.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::OutOfRange`] when `value` does not fit `format`.
    pub fn with_sink(
        value: f64,
        format: QFormat,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<Self, CodecError> {
        format.limit_guard(value)?;
        let mut kept = value;
        if format.is_integer() && value.fract() != 0.0 {
            kept = value.trunc();
            sink.on_diagnostic(Diagnostic::Truncation {
                requested: value,
                kept,
            });
        }
        Ok(Self {
            value: kept,
            format,
        })
    }

    /// Decodes a number from a two's-complement word, reporting lost
    /// precision to the `log` facade.
    #[must_use]
    pub fn from_bits(bits: u64, format: QFormat) -> Self {
        Self::from_bits_with(bits, format, &mut LogSink)
    }

    /// Decodes a number from a two's-complement word, reporting lost
    /// precision to `sink`.
    ///
    /// Formats wider than the `f64` mantissa cannot hold every word exactly.
    /// When the decoded value does not encode back to `bits`, a
    /// [`Diagnostic::Truncation`] is raised and the value is kept inside the
    /// format's range, so [`Self::bits`] never changes sign.
    #[must_use]
    pub fn from_bits_with(bits: u64, format: QFormat, sink: &mut dyn DiagnosticSink) -> Self {
        let decoded = bits_to_value(bits, format);
        let value = if format.limit_guard(decoded).is_ok() {
            decoded
        } else {
            format.max_value()
        };
        let number = Self { value, format };
        if number.bits() != bits & format.word_mask() {
            sink.on_diagnostic(Diagnostic::Truncation {
                requested: decoded,
                kept: value,
            });
        }
        number
    }

    /// Decodes a number from big-endian bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8], format: QFormat) -> Self {
        Self::from_bits(be_bytes_to_bits(bytes), format)
    }

    /// Decodes a number from big-endian bytes, reporting lost precision to `sink`.
    #[must_use]
    pub fn from_bytes_with(bytes: &[u8], format: QFormat, sink: &mut dyn DiagnosticSink) -> Self {
        Self::from_bits_with(be_bytes_to_bits(bytes), format, sink)
    }

    /// Stored value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.value
    }

    /// Format the value is encoded with.
    #[must_use]
    pub const fn format(self) -> QFormat {
        self.format
    }

    /// Two's-complement word for this value.
    #[must_use]
    pub fn bits(self) -> u64 {
        encode_in_range(self.value, self.format)
    }

    /// Big-endian bytes for this value.
    #[must_use]
    pub fn bytes(self) -> Vec<u8> {
        bits_to_be_bytes(self.bits(), self.format.n_bytes())
    }

    /// Length of [`Self::bytes`].
    #[must_use]
    pub const fn size(self) -> usize {
        self.format.n_bytes()
    }

    /// Reinterprets as a pure integer spanning the whole word (`Q(A+B).0`),
    /// dropping the fractional part.
    #[must_use]
    pub fn into_integer(self) -> Self {
        Self {
            value: self.value.trunc(),
            format: Self::widened(self.format),
        }
    }

    /// Re-encodes the value with another format.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::OutOfRange`] when the value does not fit `format`.
    pub fn into_format(self, format: QFormat) -> Result<Self, CodecError> {
        Self::new(self.value, format)
    }

    const fn widened(format: QFormat) -> QFormat {
        QFormat {
            n_bits_a: format.n_bits(),
            n_bits_b: 0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.value, self.format)
    }
}
