//! Bitfield elements and the registers they compose.
//!
//! An [`Element`] is a named slice `[idx_lowest_bit, idx_lowest_bit + n_bits)`
//! of a register word holding an unsigned field value. A [`Register`] owns an
//! ordered list of elements and aggregates their shifted values into one word.
//!
//! Elements of a register are assumed not to overlap. This is a schema
//! precondition and is not checked: overlapping fields OR into each other
//! when the register value is assembled.

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use crate::error::{RegmapError, Result};
use crate::index::unique_index_by;
use crate::numeric::{bits_to_be_bytes, MAX_WORD_BITS};

/// Mask of the low `n_bits` bits; `n_bits` must be in `1..=64`.
const fn low_mask(n_bits: u32) -> u64 {
    u64::MAX >> (MAX_WORD_BITS - n_bits)
}

/// A named bitfield within a register word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ElementRecord", into = "ElementRecord")]
pub struct Element {
    name: String,
    code_name: String,
    description: Option<String>,
    idx_lowest_bit: u32,
    n_bits: u32,
    value: u64,
    read_only: bool,
}

impl Element {
    /// Creates a writable element holding zero, with `code_name` equal to `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::InvalidElement`] when `n_bits` is zero or the field
    /// extends past bit 63.
    pub fn new(name: impl Into<String>, idx_lowest_bit: u32, n_bits: u32) -> Result<Self> {
        let name = name.into();
        if n_bits == 0 {
            return Err(RegmapError::InvalidElement {
                name,
                reason: "field width must be at least one bit",
            });
        }
        if idx_lowest_bit >= MAX_WORD_BITS || n_bits > MAX_WORD_BITS - idx_lowest_bit {
            return Err(RegmapError::InvalidElement {
                name,
                reason: "field extends past bit 63",
            });
        }
        Ok(Self {
            code_name: name.clone(),
            name,
            description: None,
            idx_lowest_bit,
            n_bits,
            value: 0,
            read_only: false,
        })
    }

    /// Marks the element read-only (or writable).
    #[must_use]
    pub const fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Sets the identifier used in generated code.
    #[must_use]
    pub fn with_code_name(mut self, code_name: impl Into<String>) -> Self {
        self.code_name = code_name.into();
        self
    }

    /// Sets the free-form description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the initial field value, regardless of the read-only flag.
    #[must_use]
    pub const fn with_value(mut self, value: u64) -> Self {
        self.value = value & low_mask(self.n_bits);
        self
    }

    /// Element name, unique within a map.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier used in generated code.
    #[must_use]
    pub fn code_name(&self) -> &str {
        &self.code_name
    }

    /// Free-form description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Position of the field's least significant bit in the register word.
    #[must_use]
    pub const fn idx_lowest_bit(&self) -> u32 {
        self.idx_lowest_bit
    }

    /// Field width in bits.
    #[must_use]
    pub const fn n_bits(&self) -> u32 {
        self.n_bits
    }

    /// `true` when user writes through [`Self::set_value`] are ignored.
    #[must_use]
    pub const fn read_only(&self) -> bool {
        self.read_only
    }

    /// Unsigned field value, in `0..2^n_bits`.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Writes the field value, masked to the field width.
    ///
    /// Silently ignored on read-only elements.
    pub const fn set_value(&mut self, value: u64) {
        if !self.read_only {
            self.value = value & low_mask(self.n_bits);
        }
    }

    /// Field mask positioned in the register word.
    #[must_use]
    pub const fn mask(&self) -> u64 {
        low_mask(self.n_bits) << self.idx_lowest_bit
    }

    /// Field value moved to its position in the register word.
    #[must_use]
    pub const fn shifted_value(&self) -> u64 {
        (self.value << self.idx_lowest_bit) & self.mask()
    }

    /// Extracts this field from a full register word.
    ///
    /// Applies to read-only elements too: the word comes from the device.
    pub const fn load_value(&mut self, register_word: u64) {
        self.value = (register_word & self.mask()) >> self.idx_lowest_bit;
    }
}

#[derive(Serialize, Deserialize)]
struct ElementRecord {
    name: String,
    idx_lowest_bit: u32,
    #[serde(default = "ElementRecord::default_n_bits")]
    n_bits: u32,
    #[serde(default)]
    value: u64,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    code_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl ElementRecord {
    const fn default_n_bits() -> u32 {
        1
    }
}

impl TryFrom<ElementRecord> for Element {
    type Error = RegmapError;

    fn try_from(record: ElementRecord) -> Result<Self> {
        let mut element = Self::new(record.name, record.idx_lowest_bit, record.n_bits)?
            .with_value(record.value)
            .with_read_only(record.read_only);
        if let Some(code_name) = record.code_name {
            element.code_name = code_name;
        }
        element.description = record.description;
        Ok(element)
    }
}

impl From<Element> for ElementRecord {
    fn from(element: Element) -> Self {
        Self {
            name: element.name,
            idx_lowest_bit: element.idx_lowest_bit,
            n_bits: element.n_bits,
            value: element.value,
            read_only: element.read_only,
            code_name: Some(element.code_name),
            description: element.description,
        }
    }
}

/// A named, addressable register word composed of bitfield elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RegisterRecord", into = "RegisterRecord")]
pub struct Register {
    name: String,
    code_name: String,
    address: u32,
    description: Option<String>,
    default_value: u64,
    elements: Vec<Element>,
    by_name: HashMap<String, usize>,
}

impl Register {
    /// Creates a register from its ordered elements.
    ///
    /// `code_name` defaults to `name` and `default_value` to zero.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::DuplicateKey`] when two elements share a name and
    /// [`RegmapError::RegisterTooWide`] when the element widths sum past 64, and
    /// [`RegmapError::FieldPastRegisterBytes`] when a field reaches beyond the
    /// `ceil(n_bits / 8)` bytes the register is transferred in.
    pub fn new(name: impl Into<String>, address: u32, elements: Vec<Element>) -> Result<Self> {
        let name = name.into();
        let by_name = unique_index_by(&elements, "element name", |e| e.name.clone())?;
        let n_bits: u32 = elements.iter().map(|e| e.n_bits).sum();
        if n_bits > MAX_WORD_BITS {
            return Err(RegmapError::RegisterTooWide { name, n_bits });
        }
        let end_bit = elements
            .iter()
            .map(|e| e.idx_lowest_bit + e.n_bits)
            .max()
            .unwrap_or(0);
        let n_bytes = n_bits.div_ceil(8);
        if end_bit > n_bytes * 8 {
            return Err(RegmapError::FieldPastRegisterBytes {
                name,
                end_bit,
                n_bytes,
            });
        }
        Ok(Self {
            code_name: name.clone(),
            name,
            address,
            description: None,
            default_value: 0,
            elements,
            by_name,
        })
    }

    /// Sets the value [`Self::reset`] reloads.
    #[must_use]
    pub const fn with_default_value(mut self, default_value: u64) -> Self {
        self.default_value = default_value;
        self
    }

    /// Sets the identifier used in generated code.
    #[must_use]
    pub fn with_code_name(mut self, code_name: impl Into<String>) -> Self {
        self.code_name = code_name.into();
        self
    }

    /// Sets the free-form description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Register name, unique within a map.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier used in generated code.
    #[must_use]
    pub fn code_name(&self) -> &str {
        &self.code_name
    }

    /// Bus address, unique within a map.
    #[must_use]
    pub const fn address(&self) -> u32 {
        self.address
    }

    /// Free-form description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Word loaded by [`Self::reset`].
    #[must_use]
    pub const fn default_value(&self) -> u64 {
        self.default_value
    }

    /// Elements in schema order.
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Looks up an element of this register by name.
    #[must_use]
    pub fn element(&self, name: &str) -> Option<&Element> {
        self.by_name.get(name).map(|&idx| &self.elements[idx])
    }

    /// Mutable lookup of an element of this register by name.
    pub fn element_mut(&mut self, name: &str) -> Option<&mut Element> {
        let idx = *self.by_name.get(name)?;
        Some(&mut self.elements[idx])
    }

    pub(crate) fn element_at_mut(&mut self, idx: usize) -> &mut Element {
        &mut self.elements[idx]
    }

    /// Sum of element widths.
    #[must_use]
    pub fn n_bits(&self) -> u32 {
        self.elements.iter().map(|e| e.n_bits).sum()
    }

    /// Length of [`Self::bytes`], `ceil(n_bits / 8)`.
    #[must_use]
    pub fn n_bytes(&self) -> usize {
        self.n_bits().div_ceil(8) as usize
    }

    /// Register word assembled from every element's shifted value.
    ///
    /// Elements are required not to overlap; the fields are OR-ed together.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.elements
            .iter()
            .fold(0, |word, element| word | element.shifted_value())
    }

    /// Big-endian encoding of [`Self::value`] in [`Self::n_bytes`] bytes.
    ///
    /// Construction keeps every field below `8 * n_bytes`, so no bit of the
    /// value is lost.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        bits_to_be_bytes(self.value(), self.n_bytes())
    }

    /// Distributes a full register word into every element.
    pub fn load_value(&mut self, word: u64) {
        for element in &mut self.elements {
            element.load_value(word);
        }
    }

    /// Reloads [`Self::default_value`] into every element.
    pub fn reset(&mut self) {
        self.load_value(self.default_value);
    }

    /// Renders the register word followed by one line per element.
    ///
    /// Element values are shown in decimal, or as hex and binary when `as_hex` is set.
    #[must_use]
    pub fn render(&self, as_hex: bool) -> String {
        let width = self
            .elements
            .iter()
            .map(|e| e.name.len())
            .max()
            .unwrap_or(0);
        let value = self.value();
        let mut out = format!(
            "{:<w$}:  ({value:#x}, {value:#b})\n",
            format!("<< {} >>", self.name),
            w = width + 7
        );
        for element in &self.elements {
            let label = format!("[ {} ]", element.name);
            let v = element.value;
            // Writing to a String is infallible.
            let _ = if as_hex {
                writeln!(out, "{label:<w$}:  ({v:#x}, {v:#b})", w = width + 5)
            } else {
                writeln!(out, "{label:<w$}:  {v}", w = width + 5)
            };
        }
        out
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

/// Wire form of a [`Register`]; conversion re-runs construction checks.
#[derive(Serialize, Deserialize)]
pub(crate) struct RegisterRecord {
    name: String,
    #[serde(default)]
    code_name: Option<String>,
    address: u32,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    default_value: u64,
    #[serde(default)]
    elements: Vec<ElementRecord>,
}

impl TryFrom<RegisterRecord> for Register {
    type Error = RegmapError;

    fn try_from(record: RegisterRecord) -> Result<Self> {
        let elements = record
            .elements
            .into_iter()
            .map(Element::try_from)
            .collect::<Result<Vec<_>>>()?;
        let mut register =
            Self::new(record.name, record.address, elements)?.with_default_value(record.default_value);
        if let Some(code_name) = record.code_name {
            register.code_name = code_name;
        }
        register.description = record.description;
        Ok(register)
    }
}

impl From<Register> for RegisterRecord {
    fn from(register: Register) -> Self {
        Self {
            name: register.name,
            code_name: Some(register.code_name),
            address: register.address,
            description: register.description,
            default_value: register.default_value,
            elements: register.elements.into_iter().map(ElementRecord::from).collect(),
        }
    }
}
