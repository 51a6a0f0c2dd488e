//! Named register collection indexed by register name, address, and element name.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bus::{BusError, RegisterBus};
use crate::diag::{Diagnostic, DiagnosticSink, LogSink};
use crate::error::{RegmapError, Result};
use crate::index::unique_index_by;
use crate::numeric::be_bytes_to_bits;
use crate::register::{Element, Register, RegisterRecord};

/// Where an element lives: register position and element position within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ElementSlot {
    register: usize,
    element: usize,
}

/// A device's full register map.
///
/// Register names, register addresses, and element names (across all
/// registers) are unique. The three lookup indexes are rebuilt together
/// whenever the register list is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MapRecord", into = "MapRecord")]
pub struct RegistersMap {
    name: String,
    description: Option<String>,
    registers: Vec<Register>,
    by_name: HashMap<String, usize>,
    by_address: HashMap<u32, usize>,
    elements: HashMap<String, ElementSlot>,
}

impl RegistersMap {
    /// Creates a map over `registers`.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::DuplicateKey`] when a register name, register
    /// address, or element name repeats.
    pub fn new(name: impl Into<String>, registers: Vec<Register>) -> Result<Self> {
        let mut map = Self {
            name: name.into(),
            description: None,
            registers: Vec::new(),
            by_name: HashMap::new(),
            by_address: HashMap::new(),
            elements: HashMap::new(),
        };
        map.set_registers(registers)?;
        Ok(map)
    }

    /// Sets the free-form description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Map name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Registers in schema order.
    #[must_use]
    pub fn registers(&self) -> &[Register] {
        &self.registers
    }

    /// Replaces the register list and rebuilds every index.
    ///
    /// On error the map is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::DuplicateKey`] when a register name, register
    /// address, or element name repeats.
    pub fn set_registers(&mut self, registers: Vec<Register>) -> Result<()> {
        let by_name = unique_index_by(&registers, "register name", |r| r.name().to_string())?;
        let by_address = unique_index_by(&registers, "register address", Register::address)?;
        let slots: Vec<(&str, ElementSlot)> = registers
            .iter()
            .enumerate()
            .flat_map(|(register, reg)| {
                reg.elements()
                    .iter()
                    .enumerate()
                    .map(move |(element, e)| (e.name(), ElementSlot { register, element }))
            })
            .collect();
        let positions = unique_index_by(&slots, "element name", |(name, _)| (*name).to_string())?;
        let elements = positions
            .into_iter()
            .map(|(name, position)| (name, slots[position].1))
            .collect();

        self.registers = registers;
        self.by_name = by_name;
        self.by_address = by_address;
        self.elements = elements;
        Ok(())
    }

    /// Looks up a register by name.
    #[must_use]
    pub fn register(&self, name: &str) -> Option<&Register> {
        self.by_name.get(name).map(|&idx| &self.registers[idx])
    }

    /// Looks up a register by address.
    #[must_use]
    pub fn register_by_address(&self, address: u32) -> Option<&Register> {
        self.by_address.get(&address).map(|&idx| &self.registers[idx])
    }

    /// Mutable lookup of a register by address.
    pub fn register_by_address_mut(&mut self, address: u32) -> Option<&mut Register> {
        let idx = *self.by_address.get(&address)?;
        Some(&mut self.registers[idx])
    }

    /// Every element with its owning register, in schema order.
    pub fn elements(&self) -> impl Iterator<Item = (&Element, &Register)> + '_ {
        self.registers
            .iter()
            .flat_map(|register| register.elements().iter().map(move |e| (e, register)))
    }

    fn slot(&self, name: &str) -> Result<ElementSlot> {
        self.elements
            .get(name)
            .copied()
            .ok_or_else(|| RegmapError::UnknownElement(name.to_string()))
    }

    /// Looks up an element and its owning register.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::UnknownElement`] when no element has this name.
    pub fn element(&self, name: &str) -> Result<(&Element, &Register)> {
        let slot = self.slot(name)?;
        let register = &self.registers[slot.register];
        Ok((&register.elements()[slot.element], register))
    }

    /// Current value of a named element.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::UnknownElement`] when no element has this name.
    pub fn value_of_element(&self, name: &str) -> Result<u64> {
        self.element(name).map(|(element, _)| element.value())
    }

    /// Current word of a named register.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::UnknownRegister`] when no register has this name.
    pub fn value_of_register(&self, name: &str) -> Result<u64> {
        self.register(name)
            .map(Register::value)
            .ok_or_else(|| RegmapError::UnknownRegister(name.to_string()))
    }

    /// Address of the register owning a named element.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::UnknownElement`] when no element has this name.
    pub fn register_address_of_element(&self, name: &str) -> Result<u32> {
        self.element(name).map(|(_, register)| register.address())
    }

    /// Writes a named element (ignored when read-only) and returns its register,
    /// ready for [`Register::bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::UnknownElement`] when no element has this name.
    pub fn set_element_value(&mut self, name: &str, value: u64) -> Result<&Register> {
        self.write_element(name, value)
            .map(|(register, _)| register)
    }

    /// Writes a named element (ignored when read-only) and returns both the
    /// owning register and the element.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::UnknownElement`] when no element has this name.
    pub fn write_element(&mut self, name: &str, value: u64) -> Result<(&Register, &Element)> {
        let slot = self.slot(name)?;
        self.registers[slot.register]
            .element_at_mut(slot.element)
            .set_value(value);
        let register = &self.registers[slot.register];
        Ok((register, &register.elements()[slot.element]))
    }

    /// Register values in schema order.
    #[must_use]
    pub fn values(&self) -> Vec<u64> {
        self.registers.iter().map(Register::value).collect()
    }

    /// `(address, name, value)` for every register, sorted by address.
    #[must_use]
    pub fn address_name_values(&self) -> Vec<(u32, &str, u64)> {
        let mut rows: Vec<_> = self
            .registers
            .iter()
            .map(|r| (r.address(), r.name(), r.value()))
            .collect();
        rows.sort_unstable();
        rows
    }

    /// `(address, value)` for every register, sorted by address.
    #[must_use]
    pub fn addressed_values(&self) -> Vec<(u32, u64)> {
        let mut rows: Vec<_> = self
            .registers
            .iter()
            .map(|r| (r.address(), r.value()))
            .collect();
        rows.sort_unstable();
        rows
    }

    /// Loads register words by address, logging misses.
    ///
    /// See [`Self::load_values_with`].
    pub fn load_values<I>(&mut self, addressed_values: I) -> usize
    where
        I: IntoIterator<Item = (u32, u64)>,
    {
        self.load_values_with(addressed_values, &mut LogSink)
    }

    /// Loads register words by address.
    ///
    /// Unknown addresses are reported to `sink` as
    /// [`Diagnostic::UnknownAddress`] and the remaining pairs are still
    /// applied. Returns the number of pairs applied.
    pub fn load_values_with<I>(&mut self, addressed_values: I, sink: &mut dyn DiagnosticSink) -> usize
    where
        I: IntoIterator<Item = (u32, u64)>,
    {
        let mut applied = 0;
        for (address, value) in addressed_values {
            match self.register_by_address_mut(address) {
                Some(register) => {
                    register.load_value(value);
                    applied += 1;
                }
                None => sink.on_diagnostic(Diagnostic::UnknownAddress { address, value }),
            }
        }
        applied
    }

    /// Loads register words keyed by element name, logging misses.
    ///
    /// See [`Self::load_values_by_name_with`].
    pub fn load_values_by_name<'a, I>(&mut self, named_values: I) -> usize
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        self.load_values_by_name_with(named_values, &mut LogSink)
    }

    /// Loads register words keyed by element name.
    ///
    /// Each value is a full register word: it is distributed over every
    /// element of the named element's register, not just the named field.
    /// Unknown names are reported to `sink` as [`Diagnostic::UnknownElement`]
    /// and skipped. Returns the number of pairs applied.
    pub fn load_values_by_name_with<'a, I>(
        &mut self,
        named_values: I,
        sink: &mut dyn DiagnosticSink,
    ) -> usize
    where
        I: IntoIterator<Item = (&'a str, u64)>,
    {
        let mut applied = 0;
        for (name, value) in named_values {
            match self.elements.get(name) {
                Some(slot) => {
                    self.registers[slot.register].load_value(value);
                    applied += 1;
                }
                None => sink.on_diagnostic(Diagnostic::UnknownElement {
                    name: name.to_string(),
                    value,
                }),
            }
        }
        applied
    }

    /// Reloads every register's default value.
    pub fn reset(&mut self) {
        for register in &mut self.registers {
            register.reset();
        }
    }

    /// Renders every register in schema order.
    #[must_use]
    pub fn render(&self, as_hex: bool) -> String {
        self.registers
            .iter()
            .map(|r| r.render(as_hex))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Serializes the map, registers, and elements to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::Json`] if serialization fails.
    pub fn dumps(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rebuilds a map from [`Self::dumps`] output or a hand-written schema.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::Json`] for malformed JSON, and the same typed
    /// error construction raises ([`RegmapError::DuplicateKey`],
    /// [`RegmapError::InvalidElement`], ...) for a schema that violates a
    /// uniqueness or geometry constraint.
    pub fn loads(json: &str) -> Result<Self> {
        let record: MapRecord = serde_json::from_str(json)?;
        Self::try_from(record)
    }

    /// Writes a named element and sends its register's bytes to `bus`.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::UnknownElement`] for an unknown name and
    /// [`RegmapError::Bus`] when the write fails.
    pub fn write_element_to(
        &mut self,
        name: &str,
        value: u64,
        bus: &mut dyn RegisterBus,
    ) -> Result<()> {
        let register = self.set_element_value(name, value)?;
        bus.write(&register.bytes())?;
        Ok(())
    }

    /// Reads `n_bytes` for the register at `address` and loads them.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::UnknownAddress`] for an unknown address and
    /// [`RegmapError::Bus`] when the read fails or returns the wrong length.
    pub fn read_register_from(&mut self, address: u32, bus: &mut dyn RegisterBus) -> Result<u64> {
        let register = self
            .register_by_address_mut(address)
            .ok_or(RegmapError::UnknownAddress(address))?;
        let expected = register.n_bytes();
        let bytes = bus.read(expected)?;
        if bytes.len() != expected {
            return Err(BusError::ShortRead {
                expected,
                actual: bytes.len(),
            }
            .into());
        }
        register.load_value(be_bytes_to_bits(&bytes));
        Ok(register.value())
    }
}

impl fmt::Display for RegistersMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

#[derive(Serialize, Deserialize)]
struct MapRecord {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    registers: Vec<RegisterRecord>,
}

impl TryFrom<MapRecord> for RegistersMap {
    type Error = RegmapError;

    fn try_from(record: MapRecord) -> Result<Self> {
        let registers = record
            .registers
            .into_iter()
            .map(Register::try_from)
            .collect::<Result<Vec<_>>>()?;
        let mut map = Self::new(record.name, registers)?;
        map.description = record.description;
        Ok(map)
    }
}

impl From<RegistersMap> for MapRecord {
    fn from(map: RegistersMap) -> Self {
        Self {
            name: map.name,
            description: map.description,
            registers: map.registers.into_iter().map(RegisterRecord::from).collect(),
        }
    }
}
