//! Line-oriented register dumps.
//!
//! One register per line as `<decimal address>, <hex value>h`. The hex value
//! may instead carry a `0x` prefix. Blank lines and lines starting with `#`
//! are skipped.
//!
//! ```text
//! # dac
//! 0, 1ah
//! 1, 0x81
//! ```

use std::fmt::Write as _;
use std::fs;
use std::num::ParseIntError;
use std::path::Path;

use crate::error::{RegmapError, Result};
use crate::map::RegistersMap;

/// Comment marker for dump files.
pub const COMMENT_PREFIX: char = '#';

/// Parses dump text into `(address, value)` pairs in file order.
///
/// # Errors
///
/// Returns [`RegmapError::Parse`] with the 1-indexed line of the first
/// malformed entry.
pub fn parse_register_dump(text: &str) -> Result<Vec<(u32, u64)>> {
    let mut pairs = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(COMMENT_PREFIX) {
            continue;
        }
        pairs.push(parse_line(line).map_err(|message| RegmapError::Parse {
            line: idx + 1,
            message,
        })?);
    }
    Ok(pairs)
}

fn parse_line(line: &str) -> std::result::Result<(u32, u64), String> {
    let (address, value) = line
        .split_once(',')
        .ok_or_else(|| format!("expected '<address>, <value>', got '{line}'"))?;
    let address = address.trim();
    let address = address
        .parse::<u32>()
        .map_err(|e| format!("invalid address '{address}': {e}"))?;
    let value = value.trim();
    let value = parse_hex_value(value).map_err(|e| format!("invalid hex value '{value}': {e}"))?;
    Ok((address, value))
}

/// Parses a hex word, accepting an optional `0x`/`0X` prefix and an optional
/// `h`/`H` suffix.
///
/// # Errors
///
/// Returns the [`ParseIntError`] for anything else that is not base-16.
pub fn parse_hex_value(text: &str) -> std::result::Result<u64, ParseIntError> {
    u64::from_str_radix(strip_hex_marker(text.trim()), 16)
}

fn strip_hex_marker(value: &str) -> &str {
    let value = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    value
        .strip_suffix('h')
        .or_else(|| value.strip_suffix('H'))
        .unwrap_or(value)
}

/// Formats pairs as dump text, preceded by an optional `#` header line.
#[must_use]
pub fn format_register_dump(header: Option<&str>, addressed_values: &[(u32, u64)]) -> String {
    let mut out = String::new();
    if let Some(header) = header {
        for line in header.lines() {
            let _ = writeln!(out, "{COMMENT_PREFIX} {line}");
        }
    }
    for (address, value) in addressed_values {
        let _ = writeln!(out, "{address}, {value:x}h");
    }
    out
}

/// Reads a dump file into `(address, value)` pairs.
///
/// # Errors
///
/// Returns [`RegmapError::Io`] when the file cannot be read and
/// [`RegmapError::Parse`] for malformed lines.
pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<(u32, u64)>> {
    parse_register_dump(&fs::read_to_string(path)?)
}

impl RegistersMap {
    /// Reads a dump file and loads it with [`RegistersMap::load_values`].
    ///
    /// Returns the number of lines applied; unknown addresses are logged.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::Io`] or [`RegmapError::Parse`] from [`read_file`].
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let pairs = read_file(path)?;
        Ok(self.load_values(pairs))
    }

    /// Writes the current register values, sorted by address, as a dump file.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::Io`] when the file cannot be written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = format_register_dump(Some(self.name()), &self.addressed_values());
        fs::write(path, text)?;
        Ok(())
    }

    /// Reads a JSON schema or [`RegistersMap::dumps`] output from disk.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::Io`] or [`RegmapError::Json`].
    pub fn load_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::loads(&fs::read_to_string(path)?)
    }

    /// Writes [`RegistersMap::dumps`] output to disk.
    ///
    /// # Errors
    ///
    /// Returns [`RegmapError::Io`] or [`RegmapError::Json`].
    pub fn save_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.dumps()?)?;
        Ok(())
    }
}
