//! Non-fatal diagnostics and the sink trait they are delivered through.

use std::fmt;

/// Condition the core recovered from but a caller may want to know about.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A value could not be held exactly by its numeric profile and was truncated.
    Truncation {
        /// Value the caller asked for.
        requested: f64,
        /// Value actually stored.
        kept: f64,
    },
    /// A batch load referenced an address with no register; the pair was skipped.
    UnknownAddress {
        /// Address that missed.
        address: u32,
        /// Value that was not applied.
        value: u64,
    },
    /// A batch load referenced an element name that is not in the map; the pair was skipped.
    UnknownElement {
        /// Name that missed.
        name: String,
        /// Value that was not applied.
        value: u64,
    },
    /// A bus with no physical device behind it was created.
    VirtualDevice,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncation { requested, kept } => {
                write!(f, "{requested} is truncated to {kept}")
            }
            Self::UnknownAddress { address, value } => {
                write!(f, "no register at address {address}, skipped value {value:#x}")
            }
            Self::UnknownElement { name, value } => {
                write!(f, "unknown element '{name}', skipped value {value:#x}")
            }
            Self::VirtualDevice => write!(f, "virtual device, data may not be real"),
        }
    }
}

/// Receiver for [`Diagnostic`]s raised while the core keeps going.
pub trait DiagnosticSink {
    /// Records one diagnostic in the order it was raised.
    fn on_diagnostic(&mut self, diagnostic: Diagnostic);
}

impl<F> DiagnosticSink for F
where
    F: FnMut(Diagnostic),
{
    fn on_diagnostic(&mut self, diagnostic: Diagnostic) {
        self(diagnostic);
    }
}

/// Sink that forwards every diagnostic to the `log` facade at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn on_diagnostic(&mut self, diagnostic: Diagnostic) {
        log::warn!("{diagnostic}");
    }
}
