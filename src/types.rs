use crate::error::ScpiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Physical unit attached to a [`Reading`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Hertz,
    Dbm,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Hertz => write!(f, "Hz"),
            Unit::Dbm => write!(f, "dBm"),
        }
    }
}

/// A measurement outcome: the instrument's textual value plus its unit.
///
/// The value may be absent when the instrument could not produce one, which
/// is distinct from zero and from a hard error. Measurement workflows return
/// an unavailable reading instead of propagating instrument-level faults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    value: Option<String>,
    unit: Unit,
}

impl Reading {
    pub fn available(value: impl Into<String>, unit: Unit) -> Self {
        Self {
            value: Some(value.into()),
            unit,
        }
    }

    pub fn unavailable(unit: Unit) -> Self {
        Self { value: None, unit }
    }

    pub fn is_available(&self) -> bool {
        self.value.is_some()
    }

    /// Raw instrument text, if any.
    pub fn text(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Numeric interpretation of the value. Instruments report numbers in
    /// exponent notation (`1.89000000E+07`), which `f64::parse` accepts.
    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_deref().and_then(|v| v.trim().parse().ok())
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{} {}", v, self.unit),
            None => write!(f, "unavailable"),
        }
    }
}

/// An acquired trace: amplitude samples paired with the reconstructed
/// frequency axis. Both sequences always have the same length; the length
/// is the number of samples actually decoded from the instrument, not the
/// instrument's advisory point count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub frequencies_hz: Vec<f64>,
    pub amplitudes_dbm: Vec<f32>,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.amplitudes_dbm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amplitudes_dbm.is_empty()
    }

    /// Render the trace as a two-column CSV table.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("frequency_hz,amplitude_dbm\n");
        for (freq, amp) in self.frequencies_hz.iter().zip(&self.amplitudes_dbm) {
            out.push_str(&format!("{freq},{amp}\n"));
        }
        out
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), ScpiError> {
        std::fs::write(path, self.to_csv())
            .map_err(|e| ScpiError::io(format!("writing trace CSV to {}", path.display()), e))
    }
}

/// Outcome of a successful screen capture: where the image landed locally
/// and the exact remote path it was stored under. The remote path is what
/// `delete_remote_file` needs for cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenCapture {
    pub local_path: PathBuf,
    pub remote_path: String,
}
