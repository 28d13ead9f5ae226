//! Recording of sampled rows.
//!
//! The engine talks to a [`TrackSink`]; failures there are collected as
//! warnings and never abort the physics. [`SimLog`] is the default sink,
//! an in-memory recorder that can flatten itself to CSV afterwards.

use std::io::{self, Write};

use serde::Serialize;
use thiserror::Error;

use super::properties::PropertyValue;

/// A sink failing is a recording problem, not a physics problem.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink io failure: {0}")]
    Io(#[from] io::Error),

    #[error("row holds {got} values but {expected} columns were declared")]
    Shape { expected: usize, got: usize },

    #[error("{0}")]
    Rejected(String),
}

/// One declared output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Entity full name plus property label, e.g. "Proton 0: Position".
    pub key: String,
    /// Vector columns flatten to three numeric columns on export.
    pub vector: bool,
}

impl Column {
    pub fn new(key: impl Into<String>, vector: bool) -> Self {
        Self {
            key: key.into(),
            vector,
        }
    }
}

/// Column keys embed user-supplied names; a comma or quote in one must
/// not shift the CSV columns, so such cells get quoted with inner quotes
/// doubled.
fn csv_cell(text: &str) -> String {
    if text.contains(',') || text.contains('"') {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// Consumer of sampled simulation data.
///
/// `begin` declares the column layout once, then `append` delivers one row
/// per logging tick. `note` and `record_environment` carry the end-of-run
/// summary; they are infallible because dropping a summary entry is not
/// worth failing a finished run over.
pub trait TrackSink {
    fn begin(&mut self, columns: &[Column]) -> Result<(), SinkError>;

    fn append(&mut self, tick: usize, values: &[PropertyValue]) -> Result<(), SinkError>;

    fn note(&mut self, key: &str, value: &str);

    fn record_environment(&mut self, entries: &[(String, usize)]);
}

/// One recorded row, keyed by the tick it was sampled on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub tick: usize,
    pub values: Vec<PropertyValue>,
}

/// In-memory recorder and the default sink.
///
/// Holds the tracked table plus the run's closing notes, and serializes
/// as a whole for full-state snapshots.
#[derive(Debug, Default, Serialize)]
pub struct SimLog {
    columns: Vec<Column>,
    rows: Vec<Row>,
    notes: Vec<(String, String)>,
    environment: Vec<(String, usize)>,
}

impl SimLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn notes(&self) -> &[(String, String)] {
        &self.notes
    }

    pub fn environment(&self) -> &[(String, usize)] {
        &self.environment
    }

    /// Writes the tracked table as CSV. Vector columns flatten to three
    /// columns suffixed `[x]`, `[y]`, `[z]`.
    pub fn write_csv<W: Write>(&self, mut w: W) -> io::Result<()> {
        write!(w, "tick")?;
        for col in &self.columns {
            if col.vector {
                for axis in ["x", "y", "z"] {
                    write!(w, ",{}", csv_cell(&format!("{} [{axis}]", col.key)))?;
                }
            } else {
                write!(w, ",{}", csv_cell(&col.key))?;
            }
        }
        writeln!(w)?;
        for row in &self.rows {
            write!(w, "{}", row.tick)?;
            for value in &row.values {
                match value {
                    PropertyValue::Scalar(s) => write!(w, ",{s}")?,
                    PropertyValue::Vector(v) => write!(w, ",{},{},{}", v.x, v.y, v.z)?,
                }
            }
            writeln!(w)?;
        }
        Ok(())
    }
}

impl TrackSink for SimLog {
    fn begin(&mut self, columns: &[Column]) -> Result<(), SinkError> {
        self.columns = columns.to_vec();
        Ok(())
    }

    fn append(&mut self, tick: usize, values: &[PropertyValue]) -> Result<(), SinkError> {
        if values.len() != self.columns.len() {
            return Err(SinkError::Shape {
                expected: self.columns.len(),
                got: values.len(),
            });
        }
        self.rows.push(Row {
            tick,
            values: values.to_vec(),
        });
        Ok(())
    }

    fn note(&mut self, key: &str, value: &str) {
        self.notes.push((key.to_string(), value.to_string()));
    }

    fn record_environment(&mut self, entries: &[(String, usize)]) {
        self.environment = entries.to_vec();
    }
}
