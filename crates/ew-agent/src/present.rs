//! Measurement output: one line per measurement, text or JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::io::{self, Write};

use ew_elm327::Measurement;

use crate::config::OutputFormat;

/// JSON line layout.
#[derive(Debug, Serialize)]
struct Record<'a> {
    timestamp: String,
    pid: &'static str,
    name: &'static str,
    unit: &'static str,
    #[serde(flatten)]
    measurement: &'a Measurement,
}

/// Writes measurements to a sink in the configured format.
pub struct Presenter<W: Write> {
    format: OutputFormat,
    out: W,
}

impl<W: Write> Presenter<W> {
    pub fn new(format: OutputFormat, out: W) -> Self {
        Self { format, out }
    }

    /// Write one measurement, stamped with the current time.
    pub fn emit(&mut self, measurement: &Measurement) -> io::Result<()> {
        let line = render(self.format, measurement, Utc::now())?;
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Format a single measurement without the trailing newline.
pub fn render(
    format: OutputFormat,
    measurement: &Measurement,
    at: DateTime<Utc>,
) -> io::Result<String> {
    match format {
        OutputFormat::Text => Ok(measurement.to_string()),
        OutputFormat::Json => {
            let record = Record {
                timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
                pid: measurement.pid(),
                name: measurement.name(),
                unit: measurement.unit(),
                measurement,
            };
            serde_json::to_string(&record).map_err(io::Error::other)
        }
    }
}
