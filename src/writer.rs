//! Event persistence: JSON-lines and CSV sinks.
//!
//! Both formats carry the same fields in the same order (see
//! [`EventRecord`]). CSV keeps the structured `axes`/`buttons` fields by
//! JSON-encoding them into string cells, so a CSV row loses no information
//! relative to a JSONL record.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;

use crate::record::EventRecord;

/// On-disk encoding for event records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One CSV row per record, header row first.
    #[default]
    Csv,
    /// One JSON object per line.
    Jsonl,
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("record serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Anything that accepts decoded event records.
///
/// The session only ever sees this trait; tests capture records in memory
/// through it.
pub trait EventSink {
    fn write(&mut self, record: &EventRecord) -> Result<(), WriterError>;

    fn flush(&mut self) -> Result<(), WriterError> {
        Ok(())
    }
}

const CSV_HEADER: &str = "timestamp_iso,timestamp_epoch_ms,device_handle,device_name,\
usage_page,usage,report_size,report_hex,axes,buttons";

/// File-backed [`EventSink`] in either output format.
pub struct EventWriter<W: Write> {
    out: W,
    format: OutputFormat,
}

impl EventWriter<BufWriter<File>> {
    /// Create (truncating) `path` and write the CSV header when applicable.
    pub fn create(path: &Path, format: OutputFormat) -> Result<Self, WriterError> {
        Self::new(BufWriter::new(File::create(path)?), format)
    }
}

impl<W: Write> EventWriter<W> {
    pub fn new(mut out: W, format: OutputFormat) -> Result<Self, WriterError> {
        if format == OutputFormat::Csv {
            writeln!(out, "{CSV_HEADER}")?;
        }
        Ok(Self { out, format })
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_csv_row(&mut self, record: &EventRecord) -> Result<(), WriterError> {
        let axes = serde_json::to_string(&record.decoded.axes)?;
        let buttons = serde_json::to_string(&record.decoded.buttons)?;
        let cells = [
            record.timestamp_iso.clone(),
            record.timestamp_epoch_ms.to_string(),
            record.device_handle.clone(),
            record.device_name.clone(),
            record.usage_page.map(|v| v.to_string()).unwrap_or_default(),
            record.usage.map(|v| v.to_string()).unwrap_or_default(),
            record.report_size.to_string(),
            record.report_hex.clone(),
            axes,
            buttons,
        ];
        let row: Vec<String> = cells.iter().map(|cell| csv_escape(cell)).collect();
        writeln!(self.out, "{}", row.join(","))?;
        Ok(())
    }
}

impl<W: Write> EventSink for EventWriter<W> {
    fn write(&mut self, record: &EventRecord) -> Result<(), WriterError> {
        match self.format {
            OutputFormat::Jsonl => {
                serde_json::to_writer(&mut self.out, record)?;
                self.out.write_all(b"\n")?;
            }
            OutputFormat::Csv => self.write_csv_row(record)?,
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), WriterError> {
        self.out.flush()?;
        Ok(())
    }
}

/// RFC 4180 quoting: quote a cell that contains a comma, quote, or newline,
/// doubling any embedded quotes.
fn csv_escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
