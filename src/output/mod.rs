//! Record formatting and output sinks.
//!
//! A [`Record`] is the formatted form of a consumed message. Sinks receive
//! records one at a time; any sink failure is fatal for the run.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};

/// A record header with its value already rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    /// Header name
    pub key: String,
    /// Rendered header value
    pub value: String,
}

/// A formatted message ready to be emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Source partition
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Broker or producer timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Rendered key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Rendered value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Rendered headers, in message order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<RecordHeader>,
}

/// Destination for formatted records.
pub trait Sink: Send {
    /// Emits a single record.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error; callers treat it as fatal.
    fn emit(&mut self, record: &Record) -> io::Result<()>;
}

/// How records are laid out by a [`WriterSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Labelled fields followed by the value
    #[default]
    Text,
    /// The value only
    Raw,
    /// One JSON object per line
    Json,
}

/// Which record fields the text format prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrintOptions {
    /// Print the key
    pub show_key: bool,
    /// Print the timestamp
    pub show_timestamp: bool,
    /// Print the headers
    pub show_headers: bool,
    /// Print partition and offset
    pub show_partition: bool,
    /// Use ANSI colors for labels
    pub color: bool,
}

/// Writes records to any `Write` implementation, flushing after each one.
///
/// # Example
///
/// ```rust
/// use kaftail::output::{OutputFormat, PrintOptions, Record, Sink, WriterSink};
///
/// let mut sink = WriterSink::new(Vec::new(), OutputFormat::Raw, PrintOptions::default());
/// let record = Record {
///     partition: 0,
///     offset: 1,
///     timestamp: None,
///     key: None,
///     value: Some("hello".to_string()),
///     headers: Vec::new(),
/// };
/// sink.emit(&record).unwrap();
/// assert_eq!(sink.into_inner(), b"hello\n");
/// ```
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    writer: W,
    format: OutputFormat,
    options: PrintOptions,
}

impl<W: Write> WriterSink<W> {
    /// Creates a sink over `writer`.
    pub fn new(writer: W, format: OutputFormat, options: PrintOptions) -> Self {
        Self {
            writer,
            format,
            options,
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn label(&self, text: &str) -> String {
        if self.options.color {
            text.cyan().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn format_text(&self, record: &Record) -> String {
        let mut out = String::new();

        if self.options.show_partition {
            let _ = writeln!(
                out,
                "{} {}  {} {}",
                self.label("Partition:"),
                record.partition,
                self.label("Offset:"),
                record.offset
            );
        }
        if self.options.show_timestamp {
            let timestamp = record
                .timestamp
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(out, "{} {}", self.label("Timestamp:"), timestamp);
        }
        if self.options.show_key {
            let _ = writeln!(
                out,
                "{} {}",
                self.label("Key:"),
                record.key.as_deref().unwrap_or("-")
            );
        }
        if self.options.show_headers && !record.headers.is_empty() {
            let headers: Vec<String> = record
                .headers
                .iter()
                .map(|h| format!("{}={}", h.key, h.value))
                .collect();
            let _ = writeln!(out, "{} {}", self.label("Headers:"), headers.join(", "));
        }

        out.push_str(record.value.as_deref().unwrap_or(""));
        out.push('\n');
        out
    }
}

impl<W: Write + Send> Sink for WriterSink<W> {
    fn emit(&mut self, record: &Record) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                let text = self.format_text(record);
                self.writer.write_all(text.as_bytes())?;
            }
            OutputFormat::Raw => {
                self.writer
                    .write_all(record.value.as_deref().unwrap_or("").as_bytes())?;
                self.writer.write_all(b"\n")?;
            }
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.writer, record)?;
                self.writer.write_all(b"\n")?;
            }
        }
        self.writer.flush()
    }
}

/// Collects records in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Record>>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records emitted so far.
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// `(partition, offset)` of every record emitted so far.
    pub fn positions(&self) -> Vec<(i32, i64)> {
        self.records()
            .iter()
            .map(|r| (r.partition, r.offset))
            .collect()
    }
}

impl Sink for MemorySink {
    fn emit(&mut self, record: &Record) -> io::Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        Ok(())
    }
}
