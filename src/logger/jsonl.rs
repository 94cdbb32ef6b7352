//! JSONL activity log: one self-contained JSON object per line.
//!
//! Each line is serialized in full before a single `write_all`, so a reader
//! tailing the file never sees a half-written record. When the primary file
//! cannot be written the writer steps down: fallback file, then stderr with
//! an `[HCM-JSONL]` prefix, then silent discard. Logging never takes the
//! dashboard down.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{HcmError, Result};

/// Log line severity (distinct from a widget's alert severity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Activity event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DashboardStart,
    DashboardStop,
    ConfigReload,
    WidgetMount,
    WidgetUnmount,
    ValidationFailed,
    PollSuccess,
    PollFailure,
    SeverityChange,
    Error,
}

/// A single JSONL record. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp, millisecond precision.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Widget title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widget: Option<String>,
    /// Search URL that was polled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Observed hit count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// Alert severity label after classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// New entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event,
            severity,
            widget: None,
            url: None,
            count: None,
            alert_severity: None,
            duration_ms: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    Primary,
    Fallback,
    Stderr,
    Discard,
}

/// Writer settings.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    /// Rotate once the active file would exceed this size. Default: 10 MiB.
    pub max_size_bytes: u64,
    /// Rotated generations kept as `<path>.1` .. `<path>.N`. Default: 3.
    pub max_rotated_files: u32,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        let logging = crate::core::config::LoggingConfig::default();
        Self {
            path: logging.jsonl_log,
            fallback_path: logging.fallback_log,
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

/// Append-only JSONL writer with size rotation and a degradation chain.
pub struct JsonlWriter {
    config: JsonlConfig,
    file: Option<BufWriter<File>>,
    sink: Sink,
    bytes_written: u64,
}

impl JsonlWriter {
    /// Open the log, falling down the chain until something accepts writes.
    pub fn open(config: JsonlConfig) -> Self {
        let mut writer = Self {
            config,
            file: None,
            sink: Sink::Discard,
            bytes_written: 0,
        };
        writer.attach(Sink::Primary);
        writer
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(mut line) => {
                line.push('\n');
                self.write_line(&line);
            }
            Err(e) => {
                let _ = writeln!(io::stderr(), "[HCM-JSONL] serialize error: {e}");
            }
        }
    }

    pub fn flush(&mut self) {
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
    }

    /// Current sink name: `primary`, `fallback`, `stderr` or `discard`.
    pub fn state(&self) -> &'static str {
        match self.sink {
            Sink::Primary => "primary",
            Sink::Fallback => "fallback",
            Sink::Stderr => "stderr",
            Sink::Discard => "discard",
        }
    }

    fn write_line(&mut self, line: &str) {
        let len = line.len() as u64;
        if self.file.is_some() && self.bytes_written + len > self.config.max_size_bytes {
            self.rotate();
        }

        match self.sink {
            Sink::Primary | Sink::Fallback => {
                let written = self
                    .file
                    .as_mut()
                    .is_some_and(|f| f.write_all(line.as_bytes()).is_ok());
                if written {
                    self.bytes_written += len;
                } else {
                    self.step_down();
                    self.write_line(line);
                }
            }
            Sink::Stderr => {
                if write!(io::stderr(), "[HCM-JSONL] {line}").is_err() {
                    self.sink = Sink::Discard;
                }
            }
            Sink::Discard => {}
        }
    }

    /// Try `start` and every sink below it until one opens.
    fn attach(&mut self, start: Sink) {
        let mut candidate = start;
        loop {
            let path = match candidate {
                Sink::Primary => Some(self.config.path.clone()),
                Sink::Fallback => self.config.fallback_path.clone(),
                Sink::Stderr | Sink::Discard => {
                    self.file = None;
                    self.sink = candidate;
                    if candidate == Sink::Stderr {
                        let _ = writeln!(io::stderr(), "[HCM-JSONL] log files unavailable, using stderr");
                    }
                    return;
                }
            };
            if let Some(path) = path
                && let Ok((file, size)) = open_append(&path)
            {
                if candidate == Sink::Fallback {
                    let _ = writeln!(
                        io::stderr(),
                        "[HCM-JSONL] primary path failed, using fallback: {}",
                        path.display()
                    );
                }
                self.file = Some(BufWriter::new(file));
                self.sink = candidate;
                self.bytes_written = size;
                return;
            }
            candidate = next_sink(candidate);
        }
    }

    fn step_down(&mut self) {
        self.file = None;
        self.attach(next_sink(self.sink));
    }

    fn active_path(&self) -> Option<PathBuf> {
        match self.sink {
            Sink::Primary => Some(self.config.path.clone()),
            Sink::Fallback => self.config.fallback_path.clone(),
            Sink::Stderr | Sink::Discard => None,
        }
    }

    fn rotate(&mut self) {
        let Some(base) = self.active_path() else {
            return;
        };
        self.flush();
        self.file = None;

        let keep = self.config.max_rotated_files.max(1);
        let _ = fs::remove_file(rotated_name(&base, keep));
        for generation in (1..keep).rev() {
            let _ = fs::rename(
                rotated_name(&base, generation),
                rotated_name(&base, generation + 1),
            );
        }
        let _ = fs::rename(&base, rotated_name(&base, 1));

        match open_append(&base) {
            Ok((file, _)) => {
                self.file = Some(BufWriter::new(file));
                self.bytes_written = 0;
            }
            Err(_) => self.step_down(),
        }
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

const fn next_sink(sink: Sink) -> Sink {
    match sink {
        Sink::Primary => Sink::Fallback,
        Sink::Fallback => Sink::Stderr,
        Sink::Stderr | Sink::Discard => Sink::Discard,
    }
}

/// Open or create `path` for appending; returns the file and its current size.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| HcmError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| HcmError::io(path, source))?;
    let size = file.metadata().map_or(0, |m| m.len());
    Ok((file, size))
}

/// `activity.jsonl` → `activity.jsonl.2`.
fn rotated_name(base: &Path, generation: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{generation}"));
    PathBuf::from(name)
}
