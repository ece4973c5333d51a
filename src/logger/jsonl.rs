//! JSONL activity log: one self-contained JSON object per line.
//!
//! Each line is serialized in memory and written with a single `write_all`, so
//! a `tail -f` never sees a half line. When the primary file cannot be written
//! the writer degrades to the fallback file, then to stderr (`[LCDC-JSONL]`
//! prefix), then discards. The panel never stops for a logging failure.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::errors::{PanelError, Result};

const WRITE_BUFFER: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DaemonStart,
    DaemonStop,
    ConfigLoaded,
    ModeChange,
    ActionExecuted,
    ActionFailed,
    QuickLaunch,
    InputError,
    InputDropped,
    Error,
}

/// One log line. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp with milliseconds.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_mode: Option<String>,
    /// Raw action string as configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// `menu` or `quick_launch`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Menu labels leading to the action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub menu_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Output as shown on the display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
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
            ts: format_utc_now(),
            event,
            severity,
            from_mode: None,
            to_mode: None,
            action: None,
            origin: None,
            menu_path: None,
            ok: None,
            duration_ms: None,
            output: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    /// Rotate once the file would exceed this many bytes.
    pub max_size_bytes: u64,
    /// Rotated generations kept (`.1` newest).
    pub max_rotated_files: u32,
    pub fsync_interval: Duration,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/log/lcdc/activity.jsonl"),
            fallback_path: Some(PathBuf::from("/tmp/lcdc-activity.jsonl")),
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval: Duration::from_secs(10),
        }
    }
}

impl JsonlConfig {
    /// Config writing to `path`, with the default fallback and limits.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Where lines currently go.
enum Sink {
    Primary(BufWriter<File>),
    Fallback(BufWriter<File>),
    Stderr,
    Discard,
}

impl Sink {
    const fn name(&self) -> &'static str {
        match self {
            Self::Primary(_) => "normal",
            Self::Fallback(_) => "fallback",
            Self::Stderr => "stderr",
            Self::Discard => "discard",
        }
    }

    fn file(&mut self) -> Option<&mut BufWriter<File>> {
        match self {
            Self::Primary(w) | Self::Fallback(w) => Some(w),
            Self::Stderr | Self::Discard => None,
        }
    }
}

/// Append-only JSONL writer with size rotation and a degradation chain.
pub struct JsonlWriter {
    config: JsonlConfig,
    sink: Sink,
    bytes_written: u64,
    last_fsync: Instant,
}

impl JsonlWriter {
    /// Open the log, falling through the degradation chain as needed.
    pub fn open(config: JsonlConfig) -> Self {
        let mut writer = Self {
            config,
            sink: Sink::Discard,
            bytes_written: 0,
            last_fsync: Instant::now(),
        };
        writer.open_primary_or_fallback();
        writer
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => self.write_line(&format!("{json}\n")),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[LCDC-JSONL] serialize error: {e}");
            }
        }
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.sink.file() {
            let _ = w.flush();
        }
    }

    /// Flush and `fdatasync` the current file.
    pub fn fsync(&mut self) {
        if let Some(w) = self.sink.file() {
            let _ = w.flush();
            let _ = w.get_ref().sync_data();
        }
        self.last_fsync = Instant::now();
    }

    /// `normal`, `fallback`, `stderr` or `discard`.
    pub fn state(&self) -> &'static str {
        self.sink.name()
    }

    pub const fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Return to the primary file if it has become writable again.
    pub fn try_recover(&mut self) {
        if matches!(self.sink, Sink::Primary(_)) {
            return;
        }
        if let Ok((file, size)) = open_append(&self.config.path) {
            self.flush();
            self.sink = Sink::Primary(BufWriter::with_capacity(WRITE_BUFFER, file));
            self.bytes_written = size;
            let _ = writeln!(
                io::stderr(),
                "[LCDC-JSONL] recovered to primary path: {}",
                self.config.path.display()
            );
        }
    }

    // ──────────────────────── internals ────────────────────────

    fn write_line(&mut self, line: &str) {
        let len = line.len() as u64;
        if self.sink.file().is_some() && self.bytes_written + len > self.config.max_size_bytes {
            self.rotate();
        }

        let written = match &mut self.sink {
            Sink::Primary(w) | Sink::Fallback(w) => w.write_all(line.as_bytes()).is_ok(),
            Sink::Stderr => {
                let _ = write!(io::stderr(), "[LCDC-JSONL] {line}");
                return;
            }
            Sink::Discard => return,
        };

        if written {
            self.bytes_written += len;
            if self.last_fsync.elapsed() >= self.config.fsync_interval {
                self.fsync();
            }
        } else {
            self.degrade();
            self.write_line(line);
        }
    }

    fn open_primary_or_fallback(&mut self) {
        match open_append(&self.config.path) {
            Ok((file, size)) => {
                self.sink = Sink::Primary(BufWriter::with_capacity(WRITE_BUFFER, file));
                self.bytes_written = size;
            }
            Err(_) => self.open_fallback(),
        }
    }

    fn open_fallback(&mut self) {
        let Some(fallback) = self.config.fallback_path.clone() else {
            let _ = writeln!(
                io::stderr(),
                "[LCDC-JSONL] primary path failed and no fallback configured, using stderr"
            );
            self.sink = Sink::Stderr;
            return;
        };
        match open_append(&fallback) {
            Ok((file, size)) => {
                let _ = writeln!(
                    io::stderr(),
                    "[LCDC-JSONL] primary path failed, using fallback: {}",
                    fallback.display()
                );
                self.sink = Sink::Fallback(BufWriter::with_capacity(WRITE_BUFFER, file));
                self.bytes_written = size;
            }
            Err(_) => {
                let _ = writeln!(
                    io::stderr(),
                    "[LCDC-JSONL] primary and fallback paths failed, using stderr"
                );
                self.sink = Sink::Stderr;
            }
        }
    }

    fn degrade(&mut self) {
        match self.sink {
            Sink::Primary(_) => self.open_fallback(),
            Sink::Fallback(_) => {
                let _ = writeln!(io::stderr(), "[LCDC-JSONL] fallback write failed, using stderr");
                self.sink = Sink::Stderr;
            }
            Sink::Stderr | Sink::Discard => self.sink = Sink::Discard,
        }
    }

    /// `log.jsonl` → `log.jsonl.1`, `.1` → `.2`, …; the oldest is dropped.
    fn rotate(&mut self) {
        let base = match &self.sink {
            Sink::Primary(_) => self.config.path.clone(),
            Sink::Fallback(_) => match &self.config.fallback_path {
                Some(path) => path.clone(),
                None => return,
            },
            Sink::Stderr | Sink::Discard => return,
        };
        self.flush();

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
                let writer = BufWriter::with_capacity(WRITE_BUFFER, file);
                self.sink = match self.sink {
                    Sink::Fallback(_) => Sink::Fallback(writer),
                    _ => Sink::Primary(writer),
                };
                self.bytes_written = 0;
            }
            Err(_) => self.degrade(),
        }
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

// ──────────────────────── helpers ────────────────────────

/// Open or create `path` for appending, creating parent directories.
/// Returns the file and its current size.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| PanelError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| PanelError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

fn rotated_name(base: &Path, generation: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{generation}"));
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
