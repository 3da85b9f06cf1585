//! Log line reader
//!
//! Supplies raw lines to the classifier in two ways:
//! - Batch: every `.log` file under `{root}/YYYY-MM-DD/` for the dates a time
//!   window covers, keeping lines whose leading timestamp falls in the window
//! - Tail: newline-terminated lines appended to one file since its last
//!   recorded cursor; a trailing partial line waits for the next read
//!
//! Missing directories and unreadable files are logged and skipped.

use crate::event::ParseError;
use crate::utils::AppError;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Leading timestamp format of every application log line
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Name format of the per-day log directories
pub const DATE_DIR_FORMAT: &str = "%Y-%m-%d";

/// File extension of application log files
const LOG_EXTENSION: &str = "log";

/// Log reader result type
pub type LogReaderResult<T> = Result<T, AppError>;

/// One line of an application log file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLogLine {
    pub text: String,
    pub source: PathBuf,
    /// 1-based line number within `source`
    pub line_number: usize,
    /// Parsed leading timestamp (batch mode only)
    pub timestamp: Option<NaiveDateTime>,
}

/// Half-open analysis window `[start, end)` in server-local time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Window covering the `hours` preceding `end`, `None` if the start is out of range
    pub fn last_hours(end: NaiveDateTime, hours: u32) -> Option<Self> {
        let span = TimeDelta::try_hours(i64::from(hours))?;
        end.checked_sub_signed(span).map(|start| Self::new(start, end))
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Calendar dates whose directories may hold lines of this window
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut current = self.start.date();
        let last = self.end.date();
        while current <= last {
            dates.push(current);
            match current.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
        }
        dates
    }

    /// Window length in whole hours, rounded up
    pub fn hours_ceil(&self) -> i64 {
        let seconds = (self.end - self.start).num_seconds().max(0);
        (seconds + 3599) / 3600
    }
}

/// Parse the `YYYY-MM-DD HH:MM:SS.ffffff` prefix of a log line
pub fn parse_line_timestamp(line: &str) -> Result<NaiveDateTime, ParseError> {
    let mut parts = line.splitn(3, ' ');
    let (date, time) = match (parts.next(), parts.next()) {
        (Some(date), Some(time)) => (date, time),
        _ => return Err(ParseError::InvalidTimestamp),
    };
    NaiveDateTime::parse_from_str(&format!("{} {}", date, time.trim_end()), LOG_TIMESTAMP_FORMAT)
        .map_err(|_| ParseError::InvalidTimestamp)
}

/// Per-file position recorded by tail mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TailCursor {
    /// Complete lines already handed out
    pub lines: usize,
    /// Modification time observed at the last read
    pub modified: Option<SystemTime>,
    /// File size in bytes observed at the last read
    pub size: u64,
}

/// Tail cursors keyed by file path
///
/// Owned by the driver loop and passed into every tail read; nothing is
/// persisted across process restarts.
#[derive(Debug, Clone, Default)]
pub struct TailState {
    cursors: HashMap<PathBuf, TailCursor>,
}

impl TailState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self, path: &Path) -> Option<TailCursor> {
        self.cursors.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    fn record(&mut self, path: &Path, cursor: TailCursor) {
        self.cursors.insert(path.to_path_buf(), cursor);
    }
}

/// Reads application log lines in batch or tail mode
#[derive(Debug, Clone)]
pub struct LogReader {
    /// Root containing one directory per calendar date
    log_root: PathBuf,
}

impl LogReader {
    pub fn new(log_root: impl Into<PathBuf>) -> Self {
        let log_root = log_root.into();
        debug!(log_root = %log_root.display(), "LogReader initialized");
        Self { log_root }
    }

    pub fn log_root(&self) -> &Path {
        &self.log_root
    }

    /// Read every line inside `window`, in file-then-line order
    pub fn read_window(&self, window: &TimeWindow) -> Vec<RawLogLine> {
        let mut lines = Vec::new();

        for date in window.dates() {
            let directory = self.date_dir(date);
            if !directory.is_dir() {
                debug!(dir = %directory.display(), "Log directory does not exist, skipping");
                continue;
            }

            let files = match self.list_log_files(&directory) {
                Ok(files) => files,
                Err(e) => {
                    warn!(error = %e, "Failed to list log directory, skipping");
                    continue;
                }
            };

            for file in files {
                match self.read_lines(&file) {
                    Ok(content) => {
                        let before = lines.len();
                        lines.extend(content.into_iter().filter_map(|line| {
                            let timestamp = parse_line_timestamp(&line.text).ok()?;
                            window.contains(timestamp).then(|| RawLogLine {
                                text: line.text.trim().to_string(),
                                timestamp: Some(timestamp),
                                ..line
                            })
                        }));
                        debug!(
                            file = %file.display(),
                            matched = lines.len() - before,
                            "Read log file"
                        );
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to open log file, skipping");
                    }
                }
            }
        }

        lines
    }

    /// Read lines appended to `path` since its cursor and advance the cursor
    ///
    /// A file seen for the first time is read from the start. If the file has
    /// fewer lines than the cursor it was rotated or truncated, and is re-read
    /// from the start. A last line without its newline is left for the next
    /// call; the cursor stops before it.
    pub fn read_appended(
        &self,
        path: &Path,
        state: &mut TailState,
    ) -> LogReaderResult<Vec<RawLogLine>> {
        let (modified, size) = Self::file_stamp(path);
        let mut lines = self.read_complete_lines(path)?;
        let current_line_count = lines.len();

        let mut last_line = state.cursor(path).map(|c| c.lines).unwrap_or(0);
        if current_line_count < last_line {
            info!(
                file = %path.display(),
                previous_line = last_line,
                current_lines = current_line_count,
                "Log file appears to have been rotated/truncated, resetting line counter"
            );
            last_line = 0;
        }

        let new_lines = lines.split_off(last_line);
        state.record(
            path,
            TailCursor {
                lines: current_line_count,
                modified,
                size,
            },
        );

        debug!(
            file = %path.display(),
            new_lines = new_lines.len(),
            after_line = last_line,
            "Read appended log lines"
        );
        Ok(new_lines)
    }

    /// Move the cursor of `path` to its current end without returning lines
    pub fn prime(&self, path: &Path, state: &mut TailState) -> LogReaderResult<usize> {
        let (modified, size) = Self::file_stamp(path);
        let count = self.read_complete_lines(path)?.len();
        state.record(
            path,
            TailCursor {
                lines: count,
                modified,
                size,
            },
        );
        Ok(count)
    }

    /// Log files whose modification time or size differs from the last read
    pub fn changed_files(&self, state: &TailState) -> Vec<PathBuf> {
        self.discover_log_files()
            .into_iter()
            .filter(|path| match state.cursor(path) {
                Some(cursor) => (cursor.modified, cursor.size) != Self::file_stamp(path),
                None => true,
            })
            .collect()
    }

    /// Every log file under the root, recursively, sorted by path
    pub fn discover_log_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut pending = vec![self.log_root.clone()];

        while let Some(directory) = pending.pop() {
            let entries = match fs::read_dir(&directory) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, dir = %directory.display(), "Failed to read log directory");
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                // symlink은 따라가지 않음 (순환 방지)
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                if is_dir {
                    pending.push(path);
                } else if Self::is_log_file(&path) {
                    files.push(path);
                }
            }
        }

        files.sort();
        files
    }

    /// Directory holding the logs of `date`
    fn date_dir(&self, date: NaiveDate) -> PathBuf {
        self.log_root.join(date.format(DATE_DIR_FORMAT).to_string())
    }

    fn is_log_file(path: &Path) -> bool {
        path.extension()
            .map(|ext| ext == LOG_EXTENSION)
            .unwrap_or(false)
    }

    /// Log files directly inside `directory`, sorted by name
    fn list_log_files(&self, directory: &Path) -> LogReaderResult<Vec<PathBuf>> {
        let entries = fs::read_dir(directory).map_err(|e| AppError::unreadable(directory, e))?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| !entry.file_type().map(|t| t.is_dir()).unwrap_or(true))
            .map(|entry| entry.path())
            .filter(|path| Self::is_log_file(path))
            .collect();
        files.sort();
        Ok(files)
    }

    /// File content; invalid UTF-8 is replaced rather than failing the file
    fn read_content(path: &Path) -> LogReaderResult<String> {
        let bytes = fs::read(path).map_err(|e| AppError::unreadable(path, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// All lines of a file, including a last line without newline
    fn read_lines(&self, path: &Path) -> LogReaderResult<Vec<RawLogLine>> {
        let content = Self::read_content(path)?;
        Ok(Self::numbered(path, content.lines()))
    }

    /// Newline-terminated lines only
    fn read_complete_lines(&self, path: &Path) -> LogReaderResult<Vec<RawLogLine>> {
        let content = Self::read_content(path)?;
        let complete = content
            .split_inclusive('\n')
            .filter(|line| line.ends_with('\n'))
            .map(|line| line.trim_end_matches(['\r', '\n']));
        Ok(Self::numbered(path, complete))
    }

    fn numbered<'a>(path: &Path, lines: impl Iterator<Item = &'a str>) -> Vec<RawLogLine> {
        lines
            .enumerate()
            .map(|(idx, text)| RawLogLine {
                text: text.to_string(),
                source: path.to_path_buf(),
                line_number: idx + 1,
                timestamp: None,
            })
            .collect()
    }

    fn file_stamp(path: &Path) -> (Option<SystemTime>, u64) {
        match fs::metadata(path) {
            Ok(meta) => (meta.modified().ok(), meta.len()),
            Err(_) => (None, 0),
        }
    }
}
