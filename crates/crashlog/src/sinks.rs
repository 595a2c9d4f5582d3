use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};

pub const CLIPBOARD_LABEL: &str = "crash_log";

/// A destination for the formatted crash report.
pub trait CrashSink: Send + Sync {
    fn name(&self) -> &'static str;
    fn write(&self, report: &str) -> Result<()>;
}

/// Overwrites a single log file; only the latest crash survives.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CrashSink for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    fn write(&self, report: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .with_context(|| format!("open crash log failed: {}", self.path.display()))?;
        f.write_all(report.as_bytes())
            .context("write crash log failed")?;
        f.flush().context("flush crash log failed")?;
        Ok(())
    }
}

/// Replaces the system clipboard with the report as plain text.
#[derive(Debug, Clone)]
pub struct ClipboardSink {
    label: String,
}

impl ClipboardSink {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    // arboard has no notion of clip labels; the label only shows up in
    // diagnostics.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Default for ClipboardSink {
    fn default() -> Self {
        Self::new(CLIPBOARD_LABEL)
    }
}

impl CrashSink for ClipboardSink {
    fn name(&self) -> &'static str {
        "clipboard"
    }

    fn write(&self, report: &str) -> Result<()> {
        if report.trim().is_empty() {
            return Err(anyhow!("E_CLIPBOARD_EMPTY_TEXT: empty report ({})", self.label));
        }
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| anyhow!("E_CLIPBOARD_UNAVAILABLE: clipboard init failed: {e}"))?;
        clipboard
            .set_text(report.to_string())
            .map_err(|e| anyhow!("E_CLIPBOARD_WRITE_FAILED: {}: {e}", self.label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn file_sink_creates_missing_file() {
        let td = tempfile::tempdir().expect("tempdir");
        let path = td.path().join("scan_crash.log");
        assert!(!path.exists());

        FileSink::new(&path).write("first crash\n").expect("write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "first crash\n");
    }

    #[test]
    fn file_sink_truncates_previous_content() {
        let td = tempfile::tempdir().expect("tempdir");
        let path = td.path().join("scan_crash.log");
        fs::write(&path, "SENTINEL ".repeat(100)).expect("seed");

        FileSink::new(&path).write("short").expect("write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "short");
    }

    #[test]
    fn file_sink_reports_missing_parent_dir() {
        let td = tempfile::tempdir().expect("tempdir");
        let path = td.path().join("no-such-dir").join("scan_crash.log");

        let err = FileSink::new(&path).write("x").unwrap_err();
        assert!(err.to_string().contains("open crash log failed"));
    }

    #[test]
    fn clipboard_sink_rejects_empty_report() {
        let err = ClipboardSink::default().write("  \n").unwrap_err();
        assert!(err.to_string().contains("E_CLIPBOARD_EMPTY_TEXT"));
        assert_eq!(ClipboardSink::default().label(), "crash_log");
    }
}
