use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    path::{Path, PathBuf},
};

use anyhow::anyhow;

use crate::{
    config::InterceptorConfig,
    report::{format_report, Clock, CrashEvent, SystemClock},
    sinks::{ClipboardSink, CrashSink, FileSink},
    trace,
};

/// Formats a crash and hands the text to every configured sink.
pub struct CrashInterceptor {
    sinks: Vec<Box<dyn CrashSink>>,
    clock: Box<dyn Clock>,
    trace_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    /// `None` when formatting itself failed.
    pub report: Option<String>,
    pub failed_sinks: Vec<&'static str>,
}

impl Default for CrashInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl CrashInterceptor {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            clock: Box::new(SystemClock),
            trace_dir: None,
        }
    }

    /// File sink first, then clipboard, matching the order a developer checks them.
    pub fn from_config(cfg: &InterceptorConfig) -> Self {
        let mut out = Self::new();
        if let Some(p) = &cfg.log_path {
            out = out.with_sink(FileSink::new(p));
        }
        if let Some(label) = &cfg.clipboard_label {
            out = out.with_sink(ClipboardSink::new(label.as_str()));
        }
        if let Some(dir) = &cfg.trace_dir {
            out = out.with_trace_dir(dir);
        }
        out
    }

    pub fn with_sink(mut self, sink: impl CrashSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_trace_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.trace_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub fn trace_dir(&self) -> Option<&Path> {
        self.trace_dir.as_deref()
    }

    /// Write the crash to every sink. Never panics and never returns an error:
    /// this is the single place where sink failures are swallowed, since the
    /// caller is the last-resort failure path and must go on to the previous
    /// handler regardless.
    pub fn record_best_effort(&self, event: &CrashEvent) -> RecordOutcome {
        let report = match catch_unwind(AssertUnwindSafe(|| {
            format_report(event, self.clock.now())
        })) {
            Ok(r) => r,
            Err(_) => {
                crate::safe_eprintln!("crashlog: formatting crash report panicked");
                return RecordOutcome {
                    report: None,
                    failed_sinks: self.sink_names(),
                };
            }
        };

        let mut failed_sinks = Vec::new();
        for sink in &self.sinks {
            let res = match catch_unwind(AssertUnwindSafe(|| sink.write(&report))) {
                Ok(r) => r,
                Err(_) => Err(anyhow!("{} sink panicked", sink.name())),
            };
            let step_id = format!("CRASH.sink.{}", sink.name());
            match res {
                Ok(()) => {
                    if let Some(dir) = &self.trace_dir {
                        trace::event(
                            dir,
                            "Crash",
                            &step_id,
                            "ok",
                            Some(serde_json::json!({ "bytes": report.len() })),
                        );
                    }
                }
                Err(e) => {
                    crate::safe_eprintln!("crashlog: {} sink failed: {e:#}", sink.name());
                    if let Some(dir) = &self.trace_dir {
                        trace::event_err(dir, "Crash", &step_id, "E_SINK_FAILED", &e, None);
                    }
                    failed_sinks.push(sink.name());
                }
            }
        }

        RecordOutcome {
            report: Some(report),
            failed_sinks,
        }
    }
}
