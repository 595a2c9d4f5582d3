use std::{backtrace::Backtrace, fmt::Write as _, panic::PanicHookInfo};

use chrono::{Local, NaiveDateTime};

pub const SEPARATOR: &str = "============================================================";
/// `yyyy-MM-dd/HH:mm:ss`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d/%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Panic,
    Error,
}

impl FailureKind {
    fn verb(self) -> &'static str {
        match self {
            FailureKind::Panic => "panicked",
            FailureKind::Error => "failed",
        }
    }
}

/// One uncaught failure as delivered to a handler.
#[derive(Debug, Clone)]
pub struct CrashEvent {
    pub thread: Option<String>,
    pub kind: FailureKind,
    pub message: String,
    pub location: Option<String>,
    /// Outermost first.
    pub causes: Vec<String>,
    pub backtrace: String,
}

impl CrashEvent {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            thread: std::thread::current().name().map(str::to_string),
            kind,
            message: message.into(),
            location: None,
            causes: Vec::new(),
            backtrace: String::new(),
        }
    }

    pub fn from_panic(info: &PanicHookInfo<'_>) -> Self {
        let payload = info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };

        let mut ev = Self::new(FailureKind::Panic, message);
        ev.location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));
        ev.backtrace = Backtrace::force_capture().to_string();
        ev
    }

    pub fn from_error(err: &anyhow::Error) -> Self {
        let mut ev = Self::new(FailureKind::Error, err.to_string());
        ev.causes = err.chain().skip(1).map(|c| c.to_string()).collect();
        ev.backtrace = Backtrace::force_capture().to_string();
        ev
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    pub fn with_backtrace(mut self, backtrace: impl Into<String>) -> Self {
        self.backtrace = backtrace.into();
        self
    }

    fn header(&self) -> String {
        let thread = self.thread.as_deref().unwrap_or("<unnamed>");
        match &self.location {
            Some(loc) => format!("thread '{thread}' {} at {loc}:", self.kind.verb()),
            None => format!("thread '{thread}' {}:", self.kind.verb()),
        }
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Render the text that every sink receives.
pub fn format_report(event: &CrashEvent, at: NaiveDateTime) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "\n{SEPARATOR}\n");
    let _ = writeln!(out, "{}", format_timestamp(at));
    let _ = writeln!(out, "{}", event.header());
    let _ = writeln!(out, "{}", event.message);
    for cause in &event.causes {
        let _ = writeln!(out, "Caused by: {cause}");
    }
    if !event.backtrace.trim().is_empty() {
        let _ = writeln!(out, "stack backtrace:");
        let _ = writeln!(out, "{}", event.backtrace.trim_end());
    }
    out
}
