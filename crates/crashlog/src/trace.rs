use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::Error as AnyhowError;
use serde::Serialize;
use serde_json::Value;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub fn trace_path(trace_dir: &Path) -> PathBuf {
    trace_dir.join("crashlog_trace.jsonl")
}

fn trace_write_lock() -> &'static Mutex<()> {
    static TRACE_WRITE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    TRACE_WRITE_LOCK.get_or_init(|| Mutex::new(()))
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceError {
    pub code: String,    // E_*
    pub message: String, // short
    pub chain: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    pub ts_ms: i64,
    pub stage: String,
    pub step_id: String,
    pub status: String, // ok|err|skipped
    pub error: Option<TraceError>,
    pub ctx: Option<Value>,
}

// Called from inside the panic hook, so nothing here may panic: a poisoned
// lock is taken over and every I/O error is reported to stderr only.
pub fn emit_best_effort(trace_dir: &Path, ev: &TraceEvent) {
    let _guard = trace_write_lock()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let _ = std::fs::create_dir_all(trace_dir);

    let p = trace_path(trace_dir);
    let mut f = match OpenOptions::new().create(true).append(true).open(&p) {
        Ok(f) => f,
        Err(e) => {
            crate::safe_eprintln!("trace: open failed: {}: {e}", p.display());
            return;
        }
    };
    let mut line = match serde_json::to_string(ev) {
        Ok(s) => s,
        Err(e) => {
            crate::safe_eprintln!("trace: serialize failed: {e}");
            return;
        }
    };
    line.push('\n');
    if let Err(e) = f.write_all(line.as_bytes()) {
        crate::safe_eprintln!("trace: write failed: {e}");
    }
}

fn redact_user_paths(s: &str) -> String {
    // Scrub the account name out of home-dir paths; the rest stays readable.
    fn scrub_after(hay: &str, marker: &str, sep: char) -> String {
        let mut out = String::with_capacity(hay.len());
        let mut i = 0;
        while let Some(pos) = hay[i..].find(marker) {
            let abs = i + pos;
            out.push_str(&hay[i..abs]);
            out.push_str(marker);
            let name_start = abs + marker.len();
            let mut name_end = name_start;
            for ch in hay[name_start..].chars() {
                if ch == sep {
                    break;
                }
                name_end += ch.len_utf8();
            }
            out.push_str("<redacted>");
            i = name_end;
        }
        out.push_str(&hay[i..]);
        out
    }

    let mut t = s.to_string();
    t = scrub_after(&t, "\\Users\\", '\\');
    t = scrub_after(&t, "/Users/", '/');
    t = scrub_after(&t, "/home/", '/');
    t
}

pub fn event(trace_dir: &Path, stage: &str, step_id: &str, status: &str, ctx: Option<Value>) {
    emit_best_effort(
        trace_dir,
        &TraceEvent {
            ts_ms: now_ms(),
            stage: stage.to_string(),
            step_id: step_id.to_string(),
            status: status.to_string(),
            error: None,
            ctx,
        },
    );
}

pub fn event_err(
    trace_dir: &Path,
    stage: &str,
    step_id: &str,
    code: &str,
    err: &AnyhowError,
    ctx: Option<Value>,
) {
    emit_best_effort(
        trace_dir,
        &TraceEvent {
            ts_ms: now_ms(),
            stage: stage.to_string(),
            step_id: step_id.to_string(),
            status: "err".to_string(),
            error: Some(TraceError {
                code: code.to_string(),
                message: redact_user_paths(&err.to_string()),
                chain: err.chain().map(|e| redact_user_paths(&e.to_string())).collect(),
            }),
            ctx,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, thread};

    #[test]
    fn concurrent_emit_keeps_jsonl_lines_parseable() {
        let td = tempfile::tempdir().expect("tempdir");
        let dir = td.path().to_path_buf();
        let threads = 4;
        let per_thread = 50;

        let mut joins = Vec::new();
        for i in 0..threads {
            let dir2 = dir.clone();
            joins.push(thread::spawn(move || {
                for j in 0..per_thread {
                    event(
                        &dir2,
                        "Crash",
                        "CRASH.concurrent_emit",
                        "ok",
                        Some(serde_json::json!({"i": i, "j": j})),
                    );
                }
            }));
        }
        for j in joins {
            j.join().expect("join");
        }

        let raw = fs::read_to_string(trace_path(&dir)).expect("read trace");
        let mut lines = 0usize;
        for line in raw.lines() {
            lines += 1;
            let v: serde_json::Value = serde_json::from_str(line).expect("valid json line");
            assert_eq!(v["step_id"], "CRASH.concurrent_emit");
        }
        assert_eq!(lines, threads * per_thread);
    }

    #[test]
    fn error_event_carries_redacted_chain() {
        let td = tempfile::tempdir().expect("tempdir");
        let err = anyhow::anyhow!("permission denied")
            .context("open crash log failed: /home/alice/scan_crash.log");
        event_err(td.path(), "Crash", "CRASH.sink.file", "E_SINK_FAILED", &err, None);

        let raw = fs::read_to_string(trace_path(td.path())).expect("read trace");
        let v: serde_json::Value = serde_json::from_str(raw.trim()).expect("json");
        assert_eq!(v["status"], "err");
        assert_eq!(v["error"]["code"], "E_SINK_FAILED");
        let msg = v["error"]["message"].as_str().expect("message");
        assert!(msg.contains("/home/<redacted>/scan_crash.log"), "{msg}");
        assert!(!msg.contains("alice"));
        assert_eq!(v["error"]["chain"].as_array().map(|a| a.len()), Some(2));
    }
}
