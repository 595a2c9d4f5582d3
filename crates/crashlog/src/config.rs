use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::sinks::CLIPBOARD_LABEL;

pub const LOG_FILE_NAME: &str = "scan_crash.log";
pub const SETTINGS_FILE_NAME: &str = "crashlog.json";

fn env_flag(key: &str) -> Option<bool> {
    let v = std::env::var(key).ok()?;
    let t = v.trim().to_ascii_lowercase();
    Some(t == "1" || t == "true" || t == "yes" || t == "on")
}

/// Root of shared storage on the device.
pub fn external_storage_dir() -> Result<PathBuf> {
    if let Ok(p) = std::env::var("CRASHLOG_EXTERNAL_STORAGE") {
        return Ok(PathBuf::from(p));
    }
    // Android shells export this (usually /sdcard).
    if let Ok(p) = std::env::var("EXTERNAL_STORAGE") {
        return Ok(PathBuf::from(p));
    }
    Err(anyhow!(
        "E_STORAGE_UNAVAILABLE: set CRASHLOG_EXTERNAL_STORAGE or EXTERNAL_STORAGE"
    ))
}

pub fn crash_log_path(storage_dir: &Path) -> PathBuf {
    storage_dir.join(LOG_FILE_NAME)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Settings {
    pub clipboard_enabled: Option<bool>, // default: true
    pub trace_enabled: Option<bool>,     // default: false
}

pub fn settings_path(storage_dir: &Path) -> PathBuf {
    storage_dir.join(SETTINGS_FILE_NAME)
}

pub fn load_settings(storage_dir: &Path) -> Result<Settings> {
    let p = settings_path(storage_dir);
    if !p.exists() {
        return Ok(Settings::default());
    }
    let s = fs::read_to_string(&p).context("read crashlog.json failed")?;
    let v: Settings = serde_json::from_str(&s).context("parse crashlog.json failed")?;
    Ok(v)
}

pub fn save_settings(storage_dir: &Path, settings: &Settings) -> Result<()> {
    fs::create_dir_all(storage_dir).context("create storage dir failed")?;
    let p = settings_path(storage_dir);
    let s = serde_json::to_string_pretty(settings).context("serialize settings failed")?;
    fs::write(&p, s).context("write crashlog.json failed")?;
    Ok(())
}

/// Which sinks the interceptor writes to. A `None` field disables that sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterceptorConfig {
    pub log_path: Option<PathBuf>,
    pub clipboard_label: Option<String>,
    pub trace_dir: Option<PathBuf>,
}

impl InterceptorConfig {
    pub fn for_storage_dir(storage_dir: &Path) -> Self {
        Self {
            log_path: Some(crash_log_path(storage_dir)),
            clipboard_label: Some(CLIPBOARD_LABEL.to_string()),
            trace_dir: None,
        }
    }

    pub fn with_settings(mut self, storage_dir: &Path, settings: &Settings) -> Self {
        if !settings.clipboard_enabled.unwrap_or(true) {
            self.clipboard_label = None;
        }
        if settings.trace_enabled.unwrap_or(false) {
            self.trace_dir = Some(storage_dir.to_path_buf());
        }
        self
    }

    /// Resolve storage, apply `crashlog.json`, then env overrides.
    ///
    /// Never fails: an unresolvable storage root only drops the file sink,
    /// and a broken settings file falls back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = match external_storage_dir() {
            Ok(dir) => {
                let settings = load_settings(&dir).unwrap_or_else(|e| {
                    crate::safe_eprintln!("crashlog: settings ignored: {e:#}");
                    Settings::default()
                });
                Self::for_storage_dir(&dir).with_settings(&dir, &settings)
            }
            Err(e) => {
                crate::safe_eprintln!("crashlog: file sink disabled: {e:#}");
                Self {
                    log_path: None,
                    clipboard_label: Some(CLIPBOARD_LABEL.to_string()),
                    trace_dir: None,
                }
            }
        };

        match env_flag("CRASHLOG_CLIPBOARD") {
            Some(false) => cfg.clipboard_label = None,
            Some(true) if cfg.clipboard_label.is_none() => {
                cfg.clipboard_label = Some(CLIPBOARD_LABEL.to_string());
            }
            _ => {}
        }
        match env_flag("CRASHLOG_TRACE") {
            Some(false) => cfg.trace_dir = None,
            Some(true) => {
                if let Ok(dir) = external_storage_dir() {
                    cfg.trace_dir = Some(dir);
                }
            }
            None => {}
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_env() {
        std::env::remove_var("CRASHLOG_EXTERNAL_STORAGE");
        std::env::remove_var("EXTERNAL_STORAGE");
        std::env::remove_var("CRASHLOG_CLIPBOARD");
        std::env::remove_var("CRASHLOG_TRACE");
    }

    #[test]
    fn storage_dir_prefers_explicit_override() {
        let _g = env_lock().lock().unwrap();
        clear_env();
        assert!(external_storage_dir().is_err());

        std::env::set_var("EXTERNAL_STORAGE", "/sdcard");
        assert_eq!(external_storage_dir().expect("dir"), PathBuf::from("/sdcard"));

        std::env::set_var("CRASHLOG_EXTERNAL_STORAGE", "/data/local/tmp");
        assert_eq!(
            external_storage_dir().expect("dir"),
            PathBuf::from("/data/local/tmp")
        );
        clear_env();
    }

    #[test]
    fn from_env_without_storage_keeps_clipboard_only() {
        let _g = env_lock().lock().unwrap();
        clear_env();
        let cfg = InterceptorConfig::from_env();
        assert_eq!(cfg.log_path, None);
        assert_eq!(cfg.clipboard_label.as_deref(), Some("crash_log"));
        assert_eq!(cfg.trace_dir, None);
    }

    #[test]
    fn from_env_applies_settings_then_env() {
        let _g = env_lock().lock().unwrap();
        clear_env();
        let td = tempfile::tempdir().expect("tempdir");
        save_settings(
            td.path(),
            &Settings {
                clipboard_enabled: Some(false),
                trace_enabled: Some(true),
            },
        )
        .expect("save");
        std::env::set_var("CRASHLOG_EXTERNAL_STORAGE", td.path());

        let cfg = InterceptorConfig::from_env();
        assert_eq!(cfg.log_path, Some(td.path().join("scan_crash.log")));
        assert_eq!(cfg.clipboard_label, None);
        assert_eq!(cfg.trace_dir.as_deref(), Some(td.path()));

        std::env::set_var("CRASHLOG_CLIPBOARD", "on");
        std::env::set_var("CRASHLOG_TRACE", "0");
        let cfg = InterceptorConfig::from_env();
        assert_eq!(cfg.clipboard_label.as_deref(), Some("crash_log"));
        assert_eq!(cfg.trace_dir, None);
        clear_env();
    }

    #[test]
    fn broken_settings_fall_back_to_defaults() {
        let _g = env_lock().lock().unwrap();
        clear_env();
        let td = tempfile::tempdir().expect("tempdir");
        fs::write(settings_path(td.path()), "{not json").expect("write");
        assert!(load_settings(td.path()).is_err());

        std::env::set_var("CRASHLOG_EXTERNAL_STORAGE", td.path());
        let cfg = InterceptorConfig::from_env();
        assert_eq!(cfg, InterceptorConfig::for_storage_dir(td.path()));
        clear_env();
    }

    #[test]
    fn settings_round_trip_through_disk() {
        let td = tempfile::tempdir().expect("tempdir");
        assert_eq!(load_settings(td.path()).expect("load"), Settings::default());
        let s = Settings {
            clipboard_enabled: Some(true),
            trace_enabled: None,
        };
        save_settings(td.path(), &s).expect("save");
        assert_eq!(load_settings(td.path()).expect("load"), s);
    }
}
