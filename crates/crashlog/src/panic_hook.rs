use std::sync::atomic::{AtomicBool, Ordering};

use crate::{
    config::InterceptorConfig, interceptor::CrashInterceptor, report::CrashEvent, trace,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Release build: the existing handler was not touched.
    Disabled,
    Installed,
    /// An interceptor already wraps the handler; nothing changed.
    AlreadyInstalled,
}

impl InstallOutcome {
    pub(crate) fn trace_status(self) -> &'static str {
        match self {
            InstallOutcome::Installed => "ok",
            InstallOutcome::Disabled | InstallOutcome::AlreadyInstalled => "skipped",
        }
    }
}

static INSTALLED: AtomicBool = AtomicBool::new(false);

pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::SeqCst)
}

// Wrap the process-wide panic hook.
//
// The hook that was registered before us (std's default printer when nobody
// set one) always runs after the crash has been recorded, whatever the sinks
// did. Installation happens at most once per process so the captured hook is
// never our own wrapper.
pub fn install(enabled: bool, interceptor: CrashInterceptor) -> InstallOutcome {
    if !enabled {
        return InstallOutcome::Disabled;
    }
    let trace_dir = interceptor.trace_dir().map(|p| p.to_path_buf());

    let outcome = if INSTALLED.swap(true, Ordering::SeqCst) {
        InstallOutcome::AlreadyInstalled
    } else {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let event = CrashEvent::from_panic(info);
            interceptor.record_best_effort(&event);
            previous(info);
        }));
        InstallOutcome::Installed
    };

    if let Some(dir) = trace_dir {
        trace::event(
            &dir,
            "Crash",
            "CRASH.install",
            outcome.trace_status(),
            Some(serde_json::json!({ "target": "panic_hook" })),
        );
    }
    outcome
}

/// Install with sinks taken from the environment. Pass
/// `cfg!(debug_assertions)` to keep release builds untouched.
pub fn install_from_env(enabled: bool) -> InstallOutcome {
    if !enabled {
        return InstallOutcome::Disabled;
    }
    let cfg = InterceptorConfig::from_env();
    install(true, CrashInterceptor::from_config(&cfg))
}
