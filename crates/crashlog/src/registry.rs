use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    interceptor::CrashInterceptor,
    panic_hook::InstallOutcome,
    report::{format_report, CrashEvent, SystemClock, Clock},
    trace,
};

/// Receives failures that reached the top of a thread.
pub trait UncaughtHandler: Send + Sync {
    fn uncaught(&self, event: &CrashEvent);
}

impl<F> UncaughtHandler for F
where
    F: Fn(&CrashEvent) + Send + Sync,
{
    fn uncaught(&self, event: &CrashEvent) {
        self(event)
    }
}

#[derive(Default)]
struct Slot {
    handler: Option<Arc<dyn UncaughtHandler>>,
    intercepted: bool,
}

/// An explicit, injectable stand-in for the process-wide handler slot.
#[derive(Default)]
pub struct HandlerRegistry {
    slot: Mutex<Slot>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(handler: Arc<dyn UncaughtHandler>) -> Self {
        let r = Self::new();
        r.set(Some(handler));
        r
    }

    // Dispatch happens on the failure path; a poisoned lock must not panic.
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn current(&self) -> Option<Arc<dyn UncaughtHandler>> {
        self.lock().handler.clone()
    }

    /// Replace the handler. Anything set here is treated as foreign, so a
    /// later interceptor install will wrap it.
    pub fn set(&self, handler: Option<Arc<dyn UncaughtHandler>>) {
        let mut slot = self.lock();
        slot.handler = handler;
        slot.intercepted = false;
    }

    pub fn is_intercepted(&self) -> bool {
        self.lock().intercepted
    }

    /// Deliver a failure to the current handler, or print the default report
    /// when none is registered.
    pub fn dispatch(&self, event: &CrashEvent) {
        // Clone out so the handler runs without the lock held.
        let handler = self.current();
        match handler {
            Some(h) => h.uncaught(event),
            None => default_report(event),
        }
    }
}

fn default_report(event: &CrashEvent) {
    crate::safe_eprintln!("{}", format_report(event, SystemClock.now()).trim_start());
}

struct Chained {
    interceptor: CrashInterceptor,
    previous: Option<Arc<dyn UncaughtHandler>>,
}

impl UncaughtHandler for Chained {
    fn uncaught(&self, event: &CrashEvent) {
        self.interceptor.record_best_effort(event);
        match &self.previous {
            Some(prev) => prev.uncaught(event),
            None => default_report(event),
        }
    }
}

/// Wrap the registry's current handler with `interceptor`.
///
/// Capture and replace happen under one lock, and a registry that already
/// holds an interceptor is left alone, so the captured handler is never an
/// interceptor itself.
pub fn install_crash_interceptor(
    registry: &HandlerRegistry,
    enabled: bool,
    interceptor: CrashInterceptor,
) -> InstallOutcome {
    if !enabled {
        return InstallOutcome::Disabled;
    }
    let trace_dir = interceptor.trace_dir().map(|p| p.to_path_buf());

    let outcome = {
        let mut slot = registry.lock();
        if slot.intercepted {
            InstallOutcome::AlreadyInstalled
        } else {
            let previous = slot.handler.take();
            slot.handler = Some(Arc::new(Chained {
                interceptor,
                previous,
            }));
            slot.intercepted = true;
            InstallOutcome::Installed
        }
    };

    if let Some(dir) = trace_dir {
        trace::event(
            &dir,
            "Crash",
            "CRASH.install",
            outcome.trace_status(),
            Some(serde_json::json!({ "target": "registry" })),
        );
    }
    outcome
}
