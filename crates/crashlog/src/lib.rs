//! Debug-build crash interceptor.
//!
//! When enabled, the interceptor wraps the process-wide panic hook (or an
//! explicit [`registry::HandlerRegistry`]) so that every crash is formatted
//! with a timestamp and backtrace, written over `scan_crash.log` on external
//! storage and copied to the clipboard before the previous handler runs.
//!
//! Recording is best-effort: sink failures are swallowed and never prevent
//! the previous handler from being invoked.

pub mod config;
pub mod interceptor;
pub mod panic_hook;
pub mod registry;
pub mod report;
mod safe_print;
pub mod sinks;
pub mod trace;

pub use config::InterceptorConfig;
pub use interceptor::{CrashInterceptor, RecordOutcome};
pub use panic_hook::InstallOutcome;
pub use registry::{HandlerRegistry, UncaughtHandler};
pub use report::{Clock, CrashEvent, FixedClock, SystemClock};
pub use sinks::{ClipboardSink, CrashSink, FileSink};
