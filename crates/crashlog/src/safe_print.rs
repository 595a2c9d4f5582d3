// Stderr logging that never panics.
//
// The interceptor runs inside the panic hook. A panic raised while printing
// there aborts the process before the previous hook runs, so write errors on
// stderr are ignored.

#[macro_export]
macro_rules! safe_eprintln {
    ($($arg:tt)*) => {{
        use std::io::Write;
        let _ = writeln!(std::io::stderr(), $($arg)*);
    }};
}
