//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Structured logging adapters and sinks."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
/// Append a line to the diagnostic sink.
///
/// Arguments are only evaluated in builds with `debug_assertions`.
/// `diag_println!(sink = diagnostics, ...)` targets a specific
/// [`Diagnostics`](crate::Diagnostics) handle instead of the process-wide sink.
#[macro_export]
macro_rules! diag_println {
    () => {{
        if cfg!(debug_assertions) {
            $crate::Diagnostics::global().println(format_args!(""));
        }
    }};
    (sink = $diag:expr, $($arg:tt)+) => {{
        if cfg!(debug_assertions) {
            $diag.println(format_args!($($arg)+));
        }
    }};
    ($($arg:tt)+) => {{
        if cfg!(debug_assertions) {
            $crate::Diagnostics::global().println(format_args!($($arg)+));
        }
    }};
}

/// Append text to the diagnostic sink without a trailing newline.
///
/// Arguments are only evaluated in builds with `debug_assertions`.
#[macro_export]
macro_rules! diag_print {
    (sink = $diag:expr, $($arg:tt)+) => {{
        if cfg!(debug_assertions) {
            $diag.print(format_args!($($arg)+));
        }
    }};
    ($($arg:tt)+) => {{
        if cfg!(debug_assertions) {
            $crate::Diagnostics::global().print(format_args!($($arg)+));
        }
    }};
}
