//! Unrecoverable logic errors.
//!
//! Kept apart from `Result` errors. A violated invariant means in-memory state is already
//! inconsistent.

/// Logs the diagnostic on target `invariant` and panics.
#[cold]
#[track_caller]
pub fn violated(msg: std::fmt::Arguments<'_>) -> ! {
    let loc = std::panic::Location::caller();
    log::error!(target: "invariant", "{msg} at {}:{}", loc.file(), loc.line());
    panic!("fatal invariant violated: {msg}");
}

/// `fatal_invariant!(cond, "fmt", args..)` aborts the operation when `cond` is false.
#[macro_export]
macro_rules! fatal_invariant {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::invariant::violated(format_args!($($arg)+));
        }
    };
}
