//! Diagnostics about unusual streams.
//!
//! With the `logging` feature the macros forward to `log` under the
//! `picto_jpeg` target. Without it they only borrow their arguments.

macro_rules! log_at {
    ($level:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "logging")]
        ::log::$level!(target: "picto_jpeg", $fmt $(, $arg)*);
        #[cfg(not(feature = "logging"))]
        {
            $(let _ = &$arg;)*
        }
    }};
}

macro_rules! ldebug {
    ($($tokens:tt)*) => {
        log_at!(debug, $($tokens)*)
    };
}

macro_rules! ltrace {
    ($($tokens:tt)*) => {
        log_at!(trace, $($tokens)*)
    };
}

macro_rules! lwarn {
    ($($tokens:tt)*) => {
        log_at!(warn, $($tokens)*)
    };
}
