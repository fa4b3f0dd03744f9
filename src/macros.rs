// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logging macros for convenient logging

/// Log a message with debug level
///
/// # Examples
/// ```ignore
/// log_debug!("parsed {} entries", count);
/// ```
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::__log_at!($crate::Level::Debug, $($arg)*)
    };
}

/// Log a message with info level
///
/// # Examples
/// ```ignore
/// log_info!("listener started on {}", addr);
/// ```
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::__log_at!($crate::Level::Info, $($arg)*)
    };
}

/// Log a message with warn level
///
/// # Examples
/// ```ignore
/// log_warn!("queue at {}% capacity", pct);
/// ```
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::__log_at!($crate::Level::Warn, $($arg)*)
    };
}

/// Log a message with error level
///
/// # Examples
/// ```ignore
/// log_error!("write failed: {}", err);
/// ```
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::__log_at!($crate::Level::Error, $($arg)*)
    };
}

/// Log a message with fatal level
///
/// # Examples
/// ```ignore
/// log_fatal!("unrecoverable: {}", err);
/// ```
#[macro_export]
macro_rules! log_fatal {
    ($($arg:tt)*) => {
        $crate::__log_at!($crate::Level::Fatal, $($arg)*)
    };
}

/// Shared expansion: gate on the level at the call site, then hand the
/// format arguments to the installed logger. A missing logger (no
/// `init` yet) makes the call a no-op.
#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($level:expr, $($arg:tt)*) => {{
        if let Some(logger) = $crate::Logger::global() {
            if $level >= logger.level() {
                logger.log($level, file!(), line!(), format_args!($($arg)*));
            }
        }
    }};
}
