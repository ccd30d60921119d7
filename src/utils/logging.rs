//! Logger setup plus logging macros gated on a module-level `ENABLE_LOGS` flag.
//!
//! Modules that tick every second (the clock, the simulated sensor) would
//! flood the log; they declare
//!
//! ```ignore
//! const ENABLE_LOGS: bool = false;
//! use crate::{log_debug, log_info};
//! ```
//!
//! and flip the flag while debugging.

use log::LevelFilter;

/// Installs `env_logger`. `RUST_LOG` still wins over the default level.
/// Calling twice is harmless; the second call is ignored.
pub fn init_logging(debug: bool) {
    let default_level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Unlike the other two, warnings still go out when the flag is off, just at
/// debug level.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        } else {
            log::debug!($($arg)*);
        }
    };
}
