// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Genkit Logging
//!
//! The library only logs through the `log` facade. Applications that do not
//! bring their own logger can install the small stderr logger below with
//! [`init`] or [`init_from_env`].

use log::{LevelFilter, SetLoggerError};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

// Re-export log macros for convenient use as `genkit_core::logging::info!`.
pub use log::{debug, error, info, trace, warn};

static LOG_LEVEL: AtomicUsize = AtomicUsize::new(LevelFilter::Info as usize);

fn current_level() -> LevelFilter {
    match LOG_LEVEL.load(Ordering::Relaxed) {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Writes records to stderr as `[LEVEL] target: message`.
struct SimpleLogger;

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= current_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: SimpleLogger = SimpleLogger;

/// Installs the stderr logger at `Info` level.
///
/// Fails if another logger is already installed in this process.
pub fn init() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(LevelFilter::Trace))
}

/// Installs the stderr logger with the level from `GENKIT_LOG_LEVEL`
/// (`error`, `warn`, `info`, `debug`, `trace` or `off`).
pub fn init_from_env() -> Result<(), SetLoggerError> {
    if let Some(level) = std::env::var("GENKIT_LOG_LEVEL")
        .ok()
        .and_then(|value| LevelFilter::from_str(&value).ok())
    {
        set_log_level(level);
    }
    init()
}

/// Sets the level of the stderr logger. Has no effect on other loggers.
pub fn set_log_level(level: LevelFilter) {
    LOG_LEVEL.store(level as usize, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_round_trips_through_the_atomic() {
        for level in [LevelFilter::Off, LevelFilter::Warn, LevelFilter::Trace] {
            set_log_level(level);
            assert_eq!(current_level(), level);
        }
        set_log_level(LevelFilter::Info);
    }
}
