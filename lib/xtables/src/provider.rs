// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Providers let the codec run in different contexts by plugging in
//! implementations of the services it needs. Today that is only
//! logging: a host stack hands in whatever sink it already has, tests
//! hand in a capturing sink, and tools use `println!` or `slog`.

use core::fmt;
use core::fmt::Display;

/// A logging provider provides the means to log messages to some
/// destination based on the context in which the codec is running.
///
/// Logging levels are provided by [`LogLevel`]. These levels will map
/// to the underlying provider with varying degrees of success.
pub trait LogProvider: Send + Sync {
    /// Log a message at the specified level.
    fn log(&self, level: LogLevel, msg: &str);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Note,
    Warn,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let level_s = match self {
            Self::Note => "[NOTE]",
            Self::Warn => "[WARN]",
            Self::Error => "[ERROR]",
        };
        write!(f, "{level_s}")
    }
}

#[cfg(any(feature = "std", test))]
#[derive(Clone, Copy)]
pub struct PrintlnLog;

#[cfg(any(feature = "std", test))]
impl LogProvider for PrintlnLog {
    fn log(&self, level: LogLevel, msg: &str) {
        println!("{level} {msg}");
    }
}

/// Forward to a [`slog::Logger`].
///
/// `Note` maps to `info`, the other levels map to their namesakes.
#[cfg(any(feature = "std", test))]
pub struct SlogLog {
    log: slog::Logger,
}

#[cfg(any(feature = "std", test))]
impl SlogLog {
    pub fn new(log: slog::Logger) -> Self {
        Self { log }
    }

    /// A logger writing to the terminal through an async drain.
    pub fn terminal() -> Self {
        use slog::Drain;

        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        Self::new(slog::Logger::root(drain, slog::o!("component" => "xtables")))
    }
}

#[cfg(any(feature = "std", test))]
impl LogProvider for SlogLog {
    fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Note => slog::info!(self.log, "{}", msg),
            LogLevel::Warn => slog::warn!(self.log, "{}", msg),
            LogLevel::Error => slog::error!(self.log, "{}", msg),
        }
    }
}
