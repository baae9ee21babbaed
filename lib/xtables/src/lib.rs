// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The `ip_tables` table codec.
//!
//! This crate sits between an in-memory rule table and the binary
//! blobs exchanged over the legacy `ip_tables` sockopt interface. It
//! encodes tables for read-back, decodes and validates caller-supplied
//! replacement blobs, and keeps the resulting tables in a store that
//! is swapped one whole table at a time.

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::len_without_is_empty)]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg_attr(feature = "engine", macro_use)]
extern crate alloc;

#[cfg(any(feature = "engine", test))]
#[macro_use]
extern crate cfg_if;

#[cfg(any(feature = "api", test))]
pub mod api;
#[cfg(any(feature = "engine", test))]
pub mod engine;
#[cfg(any(all(feature = "engine", feature = "std"), test))]
pub mod print;
#[cfg(any(feature = "engine", test))]
pub mod provider;
#[cfg(any(feature = "std", test))]
pub mod sync;

#[cfg(any(feature = "engine", test))]
use alloc::boxed::Box;
#[cfg(any(feature = "engine", test))]
pub use provider::LogLevel;
#[cfg(any(feature = "engine", test))]
pub use provider::LogProvider;
#[cfg(any(feature = "std", test))]
pub use provider::PrintlnLog;
#[cfg(any(feature = "std", test))]
pub use provider::SlogLog;

/// The execution context handed to every operation that can reject
/// input or detect drift.
#[cfg(any(feature = "engine", test))]
pub struct ExecCtx {
    pub log: Box<dyn LogProvider>,
}

#[cfg(any(feature = "engine", test))]
impl ExecCtx {
    pub fn note(&self, msg: &str) {
        self.log.log(LogLevel::Note, msg);
    }

    pub fn warn(&self, msg: &str) {
        self.log.log(LogLevel::Warn, msg);
    }

    /// Report an internal-consistency violation and halt.
    ///
    /// These never result from caller input that the decoder has
    /// accepted; reaching here means a bug in this crate.
    #[cold]
    pub fn fatal(&self, msg: &str) -> ! {
        self.log.log(LogLevel::Error, msg);
        panic!("{msg}");
    }
}
