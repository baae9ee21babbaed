// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Types shared between the xtables engine and its callers.
//!
//! Everything in here describes the legacy `ip_tables` sockopt ABI:
//! the fixed-size records that make up a table blob, the constants
//! they carry, and the error type handed back across the sockopt
//! boundary.

#![no_std]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

#[macro_use]
extern crate alloc;

pub mod abi;
pub mod cmd;
pub mod hook;
pub mod name;
pub mod verdict;

pub use abi::*;
pub use cmd::*;
pub use hook::*;
pub use name::*;
pub use verdict::*;
