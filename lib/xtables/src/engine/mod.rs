// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The engine: rule model, blob codec, table store and the operations
//! built on them.
//!
//! Everything here is guarded by the `engine` feature.

pub mod decode;
pub mod encode;
pub mod ioctl;
pub mod matcher;
pub mod rule;
pub mod sockopt;
pub mod store;
pub mod table;
pub mod target;
pub mod verdict;
