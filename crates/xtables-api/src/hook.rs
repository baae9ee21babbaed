// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use bitflags::bitflags;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// The number of netfilter hooks in the IPv4 packet path.
pub const NF_INET_NUMHOOKS: usize = 5;

/// An interception point in the IPv4 packet path.
///
/// The discriminant is the hook's index in the per-hook arrays of the
/// replace and get-info headers.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[repr(u8)]
pub enum Hook {
    PreRouting = 0,
    LocalIn = 1,
    Forward = 2,
    LocalOut = 3,
    PostRouting = 4,
}

impl Hook {
    /// All hooks, in index order.
    pub const ALL: [Hook; NF_INET_NUMHOOKS] = [
        Self::PreRouting,
        Self::LocalIn,
        Self::Forward,
        Self::LocalOut,
        Self::PostRouting,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }

    pub const fn mask(self) -> HookMask {
        HookMask::from_bits_retain(1 << self as u32)
    }
}

impl Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::PreRouting => "PREROUTING",
            Self::LocalIn => "INPUT",
            Self::Forward => "FORWARD",
            Self::LocalOut => "OUTPUT",
            Self::PostRouting => "POSTROUTING",
        };
        write!(f, "{s}")
    }
}

bitflags! {
    /// The `valid_hooks` bitmask: bit `n` is set when the table
    /// supports the hook with index `n`.
    #[derive(
        Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq,
        Serialize,
    )]
    pub struct HookMask: u32 {
        const PRE_ROUTING = 1 << 0;
        const LOCAL_IN = 1 << 1;
        const FORWARD = 1 << 2;
        const LOCAL_OUT = 1 << 3;
        const POST_ROUTING = 1 << 4;
    }
}

impl HookMask {
    /// Iterate the hooks in this mask, in index order.
    pub fn hooks(self) -> impl Iterator<Item = Hook> {
        Hook::ALL.into_iter().filter(move |h| self.contains(h.mask()))
    }
}

impl FromIterator<Hook> for HookMask {
    fn from_iter<I: IntoIterator<Item = Hook>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |acc, h| acc | h.mask())
    }
}
