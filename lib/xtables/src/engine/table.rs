// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The abstract rule table and the kinds of table we know about.

use super::rule::Rule;
use super::target::Target;
use crate::api::Hook;
use crate::api::HookMask;
use crate::api::NF_INET_NUMHOOKS;
use crate::api::TableInfo;
use crate::api::TableName;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

cfg_if! {
    if #[cfg(all(not(feature = "std"), not(test)))] {
        use alloc::collections::BTreeMap;
        use alloc::vec::Vec;
    } else {
        use std::collections::BTreeMap;
        use std::vec::Vec;
    }
}

pub const FILTER_TABLE: &str = "filter";
pub const NAT_TABLE: &str = "nat";
pub const MANGLE_TABLE: &str = "mangle";

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("hook {0} is supported but has no chain")]
    MissingHook(Hook),

    #[error("hook {0} has a chain but is not supported")]
    UnsupportedHook(Hook),

    #[error("hook {hook} points at rule {idx} of {len}")]
    RuleIndex { hook: Hook, idx: usize, len: usize },

    #[error("rule {idx} encodes to {len} bytes, more than an entry can hold")]
    RuleTooLarge { idx: usize, len: usize },
}

/// Where a built-in chain starts and where it falls back to.
///
/// Both are rule indices.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ChainPoints {
    pub entry: usize,
    pub underflow: usize,
}

impl ChainPoints {
    pub fn at(idx: usize) -> Self {
        Self { entry: idx, underflow: idx }
    }
}

/// The byte-offset summary of a table's encoding.
///
/// Slots for hooks the table does not support are zero.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct Metadata {
    pub hook_entry: [u32; NF_INET_NUMHOOKS],
    pub underflow: [u32; NF_INET_NUMHOOKS],
    pub num_entries: u32,
    pub size: u32,
}

impl Metadata {
    pub fn info(&self, valid_hooks: HookMask) -> TableInfo {
        TableInfo {
            valid_hooks,
            hook_entry: self.hook_entry,
            underflow: self.underflow,
            num_entries: self.num_entries,
            size: self.size,
        }
    }
}

/// A rule table.
///
/// Every supported hook has exactly one chain, and every chain points
/// at rules that exist. Tables are never edited in place: a new one is
/// built and swapped into the store whole.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Table {
    rules: Vec<Rule>,
    valid_hooks: HookMask,
    chains: BTreeMap<Hook, ChainPoints>,
    metadata: Option<Metadata>,
}

impl Table {
    pub fn new(
        valid_hooks: HookMask,
        rules: Vec<Rule>,
        chains: BTreeMap<Hook, ChainPoints>,
    ) -> Result<Self, TableError> {
        for hook in valid_hooks.hooks() {
            if !chains.contains_key(&hook) {
                return Err(TableError::MissingHook(hook));
            }
        }

        for (hook, points) in &chains {
            if !valid_hooks.contains(hook.mask()) {
                return Err(TableError::UnsupportedHook(*hook));
            }

            for idx in [points.entry, points.underflow] {
                if idx >= rules.len() {
                    return Err(TableError::RuleIndex {
                        hook: *hook,
                        idx,
                        len: rules.len(),
                    });
                }
            }
        }

        // Entry offsets are 16 bits wide.
        for (idx, rule) in rules.iter().enumerate() {
            let len = rule.entry_len();
            if len > usize::from(u16::MAX) {
                return Err(TableError::RuleTooLarge { idx, len });
            }
        }

        Ok(Self { rules, valid_hooks, chains, metadata: None })
    }

    /// A table with no rules that supports no hooks.
    pub fn empty() -> Self {
        Self {
            rules: vec![],
            valid_hooks: HookMask::empty(),
            chains: BTreeMap::new(),
            metadata: None,
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn valid_hooks(&self) -> HookMask {
        self.valid_hooks
    }

    pub fn chain(&self, hook: Hook) -> Option<ChainPoints> {
        self.chains.get(&hook).copied()
    }

    /// The chains of the supported hooks, in hook order.
    pub fn chains(&self) -> impl Iterator<Item = (Hook, ChainPoints)> + '_ {
        self.chains.iter().map(|(h, p)| (*h, *p))
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = Some(metadata);
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.set_metadata(metadata);
        self
    }

    /// Do both tables hold the same rules and chains?
    ///
    /// Metadata is not compared.
    pub fn same_rules(&self, other: &Self) -> bool {
        self.rules == other.rules
            && self.valid_hooks == other.valid_hooks
            && self.chains == other.chains
    }
}

/// The kinds of table a network stack carries.
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
pub enum TableKind {
    Filter,
    Nat,
    Mangle,
}

impl TableKind {
    pub const ALL: [TableKind; 3] = [Self::Filter, Self::Nat, Self::Mangle];

    pub fn name(self) -> &'static str {
        match self {
            Self::Filter => FILTER_TABLE,
            Self::Nat => NAT_TABLE,
            Self::Mangle => MANGLE_TABLE,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn table_name(self) -> TableName {
        // Each kind's name is a short ASCII literal.
        match TableName::new(self.name()) {
            Ok(name) => name,
            Err(e) => panic!("bad built-in table name {}: {e}", self.name()),
        }
    }

    pub fn valid_hooks(self) -> HookMask {
        match self {
            Self::Filter => {
                HookMask::LOCAL_IN | HookMask::FORWARD | HookMask::LOCAL_OUT
            }
            Self::Nat => {
                HookMask::PRE_ROUTING
                    | HookMask::LOCAL_IN
                    | HookMask::LOCAL_OUT
                    | HookMask::POST_ROUTING
            }
            Self::Mangle => HookMask::PRE_ROUTING | HookMask::LOCAL_OUT,
        }
    }

    /// Can callers replace a table of this kind?
    pub fn is_replaceable(self) -> bool {
        matches!(self, Self::Filter)
    }

    /// The table a freshly started stack carries.
    ///
    /// Each supported hook gets one accept rule that is both its entry
    /// and its underflow, in hook order. A final error rule catches
    /// anything that falls off the end.
    pub fn default_table(self) -> Table {
        let mut rules = Vec::new();
        let mut chains = BTreeMap::new();

        for hook in self.valid_hooks().hooks() {
            chains.insert(hook, ChainPoints::at(rules.len()));
            rules.push(Rule::unconditional(Target::UnconditionalAccept));
        }

        rules.push(Rule::unconditional(Target::Error));

        Table {
            rules,
            valid_hooks: self.valid_hooks(),
            chains,
            metadata: None,
        }
    }
}

impl Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One default table per kind.
pub fn default_tables() -> Vec<(TableName, Table)> {
    TableKind::ALL
        .into_iter()
        .map(|k| (k.table_name(), k.default_table()))
        .collect()
}
