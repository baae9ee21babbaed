// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Decode a caller's replacement blob into a [`Table`].
//!
//! Every byte handed to us here is untrusted. Each read is bounds
//! checked by `zerocopy` or by an explicit length test against the
//! remaining input, and every failure comes back as a
//! [`DecodeError`].

use super::encode::encode_table;
use super::matcher::MatcherError;
use super::matcher::parse_matchers;
use super::rule::FilterError;
use super::rule::IpHeaderFilter;
use super::rule::Rule;
use super::table::ChainPoints;
use super::table::Metadata;
use super::table::Table;
use super::table::TableError;
use super::table::TableKind;
use super::target::Target;
use super::target::TargetError;
use super::target::parse_target;
use crate::ExecCtx;
use crate::api::Hook;
use crate::api::HookMask;
use crate::api::IptEntry;
use crate::api::IptReplace;
use crate::api::NameError;
use crate::api::TableName;
use zerocopy::FromBytes;

cfg_if! {
    if #[cfg(all(not(feature = "std"), not(test)))] {
        use alloc::collections::BTreeMap;
        use alloc::string::String;
        use alloc::string::ToString;
        use alloc::vec::Vec;
    } else {
        use std::collections::BTreeMap;
        use std::string::String;
        use std::string::ToString;
        use std::vec::Vec;
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("{len} bytes is too few for the replace header")]
    ShortReplace { len: usize },

    #[error("bad table name: {0}")]
    BadName(NameError),

    #[error("table {0:?} cannot be replaced")]
    UnsupportedTable(String),

    #[error("entry {index} at offset {offset}: truncated header")]
    ShortEntry { index: u32, offset: u64 },

    #[error(
        "entry {index} at offset {offset}: target offset {target_offset} \
         is inside the entry header"
    )]
    TargetOffset { index: u32, offset: u64, target_offset: u16 },

    #[error(
        "entry {index} at offset {offset}: next offset {next_offset} is \
         before target offset {target_offset}"
    )]
    NextOffset {
        index: u32,
        offset: u64,
        target_offset: u16,
        next_offset: u16,
    },

    #[error("entry {index} at offset {offset}: {err}")]
    Filter { index: u32, offset: u64, err: FilterError },

    #[error(
        "entry {index} at offset {offset}: {region} region of {len} bytes \
         overruns the {remaining} bytes left"
    )]
    Overrun {
        index: u32,
        offset: u64,
        region: &'static str,
        len: usize,
        remaining: usize,
    },

    #[error("entry {index} at offset {offset}: {err}")]
    Matcher { index: u32, offset: u64, err: MatcherError },

    #[error("entry {index} at offset {offset}: {err}")]
    Target { index: u32, offset: u64, err: TargetError },

    #[error("hook {hook} is unset: no entry at offset {offset}")]
    HookUnset { hook: Hook, offset: u32 },

    #[error("underflow {hook} is unset: no entry at offset {offset}")]
    UnderflowUnset { hook: Hook, offset: u32 },

    #[error("hook {0} is unsupported: its entry rule is not an accept")]
    HookNotAccept(Hook),

    #[error("declared {declared:?} disagrees with entries {computed:?}")]
    Metadata { declared: Metadata, computed: Metadata },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Accumulates decoded rules and the offset each one started at.
///
/// Nothing is visible to anyone else until [`TableBuilder::finish`]
/// hands back a complete [`Table`].
struct TableBuilder {
    valid_hooks: HookMask,
    rules: Vec<Rule>,
    offsets: Vec<u64>,
}

impl TableBuilder {
    fn new(valid_hooks: HookMask) -> Self {
        Self { valid_hooks, rules: Vec::new(), offsets: Vec::new() }
    }

    fn push(&mut self, offset: u64, rule: Rule) {
        self.rules.push(rule);
        self.offsets.push(offset);
    }

    fn rule_at(&self, offset: u32) -> Option<usize> {
        // Each entry is at least a header long, so offsets ascend.
        self.offsets.binary_search(&u64::from(offset)).ok()
    }

    fn finish(self, declared: &Metadata) -> Result<Table, DecodeError> {
        let valid_hooks = self.valid_hooks;
        let mut chains = BTreeMap::new();

        for hook in valid_hooks.hooks() {
            let entry_off = declared.hook_entry[hook.index()];
            let entry = self.rule_at(entry_off).ok_or(
                DecodeError::HookUnset { hook, offset: entry_off },
            )?;

            let uflow_off = declared.underflow[hook.index()];
            let underflow = self.rule_at(uflow_off).ok_or(
                DecodeError::UnderflowUnset { hook, offset: uflow_off },
            )?;

            chains.insert(hook, ChainPoints { entry, underflow });
        }

        // Only the input chain may hold anything but a bare accept.
        for (hook, points) in &chains {
            let target = self.rules[points.entry].target;
            if *hook != Hook::LocalIn && target != Target::UnconditionalAccept
            {
                return Err(DecodeError::HookNotAccept(*hook));
            }
        }

        Ok(Table::new(valid_hooks, self.rules, chains)?)
    }
}

/// Decode a `IPT_SO_SET_REPLACE` blob.
///
/// On success the returned table carries the caller's declared
/// [`Metadata`], which has been checked against the table's own
/// encoding. Every rejection is logged at `Warn` before it is
/// returned.
pub fn decode_replace(
    ectx: &ExecCtx,
    blob: &[u8],
) -> Result<(TableName, Table), DecodeError> {
    let (replace, entries) = IptReplace::read_from_prefix(blob)
        .map_err(|_| DecodeError::ShortReplace { len: blob.len() })
        .inspect_err(|e| ectx.warn(&format!("replace rejected: {e}")))?;

    let name = TableName::from_raw(&replace.name)
        .map_err(DecodeError::BadName)
        .inspect_err(|e| ectx.warn(&format!("replace rejected: {e}")))?;

    let res = match TableKind::from_name(name.as_str()) {
        Some(kind) if kind.is_replaceable() => {
            if replace.valid_hooks != kind.valid_hooks().bits() {
                ectx.note(&format!(
                    "replace of table {name}: ignoring declared hooks \
                     {:#x}, table supports {:?}",
                    replace.valid_hooks,
                    kind.valid_hooks(),
                ));
            }

            let declared = Metadata {
                hook_entry: replace.hook_entry,
                underflow: replace.underflow,
                num_entries: replace.num_entries,
                size: replace.size,
            };
            decode_table(ectx, kind.valid_hooks(), &declared, entries)
        }

        _ => Err(DecodeError::UnsupportedTable(name.to_string())),
    };

    match res {
        Ok(table) => Ok((name, table)),
        Err(e) => {
            ectx.warn(&format!("replace of table {name} rejected: {e}"));
            Err(e)
        }
    }
}

/// Decode the entries of a table supporting `valid_hooks`.
///
/// `declared` gives the entry count to read, the offsets of each
/// hook's entry and underflow rules, and the total size. The offsets
/// are resolved to rule indices, and the whole of `declared` must
/// agree with the decoded table's own encoding. The returned table
/// carries `declared` as its metadata.
pub fn decode_table(
    ectx: &ExecCtx,
    valid_hooks: HookMask,
    declared: &Metadata,
    mut bytes: &[u8],
) -> Result<Table, DecodeError> {
    let mut builder = TableBuilder::new(valid_hooks);
    let mut offset = 0u64;

    for index in 0..declared.num_entries {
        let (entry, rest) = IptEntry::read_from_prefix(bytes)
            .map_err(|_| DecodeError::ShortEntry { index, offset })?;

        let target_offset = entry.target_offset;
        let next_offset = entry.next_offset;

        if usize::from(target_offset) < IptEntry::SIZE {
            return Err(DecodeError::TargetOffset {
                index,
                offset,
                target_offset,
            });
        }

        let filter = IpHeaderFilter::from_raw(&entry.ip)
            .map_err(|err| DecodeError::Filter { index, offset, err })?;

        if next_offset < target_offset {
            return Err(DecodeError::NextOffset {
                index,
                offset,
                target_offset,
                next_offset,
            });
        }

        let matchers_len = usize::from(target_offset) - IptEntry::SIZE;
        if matchers_len > rest.len() {
            return Err(DecodeError::Overrun {
                index,
                offset,
                region: "matcher",
                len: matchers_len,
                remaining: rest.len(),
            });
        }
        let (matcher_bytes, rest) = rest.split_at(matchers_len);
        let matchers = parse_matchers(&filter, matcher_bytes)
            .map_err(|err| DecodeError::Matcher { index, offset, err })?;

        let target_len = usize::from(next_offset - target_offset);
        if target_len > rest.len() {
            return Err(DecodeError::Overrun {
                index,
                offset,
                region: "target",
                len: target_len,
                remaining: rest.len(),
            });
        }
        let (target_bytes, rest) = rest.split_at(target_len);
        let target = parse_target(target_bytes)
            .map_err(|err| DecodeError::Target { index, offset, err })?;

        builder.push(offset, Rule { filter, matchers, target });

        let consumed = bytes.len() - rest.len();
        if consumed != usize::from(next_offset) {
            ectx.warn(&format!(
                "entry {index} at offset {offset} declares next offset \
                 {next_offset} but took {consumed} bytes"
            ));
        }

        offset += u64::from(next_offset);
        bytes = rest;
    }

    let table = builder.finish(declared)?;
    let computed = encode_table(ectx, &table).metadata;
    if computed != *declared {
        return Err(DecodeError::Metadata { declared: *declared, computed });
    }

    Ok(table.with_metadata(*declared))
}
