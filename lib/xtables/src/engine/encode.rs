// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Encode a [`Table`] into its entry blob.

use super::table::Metadata;
use super::table::Table;
use crate::ExecCtx;
use crate::api::IptEntry;
use crate::api::XT_ALIGN;
use zerocopy::IntoBytes;

cfg_if! {
    if #[cfg(all(not(feature = "std"), not(test)))] {
        use alloc::vec::Vec;
    } else {
        use std::vec::Vec;
    }
}

/// The entries of a table, as the caller sees them, along with the
/// offsets and counts describing them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncodedTable {
    pub entries: Vec<u8>,
    pub metadata: Metadata,
}

/// Encode `table` one entry per rule, in rule order.
///
/// A [`Table`] is validated when it is built, so encoding cannot fail.
/// A block that comes out misaligned or oversized is a bug in this
/// crate and halts via [`ExecCtx::fatal`].
pub fn encode_table(ectx: &ExecCtx, table: &Table) -> EncodedTable {
    let mut meta = Metadata::default();
    let mut entries = Vec::new();

    for (idx, rule) in table.rules().iter().enumerate() {
        let offset = offset_u32(ectx, entries.len());

        for (hook, points) in table.chains() {
            if points.entry == idx {
                meta.hook_entry[hook.index()] = offset;
            }
            if points.underflow == idx {
                meta.underflow[hook.index()] = offset;
            }
        }

        let start = entries.len();
        let mut body = Vec::new();
        for m in &rule.matchers {
            let before = body.len();
            m.marshal(&mut body);
            check_block(ectx, m.name(), body.len() - before);
        }
        let target_offset = IptEntry::SIZE + body.len();

        let before = body.len();
        rule.target.marshal(&mut body);
        check_block(ectx, "target", body.len() - before);
        let next_offset = IptEntry::SIZE + body.len();

        let (Ok(target_offset), Ok(next_offset)) =
            (u16::try_from(target_offset), u16::try_from(next_offset))
        else {
            ectx.fatal(&format!(
                "rule {idx} encodes to {next_offset} bytes, past the \
                 entry limit"
            ));
        };

        let hdr = IptEntry {
            ip: rule.filter.to_raw(),
            target_offset,
            next_offset,
            ..Default::default()
        };
        entries.extend_from_slice(hdr.as_bytes());
        entries.extend_from_slice(&body);
        debug_assert_eq!(entries.len() - start, rule.entry_len());
    }

    meta.size = offset_u32(ectx, entries.len());
    meta.num_entries = offset_u32(ectx, table.rules().len());
    EncodedTable { entries, metadata: meta }
}

fn check_block(ectx: &ExecCtx, what: &str, len: usize) {
    if len % XT_ALIGN != 0 {
        ectx.fatal(&format!(
            "{what} block of {len} bytes is not a multiple of {XT_ALIGN}"
        ));
    }
}

fn offset_u32(ectx: &ExecCtx, val: usize) -> u32 {
    match u32::try_from(val) {
        Ok(v) => v,
        Err(_) => ectx.fatal(&format!("table offset {val} exceeds 32 bits")),
    }
}
