// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The table operations: query info, query entries, replace entries,
//! and installing the defaults.
//!
//! These run against a caller-supplied [`TableStore`] and do all
//! byte-level work through the encoder and decoder.

use super::decode::DecodeError;
use super::decode::decode_replace;
use super::encode::EncodedTable;
use super::encode::encode_table;
use super::store::TableStore;
use super::table::Metadata;
use super::table::Table;
use super::table::default_tables;
use crate::ExecCtx;
use crate::api::IptReplace;
use crate::api::TableInfo;
use crate::api::TableName;
use crate::api::XtError;
use zerocopy::FromBytes;

cfg_if! {
    if #[cfg(all(not(feature = "std"), not(test)))] {
        use alloc::string::String;
        use alloc::string::ToString;
    } else {
        use std::string::String;
        use std::string::ToString;
    }
}

fn lookup(
    ectx: &ExecCtx,
    store: &dyn TableStore,
    name: &TableName,
) -> Result<(Table, Metadata), XtError> {
    let Some(table) = store.get(name) else {
        ectx.warn(&format!("table {name} not found"));
        return Err(XtError::TableNotFound(name.to_string()));
    };

    // Every table we install carries its metadata.
    let Some(meta) = table.metadata().copied() else {
        ectx.fatal(&format!("table {name} has no metadata"));
    };

    Ok((table, meta))
}

/// Describe the named table's hooks, entry count and size.
pub fn query_info(
    ectx: &ExecCtx,
    store: &dyn TableStore,
    name: &TableName,
) -> Result<TableInfo, XtError> {
    let (table, meta) = lookup(ectx, store, name)?;
    Ok(meta.info(table.valid_hooks()))
}

/// Encode the named table's entries.
///
/// The entries must fit in `capacity` bytes.
///
/// # Panics
///
/// If the stored metadata disagrees with a fresh encoding of the
/// table. The decoder checks this agreement before anything is
/// stored, so a mismatch means the table changed without its
/// metadata.
pub fn query_entries(
    ectx: &ExecCtx,
    store: &dyn TableStore,
    name: &TableName,
    capacity: usize,
) -> Result<EncodedTable, XtError> {
    let (table, meta) = lookup(ectx, store, name)?;
    let enc = encode_table(ectx, &table);

    if enc.metadata != meta {
        ectx.fatal(&format!(
            "table {name} metadata drifted: stored {meta:?}, encoded {:?}",
            enc.metadata
        ));
    }

    if enc.entries.len() > capacity {
        ectx.warn(&format!(
            "table {name} needs {} bytes, caller gave {capacity}",
            enc.entries.len()
        ));
        return Err(XtError::RespTooLarge {
            needed: enc.entries.len(),
            given: capacity,
        });
    }

    Ok(enc)
}

/// Decode `blob` and install the resulting table.
///
/// On any rejection the store is left as it was.
pub fn replace_entries(
    ectx: &ExecCtx,
    store: &dyn TableStore,
    blob: &[u8],
) -> Result<TableName, XtError> {
    let (name, table) = decode_replace(ectx, blob).map_err(|e| match e {
        DecodeError::BadName(_) => XtError::BadName,
        DecodeError::UnsupportedTable(name) => {
            XtError::UnsupportedTable(name)
        }
        e => XtError::InvalidReplace {
            table: table_name_of(blob),
            msg: e.to_string(),
        },
    })?;

    let (num_entries, size) = match table.metadata() {
        Some(m) => (m.num_entries, m.size),
        None => (0, 0),
    };
    store.set(name.clone(), table);
    ectx.note(&format!(
        "replaced table {name}: {num_entries} entries, {size} bytes"
    ));
    Ok(name)
}

// Empty when the replace header itself is unreadable.
fn table_name_of(blob: &[u8]) -> String {
    IptReplace::read_from_prefix(blob)
        .ok()
        .and_then(|(r, _)| TableName::from_raw(&r.name).ok())
        .map(|n| n.to_string())
        .unwrap_or_default()
}

/// Install the default table of every kind, replacing whatever the
/// store held under those names.
///
/// # Panics
///
/// The defaults are built here and must always encode.
pub fn install_defaults(ectx: &ExecCtx, store: &dyn TableStore) {
    for (name, table) in default_tables() {
        let enc = encode_table(ectx, &table);
        let num_entries = enc.metadata.num_entries;
        let size = enc.metadata.size;
        store.set(name.clone(), table.with_metadata(enc.metadata));
        ectx.note(&format!(
            "installed default table {name}: {num_entries} entries, \
             {size} bytes"
        ));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::Hook;
    use crate::api::HookMask;
    use crate::engine::store::IpTables;
    use crate::engine::table::TableKind;
    use crate::provider::PrintlnLog;

    fn ectx() -> ExecCtx {
        ExecCtx { log: Box::new(PrintlnLog) }
    }

    fn filter() -> TableName {
        TableName::new("filter").unwrap()
    }

    #[test]
    fn info_after_defaults() {
        let store = IpTables::new();
        install_defaults(&ectx(), &store);

        let info = query_info(&ectx(), &store, &filter()).unwrap();
        assert_eq!(
            info.valid_hooks,
            HookMask::LOCAL_IN | HookMask::FORWARD | HookMask::LOCAL_OUT
        );
        assert_eq!(info.num_entries, 4);
        assert_eq!(info.size, 632);
        assert_eq!(info.hook_entry[Hook::Forward.index()], 152);

        let nat = TableName::new("nat").unwrap();
        let info = query_info(&ectx(), &store, &nat).unwrap();
        assert_eq!(info.num_entries, 5);
        assert_eq!(info.hook_entry, [0, 152, 0, 304, 456]);
    }

    #[test]
    fn not_found() {
        let store = IpTables::new();
        assert_eq!(
            query_info(&ectx(), &store, &filter()),
            Err(XtError::TableNotFound("filter".to_string()))
        );
    }

    #[test]
    fn entries_capacity() {
        let store = IpTables::new();
        install_defaults(&ectx(), &store);

        let enc = query_entries(&ectx(), &store, &filter(), 632).unwrap();
        assert_eq!(enc.entries.len(), 632);
        assert_eq!(
            query_entries(&ectx(), &store, &filter(), 631),
            Err(XtError::RespTooLarge { needed: 632, given: 631 })
        );
    }

    #[test]
    #[should_panic]
    fn drifted_metadata_is_fatal() {
        let store = IpTables::new();
        let name = filter();
        let table = TableKind::Filter
            .default_table()
            .with_metadata(Metadata { size: 1, ..Default::default() });
        store.set(name.clone(), table);
        let _ = query_entries(&ectx(), &store, &name, usize::MAX);
    }

    #[test]
    #[should_panic]
    fn missing_metadata_is_fatal() {
        let store = IpTables::new();
        store.set(filter(), TableKind::Filter.default_table());
        let _ = query_info(&ectx(), &store, &filter());
    }

    #[test]
    fn rejected_replace_keeps_table() {
        let store = IpTables::new();
        install_defaults(&ectx(), &store);
        let before = store.get(&filter());

        let res = replace_entries(&ectx(), &store, &[0u8; 10]);
        assert!(matches!(res, Err(XtError::InvalidReplace { .. })));
        assert_eq!(store.get(&filter()), before);
    }
}
