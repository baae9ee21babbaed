// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Where tables live between calls.
//!
//! The network stack owns its tables; we only ever read one whole
//! table out or write one whole table in.

use super::table::Table;
use crate::api::TableName;

cfg_if! {
    if #[cfg(all(not(feature = "std"), not(test)))] {
        use alloc::vec::Vec;
    } else {
        use crate::sync::KMutex;
        use std::collections::BTreeMap;
        use std::vec::Vec;
    }
}

/// A store of tables keyed by name.
///
/// Implementations must make [`TableStore::set`] a single swap: a
/// concurrent [`TableStore::get`] of the same name sees either the old
/// table or the new one, never a mix.
pub trait TableStore: Send + Sync {
    /// A snapshot of the named table.
    fn get(&self, name: &TableName) -> Option<Table>;

    /// Install `table` under `name`, replacing any previous table.
    fn set(&self, name: TableName, table: Table);

    /// A snapshot of every table, ordered by name.
    fn list(&self) -> Vec<(TableName, Table)>;
}

/// An in-memory [`TableStore`] guarded by a single lock.
#[cfg(any(feature = "std", test))]
pub struct IpTables {
    tables: KMutex<BTreeMap<TableName, Table>>,
}

#[cfg(any(feature = "std", test))]
impl IpTables {
    pub fn new() -> Self {
        Self { tables: KMutex::new(BTreeMap::new()) }
    }
}

#[cfg(any(feature = "std", test))]
impl TableStore for IpTables {
    fn get(&self, name: &TableName) -> Option<Table> {
        self.tables.lock().get(name).cloned()
    }

    fn set(&self, name: TableName, table: Table) {
        self.tables.lock().insert(name, table);
    }

    fn list(&self) -> Vec<(TableName, Table)> {
        self.tables
            .lock()
            .iter()
            .map(|(n, t)| (n.clone(), t.clone()))
            .collect()
    }
}

#[cfg(any(feature = "std", test))]
impl Default for IpTables {
    fn default() -> Self {
        Self::new()
    }
}
