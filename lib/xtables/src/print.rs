// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Print tables in a human-friendly manner.
//!
//! This is mostly a place to hang printing routines so that they can
//! be shared by tools and integration tests.

use crate::api::TableInfo;
use crate::api::TableName;
use crate::engine::table::Table;
use itertools::Itertools;
use std::io::Write;
use std::string::String;
use tabwriter::TabWriter;

/// Print a [`Table`].
pub fn print_table(name: &TableName, table: &Table) -> std::io::Result<()> {
    print_table_into(&mut std::io::stdout(), name, table)
}

/// Print a [`Table`] into a given writer.
pub fn print_table_into(
    writer: &mut impl Write,
    name: &TableName,
    table: &Table,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(t, "Table {name}")?;
    write_hrb(&mut t)?;
    writeln!(t, "Chains")?;
    write_hr(&mut t)?;
    writeln!(t, "HOOK\tENTRY\tUNDERFLOW")?;
    for (hook, points) in table.chains() {
        writeln!(t, "{hook}\t{}\t{}", points.entry, points.underflow)?;
    }
    t.flush()?;

    writeln!(t, "\nRules")?;
    write_hr(&mut t)?;
    writeln!(t, "IDX\tHOOKS\tPROTO\tMATCHES\tTARGET")?;
    for (idx, rule) in table.rules().iter().enumerate() {
        let matches = if rule.matchers.is_empty() {
            String::from("--")
        } else {
            rule.matchers.iter().join(", ")
        };

        writeln!(
            t,
            "{idx}\t{}\t{}\t{matches}\t{}",
            hooks_at(table, idx),
            rule.filter,
            rule.target,
        )?;
    }

    writeln!(t)?;
    t.flush()
}

/// Print a [`TableInfo`].
pub fn print_info(name: &TableName, info: &TableInfo) -> std::io::Result<()> {
    print_info_into(&mut std::io::stdout(), name, info)
}

/// Print a [`TableInfo`] into a given writer.
pub fn print_info_into(
    writer: &mut impl Write,
    name: &TableName,
    info: &TableInfo,
) -> std::io::Result<()> {
    let mut t = TabWriter::new(writer);

    writeln!(
        t,
        "Table {name}: {} entries, {} bytes",
        info.num_entries, info.size
    )?;
    write_hr(&mut t)?;
    writeln!(t, "HOOK\tENTRY OFFSET\tUNDERFLOW OFFSET")?;
    for hook in info.valid_hooks.hooks() {
        writeln!(
            t,
            "{hook}\t{}\t{}",
            info.hook_entry[hook.index()],
            info.underflow[hook.index()],
        )?;
    }
    t.flush()
}

// The hooks whose chains start or fall back at rule `idx`, e.g.
// `INPUT/u` for an underflow.
fn hooks_at(table: &Table, idx: usize) -> String {
    let marks = table
        .chains()
        .filter_map(|(hook, p)| match (p.entry == idx, p.underflow == idx) {
            (true, true) => Some(format!("{hook}")),
            (true, false) => Some(format!("{hook}/e")),
            (false, true) => Some(format!("{hook}/u")),
            (false, false) => None,
        })
        .join(",");

    if marks.is_empty() { String::from("--") } else { marks }
}

/// Print a horizontal rule in bold.
pub fn write_hrb(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:=<70}", "=")
}

/// Print a horizontal rule.
pub fn write_hr(t: &mut impl Write) -> std::io::Result<()> {
    writeln!(t, "{:-<70}", "-")
}
