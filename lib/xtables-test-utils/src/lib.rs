// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Common routines for integration tests.

// This type of pedantry is more trouble than it's worth here.
#![allow(dead_code)]

pub mod raw;

use std::sync::Arc;
use std::sync::Mutex;

// Let's make our lives easier and pub use a bunch of stuff.
pub use xtables::ExecCtx;
pub use xtables::LogLevel;
pub use xtables::LogProvider;
pub use xtables::api::Hook;
pub use xtables::api::HookMask;
pub use xtables::api::IPPROTO_TCP;
pub use xtables::api::IPPROTO_UDP;
pub use xtables::api::IptEntry;
pub use xtables::api::IptGetEntries;
pub use xtables::api::IptGetinfo;
pub use xtables::api::IptIp;
pub use xtables::api::IptReplace;
pub use xtables::api::TableName;
pub use xtables::api::XtError;
pub use xtables::engine::decode::DecodeError;
pub use xtables::engine::decode::decode_replace;
pub use xtables::engine::decode::decode_table;
pub use xtables::engine::encode::EncodedTable;
pub use xtables::engine::encode::encode_table;
pub use xtables::engine::ioctl::install_defaults;
pub use xtables::engine::ioctl::query_entries;
pub use xtables::engine::ioctl::query_info;
pub use xtables::engine::ioctl::replace_entries;
pub use xtables::engine::matcher::Matcher;
pub use xtables::engine::matcher::MatcherError;
pub use xtables::engine::matcher::PortRange;
pub use xtables::engine::matcher::TcpMatcher;
pub use xtables::engine::matcher::UdpMatcher;
pub use xtables::engine::rule::FilterError;
pub use xtables::engine::rule::IpHeaderFilter;
pub use xtables::engine::rule::Rule;
pub use xtables::engine::sockopt::UserMem;
pub use xtables::engine::sockopt::VecMem;
pub use xtables::engine::store::IpTables;
pub use xtables::engine::store::TableStore;
pub use xtables::engine::table::ChainPoints;
pub use xtables::engine::table::Metadata;
pub use xtables::engine::table::Table;
pub use xtables::engine::table::TableKind;
pub use xtables::engine::target::Target;
pub use xtables::engine::target::TargetError;
pub use xtables::engine::verdict::VerdictError;

/// A log provider that remembers every line it is handed.
#[derive(Clone, Default)]
pub struct CaptureLog {
    lines: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl CaptureLog {
    /// Every captured line at `level`, oldest first.
    pub fn at(&self, level: LogLevel) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.at(LogLevel::Warn)
    }

    pub fn notes(&self) -> Vec<String> {
        self.at(LogLevel::Note)
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap().clear();
    }
}

impl LogProvider for CaptureLog {
    fn log(&self, level: LogLevel, msg: &str) {
        self.lines.lock().unwrap().push((level, msg.to_string()));
    }
}

/// An [`ExecCtx`] logging to a [`CaptureLog`], and a handle on that
/// log.
pub fn ectx() -> (ExecCtx, CaptureLog) {
    let log = CaptureLog::default();
    (ExecCtx { log: Box::new(log.clone()) }, log)
}

/// A store holding the default table of every kind.
pub fn default_store() -> IpTables {
    let (ectx, _) = ectx();
    let store = IpTables::new();
    install_defaults(&ectx, &store);
    store
}

pub fn table_name(name: &str) -> TableName {
    TableName::new(name).unwrap()
}

/// A replace blob for `table` under `name`, with the header filled in
/// from the table's own encoding.
pub fn blob_for(name: &str, table: &Table) -> Vec<u8> {
    let (ectx, _) = ectx();
    let enc = encode_table(&ectx, table);
    raw::replace(
        &raw::ReplaceHdr {
            name: name.to_string(),
            valid_hooks: table.valid_hooks(),
            hook_entry: enc.metadata.hook_entry,
            underflow: enc.metadata.underflow,
            num_entries: enc.metadata.num_entries,
            size: enc.metadata.size,
        },
        &enc.entries,
    )
}

/// A filter table with one rule per built-in chain plus the
/// terminating error rule. The input chain's rule is `input`; the
/// others accept.
pub fn filter_with_input(input: Rule) -> Table {
    let accept = || Rule::unconditional(Target::UnconditionalAccept);
    let rules = vec![
        input,
        accept(),
        accept(),
        Rule::unconditional(Target::Error),
    ];
    let chains = [
        (Hook::LocalIn, ChainPoints::at(0)),
        (Hook::Forward, ChainPoints::at(1)),
        (Hook::LocalOut, ChainPoints::at(2)),
    ]
    .into_iter()
    .collect();
    Table::new(TableKind::Filter.valid_hooks(), rules, chains).unwrap()
}

/// A rule dropping TCP traffic to `port`.
pub fn tcp_drop(port: u16) -> Rule {
    Rule {
        filter: IpHeaderFilter { protocol: IPPROTO_TCP },
        matchers: vec![Matcher::Tcp(TcpMatcher {
            src_ports: PortRange::ANY,
            dst_ports: PortRange { start: port, end: port },
        })],
        target: Target::UnconditionalDrop,
    }
}

/// A rule dropping UDP traffic from ports `[start, end]`.
pub fn udp_drop(start: u16, end: u16) -> Rule {
    Rule {
        filter: IpHeaderFilter { protocol: IPPROTO_UDP },
        matchers: vec![Matcher::Udp(UdpMatcher {
            src_ports: PortRange { start, end },
            dst_ports: PortRange::ANY,
        })],
        target: Target::UnconditionalDrop,
    }
}
