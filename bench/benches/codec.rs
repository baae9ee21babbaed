// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use std::hint::black_box;
use xtables_test_utils::*;

// A filter table whose input chain holds `n` port rules, alternating
// between TCP and UDP, before falling through to an accept.
fn port_table(n: u16) -> Table {
    let mut rules: Vec<Rule> = (0..n)
        .map(|i| if i % 2 == 0 { tcp_drop(i) } else { udp_drop(i, i) })
        .collect();
    let accept = || Rule::unconditional(Target::UnconditionalAccept);
    let uflow = rules.len();
    rules.extend([accept(), accept(), accept()]);
    rules.push(Rule::unconditional(Target::Error));

    let chains = [
        (Hook::LocalIn, ChainPoints { entry: 0, underflow: uflow }),
        (Hook::Forward, ChainPoints::at(uflow + 1)),
        (Hook::LocalOut, ChainPoints::at(uflow + 2)),
    ]
    .into_iter()
    .collect();
    Table::new(TableKind::Filter.valid_hooks(), rules, chains).unwrap()
}

fn tables() -> Vec<(&'static str, Table)> {
    vec![
        ("default", TableKind::Filter.default_table()),
        ("ports-256", port_table(256)),
    ]
}

pub fn encode(c: &mut Criterion) {
    let (ectx, _) = ectx();
    let mut group = c.benchmark_group("encode");

    for (label, table) in tables() {
        let len = encode_table(&ectx, &table).entries.len();
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(label),
            &table,
            |b, t| b.iter(|| encode_table(&ectx, black_box(t))),
        );
    }
}

pub fn decode(c: &mut Criterion) {
    let (ectx, _) = ectx();
    let mut group = c.benchmark_group("decode");

    for (label, table) in tables() {
        let blob = blob_for("filter", &table);
        group.throughput(Throughput::Bytes(blob.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(label),
            &blob,
            |b, blob| b.iter(|| decode_replace(&ectx, black_box(blob))),
        );
    }
}

pub fn replace(c: &mut Criterion) {
    let (ectx, _) = ectx();
    let store = default_store();
    let blob = blob_for("filter", &port_table(256));

    c.bench_function("replace ports-256", |b| {
        b.iter(|| replace_entries(&ectx, &store, black_box(&blob)))
    });
}

criterion_group!(codec, encode, decode, replace);
criterion_main!(codec);
