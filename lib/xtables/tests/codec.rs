// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Codec tests.
//!
//! These drive the decoder with blobs built by hand, byte by byte,
//! as well as blobs produced by the encoder, and check that each
//! rejection names the entry and offset at fault.

use common::raw;
use common::*;
use xtables_api::XtTcp;
use xtables_api::XtUdp;
use xtables_test_utils as common;

// Byte offsets into an `ipt_replace` header.
const HOOK_ENTRY_AT: usize = 44;
const UNDERFLOW_AT: usize = 64;

fn default_filter_blob() -> Vec<u8> {
    blob_for("filter", &TableKind::Filter.default_table())
}

fn set_u32(blob: &mut [u8], at: usize, val: u32) {
    blob[at..at + 4].copy_from_slice(&val.to_ne_bytes());
}

#[test]
fn default_tables_round_trip() {
    let (ectx, _) = ectx();

    for kind in TableKind::ALL {
        let table = kind.default_table();
        let enc = encode_table(&ectx, &table);
        let decoded = decode_table(
            &ectx,
            kind.valid_hooks(),
            &enc.metadata,
            &enc.entries,
        )
        .unwrap();

        assert!(decoded.same_rules(&table), "{kind}");
        assert_eq!(decoded.metadata(), Some(&enc.metadata), "{kind}");
        assert_eq!(encode_table(&ectx, &decoded), enc, "{kind}");
    }
}

#[test]
fn single_accept_rule_per_chain() {
    let (ectx, log) = ectx();
    let (name, table) = decode_replace(&ectx, &default_filter_blob()).unwrap();

    assert_eq!(name.as_str(), "filter");
    assert_eq!(table.rules().len(), 4);
    for rule in &table.rules()[..3] {
        assert!(rule.is_unconditional_accept());
        assert!(rule.matchers.is_empty());
    }
    assert_eq!(table.rules()[3].target, Target::Error);

    let meta = table.metadata().unwrap();
    assert_eq!(meta.size, 632);
    assert_eq!(meta.hook_entry, [0, 0, 152, 304, 0]);
    assert_eq!(meta.underflow, [0, 0, 152, 304, 0]);
    assert!(log.warnings().is_empty());
}

#[test]
fn input_only_single_accept() {
    let (ectx, _) = ectx();
    let mut chains = std::collections::BTreeMap::new();
    chains.insert(Hook::LocalIn, ChainPoints::at(0));
    let table = Table::new(
        HookMask::LOCAL_IN,
        vec![Rule::unconditional(Target::UnconditionalAccept)],
        chains,
    )
    .unwrap();

    let enc = encode_table(&ectx, &table);
    assert_eq!(enc.entries.len(), 152);
    assert_eq!(enc.metadata.num_entries, 1);
    assert_eq!(enc.metadata.hook_entry, [0; 5]);
    assert_eq!(
        enc.entries,
        raw::entry(IptIp::default(), &[], &raw::accept_target())
    );

    let decoded =
        decode_table(&ectx, HookMask::LOCAL_IN, &enc.metadata, &enc.entries)
            .unwrap();
    assert_eq!(decoded, table.with_metadata(enc.metadata));
}

#[test]
fn empty_table() {
    let (ectx, _) = ectx();
    let table =
        decode_table(&ectx, HookMask::empty(), &Metadata::default(), &[])
            .unwrap();
    assert!(table.rules().is_empty());
    assert_eq!(encode_table(&ectx, &table).entries, Vec::<u8>::new());

    // A filter table must at least give each of its chains a rule.
    let hdr = raw::ReplaceHdr {
        num_entries: 0,
        size: 0,
        hook_entry: [0; 5],
        underflow: [0; 5],
        ..raw::filter_hdr(0)
    };
    assert_eq!(
        decode_replace(&ectx, &raw::replace(&hdr, &[])),
        Err(DecodeError::HookUnset { hook: Hook::LocalIn, offset: 0 })
    );
}

#[test]
fn hand_built_udp_matches_encoder() {
    let udp = raw::udp_match(XtUdp {
        spts: [53, 53],
        dpts: [0, u16::MAX],
        ..Default::default()
    });
    let input =
        raw::entry(raw::ip_proto(IPPROTO_UDP), &[udp], &raw::drop_target());
    assert_eq!(input.len(), 200);

    let blob =
        raw::replace(&raw::filter_hdr(200), &raw::filter_entries(input));
    assert_eq!(blob, blob_for("filter", &filter_with_input(udp_drop(53, 53))));

    let (ectx, _) = ectx();
    let (_, table) = decode_replace(&ectx, &blob).unwrap();
    assert_eq!(table.rules()[0], udp_drop(53, 53));
}

#[test]
fn tcp_rule_shifts_offsets() {
    let (ectx, _) = ectx();
    let blob = blob_for("filter", &filter_with_input(tcp_drop(22)));
    let (_, table) = decode_replace(&ectx, &blob).unwrap();

    assert_eq!(table.rules()[0], tcp_drop(22));
    let meta = table.metadata().unwrap();
    assert_eq!(meta.hook_entry, [0, 0, 200, 352, 0]);
    assert_eq!(meta.size, 200 + 2 * 152 + 176);
}

#[test]
fn every_truncation_rejected() {
    let (ectx, _) = ectx();
    let blob = blob_for("filter", &filter_with_input(tcp_drop(443)));

    for len in 0..blob.len() {
        assert!(
            decode_replace(&ectx, &blob[..len]).is_err(),
            "accepted blob truncated to {len} bytes"
        );
    }
    assert!(decode_replace(&ectx, &blob).is_ok());
}

#[test]
fn hook_entry_unset() {
    let (ectx, _) = ectx();

    for hook in [Hook::LocalIn, Hook::Forward, Hook::LocalOut] {
        let mut blob = default_filter_blob();
        set_u32(&mut blob, HOOK_ENTRY_AT + 4 * hook.index(), 8);
        assert_eq!(
            decode_replace(&ectx, &blob),
            Err(DecodeError::HookUnset { hook, offset: 8 }),
            "{hook}"
        );
    }
}

#[test]
fn underflow_unset() {
    let (ectx, _) = ectx();

    for hook in [Hook::LocalIn, Hook::Forward, Hook::LocalOut] {
        let mut blob = default_filter_blob();
        set_u32(&mut blob, UNDERFLOW_AT + 4 * hook.index(), 9999);
        assert_eq!(
            decode_replace(&ectx, &blob),
            Err(DecodeError::UnderflowUnset { hook, offset: 9999 }),
            "{hook}"
        );
    }
}

#[test]
fn unsupported_filter_fields() {
    let (ectx, _) = ectx();
    let fields = [
        (0, "src"),
        (4, "dst"),
        (8, "smsk"),
        (12, "dmsk"),
        (16, "iniface"),
        (32, "outiface"),
        (48, "iniface_mask"),
        (64, "outiface_mask"),
        (82, "flags"),
        (83, "invflags"),
    ];

    for (at, field) in fields {
        // Poke the second entry so the error carries a nonzero offset.
        let mut blob = default_filter_blob();
        blob[IptReplace::SIZE + 152 + at] = b'x';
        assert_eq!(
            decode_replace(&ectx, &blob),
            Err(DecodeError::Filter {
                index: 1,
                offset: 152,
                err: FilterError(field),
            })
        );
    }
}

#[test]
fn target_offset_inside_header() {
    let (ectx, _) = ectx();
    let input = raw::entry_with_offsets(
        IptIp::default(),
        &[],
        &raw::accept_target(),
        100,
        152,
    );
    let blob =
        raw::replace(&raw::filter_hdr(152), &raw::filter_entries(input));
    assert_eq!(
        decode_replace(&ectx, &blob),
        Err(DecodeError::TargetOffset {
            index: 0,
            offset: 0,
            target_offset: 100,
        })
    );
}

#[test]
fn target_overruns_blob() {
    let (ectx, _) = ectx();
    let mut entries = raw::filter_entries(raw::entry(
        IptIp::default(),
        &[],
        &raw::accept_target(),
    ));
    // Drop the tail of the error target.
    entries.truncate(entries.len() - 8);
    let blob = raw::replace(&raw::filter_hdr(152), &entries);
    assert_eq!(
        decode_replace(&ectx, &blob),
        Err(DecodeError::Overrun {
            index: 3,
            offset: 456,
            region: "target",
            len: 64,
            remaining: 56,
        })
    );
}

#[test]
fn tcp_flags_rejected() {
    let (ectx, _) = ectx();
    let tcp = raw::tcp_match(XtTcp {
        spts: [0, u16::MAX],
        dpts: [22, 22],
        flg_mask: 0x12,
        flg_cmp: 0x02,
        ..Default::default()
    });
    let input =
        raw::entry(raw::ip_proto(IPPROTO_TCP), &[tcp], &raw::drop_target());
    let blob =
        raw::replace(&raw::filter_hdr(200), &raw::filter_entries(input));
    assert_eq!(
        decode_replace(&ectx, &blob),
        Err(DecodeError::Matcher {
            index: 0,
            offset: 0,
            err: MatcherError::TcpFlags,
        })
    );
}

#[test]
fn matcher_needs_its_protocol() {
    let (ectx, _) = ectx();
    let udp = raw::udp_match(XtUdp::default());
    let input =
        raw::entry(raw::ip_proto(IPPROTO_TCP), &[udp], &raw::drop_target());
    let blob =
        raw::replace(&raw::filter_hdr(200), &raw::filter_entries(input));
    assert_eq!(
        decode_replace(&ectx, &blob),
        Err(DecodeError::Matcher {
            index: 0,
            offset: 0,
            err: MatcherError::Protocol {
                name: "udp",
                expected: IPPROTO_UDP,
                proto: IPPROTO_TCP,
            },
        })
    );
}

#[test]
fn unknown_matcher() {
    let (ectx, _) = ectx();
    let icmp = raw::named_match("icmp", &[8, 0, 255, 0]);
    assert_eq!(icmp.len(), 40);
    let input = raw::entry(IptIp::default(), &[icmp], &raw::drop_target());
    let blob =
        raw::replace(&raw::filter_hdr(192), &raw::filter_entries(input));
    assert_eq!(
        decode_replace(&ectx, &blob),
        Err(DecodeError::Matcher {
            index: 0,
            offset: 0,
            err: MatcherError::Unknown("icmp".to_string()),
        })
    );
}

#[test]
fn jump_rejected() {
    let (ectx, _) = ectx();
    let input =
        raw::entry(IptIp::default(), &[], &raw::standard_target(304));
    let blob =
        raw::replace(&raw::filter_hdr(152), &raw::filter_entries(input));
    assert_eq!(
        decode_replace(&ectx, &blob),
        Err(DecodeError::Target {
            index: 0,
            offset: 0,
            err: TargetError::Verdict(VerdictError::Unknown(304)),
        })
    );
}

#[test]
fn user_chain_rejected() {
    let (ectx, _) = ectx();
    let accept = || raw::entry(IptIp::default(), &[], &raw::accept_target());
    let mut entries = Vec::new();
    for _ in 0..3 {
        entries.extend(accept());
    }
    entries.extend(raw::entry(
        IptIp::default(),
        &[],
        &raw::error_target("mychain"),
    ));

    let blob = raw::replace(&raw::filter_hdr(152), &entries);
    assert_eq!(
        decode_replace(&ectx, &blob),
        Err(DecodeError::Target {
            index: 3,
            offset: 456,
            err: TargetError::UserChain("mychain".to_string()),
        })
    );
}

#[test]
fn declared_metadata_must_agree() {
    let (ectx, _) = ectx();
    let input = raw::entry(IptIp::default(), &[], &raw::accept_target());
    let hdr = raw::ReplaceHdr { size: 640, ..raw::filter_hdr(152) };
    let blob = raw::replace(&hdr, &raw::filter_entries(input));

    match decode_replace(&ectx, &blob) {
        Err(DecodeError::Metadata { declared, computed }) => {
            assert_eq!(declared.size, 640);
            assert_eq!(computed.size, 632);
        }
        res => panic!("expected metadata mismatch: {res:?}"),
    }
}

#[test]
fn declared_hooks_are_noted() {
    let (ectx, log) = ectx();
    let input = raw::entry(IptIp::default(), &[], &raw::accept_target());
    let hdr = raw::ReplaceHdr {
        valid_hooks: HookMask::all(),
        ..raw::filter_hdr(152)
    };
    let blob = raw::replace(&hdr, &raw::filter_entries(input));

    let (_, table) = decode_replace(&ectx, &blob).unwrap();
    assert_eq!(table.valid_hooks(), TableKind::Filter.valid_hooks());
    let notes = log.notes();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].contains("ignoring declared hooks"), "{notes:?}");
}

#[test]
fn rejections_are_logged() {
    let (ectx, log) = ectx();
    let mut blob = default_filter_blob();
    set_u32(&mut blob, HOOK_ENTRY_AT + 4 * Hook::Forward.index(), 8);

    assert!(decode_replace(&ectx, &blob).is_err());
    let warnings = log.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("replace of table filter rejected"));
    assert!(warnings[0].contains("FORWARD"));

    log.clear();
    assert!(decode_replace(&ectx, &blob[..10]).is_err());
    assert_eq!(log.warnings().len(), 1);
}
