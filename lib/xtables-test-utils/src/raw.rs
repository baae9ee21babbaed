// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Hand-built ABI records.
//!
//! These write bytes directly rather than going through the encoder,
//! so tests can produce blobs the encoder never would.

use xtables::api::HookMask;
use xtables_api::IptEntry;
use xtables_api::IptIp;
use xtables_api::IptReplace;
use xtables_api::NF_INET_NUMHOOKS;
use xtables_api::XtEntryMatch;
use xtables_api::XtEntryTarget;
use xtables_api::XtErrorTarget;
use xtables_api::XtStandardTarget;
use xtables_api::XtTcp;
use xtables_api::XtUdp;
use xtables_api::to_c_str;
use xtables_api::xt_align;
use zerocopy::IntoBytes;

/// The header fields of a replace blob.
#[derive(Clone, Debug)]
pub struct ReplaceHdr {
    pub name: String,
    pub valid_hooks: HookMask,
    pub hook_entry: [u32; NF_INET_NUMHOOKS],
    pub underflow: [u32; NF_INET_NUMHOOKS],
    pub num_entries: u32,
    pub size: u32,
}

/// A replace header followed by `entries`.
pub fn replace(hdr: &ReplaceHdr, entries: &[u8]) -> Vec<u8> {
    let raw = IptReplace {
        name: to_c_str(&hdr.name).unwrap(),
        valid_hooks: hdr.valid_hooks.bits(),
        num_entries: hdr.num_entries,
        size: hdr.size,
        hook_entry: hdr.hook_entry,
        underflow: hdr.underflow,
        ..Default::default()
    };
    let mut blob = raw.as_bytes().to_vec();
    blob.extend_from_slice(entries);
    blob
}

/// One entry: header, match blocks, then the target block.
///
/// The offsets are computed from the blocks handed in.
pub fn entry(ip: IptIp, matches: &[Vec<u8>], target: &[u8]) -> Vec<u8> {
    let matches_len: usize = matches.iter().map(Vec::len).sum();
    let target_offset = IptEntry::SIZE + matches_len;
    let next_offset = target_offset + target.len();
    entry_with_offsets(
        ip,
        matches,
        target,
        target_offset as u16,
        next_offset as u16,
    )
}

/// Like [`entry`], but with caller-chosen offsets.
pub fn entry_with_offsets(
    ip: IptIp,
    matches: &[Vec<u8>],
    target: &[u8],
    target_offset: u16,
    next_offset: u16,
) -> Vec<u8> {
    let hdr = IptEntry { ip, target_offset, next_offset, ..Default::default() };
    let mut buf = hdr.as_bytes().to_vec();
    for m in matches {
        buf.extend_from_slice(m);
    }
    buf.extend_from_slice(target);
    buf
}

pub fn ip_proto(proto: u16) -> IptIp {
    IptIp { proto, ..Default::default() }
}

/// A standard target carrying the raw `verdict`.
pub fn standard_target(verdict: i32) -> Vec<u8> {
    XtStandardTarget {
        target: XtEntryTarget {
            target_size: XtStandardTarget::SIZE as u16,
            ..Default::default()
        },
        verdict,
        _pad: [0; 4],
    }
    .as_bytes()
    .to_vec()
}

pub fn accept_target() -> Vec<u8> {
    standard_target(-2)
}

pub fn drop_target() -> Vec<u8> {
    standard_target(-1)
}

/// An error target whose error name is `errorname`.
pub fn error_target(errorname: &str) -> Vec<u8> {
    XtErrorTarget {
        target: XtEntryTarget {
            target_size: XtErrorTarget::SIZE as u16,
            name: to_c_str("ERROR").unwrap(),
            revision: 0,
        },
        errorname: to_c_str(errorname).unwrap(),
        _pad: [0; 2],
    }
    .as_bytes()
    .to_vec()
}

fn match_block(name: &str, payload: &[u8]) -> Vec<u8> {
    let len = xt_align(XtEntryMatch::SIZE + payload.len());
    let hdr = XtEntryMatch {
        match_size: len as u16,
        name: to_c_str(name).unwrap(),
        revision: 0,
    };
    let mut buf = hdr.as_bytes().to_vec();
    buf.extend_from_slice(payload);
    buf.resize(len, 0);
    buf
}

pub fn tcp_match(tcp: XtTcp) -> Vec<u8> {
    match_block("tcp", tcp.as_bytes())
}

pub fn udp_match(udp: XtUdp) -> Vec<u8> {
    match_block("udp", udp.as_bytes())
}

/// A match block of any name around an arbitrary payload.
pub fn named_match(name: &str, payload: &[u8]) -> Vec<u8> {
    match_block(name, payload)
}

/// The entries of a filter table: `input`, then an accept entry for
/// each of the forward and output chains, then the error entry.
pub fn filter_entries(input: Vec<u8>) -> Vec<u8> {
    let accept = || entry(IptIp::default(), &[], &accept_target());
    let mut buf = input;
    buf.extend(accept());
    buf.extend(accept());
    buf.extend(entry(IptIp::default(), &[], &error_target("ERROR")));
    buf
}

/// A filter replace header for [`filter_entries`] with an input entry
/// of `input_len` bytes.
pub fn filter_hdr(input_len: u32) -> ReplaceHdr {
    let fwd = input_len;
    let out = input_len + 152;
    ReplaceHdr {
        name: "filter".to_string(),
        valid_hooks: HookMask::LOCAL_IN
            | HookMask::FORWARD
            | HookMask::LOCAL_OUT,
        hook_entry: [0, 0, fwd, out, 0],
        underflow: [0, 0, fwd, out, 0],
        num_entries: 4,
        size: input_len + 2 * 152 + 176,
    }
}
