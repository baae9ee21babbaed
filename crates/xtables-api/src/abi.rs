// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Fixed record shapes of the `ip_tables` ABI.
//!
//! A replace blob is laid out as follows, where every row after the
//! first is one entry and every extension block (match or target) is
//! padded to a multiple of [`XT_ALIGN`] bytes:
//!
//! ```text
//!        [ ipt_replace ]
//!   0:   [ ipt_entry ][ xt_entry_match ][ xt_tcp ] ... [ xt_standard_target ]
//!   1:   [ ipt_entry ][ xt_standard_target ]
//!        ...
//!   N-1: [ ipt_entry ][ xt_error_target ]
//! ```
//!
//! All integers are in host byte order. The address fields of
//! [`IptIp`] are in network order, but we never interpret them beyond
//! checking that they are zero.

use core::mem::size_of;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

pub const XT_TABLE_MAXNAMELEN: usize = 32;
pub const XT_EXTENSION_MAXNAMELEN: usize = 29;
pub const XT_FUNCTION_MAXNAMELEN: usize = 30;
pub const IFNAMSIZ: usize = 16;

/// Every match and target block is padded to this many bytes.
pub const XT_ALIGN: usize = 8;

pub const NF_DROP: i32 = 0;
pub const NF_ACCEPT: i32 = 1;
pub const NF_STOLEN: i32 = 2;
pub const NF_QUEUE: i32 = 3;
pub const NF_REPEAT: i32 = 4;
pub const NF_STOP: i32 = 5;

/// The standard-target verdict meaning "return to the calling chain".
pub const XT_RETURN: i32 = -NF_REPEAT - 1;

pub const IPPROTO_IP: u16 = 0;
pub const IPPROTO_TCP: u16 = 6;
pub const IPPROTO_UDP: u16 = 17;

/// Name carried by error targets, in both the target header and the
/// error name field.
pub const ERROR_TARGET_NAME: &str = "ERROR";

/// The target header name of a standard (verdict) target.
pub const STANDARD_TARGET_NAME: &str = "";

pub const TCP_MATCH_NAME: &str = "tcp";
pub const UDP_MATCH_NAME: &str = "udp";

/// Round `len` up to the next multiple of [`XT_ALIGN`].
pub const fn xt_align(len: usize) -> usize {
    (len + (XT_ALIGN - 1)) & !(XT_ALIGN - 1)
}

/// `struct ipt_ip`: the fixed IPv4 header filter of an entry.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    FromBytes,
    Immutable,
    IntoBytes,
    KnownLayout,
    PartialEq,
)]
#[repr(C)]
pub struct IptIp {
    pub src: u32,
    pub dst: u32,
    pub smsk: u32,
    pub dmsk: u32,
    pub iniface: [u8; IFNAMSIZ],
    pub outiface: [u8; IFNAMSIZ],
    pub iniface_mask: [u8; IFNAMSIZ],
    pub outiface_mask: [u8; IFNAMSIZ],
    pub proto: u16,
    pub flags: u8,
    pub invflags: u8,
}

/// `struct xt_counters`.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    FromBytes,
    Immutable,
    IntoBytes,
    KnownLayout,
    PartialEq,
)]
#[repr(C)]
pub struct XtCounters {
    pub pcnt: u64,
    pub bcnt: u64,
}

/// `struct ipt_entry`: the header of every entry.
///
/// Both offsets are relative to the start of this header.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    FromBytes,
    Immutable,
    IntoBytes,
    KnownLayout,
    PartialEq,
)]
#[repr(C)]
pub struct IptEntry {
    pub ip: IptIp,
    pub nfcache: u32,
    pub target_offset: u16,
    pub next_offset: u16,
    pub comefrom: u32,
    pub counters: XtCounters,
}

impl IptEntry {
    pub const SIZE: usize = size_of::<Self>();
}

/// The user-facing half of `struct xt_entry_match`.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    FromBytes,
    Immutable,
    IntoBytes,
    KnownLayout,
    PartialEq,
)]
#[repr(C)]
pub struct XtEntryMatch {
    /// Size of the whole block, header included.
    pub match_size: u16,
    pub name: [u8; XT_EXTENSION_MAXNAMELEN],
    pub revision: u8,
}

impl XtEntryMatch {
    pub const SIZE: usize = size_of::<Self>();
}

/// The user-facing half of `struct xt_entry_target`.
///
/// An empty name means a standard target, i.e. a bare verdict.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    FromBytes,
    Immutable,
    IntoBytes,
    KnownLayout,
    PartialEq,
)]
#[repr(C)]
pub struct XtEntryTarget {
    /// Size of the whole block, header included.
    pub target_size: u16,
    pub name: [u8; XT_EXTENSION_MAXNAMELEN],
    pub revision: u8,
}

impl XtEntryTarget {
    pub const SIZE: usize = size_of::<Self>();
}

/// `struct xt_standard_target`, padded out to its aligned size.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    FromBytes,
    Immutable,
    IntoBytes,
    KnownLayout,
    PartialEq,
)]
#[repr(C)]
pub struct XtStandardTarget {
    pub target: XtEntryTarget,
    pub verdict: i32,
    pub _pad: [u8; 4],
}

impl XtStandardTarget {
    pub const SIZE: usize = size_of::<Self>();
}

/// `struct xt_error_target`, padded out to its aligned size.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    FromBytes,
    Immutable,
    IntoBytes,
    KnownLayout,
    PartialEq,
)]
#[repr(C)]
pub struct XtErrorTarget {
    pub target: XtEntryTarget,
    pub errorname: [u8; XT_FUNCTION_MAXNAMELEN],
    pub _pad: [u8; 2],
}

impl XtErrorTarget {
    pub const SIZE: usize = size_of::<Self>();
}

/// `struct xt_tcp`: payload of a `tcp` match block.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    FromBytes,
    Immutable,
    IntoBytes,
    KnownLayout,
    PartialEq,
)]
#[repr(C)]
pub struct XtTcp {
    pub spts: [u16; 2],
    pub dpts: [u16; 2],
    pub option: u8,
    pub flg_mask: u8,
    pub flg_cmp: u8,
    pub invflags: u8,
}

impl XtTcp {
    pub const SIZE: usize = size_of::<Self>();
}

/// `struct xt_udp`: payload of a `udp` match block.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    FromBytes,
    Immutable,
    IntoBytes,
    KnownLayout,
    PartialEq,
)]
#[repr(C)]
pub struct XtUdp {
    pub spts: [u16; 2],
    pub dpts: [u16; 2],
    pub invflags: u8,
    pub _pad: u8,
}

impl XtUdp {
    pub const SIZE: usize = size_of::<Self>();
}

/// `struct ipt_replace`: the header of a `IPT_SO_SET_REPLACE` blob.
///
/// The trailing `counters` field is a pointer into the caller's
/// address space on the legacy ABI; we carry it as an opaque `u64`.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    FromBytes,
    Immutable,
    IntoBytes,
    KnownLayout,
    PartialEq,
)]
#[repr(C)]
pub struct IptReplace {
    pub name: [u8; XT_TABLE_MAXNAMELEN],
    pub valid_hooks: u32,
    pub num_entries: u32,
    pub size: u32,
    pub hook_entry: [u32; crate::NF_INET_NUMHOOKS],
    pub underflow: [u32; crate::NF_INET_NUMHOOKS],
    pub num_counters: u32,
    pub counters: u64,
}

impl IptReplace {
    pub const SIZE: usize = size_of::<Self>();
}

/// `struct ipt_getinfo`: request and response of `IPT_SO_GET_INFO`.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    FromBytes,
    Immutable,
    IntoBytes,
    KnownLayout,
    PartialEq,
)]
#[repr(C)]
pub struct IptGetinfo {
    pub name: [u8; XT_TABLE_MAXNAMELEN],
    pub valid_hooks: u32,
    pub hook_entry: [u32; crate::NF_INET_NUMHOOKS],
    pub underflow: [u32; crate::NF_INET_NUMHOOKS],
    pub num_entries: u32,
    pub size: u32,
}

impl IptGetinfo {
    pub const SIZE: usize = size_of::<Self>();
}

/// `struct ipt_get_entries` without its trailing entry table.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    FromBytes,
    Immutable,
    IntoBytes,
    KnownLayout,
    PartialEq,
)]
#[repr(C)]
pub struct IptGetEntries {
    pub name: [u8; XT_TABLE_MAXNAMELEN],
    pub size: u32,
    pub _pad: [u8; 4],
}

impl IptGetEntries {
    pub const SIZE: usize = size_of::<Self>();
}

// The ABI is fixed; catch any layout drift at compile time.
const _: () = assert!(size_of::<IptIp>() == 84);
const _: () = assert!(IptEntry::SIZE == 112);
const _: () = assert!(XtEntryMatch::SIZE == 32);
const _: () = assert!(XtEntryTarget::SIZE == 32);
const _: () = assert!(XtStandardTarget::SIZE == 40);
const _: () = assert!(XtErrorTarget::SIZE == 64);
const _: () = assert!(XtTcp::SIZE == 12);
const _: () = assert!(XtUdp::SIZE == 10);
const _: () = assert!(IptReplace::SIZE == 96);
const _: () = assert!(IptGetinfo::SIZE == 84);
const _: () = assert!(IptGetEntries::SIZE == 40);
const _: () = assert!(XtStandardTarget::SIZE % XT_ALIGN == 0);
const _: () = assert!(XtErrorTarget::SIZE % XT_ALIGN == 0);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn align() {
        assert_eq!(xt_align(0), 0);
        assert_eq!(xt_align(1), 8);
        assert_eq!(xt_align(8), 8);
        assert_eq!(xt_align(XtEntryMatch::SIZE + XtTcp::SIZE), 48);
        assert_eq!(xt_align(XtEntryMatch::SIZE + XtUdp::SIZE), 48);
    }

    #[test]
    fn entry_field_offsets() {
        let entry = IptEntry {
            target_offset: 0x1122,
            next_offset: 0x3344,
            ..Default::default()
        };
        let bytes = entry.as_bytes();
        assert_eq!(bytes.len(), 112);
        assert_eq!(&bytes[88..90], &0x1122u16.to_ne_bytes());
        assert_eq!(&bytes[90..92], &0x3344u16.to_ne_bytes());
    }

    #[test]
    fn replace_field_offsets() {
        let replace = IptReplace {
            num_entries: 7,
            size: 0xabcd,
            hook_entry: [0, 1, 2, 3, 4],
            ..Default::default()
        };
        let bytes = replace.as_bytes();
        assert_eq!(&bytes[36..40], &7u32.to_ne_bytes());
        assert_eq!(&bytes[40..44], &0xabcdu32.to_ne_bytes());
        assert_eq!(&bytes[44 + 4..44 + 8], &1u32.to_ne_bytes());
    }
}
