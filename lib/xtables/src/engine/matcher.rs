// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Match extension blocks.
//!
//! A rule carries zero or more of these between its entry header and
//! its target. Each block is an [`XtEntryMatch`] header followed by a
//! kind-specific payload, padded to [`XT_ALIGN`].

use super::rule::IpHeaderFilter;
use crate::api::IPPROTO_TCP;
use crate::api::IPPROTO_UDP;
use crate::api::NameError;
use crate::api::TCP_MATCH_NAME;
use crate::api::UDP_MATCH_NAME;
use crate::api::XT_ALIGN;
use crate::api::XtEntryMatch;
use crate::api::XtTcp;
use crate::api::XtUdp;
use crate::api::c_str;
use crate::api::to_c_str;
use crate::api::xt_align;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;
use zerocopy::FromBytes;
use zerocopy::IntoBytes;

cfg_if! {
    if #[cfg(all(not(feature = "std"), not(test)))] {
        use alloc::string::String;
        use alloc::string::ToString;
        use alloc::vec::Vec;
    } else {
        use std::string::String;
        use std::string::ToString;
        use std::vec::Vec;
    }
}

/// The on-wire size of a `tcp` match block.
pub const TCP_MATCH_LEN: usize = xt_align(XtEntryMatch::SIZE + XtTcp::SIZE);

/// The on-wire size of a `udp` match block.
pub const UDP_MATCH_LEN: usize = xt_align(XtEntryMatch::SIZE + XtUdp::SIZE);

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum MatcherError {
    #[error("{remaining} bytes left, too few for a match header")]
    Truncated { remaining: usize },

    #[error("match size {size} is smaller than the match header")]
    TooSmall { size: usize },

    #[error("match size {size} exceeds the {remaining} bytes left")]
    Overrun { size: usize, remaining: usize },

    #[error("bad match name: {0}")]
    BadName(NameError),

    #[error("unknown matcher {0:?}")]
    Unknown(String),

    #[error("{name} match size {size}, expected {expected}")]
    BadSize { name: &'static str, size: usize, expected: usize },

    #[error("{name} matcher requires protocol {expected}, rule has {proto}")]
    Protocol { name: &'static str, expected: u16, proto: u16 },

    #[error("{name} matcher has unsupported inverse flags {flags:#x}")]
    InverseFlags { name: &'static str, flags: u8 },

    #[error("tcp matcher has unsupported option or flag fields")]
    TcpFlags,
}

/// An inclusive port range, `[start, end]`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    /// The range a bare `-p tcp` or `-p udp` rule carries.
    pub const ANY: Self = Self { start: 0, end: u16::MAX };

    fn from_raw(raw: [u16; 2]) -> Self {
        Self { start: raw[0], end: raw[1] }
    }

    fn to_raw(self) -> [u16; 2] {
        [self.start, self.end]
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::ANY
    }
}

impl Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if *self == Self::ANY {
            write!(f, "*")
        } else if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct TcpMatcher {
    pub src_ports: PortRange,
    pub dst_ports: PortRange,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct UdpMatcher {
    pub src_ports: PortRange,
    pub dst_ports: PortRange,
}

/// The closed set of matchers a rule may carry.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Matcher {
    Tcp(TcpMatcher),
    Udp(UdpMatcher),
}

impl Matcher {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tcp(_) => TCP_MATCH_NAME,
            Self::Udp(_) => UDP_MATCH_NAME,
        }
    }

    /// The length of this matcher's marshaled block.
    pub fn block_len(&self) -> usize {
        match self {
            Self::Tcp(_) => TCP_MATCH_LEN,
            Self::Udp(_) => UDP_MATCH_LEN,
        }
    }

    /// The protocol a rule must filter on to carry this matcher.
    pub fn protocol(&self) -> u16 {
        match self {
            Self::Tcp(_) => IPPROTO_TCP,
            Self::Udp(_) => IPPROTO_UDP,
        }
    }

    /// Append this matcher's block to `buf`.
    pub fn marshal(&self, buf: &mut Vec<u8>) {
        let start = buf.len();
        let len = self.block_len();
        let hdr = XtEntryMatch {
            // Block lengths are small compile-time constants.
            match_size: len as u16,
            name: ext_name(self.name()),
            revision: 0,
        };
        buf.extend_from_slice(hdr.as_bytes());

        match self {
            Self::Tcp(m) => {
                let raw = XtTcp {
                    spts: m.src_ports.to_raw(),
                    dpts: m.dst_ports.to_raw(),
                    ..Default::default()
                };
                buf.extend_from_slice(raw.as_bytes());
            }

            Self::Udp(m) => {
                let raw = XtUdp {
                    spts: m.src_ports.to_raw(),
                    dpts: m.dst_ports.to_raw(),
                    ..Default::default()
                };
                buf.extend_from_slice(raw.as_bytes());
            }
        }

        buf.resize(start + len, 0);
    }
}

impl Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Tcp(m) => {
                write!(f, "tcp spt:{} dpt:{}", m.src_ports, m.dst_ports)
            }
            Self::Udp(m) => {
                write!(f, "udp spt:{} dpt:{}", m.src_ports, m.dst_ports)
            }
        }
    }
}

// Extension names are fixed literals that always fit.
fn ext_name(name: &str) -> [u8; crate::api::XT_EXTENSION_MAXNAMELEN] {
    to_c_str(name).unwrap_or([0; crate::api::XT_EXTENSION_MAXNAMELEN])
}

/// Parse every match block in `bytes`, which must be exactly the
/// matcher region of one entry.
pub fn parse_matchers(
    filter: &IpHeaderFilter,
    mut bytes: &[u8],
) -> Result<Vec<Matcher>, MatcherError> {
    let mut matchers = Vec::new();

    while !bytes.is_empty() {
        let (hdr, _) = XtEntryMatch::read_from_prefix(bytes)
            .map_err(|_| MatcherError::Truncated { remaining: bytes.len() })?;
        let size = usize::from(hdr.match_size);

        if size < XtEntryMatch::SIZE {
            return Err(MatcherError::TooSmall { size });
        }

        if size > bytes.len() {
            return Err(MatcherError::Overrun {
                size,
                remaining: bytes.len(),
            });
        }

        let name = c_str(&hdr.name).map_err(MatcherError::BadName)?;
        let payload = &bytes[XtEntryMatch::SIZE..size];
        matchers.push(unmarshal_matcher(name, size, filter, payload)?);
        bytes = &bytes[size..];
    }

    Ok(matchers)
}

fn unmarshal_matcher(
    name: &str,
    size: usize,
    filter: &IpHeaderFilter,
    payload: &[u8],
) -> Result<Matcher, MatcherError> {
    match name {
        TCP_MATCH_NAME => {
            check_block(TCP_MATCH_NAME, size, TCP_MATCH_LEN)?;
            check_proto(TCP_MATCH_NAME, filter, IPPROTO_TCP)?;
            let (raw, _) = XtTcp::read_from_prefix(payload).map_err(|_| {
                MatcherError::BadSize {
                    name: TCP_MATCH_NAME,
                    size,
                    expected: TCP_MATCH_LEN,
                }
            })?;

            if raw.invflags != 0 {
                return Err(MatcherError::InverseFlags {
                    name: TCP_MATCH_NAME,
                    flags: raw.invflags,
                });
            }

            if raw.option != 0 || raw.flg_mask != 0 || raw.flg_cmp != 0 {
                return Err(MatcherError::TcpFlags);
            }

            Ok(Matcher::Tcp(TcpMatcher {
                src_ports: PortRange::from_raw(raw.spts),
                dst_ports: PortRange::from_raw(raw.dpts),
            }))
        }

        UDP_MATCH_NAME => {
            check_block(UDP_MATCH_NAME, size, UDP_MATCH_LEN)?;
            check_proto(UDP_MATCH_NAME, filter, IPPROTO_UDP)?;
            let (raw, _) = XtUdp::read_from_prefix(payload).map_err(|_| {
                MatcherError::BadSize {
                    name: UDP_MATCH_NAME,
                    size,
                    expected: UDP_MATCH_LEN,
                }
            })?;

            if raw.invflags != 0 {
                return Err(MatcherError::InverseFlags {
                    name: UDP_MATCH_NAME,
                    flags: raw.invflags,
                });
            }

            Ok(Matcher::Udp(UdpMatcher {
                src_ports: PortRange::from_raw(raw.spts),
                dst_ports: PortRange::from_raw(raw.dpts),
            }))
        }

        _ => Err(MatcherError::Unknown(name.to_string())),
    }
}

fn check_block(
    name: &'static str,
    size: usize,
    expected: usize,
) -> Result<(), MatcherError> {
    if size != expected {
        return Err(MatcherError::BadSize { name, size, expected });
    }
    Ok(())
}

fn check_proto(
    name: &'static str,
    filter: &IpHeaderFilter,
    expected: u16,
) -> Result<(), MatcherError> {
    if filter.protocol != expected {
        return Err(MatcherError::Protocol {
            name,
            expected,
            proto: filter.protocol,
        });
    }
    Ok(())
}

const _: () = assert!(TCP_MATCH_LEN % XT_ALIGN == 0);
const _: () = assert!(UDP_MATCH_LEN % XT_ALIGN == 0);
