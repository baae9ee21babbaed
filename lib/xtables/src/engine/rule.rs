// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use super::matcher::Matcher;
use super::target::Target;
use crate::api::IFNAMSIZ;
use crate::api::IptEntry;
use crate::api::IptIp;
use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

cfg_if! {
    if #[cfg(all(not(feature = "std"), not(test)))] {
        use alloc::vec::Vec;
    } else {
        use std::vec::Vec;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unsupported header filter field {0}")]
pub struct FilterError(pub &'static str);

/// The fixed IPv4 header filter of a rule.
///
/// Only the transport protocol may be set; a protocol of zero matches
/// any protocol.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
pub struct IpHeaderFilter {
    pub protocol: u16,
}

impl IpHeaderFilter {
    /// Derive a filter from an entry's `ipt_ip`, naming the first field
    /// we cannot represent.
    pub fn from_raw(ip: &IptIp) -> Result<Self, FilterError> {
        const NO_IFACE: [u8; IFNAMSIZ] = [0; IFNAMSIZ];

        let unsupported = [
            ("src", ip.src != 0),
            ("dst", ip.dst != 0),
            ("smsk", ip.smsk != 0),
            ("dmsk", ip.dmsk != 0),
            ("iniface", ip.iniface != NO_IFACE),
            ("outiface", ip.outiface != NO_IFACE),
            ("iniface_mask", ip.iniface_mask != NO_IFACE),
            ("outiface_mask", ip.outiface_mask != NO_IFACE),
            ("flags", ip.flags != 0),
            ("invflags", ip.invflags != 0),
        ];

        match unsupported.iter().find(|(_, set)| *set) {
            Some((field, _)) => Err(FilterError(*field)),
            None => Ok(Self { protocol: ip.proto }),
        }
    }

    pub fn to_raw(&self) -> IptIp {
        IptIp { proto: self.protocol, ..Default::default() }
    }
}

impl Display for IpHeaderFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.protocol {
            0 => write!(f, "all"),
            crate::api::IPPROTO_TCP => write!(f, "tcp"),
            crate::api::IPPROTO_UDP => write!(f, "udp"),
            p => write!(f, "{p}"),
        }
    }
}

/// A single table rule.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Rule {
    pub filter: IpHeaderFilter,
    pub matchers: Vec<Matcher>,
    pub target: Target,
}

impl Rule {
    /// A rule with no filter and no matchers.
    pub fn unconditional(target: Target) -> Self {
        Self { filter: IpHeaderFilter::default(), matchers: vec![], target }
    }

    /// The offset of the target block from the start of the entry.
    pub fn target_offset(&self) -> usize {
        IptEntry::SIZE
            + self.matchers.iter().map(Matcher::block_len).sum::<usize>()
    }

    /// The length of this rule's encoded entry.
    pub fn entry_len(&self) -> usize {
        self.target_offset() + self.target.block_len()
    }

    /// Does this rule's target unconditionally accept?
    pub fn is_unconditional_accept(&self) -> bool {
        self.target == Target::UnconditionalAccept
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn protocol_only() {
        let ip = IptIp { proto: 6, ..Default::default() };
        assert_eq!(
            IpHeaderFilter::from_raw(&ip),
            Ok(IpHeaderFilter { protocol: 6 })
        );
        assert_eq!(IpHeaderFilter { protocol: 6 }.to_raw(), ip);
    }

    #[test]
    fn names_offending_field() {
        let ip = IptIp { dst: 0x0a00_0001, ..Default::default() };
        assert_eq!(IpHeaderFilter::from_raw(&ip), Err(FilterError("dst")));

        let mut ip = IptIp::default();
        ip.outiface[0] = b'e';
        assert_eq!(
            IpHeaderFilter::from_raw(&ip),
            Err(FilterError("outiface"))
        );

        let ip = IptIp { invflags: 0x8, ..Default::default() };
        assert_eq!(
            IpHeaderFilter::from_raw(&ip),
            Err(FilterError("invflags"))
        );
    }

    #[test]
    fn entry_len() {
        let rule = Rule::unconditional(Target::UnconditionalAccept);
        assert_eq!(rule.target_offset(), 112);
        assert_eq!(rule.entry_len(), 152);
        assert_eq!(Rule::unconditional(Target::Error).entry_len(), 176);
    }
}
