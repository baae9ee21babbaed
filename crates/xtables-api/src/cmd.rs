// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use super::HookMask;
use super::IptGetinfo;
use super::NF_INET_NUMHOOKS;
use super::TableName;
use alloc::string::String;
use core::fmt;
use core::fmt::Display;
use libc::c_int;
use serde::Deserialize;
use serde::Serialize;

pub const IPT_BASE_CTL: c_int = 64;

pub const IPT_SO_SET_REPLACE: c_int = IPT_BASE_CTL;
pub const IPT_SO_SET_ADD_COUNTERS: c_int = IPT_BASE_CTL + 1;

pub const IPT_SO_GET_INFO: c_int = IPT_BASE_CTL;
pub const IPT_SO_GET_ENTRIES: c_int = IPT_BASE_CTL + 1;

/// The `ip_tables` options accepted by `getsockopt(2)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(C)]
pub enum GetOpt {
    Info = 64,    // table metadata
    Entries = 65, // encoded entries
}

impl TryFrom<c_int> for GetOpt {
    type Error = ();

    fn try_from(num: c_int) -> Result<Self, Self::Error> {
        match num {
            IPT_SO_GET_INFO => Ok(Self::Info),
            IPT_SO_GET_ENTRIES => Ok(Self::Entries),
            _ => Err(()),
        }
    }
}

/// The `ip_tables` options accepted by `setsockopt(2)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(C)]
pub enum SetOpt {
    Replace = 64,     // replace a whole table
    AddCounters = 65, // add to rule counters
}

impl TryFrom<c_int> for SetOpt {
    type Error = ();

    fn try_from(num: c_int) -> Result<Self, Self::Error> {
        match num {
            IPT_SO_SET_REPLACE => Ok(Self::Replace),
            IPT_SO_SET_ADD_COUNTERS => Ok(Self::AddCounters),
            _ => Err(()),
        }
    }
}

/// The error handed back across the sockopt boundary.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum XtError {
    /// The request carried a table name that is unterminated, not
    /// ASCII, or too long.
    BadName,

    /// The caller's buffer is not the size the option requires.
    BadLength {
        expected: usize,
        given: usize,
    },

    CopyinReq,
    CopyoutResp,

    /// The replace blob was rejected. The message names the entry and
    /// field at fault.
    InvalidReplace {
        table: String,
        msg: String,
    },

    RespTooLarge {
        needed: usize,
        given: usize,
    },

    TableNotFound(String),

    /// The table exists in name only: it may be queried but not
    /// replaced.
    UnsupportedTable(String),

    UnknownOpt(c_int),
}

impl XtError {
    /// Convert to an errno value.
    ///
    /// Everything the caller could have done differently is `EINVAL`,
    /// which is all the legacy interface ever reports.
    pub fn to_errno(&self) -> c_int {
        use libc::*;

        match self {
            Self::BadName => EINVAL,
            Self::BadLength { .. } => EINVAL,
            Self::CopyinReq => EFAULT,
            Self::CopyoutResp => EFAULT,
            Self::InvalidReplace { .. } => EINVAL,
            Self::RespTooLarge { .. } => EINVAL,
            Self::TableNotFound(_) => EINVAL,
            Self::UnsupportedTable(_) => EINVAL,
            Self::UnknownOpt(_) => ENOPROTOOPT,
        }
    }
}

impl Display for XtError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BadName => write!(f, "bad table name"),
            Self::BadLength { expected, given } => {
                write!(f, "bad length: expected {expected}, given {given}")
            }
            Self::CopyinReq => write!(f, "failed to copy in request"),
            Self::CopyoutResp => write!(f, "failed to copy out response"),
            Self::InvalidReplace { table, msg } => {
                write!(f, "invalid replacement for table {table}: {msg}")
            }
            Self::RespTooLarge { needed, given } => write!(
                f,
                "response needs {needed} bytes but only {given} given"
            ),
            Self::TableNotFound(name) => write!(f, "table not found: {name}"),
            Self::UnsupportedTable(name) => {
                write!(f, "table not supported: {name}")
            }
            Self::UnknownOpt(opt) => write!(f, "unknown option: {opt}"),
        }
    }
}

impl core::error::Error for XtError {}

/// The answer to a table info query.
///
/// Offsets are byte offsets into the table's encoded entries.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TableInfo {
    pub valid_hooks: HookMask,
    pub hook_entry: [u32; NF_INET_NUMHOOKS],
    pub underflow: [u32; NF_INET_NUMHOOKS],
    pub num_entries: u32,
    pub size: u32,
}

impl TableInfo {
    pub fn to_raw(&self, name: &TableName) -> IptGetinfo {
        IptGetinfo {
            name: name.to_raw(),
            valid_hooks: self.valid_hooks.bits(),
            hook_entry: self.hook_entry,
            underflow: self.underflow,
            num_entries: self.num_entries,
            size: self.size,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn opt_numbers() {
        assert_eq!(GetOpt::try_from(64), Ok(GetOpt::Info));
        assert_eq!(GetOpt::try_from(65), Ok(GetOpt::Entries));
        assert_eq!(GetOpt::try_from(66), Err(()));
        assert_eq!(SetOpt::try_from(64), Ok(SetOpt::Replace));
        assert_eq!(SetOpt::try_from(65), Ok(SetOpt::AddCounters));
        assert_eq!(SetOpt::try_from(0), Err(()));
    }

    #[test]
    fn errno() {
        let e = XtError::InvalidReplace {
            table: "filter".to_string(),
            msg: "hook unset".to_string(),
        };
        assert_eq!(e.to_errno(), libc::EINVAL);
        assert_eq!(XtError::CopyinReq.to_errno(), libc::EFAULT);
        assert_eq!(XtError::UnknownOpt(99).to_errno(), libc::ENOPROTOOPT);
    }
}
