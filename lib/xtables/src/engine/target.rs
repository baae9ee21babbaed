// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Target extension blocks.
//!
//! Every entry ends in exactly one target. Two kinds are understood:
//!
//! * A standard target (empty name) carrying a signed verdict.
//!
//! * An error target named `ERROR`. Its inner name is `ERROR` for a
//!   genuine error rule, such as the one terminating every table, and
//!   the chain name for the head of a user-defined chain.

use super::verdict::VerdictError;
use super::verdict::decode_verdict;
use super::verdict::encode_verdict;
use crate::api::ERROR_TARGET_NAME;
use crate::api::NameError;
use crate::api::STANDARD_TARGET_NAME;
use crate::api::Verdict;
use crate::api::XtEntryTarget;
use crate::api::XtErrorTarget;
use crate::api::XtStandardTarget;
use crate::api::c_str;
use crate::api::to_c_str;
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

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TargetError {
    #[error("{len} bytes is too few for a target header")]
    Truncated { len: usize },

    #[error("bad target name: {0}")]
    BadName(NameError),

    #[error("{name:?} target region is {len} bytes, expected {expected}")]
    BadSize { name: &'static str, len: usize, expected: usize },

    #[error("target size {declared} disagrees with region of {len} bytes")]
    SizeMismatch { declared: usize, len: usize },

    #[error(transparent)]
    Verdict(#[from] VerdictError),

    #[error("user-defined chain {0:?} is not supported")]
    UserChain(String),

    #[error("unknown target {0:?}")]
    Unknown(String),
}

/// The closed set of targets a rule may carry.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Target {
    UnconditionalAccept,
    UnconditionalDrop,
    /// Halt traversal with an error. The only name an error target can
    /// carry is `ERROR`.
    Error,
}

impl Target {
    pub fn block_len(&self) -> usize {
        match self {
            Self::UnconditionalAccept | Self::UnconditionalDrop => {
                XtStandardTarget::SIZE
            }
            Self::Error => XtErrorTarget::SIZE,
        }
    }

    /// Append this target's block to `buf`.
    pub fn marshal(&self, buf: &mut Vec<u8>) {
        match self {
            Self::UnconditionalAccept => {
                marshal_standard(Verdict::Accept, buf)
            }
            Self::UnconditionalDrop => marshal_standard(Verdict::Drop, buf),
            Self::Error => marshal_error(buf),
        }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::UnconditionalAccept => "ACCEPT",
            Self::UnconditionalDrop => "DROP",
            Self::Error => ERROR_TARGET_NAME,
        };
        write!(f, "{s}")
    }
}

// Fixed literals that always fit their fields.
fn target_name(name: &str) -> [u8; crate::api::XT_EXTENSION_MAXNAMELEN] {
    to_c_str(name).unwrap_or([0; crate::api::XT_EXTENSION_MAXNAMELEN])
}

fn error_name(name: &str) -> [u8; crate::api::XT_FUNCTION_MAXNAMELEN] {
    to_c_str(name).unwrap_or([0; crate::api::XT_FUNCTION_MAXNAMELEN])
}

fn marshal_standard(verdict: Verdict, buf: &mut Vec<u8>) {
    let raw = XtStandardTarget {
        target: XtEntryTarget {
            target_size: XtStandardTarget::SIZE as u16,
            name: target_name(STANDARD_TARGET_NAME),
            revision: 0,
        },
        verdict: encode_verdict(verdict),
        _pad: [0; 4],
    };
    buf.extend_from_slice(raw.as_bytes());
}

fn marshal_error(buf: &mut Vec<u8>) {
    let raw = XtErrorTarget {
        target: XtEntryTarget {
            target_size: XtErrorTarget::SIZE as u16,
            name: target_name(ERROR_TARGET_NAME),
            revision: 0,
        },
        errorname: error_name(ERROR_TARGET_NAME),
        _pad: [0; 2],
    };
    buf.extend_from_slice(raw.as_bytes());
}

/// Parse the target region of one entry.
pub fn parse_target(bytes: &[u8]) -> Result<Target, TargetError> {
    let (hdr, _) = XtEntryTarget::read_from_prefix(bytes)
        .map_err(|_| TargetError::Truncated { len: bytes.len() })?;
    let name = c_str(&hdr.name).map_err(TargetError::BadName)?;

    match name {
        STANDARD_TARGET_NAME => {
            let raw = region::<XtStandardTarget>("standard", bytes)?;
            check_declared(&raw.target, bytes)?;
            match decode_verdict(raw.verdict)? {
                Verdict::Accept => Ok(Target::UnconditionalAccept),
                Verdict::Drop => Ok(Target::UnconditionalDrop),
                v => Err(VerdictError::Unsupported(v).into()),
            }
        }

        ERROR_TARGET_NAME => {
            let raw = region::<XtErrorTarget>(ERROR_TARGET_NAME, bytes)?;
            check_declared(&raw.target, bytes)?;
            match c_str(&raw.errorname).map_err(TargetError::BadName)? {
                ERROR_TARGET_NAME => Ok(Target::Error),
                chain => Err(TargetError::UserChain(chain.to_string())),
            }
        }

        _ => Err(TargetError::Unknown(name.to_string())),
    }
}

// The region must be exactly one `T`.
fn region<T: FromBytes>(
    name: &'static str,
    bytes: &[u8],
) -> Result<T, TargetError> {
    T::read_from_bytes(bytes).map_err(|_| TargetError::BadSize {
        name,
        len: bytes.len(),
        expected: core::mem::size_of::<T>(),
    })
}

fn check_declared(
    hdr: &XtEntryTarget,
    bytes: &[u8],
) -> Result<(), TargetError> {
    let declared = usize::from(hdr.target_size);
    if declared != bytes.len() {
        return Err(TargetError::SizeMismatch { declared, len: bytes.len() });
    }
    Ok(())
}
