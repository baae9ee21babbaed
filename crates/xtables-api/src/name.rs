// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Fixed-width, NUL-terminated names as they appear on the wire.

use super::XT_TABLE_MAXNAMELEN;
use alloc::string::String;
use alloc::string::ToString;
use core::fmt;
use core::fmt::Display;
use core::str::FromStr;
use serde::Deserialize;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NameError {
    /// No NUL terminator within the field.
    Unterminated,
    /// A byte before the terminator is not printable ASCII.
    NotAscii,
    /// The name does not fit, with its terminator, in the field.
    TooLong { max: usize },
    Empty,
}

impl Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unterminated => write!(f, "name is not NUL-terminated"),
            Self::NotAscii => write!(f, "name is not ASCII"),
            Self::TooLong { max } => {
                write!(f, "name longer than {max} bytes")
            }
            Self::Empty => write!(f, "name is empty"),
        }
    }
}

impl core::error::Error for NameError {}

/// Read the NUL-terminated string held in a fixed-width field.
///
/// Bytes after the terminator are ignored.
pub fn c_str<const N: usize>(raw: &[u8; N]) -> Result<&str, NameError> {
    let len = raw
        .iter()
        .position(|b| *b == 0)
        .ok_or(NameError::Unterminated)?;
    let bytes = &raw[..len];

    if !bytes.iter().all(|b| b.is_ascii_graphic()) {
        return Err(NameError::NotAscii);
    }

    // All bytes are ASCII at this point.
    core::str::from_utf8(bytes).map_err(|_| NameError::NotAscii)
}

/// Write `s` into a zero-filled fixed-width field, leaving room for the
/// terminator.
pub fn to_c_str<const N: usize>(s: &str) -> Result<[u8; N], NameError> {
    if s.len() >= N {
        return Err(NameError::TooLong { max: N - 1 });
    }

    if !s.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(NameError::NotAscii);
    }

    let mut raw = [0u8; N];
    raw[..s.len()].copy_from_slice(s.as_bytes());
    Ok(raw)
}

/// The name of a table, e.g. `filter`.
#[derive(
    Clone,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: &str) -> Result<Self, NameError> {
        if name.is_empty() {
            return Err(NameError::Empty);
        }

        // Validate against the wire width up front so that `to_raw()`
        // cannot fail.
        let _ = to_c_str::<XT_TABLE_MAXNAMELEN>(name)?;
        Ok(Self(name.to_string()))
    }

    pub fn from_raw(
        raw: &[u8; XT_TABLE_MAXNAMELEN],
    ) -> Result<Self, NameError> {
        Self::new(c_str(raw)?)
    }

    pub fn to_raw(&self) -> [u8; XT_TABLE_MAXNAMELEN] {
        let mut raw = [0u8; XT_TABLE_MAXNAMELEN];
        raw[..self.0.len()].copy_from_slice(self.0.as_bytes());
        raw
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TableName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
