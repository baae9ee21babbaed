// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The signed verdict carried by a standard target.
//!
//! Built-in dispositions are stored as `-(NF_* + 1)` so that they can
//! never collide with a non-negative jump offset.

use crate::api::NF_ACCEPT;
use crate::api::NF_DROP;
use crate::api::NF_QUEUE;
use crate::api::Verdict;
use crate::api::XT_RETURN;

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum VerdictError {
    /// A verdict we recognise but cannot carry.
    #[error("unsupported verdict {0}")]
    Unsupported(Verdict),

    #[error("unknown verdict {0}")]
    Unknown(i32),
}

const fn builtin(nf: i32) -> i32 {
    -nf - 1
}

pub const VERDICT_ACCEPT: i32 = builtin(NF_ACCEPT);
pub const VERDICT_DROP: i32 = builtin(NF_DROP);
pub const VERDICT_QUEUE: i32 = builtin(NF_QUEUE);
pub const VERDICT_RETURN: i32 = XT_RETURN;

/// Encode a verdict for a standard target.
///
/// # Panics
///
/// A [`Verdict::Jump`] has no encoding without a target offset, and
/// nothing in this crate constructs one.
pub fn encode_verdict(v: Verdict) -> i32 {
    match v {
        Verdict::Accept => VERDICT_ACCEPT,
        Verdict::Drop => VERDICT_DROP,
        Verdict::Queue => VERDICT_QUEUE,
        Verdict::Return => VERDICT_RETURN,
        Verdict::Jump => panic!("jump verdict is not encodable"),
    }
}

/// Decode the verdict of a standard target.
///
/// Only `Accept` and `Drop` succeed.
pub fn decode_verdict(raw: i32) -> Result<Verdict, VerdictError> {
    match raw {
        VERDICT_ACCEPT => Ok(Verdict::Accept),
        VERDICT_DROP => Ok(Verdict::Drop),
        VERDICT_QUEUE => Err(VerdictError::Unsupported(Verdict::Queue)),
        VERDICT_RETURN => Err(VerdictError::Unsupported(Verdict::Return)),
        _ => Err(VerdictError::Unknown(raw)),
    }
}
