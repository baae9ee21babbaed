// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use core::fmt;
use core::fmt::Display;
use serde::Deserialize;
use serde::Serialize;

/// The disposition a rule's target requests.
///
/// Only `Accept` and `Drop` can currently be carried by a table. The
/// rest exist so that the wire values for them can be recognised and
/// rejected by name rather than lumped in with garbage.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Verdict {
    Accept,
    Drop,
    Queue,
    Return,
    Jump,
}

impl Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Accept => "ACCEPT",
            Self::Drop => "DROP",
            Self::Queue => "QUEUE",
            Self::Return => "RETURN",
            Self::Jump => "JUMP",
        };
        write!(f, "{s}")
    }
}
