// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

#![no_main]

use libfuzzer_sys::fuzz_target;
use xtables::engine::sockopt::setsockopt;
use xtables_api::IPT_SO_SET_REPLACE;
use xtables_test_utils::*;

fuzz_target!(|data: &[u8]| {
    let (ectx, _) = ectx();
    let store = default_store();
    let name = table_name("filter");
    let before = store.get(&name);

    let mut mem = VecMem::new(data.len());
    mem.copy_out(0, data).unwrap();
    let res =
        setsockopt(&ectx, &store, &mem, IPT_SO_SET_REPLACE, 0, data.len());

    // A rejected replace never touches the store.
    if res.is_err() {
        assert_eq!(store.get(&name), before);
    }
});
