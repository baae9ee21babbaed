// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

#![no_main]

use libfuzzer_sys::fuzz_target;
use xtables_test_utils::*;

fuzz_target!(|data: &[u8]| {
    let (ectx, _) = ectx();

    // Anything the decoder accepts must re-encode to its declared
    // metadata and decode again to the same rules.
    if let Ok((name, table)) = decode_replace(&ectx, data) {
        let enc = encode_table(&ectx, &table);
        assert_eq!(Some(&enc.metadata), table.metadata());

        let again = blob_for(name.as_str(), &table);
        let (_, table2) = decode_replace(&ectx, &again).unwrap();
        assert!(table2.same_rules(&table));
    }
});
