#![no_main]

use libfuzzer_sys::fuzz_target;
use tzrules::tz::TransitionTable;

fuzz_target!(|input: (&str, &[u8], i64)| {
    let (id, data, millis) = input;
    // Decoding and querying should never panic.
    if let Ok(table) = TransitionTable::decode(id, data) {
        let _ = table.offsets_at_millis(millis);
        let _ = table.in_daylight_time(millis);
    }
});
