#![no_main]

use libfuzzer_sys::fuzz_target;
use tzrules::tz::ZoneCatalog;

fuzz_target!(|data: &[u8]| {
    let Ok(catalog) = ZoneCatalog::from_bytes(data) else { return };
    let _ = catalog.validate();
    for id in catalog.available_ids() {
        if let Some(zone) = catalog.make_zone(id, 0) {
            let _ = zone.offset_at_millis(i64::MAX);
        }
    }
});
