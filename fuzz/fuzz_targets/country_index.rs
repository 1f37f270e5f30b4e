#![no_main]

use libfuzzer_sys::fuzz_target;
use tzrules::tz::{CountryZoneIndex, ParseMode, ZoneCatalog};

fuzz_target!(|text: &str| {
    let catalog = ZoneCatalog::builtin();
    let _ = CountryZoneIndex::load(text, ParseMode::Strict, &catalog);
    if let Ok(index) = CountryZoneIndex::parse(text, ParseMode::Lenient) {
        for code in index.country_codes() {
            let _ = index.lookup_candidates(code);
        }
    }
});
