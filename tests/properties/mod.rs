use quickcheck::TestResult;

use tzrules::tz::{CountryZoneIndex, ParseMode, TransitionTable, ZoneCatalog};

use crate::util::record;

/// Builds transitions alternating between standard time (type 0) and DST
/// (type 1) according to `dst`, at the given distinct instants.
fn transitions(instants: Vec<i32>, dst: &[bool]) -> Vec<(i32, u8)> {
    let mut instants = instants;
    instants.sort();
    instants.dedup();
    instants
        .into_iter()
        .enumerate()
        .map(|(i, instant)| {
            (instant, u8::from(dst.get(i).copied().unwrap_or(false)))
        })
        .collect()
}

const TYPES: &[(i32, bool)] = &[(-3600, false), (0, true)];

quickcheck::quickcheck! {
    fn prop_decode_never_panics(bytes: Vec<u8>) -> bool {
        let _ = TransitionTable::decode("Test/Zone", &bytes);
        let mut tzif = b"TZif2".to_vec();
        tzif.extend_from_slice(&bytes);
        let _ = TransitionTable::decode("Test/Zone", &tzif);
        true
    }

    fn prop_catalog_never_panics(bytes: Vec<u8>) -> bool {
        let _ = ZoneCatalog::from_bytes(&bytes);
        let mut container = b"tzdata2024a\0".to_vec();
        container.extend_from_slice(&bytes);
        if let Ok(catalog) = ZoneCatalog::from_bytes(&container) {
            let _ = catalog.validate();
            for id in catalog.available_ids() {
                let _ = catalog.make_zone(id, 0);
            }
        }
        true
    }

    fn prop_country_index_never_panics(text: String) -> bool {
        let _ = CountryZoneIndex::parse(&text, ParseMode::Strict);
        let _ = CountryZoneIndex::parse(&text, ParseMode::Lenient);
        true
    }

    fn prop_lookup_uses_latest_transition(
        instants: Vec<i32>,
        dst: Vec<bool>
    ) -> TestResult {
        let transitions = transitions(instants, &dst);
        if !transitions.iter().any(|&(_, index)| index == 0) {
            return TestResult::discard();
        }
        let bytes = record(TYPES, &transitions);
        let table = TransitionTable::decode("Test/Zone", &bytes).unwrap();
        for (i, &(instant, index)) in transitions.iter().enumerate() {
            let at = table.offset_at(i64::from(instant));
            if at.is_dst() != (index == 1) {
                return TestResult::failed();
            }
            // Before the first transition, the first standard type applies.
            let expected = i > 0 && transitions[i - 1].1 == 1;
            let before = table.offset_at(i64::from(instant) - 1);
            if before.is_dst() != expected {
                return TestResult::failed();
            }
        }
        TestResult::passed()
    }

    fn prop_offsets_split(
        instants: Vec<i32>,
        dst: Vec<bool>,
        millis: i64
    ) -> TestResult {
        let transitions = transitions(instants, &dst);
        if !transitions.iter().any(|&(_, index)| index == 0) {
            return TestResult::discard();
        }
        let bytes = record(TYPES, &transitions);
        let table = TransitionTable::decode("Test/Zone", &bytes).unwrap();
        let offsets = table.offsets_at_millis(millis);
        let typ = table.offset_at_millis(millis);
        TestResult::from_bool(
            offsets.raw() == -3600
                && offsets.total() == typ.utc_offset()
                && offsets.raw() + offsets.dst() == offsets.total()
                && (offsets.dst() != 0) == typ.is_dst(),
        )
    }
}
