/*!
Builders for the binary inputs used by unit tests.

Real compiled zone files are large and mostly irrelevant to what the tests
check, so instead we build small records by hand. The transition instants
used for the named zones below are the real ones for 2016 through 2018.
*/

/// A July 2017 instant at which London and New York both observe DST.
pub(crate) const WHEN_DST: i64 = 1500729255000;

/// A January 2018 instant at which neither London nor New York observe DST.
pub(crate) const WHEN_NO_DST: i64 = 1516626855000;

/// Builds the bytes of a single zone record.
///
/// Counts in the header are derived from the transitions and types given,
/// unless they are explicitly overridden.
#[derive(Clone, Debug)]
pub(crate) struct ZoneRecord {
    magic: [u8; 4],
    transitions: Vec<(i32, u8)>,
    types: Vec<(i32, u8)>,
    transition_count: Option<i32>,
    type_count: Option<i32>,
}

impl ZoneRecord {
    pub(crate) fn new() -> ZoneRecord {
        ZoneRecord {
            magic: *b"TZif",
            transitions: vec![],
            types: vec![],
            transition_count: None,
            type_count: None,
        }
    }

    pub(crate) fn magic(mut self, magic: &[u8; 4]) -> ZoneRecord {
        self.magic = *magic;
        self
    }

    /// Each transition is an instant in seconds and a type index.
    pub(crate) fn transitions(
        mut self,
        transitions: &[(i32, u8)],
    ) -> ZoneRecord {
        self.transitions = transitions.to_vec();
        self
    }

    /// Each type is a UTC offset in seconds and a raw DST flag byte.
    pub(crate) fn types(mut self, types: &[(i32, u8)]) -> ZoneRecord {
        self.types = types.to_vec();
        self
    }

    pub(crate) fn transition_count(mut self, count: i32) -> ZoneRecord {
        self.transition_count = Some(count);
        self
    }

    pub(crate) fn type_count(mut self, count: i32) -> ZoneRecord {
        self.type_count = Some(count);
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let timecnt = self
            .transition_count
            .unwrap_or(i32::try_from(self.transitions.len()).unwrap());
        let typecnt = self
            .type_count
            .unwrap_or(i32::try_from(self.types.len()).unwrap());

        let mut out = vec![];
        out.extend_from_slice(&self.magic);
        out.push(b'2');
        out.extend_from_slice(&[0; 15]);
        // isutcnt, isstdcnt, leapcnt, timecnt, typecnt, charcnt
        for count in [0, 0, 0, timecnt, typecnt, 4] {
            out.extend_from_slice(&i32::to_be_bytes(count));
        }
        for &(instant, _) in self.transitions.iter() {
            out.extend_from_slice(&instant.to_be_bytes());
        }
        for &(_, type_index) in self.transitions.iter() {
            out.push(type_index);
        }
        for &(offset, is_dst) in self.types.iter() {
            out.extend_from_slice(&offset.to_be_bytes());
            out.push(is_dst);
            out.push(0);
        }
        out.extend_from_slice(b"XXX\0");
        out
    }
}

/// Builds the bytes of a concatenated container of zone records.
///
/// Zones are written in the order given, which lets tests build containers
/// with an unsorted index.
#[derive(Clone, Debug)]
pub(crate) struct Container {
    version: String,
    zones: Vec<(String, Vec<u8>)>,
    zone_tab: String,
}

impl Container {
    pub(crate) fn new(version: &str) -> Container {
        Container {
            version: version.to_string(),
            zones: vec![],
            zone_tab: String::new(),
        }
    }

    pub(crate) fn zone(mut self, name: &str, record: Vec<u8>) -> Container {
        self.zones.push((name.to_string(), record));
        self
    }

    pub(crate) fn zone_tab(mut self, text: &str) -> Container {
        self.zone_tab = text.to_string();
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        const HEADER_LEN: i32 = 24;
        const ENTRY_LEN: i32 = 52;

        let zone_count = i32::try_from(self.zones.len()).unwrap();
        let index_offset = HEADER_LEN;
        let data_offset = index_offset + zone_count * ENTRY_LEN;
        let data_len: usize =
            self.zones.iter().map(|(_, record)| record.len()).sum();
        let final_offset = data_offset + i32::try_from(data_len).unwrap();

        let mut out = vec![];
        out.extend_from_slice(b"tzdata");
        assert_eq!(self.version.len(), 5, "version must be five bytes");
        out.extend_from_slice(self.version.as_bytes());
        out.push(0);
        out.extend_from_slice(&index_offset.to_be_bytes());
        out.extend_from_slice(&data_offset.to_be_bytes());
        out.extend_from_slice(&final_offset.to_be_bytes());

        let mut offset = 0i32;
        for (name, record) in self.zones.iter() {
            let mut padded = [0u8; 40];
            padded[..name.len()].copy_from_slice(name.as_bytes());
            out.extend_from_slice(&padded);
            out.extend_from_slice(&offset.to_be_bytes());
            let len = i32::try_from(record.len()).unwrap();
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(&0i32.to_be_bytes());
            offset += len;
        }
        for (_, record) in self.zones.iter() {
            out.extend_from_slice(record);
        }
        out.extend_from_slice(self.zone_tab.as_bytes());
        out
    }
}

pub(crate) fn europe_london() -> Vec<u8> {
    ZoneRecord::new()
        .types(&[(0, 0), (3600, 1)])
        .transitions(&[
            (1477789200, 0),
            (1490490000, 1),
            (1509238800, 0),
            (1521939600, 1),
            (1540688400, 0),
        ])
        .build()
}

pub(crate) fn america_new_york() -> Vec<u8> {
    ZoneRecord::new()
        .types(&[(-18000, 0), (-14400, 1)])
        .transitions(&[
            (1478412000, 0),
            (1489302000, 1),
            (1509861600, 0),
            (1520751600, 1),
            (1541311200, 0),
        ])
        .build()
}

pub(crate) fn atlantic_reykjavik() -> Vec<u8> {
    ZoneRecord::new().types(&[(0, 0)]).transitions(&[(-1000000000, 0)]).build()
}

pub(crate) fn etc_utc() -> Vec<u8> {
    ZoneRecord::new().types(&[(0, 0)]).transitions(&[(i32::MIN, 0)]).build()
}

/// A container holding the four zones above, in sorted order.
pub(crate) fn small_container(version: &str) -> Vec<u8> {
    Container::new(version)
        .zone("America/New_York", america_new_york())
        .zone("Atlantic/Reykjavik", atlantic_reykjavik())
        .zone("Etc/UTC", etc_utc())
        .zone("Europe/London", europe_london())
        .zone_tab("GB\t+513030-0000731\tEurope/London\n")
        .build()
}
