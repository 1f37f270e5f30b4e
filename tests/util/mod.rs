// Not every test module uses every helper.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// A July 2017 instant at which London and New York both observe DST.
pub const WHEN_DST: i64 = 1500729255000;

/// A January 2018 instant at which neither London nor New York observe DST.
pub const WHEN_NO_DST: i64 = 1516626855000;

/// Builds a zone record from its types, given as `(offset, is_dst)`, and
/// its transitions, given as `(instant, type index)`.
pub fn record(types: &[(i32, bool)], transitions: &[(i32, u8)]) -> Vec<u8> {
    let timecnt = i32::try_from(transitions.len()).unwrap();
    let typecnt = i32::try_from(types.len()).unwrap();

    let mut out = b"TZif2".to_vec();
    out.extend_from_slice(&[0; 15]);
    for count in [0, 0, 0, timecnt, typecnt, 0] {
        out.extend_from_slice(&count.to_be_bytes());
    }
    for &(instant, _) in transitions {
        out.extend_from_slice(&instant.to_be_bytes());
    }
    out.extend(transitions.iter().map(|&(_, index)| index));
    for &(offset, is_dst) in types {
        out.extend_from_slice(&offset.to_be_bytes());
        out.push(u8::from(is_dst));
        out.push(0);
    }
    out
}

/// Builds a container from zones that must already be sorted by name.
pub fn container(
    version: &str,
    zones: &[(&str, Vec<u8>)],
    zone_tab: &str,
) -> Vec<u8> {
    assert_eq!(version.len(), 5);
    let count = i32::try_from(zones.len()).unwrap();
    let data_offset = 24 + count * 52;
    let data_len: usize = zones.iter().map(|(_, r)| r.len()).sum();
    let final_offset = data_offset + i32::try_from(data_len).unwrap();

    let mut out = b"tzdata".to_vec();
    out.extend_from_slice(version.as_bytes());
    out.push(0);
    for offset in [24, data_offset, final_offset] {
        out.extend_from_slice(&offset.to_be_bytes());
    }
    let mut start = 0i32;
    for (name, record) in zones {
        let mut padded = [0u8; 40];
        padded[..name.len()].copy_from_slice(name.as_bytes());
        out.extend_from_slice(&padded);
        let len = i32::try_from(record.len()).unwrap();
        for field in [start, len, 0] {
            out.extend_from_slice(&field.to_be_bytes());
        }
        start += len;
    }
    for (_, record) in zones {
        out.extend_from_slice(record);
    }
    out.extend_from_slice(zone_tab.as_bytes());
    out
}

pub fn london() -> Vec<u8> {
    record(
        &[(0, false), (3600, true)],
        &[
            (1477789200, 0),
            (1490490000, 1),
            (1509238800, 0),
            (1521939600, 1),
            (1540688400, 0),
        ],
    )
}

pub fn new_york() -> Vec<u8> {
    record(
        &[(-18000, false), (-14400, true)],
        &[
            (1478412000, 0),
            (1489302000, 1),
            (1509861600, 0),
            (1520751600, 1),
            (1541311200, 0),
        ],
    )
}

pub fn utc() -> Vec<u8> {
    record(&[(0, false)], &[(i32::MIN, 0)])
}

/// A container with New York, London and UTC.
pub fn small_container(version: &str) -> Vec<u8> {
    container(
        version,
        &[
            ("America/New_York", new_york()),
            ("Etc/UTC", utc()),
            ("Europe/London", london()),
        ],
        "",
    )
}

/// A file in the temporary directory that is removed when dropped.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    /// Writes `contents` to a file whose name is unique to this process
    /// and the given label.
    pub fn new(label: &str, contents: &[u8]) -> TempFile {
        let name = format!("tzrules-test-{}-{label}", std::process::id());
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        TempFile { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
