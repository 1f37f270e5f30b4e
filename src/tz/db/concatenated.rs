/*!
Decoding of the concatenated container that bundles many zone records.

The container starts with a 12 byte version header (`tzdata`, five ASCII
version bytes and a NUL), followed by three big endian offsets: the start
of the index block, the start of the zone data block and the start of the
trailing `zone.tab` text. Each index entry names one zone and the slice of
the data block holding its record.

Only the container structure is checked here. Zone records themselves are
decoded lazily by the catalog.
*/

use std::ops::Range;

use crate::{
    error::{
        tz::concatenated::{Error as E, INDEX_ENTRY_LEN},
        Error,
    },
    util::{from_be_bytes_i32, try_split_at},
};

/// The length of the version header at the start of every container.
pub(crate) const VERSION_HEADER_LEN: usize = 12;

/// The length of the full header: the version header plus three offsets.
const HEADER_LEN: usize = VERSION_HEADER_LEN + 12;

/// The length of the NUL padded zone identifier in an index entry.
const NAME_LEN: usize = 40;

/// The structure of a decoded container.
///
/// All ranges are absolute positions in the container's bytes.
#[derive(Debug)]
pub(crate) struct Container {
    pub(crate) version: Box<str>,
    pub(crate) entries: Vec<IndexEntry>,
    pub(crate) zone_tab: Range<usize>,
}

/// One entry in the index block.
#[derive(Debug)]
pub(crate) struct IndexEntry {
    pub(crate) name: Box<str>,
    pub(crate) range: Range<usize>,
}

impl Container {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Container, Error> {
        let version = parse_version(bytes)?;
        let (header, _) =
            try_split_at(E::FailedReadHeader, bytes, HEADER_LEN)?;
        let index_offset =
            offset(&header[12..16], E::InvalidIndexDataOffsets)?;
        let data_offset =
            offset(&header[16..20], E::InvalidIndexDataOffsets)?;
        let final_offset = offset(&header[20..24], E::InvalidFinalOffset)?;
        if index_offset < HEADER_LEN || index_offset > data_offset {
            return Err(E::InvalidIndexDataOffsets.into());
        }
        if data_offset > bytes.len() {
            return Err(E::FailedReadIndex.into());
        }
        if final_offset < data_offset {
            return Err(E::InvalidFinalOffset.into());
        }
        if final_offset > bytes.len() {
            return Err(E::FailedReadData.into());
        }

        let index = &bytes[index_offset..data_offset];
        if index.len() % INDEX_ENTRY_LEN != 0 {
            return Err(E::InvalidLengthIndexBlock.into());
        }
        if index.is_empty() {
            return Err(E::EmptyIndex.into());
        }
        let data_len = final_offset - data_offset;
        let mut entries: Vec<IndexEntry> =
            Vec::with_capacity(index.len() / INDEX_ENTRY_LEN);
        for chunk in index.chunks_exact(INDEX_ENTRY_LEN) {
            let entry = IndexEntry::parse(chunk, data_len)?;
            let range = (data_offset + entry.range.start)
                ..(data_offset + entry.range.end);
            if let Some(previous) = entries.last() {
                if previous.name == entry.name {
                    let name = entry.name;
                    return Err(E::DuplicateIanaName { name }.into());
                }
                if previous.name > entry.name {
                    return Err(E::UnsortedIndex { name: entry.name }.into());
                }
            }
            entries.push(IndexEntry { name: entry.name, range });
        }
        let zone_tab = final_offset..bytes.len();
        Ok(Container { version, entries, zone_tab })
    }
}

impl IndexEntry {
    /// Parses one index entry. The range returned is relative to the start
    /// of the data block, whose length is `data_len`.
    fn parse(chunk: &[u8], data_len: usize) -> Result<IndexEntry, Error> {
        let (name_bytes, rest) = chunk.split_at(NAME_LEN);
        let end = name_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(name_bytes.len());
        let name = &name_bytes[..end];
        if name.is_empty() || !name.iter().all(|b| b.is_ascii_graphic()) {
            return Err(E::ExpectedIanaName.into());
        }
        // OK because every byte is ASCII.
        let name: Box<str> = String::from_utf8_lossy(name).into();

        let start = from_be_bytes_i32(&rest[0..4]);
        let len = from_be_bytes_i32(&rest[4..8]);
        // rest[8..12] is a raw offset hint, which isn't used.
        let range = usize::try_from(start)
            .ok()
            .zip(usize::try_from(len).ok())
            .and_then(|(start, len)| Some(start..start.checked_add(len)?))
            .filter(|range| range.end <= data_len);
        let Some(range) = range else {
            return Err(E::InvalidZoneRange { name }.into());
        };
        Ok(IndexEntry { name, range })
    }
}

/// Parses the version header at the start of a container.
///
/// Only the first 12 bytes are examined, which lets callers read a version
/// without reading a whole container.
pub(crate) fn parse_version(bytes: &[u8]) -> Result<Box<str>, Error> {
    let (header, _) =
        try_split_at(E::FailedReadHeader, bytes, VERSION_HEADER_LEN)?;
    if &header[..6] != b"tzdata" {
        return Err(E::ExpectedFirstSixBytes.into());
    }
    let version = &header[6..11];
    if !version.iter().all(|b| b.is_ascii_graphic()) {
        return Err(E::ExpectedVersion.into());
    }
    if header[11] != 0 {
        return Err(E::ExpectedLastByte.into());
    }
    Ok(String::from_utf8_lossy(version).into())
}

fn offset(bytes: &[u8], err: E) -> Result<usize, Error> {
    usize::try_from(from_be_bytes_i32(bytes)).map_err(|_| err.into())
}
