/*!
Decoding and querying the transition table of a single time zone.

A zone record is the version 1 data block of a file compiled by `zic`. Only
the first two sections that follow the header are used: the transition
instants (with their type indices) and the local time types. Leap seconds,
designations and indicator sections are ignored, as is any 64-bit block or
footer that follows.

Decoding is strict. A record that is truncated, declares too many entries,
has unsorted transitions or has no reachable standard time type is rejected
with a [`FormatError`] describing the first problem found.
*/

use crate::util::{from_be_bytes_i32, try_split_at};

/// The length, in bytes, of the fixed size header of a zone record.
const HEADER_LEN: usize = 44;

/// The length, in bytes, of a single local time type entry.
const LOCAL_TIME_TYPE_LEN: usize = 6;

/// The maximum number of local time types a record may declare.
///
/// A transition refers to its type with a single byte, so more than this
/// could never be addressed.
pub(crate) const MAX_TYPES: i32 = 256;

/// The maximum number of transitions a record may declare.
pub(crate) const MAX_TRANSITIONS: i32 = 2000;

/// A decoded zone record.
///
/// This is an immutable value. It's usually shared behind an `Arc` by a
/// [`ZoneCatalog`](crate::tz::ZoneCatalog), which decodes each zone at most
/// once.
///
/// # Invariants
///
/// * There is at least one transition and at least one type.
/// * Transition instants are strictly increasing.
/// * Every transition's type index refers to an existing type.
/// * At least one transition refers to a standard (non-DST) type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransitionTable {
    id: Box<str>,
    transitions: Vec<Transition>,
    types: Vec<OffsetType>,
    /// The index of the first non-DST type in declaration order.
    first_standard: usize,
}

impl TransitionTable {
    /// Decodes a zone record for the zone named `id`.
    ///
    /// # Errors
    ///
    /// This returns an error when the bytes are not a well formed zone
    /// record. Use [`FormatError::kind`] to inspect what went wrong.
    ///
    /// # Example
    ///
    /// ```
    /// use tzrules::tz::{FormatErrorKind, TransitionTable};
    ///
    /// let err = TransitionTable::decode("Nowhere", b"TZ").unwrap_err();
    /// assert_eq!(err.kind(), FormatErrorKind::BadMagic);
    /// ```
    pub fn decode(
        id: &str,
        bytes: &[u8],
    ) -> Result<TransitionTable, FormatError> {
        let (header, rest) = Header::parse(bytes)?;
        let (times, rest) = try_split_at(
            SplitAtError::TransitionTimes,
            rest,
            header.transition_times_len(),
        )?;
        let (indices, rest) = try_split_at(
            SplitAtError::TransitionTypes,
            rest,
            header.timecnt,
        )?;
        let (local, _) = try_split_at(
            SplitAtError::LocalTimeTypes,
            rest,
            header.local_time_types_len(),
        )?;

        let mut transitions = Vec::with_capacity(header.timecnt);
        let mut previous: Option<i64> = None;
        for (index, (chunk, &type_index)) in
            times.chunks_exact(4).zip(indices).enumerate()
        {
            let instant = i64::from(from_be_bytes_i32(chunk));
            if let Some(previous) = previous {
                if instant <= previous {
                    return Err(FormatError::from(Repr::TransitionsNotSorted {
                        index,
                        previous,
                        instant,
                    }));
                }
            }
            if usize::from(type_index) >= header.typecnt {
                return Err(FormatError::from(Repr::InvalidTypeIndex {
                    index,
                    type_index,
                    types: header.typecnt,
                }));
            }
            previous = Some(instant);
            transitions.push(Transition { instant, type_index });
        }

        let mut types = Vec::with_capacity(header.typecnt);
        for (type_index, chunk) in
            local.chunks_exact(LOCAL_TIME_TYPE_LEN).enumerate()
        {
            let utc_offset = from_be_bytes_i32(&chunk[..4]);
            let is_dst = match chunk[4] {
                0 => false,
                1 => true,
                flag => {
                    return Err(FormatError::from(Repr::InvalidDstFlag {
                        type_index,
                        flag,
                    }))
                }
            };
            // chunk[5] is the designation index, which we don't use.
            types.push(OffsetType { utc_offset, is_dst });
        }

        let reaches_standard = transitions
            .iter()
            .any(|t| !types[usize::from(t.type_index)].is_dst);
        let first_standard = types.iter().position(|t| !t.is_dst);
        let Some(first_standard) = first_standard.filter(|_| reaches_standard)
        else {
            return Err(FormatError::from(Repr::NoStandardType));
        };
        trace!(
            "decoded zone record for {id}: {} transitions, {} types",
            transitions.len(),
            types.len(),
        );
        let id = id.into();
        Ok(TransitionTable { id, transitions, types, first_standard })
    }

    /// Builds a table directly from its parts.
    ///
    /// Callers must uphold the invariants documented on this type.
    pub(crate) fn from_parts(
        id: &str,
        transitions: Vec<Transition>,
        types: Vec<OffsetType>,
    ) -> TransitionTable {
        debug_assert!(!transitions.is_empty());
        debug_assert!(
            transitions.windows(2).all(|w| w[0].instant < w[1].instant)
        );
        let first_standard =
            types.iter().position(|t| !t.is_dst).unwrap_or(0);
        TransitionTable { id: id.into(), transitions, types, first_standard }
    }

    /// Returns the identifier this table was decoded for.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the transitions of this table in ascending order.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Returns the local time types of this table in declaration order.
    pub fn types(&self) -> &[OffsetType] {
        &self.types
    }

    /// Returns the first non-DST type in declaration order.
    ///
    /// This is the type in effect before the first transition.
    pub fn first_standard_type(&self) -> OffsetType {
        self.types[self.first_standard]
    }

    /// Returns the type in effect at the given Unix second.
    ///
    /// A transition takes effect at exactly its instant. Before the first
    /// transition, the first standard type is in effect. After the last
    /// transition, the last transition's type stays in effect forever.
    pub fn offset_at(&self, seconds: i64) -> OffsetType {
        match self.transition_index(seconds) {
            None => self.first_standard_type(),
            Some(i) => self.type_of(&self.transitions[i]),
        }
    }

    /// Like [`TransitionTable::offset_at`], but for a Unix millisecond.
    ///
    /// Milliseconds are floored toward negative infinity, so `-1` refers to
    /// the second `-1` and not the second `0`.
    ///
    /// # Example
    ///
    /// ```
    /// use tzrules::tz::TransitionTable;
    ///
    /// # let mut bytes = b"TZif2".to_vec();
    /// # bytes.extend_from_slice(&[0; 15]);
    /// # for count in [0i32, 0, 0, 1, 2, 0] {
    /// #     bytes.extend_from_slice(&count.to_be_bytes());
    /// # }
    /// # bytes.extend_from_slice(&0i32.to_be_bytes());
    /// # bytes.push(1);
    /// # bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
    /// # bytes.extend_from_slice(&[0, 0, 0x0E, 0x10, 0, 0]);
    /// // One transition at second 0 to a type with offset +01:00.
    /// let table = TransitionTable::decode("Test/Zone", &bytes)?;
    /// assert_eq!(table.offset_at_millis(-1).utc_offset(), 0);
    /// assert_eq!(table.offset_at_millis(0).utc_offset(), 3600);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn offset_at_millis(&self, millis: i64) -> OffsetType {
        self.offset_at(millis.div_euclid(1000))
    }

    /// Returns true when the type in effect at the given Unix millisecond is
    /// a DST type.
    pub fn in_daylight_time(&self, millis: i64) -> bool {
        self.offset_at_millis(millis).is_dst()
    }

    /// Returns the total offset in effect at the given Unix millisecond,
    /// split into its raw (standard) part and its DST part.
    ///
    /// The raw part of a DST type is the offset of the closest preceding
    /// transition to a standard type, or the first standard type if there
    /// is no such transition.
    pub fn offsets_at_millis(&self, millis: i64) -> Offsets {
        let seconds = millis.div_euclid(1000);
        let Some(i) = self.transition_index(seconds) else {
            return Offsets::standard(self.first_standard_type().utc_offset);
        };
        let typ = self.type_of(&self.transitions[i]);
        if !typ.is_dst {
            return Offsets::standard(typ.utc_offset);
        }
        let raw = self.standard_offset_before(i);
        Offsets {
            total: typ.utc_offset,
            raw,
            dst: typ.utc_offset.saturating_sub(raw),
        }
    }

    /// Returns true when both tables have the same transitions and types.
    ///
    /// Identifiers are not compared.
    pub fn has_same_rules(&self, other: &TransitionTable) -> bool {
        self.transitions == other.transitions && self.types == other.types
    }

    /// Returns the offset of the latest transition to a standard type that
    /// precedes the transition at `index`, falling back to the first
    /// standard type.
    pub(crate) fn standard_offset_before(&self, index: usize) -> i32 {
        self.transitions[..index]
            .iter()
            .rev()
            .map(|t| self.type_of(t))
            .find(|typ| !typ.is_dst)
            .unwrap_or_else(|| self.first_standard_type())
            .utc_offset
    }

    /// Returns the type of the given transition.
    pub(crate) fn type_of(&self, transition: &Transition) -> OffsetType {
        self.types[usize::from(transition.type_index)]
    }

    /// Returns the index of the last transition at or before `seconds`.
    fn transition_index(&self, seconds: i64) -> Option<usize> {
        self.transitions
            .partition_point(|t| t.instant <= seconds)
            .checked_sub(1)
    }
}

/// A single transition in a [`TransitionTable`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Transition {
    instant: i64,
    type_index: u8,
}

impl Transition {
    pub(crate) const fn new(instant: i64, type_index: u8) -> Transition {
        Transition { instant, type_index }
    }

    /// The Unix second at which this transition takes effect.
    pub fn instant(&self) -> i64 {
        self.instant
    }

    /// The index into [`TransitionTable::types`] in effect from this
    /// transition onwards.
    pub fn type_index(&self) -> u8 {
        self.type_index
    }
}

/// A local time type: an offset from UTC and whether it's DST.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct OffsetType {
    utc_offset: i32,
    is_dst: bool,
}

impl OffsetType {
    /// Creates a new local time type.
    pub const fn new(utc_offset: i32, is_dst: bool) -> OffsetType {
        OffsetType { utc_offset, is_dst }
    }

    /// The total offset from UTC, in seconds, east of UTC being positive.
    pub fn utc_offset(&self) -> i32 {
        self.utc_offset
    }

    /// Whether this type is daylight saving time.
    pub fn is_dst(&self) -> bool {
        self.is_dst
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for OffsetType {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut s = serializer.serialize_struct("OffsetType", 2)?;
        s.serialize_field("utc_offset", &self.utc_offset)?;
        s.serialize_field("is_dst", &self.is_dst)?;
        s.end()
    }
}

/// A total offset split into its raw and DST parts, all in seconds.
///
/// It's always the case that `total == raw + dst`, unless the addition
/// would overflow.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Offsets {
    total: i32,
    raw: i32,
    dst: i32,
}

impl Offsets {
    fn standard(offset: i32) -> Offsets {
        Offsets { total: offset, raw: offset, dst: 0 }
    }

    pub(crate) fn shift(self, seconds: i32) -> Offsets {
        Offsets {
            total: self.total.saturating_add(seconds),
            raw: self.raw.saturating_add(seconds),
            dst: self.dst,
        }
    }

    /// The total offset from UTC.
    pub fn total(&self) -> i32 {
        self.total
    }

    /// The standard part of the total offset.
    pub fn raw(&self) -> i32 {
        self.raw
    }

    /// The DST part of the total offset. Zero when standard time is in
    /// effect.
    pub fn dst(&self) -> i32 {
        self.dst
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Offsets {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut s = serializer.serialize_struct("Offsets", 3)?;
        s.serialize_field("total", &self.total)?;
        s.serialize_field("raw", &self.raw)?;
        s.serialize_field("dst", &self.dst)?;
        s.end()
    }
}

/// The parsed fixed size header of a zone record.
#[derive(Debug)]
struct Header {
    timecnt: usize,
    typecnt: usize,
}

impl Header {
    fn parse(bytes: &[u8]) -> Result<(Header, &[u8]), FormatError> {
        if bytes.get(..4) != Some(&b"TZif"[..]) {
            return Err(FormatError::from(Repr::BadMagic));
        }
        let (header, rest) =
            try_split_at(SplitAtError::Header, bytes, HEADER_LEN)?;
        // After the magic, a version byte and 15 reserved bytes, the counts
        // appear in this order: isutcnt, isstdcnt, leapcnt, timecnt, typecnt
        // and charcnt.
        let timecnt = from_be_bytes_i32(&header[32..36]);
        let typecnt = from_be_bytes_i32(&header[36..40]);
        if timecnt <= 0 || typecnt <= 0 {
            return Err(FormatError::from(Repr::Empty {
                transitions: timecnt,
                types: typecnt,
            }));
        }
        if typecnt > MAX_TYPES {
            return Err(FormatError::from(Repr::TooManyTypes {
                types: typecnt,
            }));
        }
        if timecnt > MAX_TRANSITIONS {
            return Err(FormatError::from(Repr::TooManyTransitions {
                transitions: timecnt,
            }));
        }
        // OK because both counts are positive and bounded above.
        let header =
            Header { timecnt: timecnt as usize, typecnt: typecnt as usize };
        Ok((header, rest))
    }

    fn transition_times_len(&self) -> usize {
        self.timecnt * 4
    }

    fn local_time_types_len(&self) -> usize {
        self.typecnt * LOCAL_TIME_TYPE_LEN
    }
}

/// An error that occurs when decoding a zone record.
///
/// The specific problem can be inspected with [`FormatError::kind`]. The
/// `Display` implementation includes details such as the offending index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormatError {
    repr: Repr,
}

impl FormatError {
    /// Returns the category of this error.
    pub fn kind(&self) -> FormatErrorKind {
        match self.repr {
            Repr::BadMagic => FormatErrorKind::BadMagic,
            Repr::Empty { .. } => FormatErrorKind::Empty,
            Repr::TooManyTypes { .. } => FormatErrorKind::TooManyTypes,
            Repr::TooManyTransitions { .. } => {
                FormatErrorKind::TooManyTransitions
            }
            Repr::TransitionsNotSorted { .. } => {
                FormatErrorKind::TransitionsNotSorted
            }
            Repr::InvalidTypeIndex { .. } => FormatErrorKind::InvalidTypeIndex,
            Repr::InvalidDstFlag { .. } => FormatErrorKind::InvalidDstFlag,
            Repr::NoStandardType => FormatErrorKind::NoStandardType,
            Repr::Truncated(_) => FormatErrorKind::Truncated,
        }
    }
}

/// The category of a [`FormatError`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum FormatErrorKind {
    /// The record doesn't start with `TZif`.
    BadMagic,
    /// The record declares zero (or fewer) transitions or types.
    Empty,
    /// The record declares more than 256 types.
    TooManyTypes,
    /// The record declares more than 2000 transitions.
    TooManyTransitions,
    /// Transition instants are not strictly increasing.
    TransitionsNotSorted,
    /// A transition refers to a type that doesn't exist.
    InvalidTypeIndex,
    /// A type's DST flag is neither 0 nor 1.
    InvalidDstFlag,
    /// No transition refers to a standard time type.
    NoStandardType,
    /// The record ends before all declared data was read.
    Truncated,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Repr {
    BadMagic,
    Empty { transitions: i32, types: i32 },
    TooManyTypes { types: i32 },
    TooManyTransitions { transitions: i32 },
    TransitionsNotSorted { index: usize, previous: i64, instant: i64 },
    InvalidTypeIndex { index: usize, type_index: u8, types: usize },
    InvalidDstFlag { type_index: usize, flag: u8 },
    NoStandardType,
    Truncated(SplitAtError),
}

impl From<Repr> for FormatError {
    fn from(repr: Repr) -> FormatError {
        FormatError { repr }
    }
}

impl From<SplitAtError> for FormatError {
    fn from(err: SplitAtError) -> FormatError {
        FormatError { repr: Repr::Truncated(err) }
    }
}

impl std::error::Error for FormatError {}

impl core::fmt::Display for FormatError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self.repr {
            Repr::BadMagic => f.write_str(
                "invalid zone record: expected first four bytes to be `TZif`",
            ),
            Repr::Empty { transitions, types } => write!(
                f,
                "invalid zone record: found {transitions} transitions and \
                 {types} types, but both must be positive",
            ),
            Repr::TooManyTypes { types } => write!(
                f,
                "invalid zone record: found {types} types, \
                 but at most {MAX_TYPES} are allowed",
            ),
            Repr::TooManyTransitions { transitions } => write!(
                f,
                "invalid zone record: found {transitions} transitions, \
                 but at most {MAX_TRANSITIONS} are allowed",
            ),
            Repr::TransitionsNotSorted { index, previous, instant } => write!(
                f,
                "invalid zone record: transition {index} at {instant} \
                 does not come after previous transition at {previous}",
            ),
            Repr::InvalidTypeIndex { index, type_index, types } => write!(
                f,
                "invalid zone record: transition {index} refers to type \
                 {type_index}, but there are only {types} types",
            ),
            Repr::InvalidDstFlag { type_index, flag } => write!(
                f,
                "invalid zone record: type {type_index} has DST flag \
                 {flag}, but it must be 0 or 1",
            ),
            Repr::NoStandardType => f.write_str(
                "invalid zone record: no transition refers to a \
                 standard time type",
            ),
            Repr::Truncated(ref err) => {
                write!(f, "invalid zone record: {err}")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SplitAtError {
    Header,
    TransitionTimes,
    TransitionTypes,
    LocalTimeTypes,
}

impl core::fmt::Display for SplitAtError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use self::SplitAtError::*;

        f.write_str("expected bytes for '")?;
        f.write_str(match *self {
            Header => "header",
            TransitionTimes => "transition times",
            TransitionTypes => "transition types",
            LocalTimeTypes => "local time types",
        })?;
        f.write_str("', but found fewer bytes than declared")
    }
}
