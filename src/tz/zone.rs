use std::sync::Arc;

use crate::{
    error::Error,
    tz::tzif::{Offsets, TransitionTable},
};

/// A long-lived handle to the rules of one time zone.
///
/// A `ZoneInfo` pairs a shared, immutable [`TransitionTable`] with a
/// [`ZoneSnapshot`] computed once, at construction, for a caller-supplied
/// instant. Cloning a handle is cheap. Handles are independent: deriving a
/// new handle with [`ZoneInfo::with_raw_offset`] never changes the one it
/// was derived from.
///
/// # Example
///
/// ```
/// use tzrules::tz::ZoneCatalog;
///
/// let catalog = ZoneCatalog::builtin();
/// let gmt = catalog.make_zone("GMT", 0).unwrap();
/// assert_eq!(gmt.raw_offset(), 0);
/// assert!(!gmt.uses_dst());
///
/// let shifted = gmt.with_raw_offset(3600);
/// assert_eq!(shifted.offset_at_millis(0), 3600);
/// assert_eq!(gmt.offset_at_millis(0), 0);
/// ```
#[derive(Clone, Debug)]
pub struct ZoneInfo {
    table: Arc<TransitionTable>,
    snapshot: ZoneSnapshot,
    /// The difference between the overridden raw offset and the raw offset
    /// derived from the table. Zero unless overridden.
    raw_shift: i32,
}

impl ZoneInfo {
    /// Creates a new handle for the given table, deriving its snapshot as
    /// of `now_millis`.
    pub fn new(table: Arc<TransitionTable>, now_millis: i64) -> ZoneInfo {
        let snapshot = ZoneSnapshot::derive(&table, now_millis);
        ZoneInfo { table, snapshot, raw_shift: 0 }
    }

    /// Returns the snapshot of this zone.
    pub fn snapshot(&self) -> &ZoneSnapshot {
        &self.snapshot
    }

    /// Returns the shared transition table behind this handle.
    pub fn table(&self) -> &Arc<TransitionTable> {
        &self.table
    }

    /// Returns the identifier of this zone.
    pub fn id(&self) -> &str {
        self.snapshot.id()
    }

    /// Returns the raw (standard) offset of this zone, in seconds.
    pub fn raw_offset(&self) -> i32 {
        self.snapshot.raw_offset()
    }

    /// Returns whether this zone observes DST at or after the instant its
    /// snapshot was derived for.
    pub fn uses_dst(&self) -> bool {
        self.snapshot.uses_dst()
    }

    /// Returns the DST savings of this zone, in seconds.
    pub fn dst_savings(&self) -> i32 {
        self.snapshot.dst_savings()
    }

    /// Returns the total offset from UTC, in seconds, in effect at the given
    /// Unix millisecond.
    pub fn offset_at_millis(&self, millis: i64) -> i32 {
        self.table
            .offset_at_millis(millis)
            .utc_offset()
            .saturating_add(self.raw_shift)
    }

    /// Returns the offset in effect at the given Unix millisecond, split
    /// into its raw and DST parts.
    pub fn offsets_at_millis(&self, millis: i64) -> Offsets {
        self.table.offsets_at_millis(millis).shift(self.raw_shift)
    }

    /// Returns true when DST is in effect at the given Unix millisecond.
    pub fn in_daylight_time(&self, millis: i64) -> bool {
        self.table.in_daylight_time(millis)
    }

    /// Returns a new handle whose raw offset is `raw_offset` seconds.
    ///
    /// Queried offsets of the returned handle are shifted by the difference
    /// between `raw_offset` and this handle's raw offset. The table is
    /// shared and `self` is left as is.
    pub fn with_raw_offset(&self, raw_offset: i32) -> ZoneInfo {
        let delta = raw_offset.saturating_sub(self.snapshot.raw_offset);
        let mut zone = self.clone();
        zone.snapshot.raw_offset = raw_offset;
        zone.raw_shift = self.raw_shift.saturating_add(delta);
        zone
    }

    /// Returns a new handle that reports `id` as its identifier.
    pub fn with_id(&self, id: &str) -> ZoneInfo {
        let mut zone = self.clone();
        zone.snapshot.id = id.into();
        zone
    }

    /// Returns true when both handles have the same raw offset, agree on
    /// whether DST is used and share the same transition data.
    ///
    /// Identifiers are not compared.
    pub fn has_same_rules(&self, other: &ZoneInfo) -> bool {
        self.raw_offset() == other.raw_offset()
            && self.uses_dst() == other.uses_dst()
            && (Arc::ptr_eq(&self.table, &other.table)
                || self.table.has_same_rules(&other.table))
    }

    /// Returns the total offset, in seconds, in effect at the given civil
    /// date and time of day.
    ///
    /// The civil date is in the proleptic Gregorian calendar and is
    /// interpreted as if it were UTC minus this zone's raw offset.
    ///
    /// # Errors
    ///
    /// This returns an error when the month is not in `1..=12`, the day is
    /// not valid for the month or the time of day is not in
    /// `0..86_400_000`.
    ///
    /// # Example
    ///
    /// ```
    /// use tzrules::tz::ZoneCatalog;
    ///
    /// let gmt = ZoneCatalog::builtin().make_zone("GMT", 0).unwrap();
    /// assert_eq!(gmt.offset_at_civil(2024, 2, 29, 0)?, 0);
    /// assert!(gmt.offset_at_civil(2023, 2, 29, 0).is_err());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn offset_at_civil(
        &self,
        year: i32,
        month: u8,
        day: u8,
        millis_of_day: i32,
    ) -> Result<i32, Error> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(Error::range("year", year, MIN_YEAR, MAX_YEAR));
        }
        if !(1..=12).contains(&month) {
            return Err(Error::range("month", month, 1, 12));
        }
        let max_day = days_in_month(year, month);
        if !(1..=max_day).contains(&day) {
            return Err(Error::range("day", day, 1, max_day));
        }
        if !(0..86_400_000).contains(&millis_of_day) {
            return Err(Error::range(
                "millis_of_day",
                millis_of_day,
                0,
                86_399_999,
            ));
        }
        let days = days_from_civil(year, month, day);
        let millis = days * 86_400_000 + i64::from(millis_of_day)
            - i64::from(self.raw_offset()) * 1000;
        Ok(self.offset_at_millis(millis))
    }
}

/// The summary of a zone as of one instant.
///
/// This is what callers that only need a zone's current raw offset and DST
/// savings work with. It's derived once, when a [`ZoneInfo`] is created.
///
/// DST usage is decided by the latest transition to a DST type: the zone
/// uses DST when that transition is at or after the instant the snapshot
/// was derived for. In that case, the savings are the DST offset minus the
/// offset of the latest standard transition before it.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ZoneSnapshot {
    id: Box<str>,
    raw_offset: i32,
    uses_dst: bool,
    dst_savings: i32,
}

impl ZoneSnapshot {
    fn derive(table: &TransitionTable, now_millis: i64) -> ZoneSnapshot {
        let raw_offset = table.offsets_at_millis(now_millis).raw();
        let latest_dst = table
            .transitions()
            .iter()
            .enumerate()
            .rev()
            .find(|(_, t)| table.type_of(t).is_dst());
        let (uses_dst, dst_savings) = match latest_dst {
            Some((i, t)) if t.instant().saturating_mul(1000) >= now_millis => {
                let dst_offset = table.type_of(t).utc_offset();
                let standard = table.standard_offset_before(i);
                (true, dst_offset.saturating_sub(standard))
            }
            _ => (false, 0),
        };
        let id = table.id().into();
        ZoneSnapshot { id, raw_offset, uses_dst, dst_savings }
    }

    /// The identifier of the zone.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The raw (standard) offset of the zone, in seconds.
    pub fn raw_offset(&self) -> i32 {
        self.raw_offset
    }

    /// Whether the zone has a DST period starting at or after the snapshot
    /// instant.
    pub fn uses_dst(&self) -> bool {
        self.uses_dst
    }

    /// The DST savings, in seconds. Zero when DST is not used.
    pub fn dst_savings(&self) -> i32 {
        self.dst_savings
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ZoneSnapshot {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut s = serializer.serialize_struct("ZoneSnapshot", 4)?;
        s.serialize_field("id", &*self.id)?;
        s.serialize_field("raw_offset", &self.raw_offset)?;
        s.serialize_field("uses_dst", &self.uses_dst)?;
        s.serialize_field("dst_savings", &self.dst_savings)?;
        s.end()
    }
}

const MIN_YEAR: i32 = -9999;
const MAX_YEAR: i32 = 9999;

fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Returns the number of days since the Unix epoch for the given date.
///
/// See: http://howardhinnant.github.io/date_algorithms.html
fn days_from_civil(year: i32, month: u8, day: u8) -> i64 {
    let (year, month, day) = (i64::from(year), i64::from(month), i64::from(day));
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}
