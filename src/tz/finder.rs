/*!
Resolving a country, an offset and a DST state to a time zone.

A device that learns its country and current UTC offset from the network,
but not its time zone, can use a [`ZoneFinder`] to pick the zone that best
fits. Candidate zones come from the country configuration and offsets come
from a [`ZoneCatalog`]. When several candidates fit equally well, the first
configured candidate wins unless the caller supplies a bias (typically the
zone currently in use) that is itself one of the fitting candidates.

Like the catalog, there is a process wide finder available via [`finder`]
that can be atomically replaced via [`install`].
*/

use std::{
    path::{Path, PathBuf},
    sync::{Arc, OnceLock, RwLock},
};

use crate::{
    error::{tz::finder::Error as E, Error},
    tz::{
        country::{CountryZoneIndex, CountryZones, ParseMode},
        db::{self, ZoneCatalog},
    },
};

/// The environment variable consulted first by [`ZoneFinder::from_env`].
pub const TZLOOKUP_ENV: &str = "TZRULES_TZLOOKUP";

/// The name of the country configuration file that sits beside each of the
/// default catalog locations.
const TZLOOKUP_FILE_NAME: &str = "tzlookup.xml";

static FINDER: OnceLock<RwLock<Arc<ZoneFinder>>> = OnceLock::new();

/// Returns the process wide finder.
///
/// On first use, this initializes the finder with
/// [`ZoneFinder::from_env`], which in turn uses the process wide catalog.
pub fn finder() -> Arc<ZoneFinder> {
    let lock =
        FINDER.get_or_init(|| RwLock::new(Arc::new(ZoneFinder::from_env())));
    let guard = lock.read().unwrap_or_else(|err| err.into_inner());
    Arc::clone(&guard)
}

/// Replaces the process wide finder and returns the previous one.
///
/// If no finder has been initialized yet, `None` is returned.
pub fn install(finder: Arc<ZoneFinder>) -> Option<Arc<ZoneFinder>> {
    let mut fresh = false;
    let lock = FINDER.get_or_init(|| {
        fresh = true;
        RwLock::new(Arc::clone(&finder))
    });
    if fresh {
        return None;
    }
    let mut guard = lock.write().unwrap_or_else(|err| err.into_inner());
    Some(std::mem::replace(&mut *guard, finder))
}

/// Answers which zone a country is in, given an offset and DST state.
///
/// A finder pairs a catalog with a country configuration that has been
/// validated against it. Both are shared, so cloning a finder is cheap.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use tzrules::tz::{CountryZoneIndex, ParseMode, ZoneCatalog, ZoneFinder};
///
/// let catalog = Arc::new(ZoneCatalog::builtin());
/// let index = CountryZoneIndex::parse(r#"
///     <timezones>
///       <countryzones>
///         <country code="gb" default="GMT"><id>GMT</id></country>
///       </countryzones>
///     </timezones>
/// "#, ParseMode::Strict)?;
/// let finder = ZoneFinder::new(catalog, index);
/// assert_eq!(finder.resolve("GB", 0, false, 0, None), Some("GMT"));
/// assert_eq!(finder.resolve("GB", 3600, false, 0, None), None);
/// assert_eq!(finder.resolve("FR", 0, false, 0, None), None);
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug)]
pub struct ZoneFinder {
    catalog: Arc<ZoneCatalog>,
    index: Arc<CountryZoneIndex>,
}

impl ZoneFinder {
    /// Creates a new finder, validating the given index against the
    /// catalog.
    ///
    /// Validation is lenient: zones the catalog doesn't know about are
    /// dropped with a warning.
    pub fn new(
        catalog: Arc<ZoneCatalog>,
        index: CountryZoneIndex,
    ) -> ZoneFinder {
        let index = match index.validated(&catalog, ParseMode::Lenient) {
            Ok(index) => index,
            Err(err) => {
                warn!("discarding country configuration: {err}");
                CountryZoneIndex::empty()
            }
        };
        ZoneFinder { catalog, index: Arc::new(index) }
    }

    /// Creates a finder from the first present configuration document.
    ///
    /// # Errors
    ///
    /// This returns an error when neither document is present, or when
    /// the first present document fails to parse. A present but invalid
    /// primary document does not fall back to the secondary one.
    pub fn from_text(
        catalog: Arc<ZoneCatalog>,
        primary: Option<&str>,
        secondary: Option<&str>,
    ) -> Result<ZoneFinder, Error> {
        let Some(text) = primary.or(secondary) else {
            return Err(E::NoSource.into());
        };
        let index = CountryZoneIndex::parse(text, ParseMode::Lenient)?;
        Ok(ZoneFinder::new(catalog, index))
    }

    /// Creates a finder from the first of the given files that can be read.
    ///
    /// If that file doesn't parse, the failure is logged and the finder
    /// has no countries. Later files are not consulted in that case. If no
    /// file can be read, the finder also has no countries.
    pub fn from_paths<P: AsRef<Path>>(
        catalog: Arc<ZoneCatalog>,
        paths: &[P],
    ) -> ZoneFinder {
        for path in paths {
            let path = path.as_ref();
            let text = match std::fs::read_to_string(path) {
                Ok(text) => text,
                Err(err) => {
                    debug!(
                        "failed to read country configuration {}: {err}",
                        path.display(),
                    );
                    continue;
                }
            };
            return match CountryZoneIndex::parse(&text, ParseMode::Lenient) {
                Ok(index) => {
                    debug!(
                        "loaded country configuration from {}",
                        path.display(),
                    );
                    ZoneFinder::new(catalog, index)
                }
                Err(err) => {
                    warn!(
                        "failed to parse country configuration {}: {err}",
                        path.display(),
                    );
                    ZoneFinder::new(catalog, CountryZoneIndex::empty())
                }
            };
        }
        warn!(
            "could not read country configuration from any of {} paths",
            paths.len(),
        );
        ZoneFinder::new(catalog, CountryZoneIndex::empty())
    }

    /// Creates a finder using the process wide catalog and the
    /// configuration file named by the `TZRULES_TZLOOKUP` environment
    /// variable, or else a `tzlookup.xml` beside one of the default catalog
    /// locations.
    pub fn from_env() -> ZoneFinder {
        let mut paths = vec![];
        if let Some(path) = std::env::var_os(TZLOOKUP_ENV) {
            paths.push(PathBuf::from(path));
        }
        for path in db::TZDATA_PATHS {
            paths.push(Path::new(path).with_file_name(TZLOOKUP_FILE_NAME));
        }
        ZoneFinder::from_paths(db::catalog(), &paths)
    }

    /// Returns the catalog used by this finder.
    pub fn catalog(&self) -> &Arc<ZoneCatalog> {
        &self.catalog
    }

    /// Returns the validated country configuration used by this finder.
    pub fn index(&self) -> &CountryZoneIndex {
        &self.index
    }

    /// Returns the IANA version the country configuration was produced
    /// for, if it says.
    pub fn iana_version(&self) -> Option<&str> {
        self.index.iana_version()
    }

    /// Returns the zones of the given country.
    pub fn lookup_country(&self, code: &str) -> Option<&CountryZones> {
        self.index.country(code)
    }

    /// Returns the default zone of the given country.
    pub fn lookup_default(&self, code: &str) -> Option<&str> {
        self.index.lookup_default(code)
    }

    /// Returns the zone of the given country whose offset at `when_millis`
    /// is `offset_seconds` and whose DST state is `is_dst`.
    ///
    /// See [`CountryZones::resolve`].
    pub fn resolve(
        &self,
        code: &str,
        offset_seconds: i32,
        is_dst: bool,
        when_millis: i64,
        bias: Option<&str>,
    ) -> Option<&str> {
        self.index.country(code)?.resolve(
            &self.catalog,
            offset_seconds,
            is_dst,
            when_millis,
            bias,
        )
    }

    /// See [`CountryZones::lookup_by_offset_with_bias`].
    pub fn lookup_by_offset_with_bias(
        &self,
        code: &str,
        offset_seconds: i32,
        is_dst: Option<bool>,
        dst_offset_seconds: Option<i32>,
        when_millis: i64,
        bias: Option<&str>,
    ) -> Option<OffsetResult> {
        self.index.country(code)?.lookup_by_offset_with_bias(
            &self.catalog,
            offset_seconds,
            is_dst,
            dst_offset_seconds,
            when_millis,
            bias,
        )
    }

    /// See [`CountryZones::has_utc_zone`]. Unknown countries have no UTC
    /// zone.
    pub fn has_utc_zone(&self, code: &str, when_millis: i64) -> bool {
        self.index
            .country(code)
            .map_or(false, |c| c.has_utc_zone(&self.catalog, when_millis))
    }

    /// See [`CountryZones::is_default_okay_at`]. It's never okay to use the
    /// default of an unknown country.
    pub fn is_default_okay_at(&self, code: &str, when_millis: i64) -> bool {
        self.index.country(code).map_or(false, |c| {
            c.is_default_okay_at(&self.catalog, when_millis)
        })
    }
}

impl CountryZones {
    /// Returns the candidate whose offset at `when_millis` is exactly
    /// `offset_seconds` and whose DST flag is exactly `is_dst`.
    ///
    /// When more than one candidate fits, the bias is returned if it's one
    /// of them. Otherwise the first fitting candidate, in configured order,
    /// is returned. A bias that doesn't fit is ignored.
    pub fn resolve<'a>(
        &'a self,
        catalog: &ZoneCatalog,
        offset_seconds: i32,
        is_dst: bool,
        when_millis: i64,
        bias: Option<&str>,
    ) -> Option<&'a str> {
        let mut first = None;
        for id in self.zone_ids() {
            let Some(table) = catalog.zone(id) else { continue };
            let typ = table.offset_at_millis(when_millis);
            if typ.utc_offset() != offset_seconds || typ.is_dst() != is_dst {
                continue;
            }
            if bias == Some(id) {
                return Some(id);
            }
            first.get_or_insert(id);
        }
        first
    }

    /// Like [`CountryZones::resolve`], but with looser matching and more
    /// information about the result.
    ///
    /// Only mappings that are still distinct at `when_millis` are
    /// considered. A candidate fits when its total offset is
    /// `offset_seconds` and:
    ///
    /// * If `is_dst` is given, the zone is (or isn't) in DST. DST here means
    /// a non-zero DST part of the total offset.
    /// * If `is_dst` is `Some(true)` and `dst_offset_seconds` is given, the
    /// DST part of the total offset is exactly that. Otherwise
    /// `dst_offset_seconds` is ignored.
    ///
    /// The result reports whether exactly one candidate fit.
    pub fn lookup_by_offset_with_bias(
        &self,
        catalog: &ZoneCatalog,
        offset_seconds: i32,
        is_dst: Option<bool>,
        dst_offset_seconds: Option<i32>,
        when_millis: i64,
        bias: Option<&str>,
    ) -> Option<OffsetResult> {
        let mut first: Option<&str> = None;
        let mut bias_fits = false;
        let mut count = 0usize;
        for mapping in self.effective_mappings(when_millis) {
            let Some(table) = catalog.zone(mapping.id()) else { continue };
            let offsets = table.offsets_at_millis(when_millis);
            if offsets.total() != offset_seconds {
                continue;
            }
            let dst_fits = match is_dst {
                None => true,
                Some(true) => {
                    offsets.dst() != 0
                        && dst_offset_seconds
                            .map_or(true, |dst| offsets.dst() == dst)
                }
                Some(false) => offsets.dst() == 0,
            };
            if !dst_fits {
                continue;
            }
            count += 1;
            first.get_or_insert(mapping.id());
            bias_fits = bias_fits || bias == Some(mapping.id());
        }
        let zone_id = match bias {
            Some(bias) if bias_fits => bias,
            _ => first?,
        };
        Some(OffsetResult { zone_id: zone_id.into(), one_match: count == 1 })
    }

    /// Returns true when this country uses UTC at some point in the year
    /// and one of its zones has a total offset of zero at `when_millis`.
    pub fn has_utc_zone(
        &self,
        catalog: &ZoneCatalog,
        when_millis: i64,
    ) -> bool {
        if !self.ever_uses_utc() {
            return false;
        }
        self.effective_mappings(when_millis).any(|mapping| {
            catalog.zone(mapping.id()).map_or(false, |table| {
                table.offset_at_millis(when_millis).utc_offset() == 0
            })
        })
    }

    /// Returns true when using this country's default zone at
    /// `when_millis` gives the same total offset as any of its other zones
    /// would.
    ///
    /// A country with no zones in effect is never okay, and one with a
    /// single zone always is. Otherwise, the default must be known to the
    /// catalog.
    pub fn is_default_okay_at(
        &self,
        catalog: &ZoneCatalog,
        when_millis: i64,
    ) -> bool {
        let mappings: Vec<_> = self.effective_mappings(when_millis).collect();
        match mappings.len() {
            0 => return false,
            1 => return true,
            _ => {}
        }
        let default = self.default_zone_id().and_then(|id| catalog.zone(id));
        let Some(default) = default else { return false };
        let offset = default.offset_at_millis(when_millis).utc_offset();
        mappings.iter().all(|mapping| {
            catalog.zone(mapping.id()).map_or(false, |table| {
                table.offset_at_millis(when_millis).utc_offset() == offset
            })
        })
    }
}

/// The result of [`CountryZones::lookup_by_offset_with_bias`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct OffsetResult {
    zone_id: Box<str>,
    one_match: bool,
}

impl OffsetResult {
    /// The identifier of the chosen zone.
    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    /// Whether the chosen zone was the only one that fit.
    pub fn is_only_match(&self) -> bool {
        self.one_match
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for OffsetResult {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut s = serializer.serialize_struct("OffsetResult", 2)?;
        s.serialize_field("zone_id", &*self.zone_id)?;
        s.serialize_field("one_match", &self.one_match)?;
        s.end()
    }
}
