/*!
A catalog of time zones backed by a concatenated container.

The catalog is built from the bytes of one container. Its index is decoded
and checked eagerly, while individual zone records are decoded the first
time they're asked for and then cached for the life of the catalog.

There is also a process wide catalog, available via [`catalog`]. It's
initialized from the environment on first use (see
[`ZoneCatalog::from_env`]) and can be atomically replaced via [`install`].
Replacing the catalog never affects callers holding on to the previous one.
*/

use std::{
    ops::Range,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock, RwLock},
};

use crate::{
    error::{tz::db::Error as E, Error, ErrorContext},
    tz::{
        tzif::{OffsetType, Transition, TransitionTable},
        zone::{ZoneInfo, ZoneSnapshot},
    },
};

use self::concatenated::Container;

mod concatenated;

/// The environment variable consulted first by [`ZoneCatalog::from_env`].
pub const TZDATA_ENV: &str = "TZRULES_TZDATA";

/// The locations searched by [`ZoneCatalog::from_env`], in order.
pub const TZDATA_PATHS: &[&str] = &[
    "/apex/com.android.tzdata/etc/tz/tzdata",
    "/data/misc/zoneinfo/current/tzdata",
    "/system/usr/share/zoneinfo/tzdata",
];

/// The version reported by the built-in catalog.
const BUILTIN_VERSION: &str = "missing";

static CATALOG: OnceLock<RwLock<Arc<ZoneCatalog>>> = OnceLock::new();

/// Returns the process wide catalog.
///
/// On first use, this initializes the catalog with
/// [`ZoneCatalog::from_env`]. Callers get a shared handle, so a catalog
/// remains usable even if [`install`] replaces it while it's being used.
pub fn catalog() -> Arc<ZoneCatalog> {
    let lock = CATALOG
        .get_or_init(|| RwLock::new(Arc::new(ZoneCatalog::from_env())));
    let guard = lock.read().unwrap_or_else(|err| err.into_inner());
    Arc::clone(&guard)
}

/// Replaces the process wide catalog and returns the previous one.
///
/// If no catalog has been initialized yet, then the given catalog becomes
/// the process wide catalog without ever consulting the environment, and
/// `None` is returned.
pub fn install(catalog: Arc<ZoneCatalog>) -> Option<Arc<ZoneCatalog>> {
    let mut fresh = false;
    let lock = CATALOG.get_or_init(|| {
        fresh = true;
        RwLock::new(Arc::clone(&catalog))
    });
    if fresh {
        return None;
    }
    let mut guard = lock.write().unwrap_or_else(|err| err.into_inner());
    debug!(
        "replacing time zone catalog version {} with version {}",
        guard.version(),
        catalog.version(),
    );
    Some(std::mem::replace(&mut *guard, catalog))
}

/// A collection of time zones keyed by IANA identifier.
///
/// # Example
///
/// ```
/// use tzrules::tz::ZoneCatalog;
///
/// // Neither source is available, so this falls back to the built-in
/// // catalog, which only knows about GMT.
/// let catalog = ZoneCatalog::load(None, Some(&b"not a container"[..]));
/// assert!(catalog.is_builtin());
/// assert_eq!(catalog.version(), "missing");
/// assert_eq!(catalog.available_ids().collect::<Vec<_>>(), vec!["GMT"]);
/// ```
pub struct ZoneCatalog {
    version: Box<str>,
    /// Sorted by identifier.
    zones: Vec<CatalogZone>,
    data: Box<[u8]>,
    zone_tab: Range<usize>,
    builtin: bool,
}

struct CatalogZone {
    id: Box<str>,
    range: Range<usize>,
    table: OnceLock<Option<Arc<TransitionTable>>>,
}

impl ZoneCatalog {
    /// Decodes a catalog from the bytes of a container.
    ///
    /// The bytes are copied. Only the container structure is checked
    /// here. Use [`ZoneCatalog::validate`] to also check every zone record.
    ///
    /// # Errors
    ///
    /// This returns an error when the container header or index is
    /// malformed.
    pub fn from_bytes(bytes: &[u8]) -> Result<ZoneCatalog, Error> {
        let container = Container::parse(bytes)?;
        let zones = container
            .entries
            .into_iter()
            .map(|entry| CatalogZone {
                id: entry.name,
                range: entry.range,
                table: OnceLock::new(),
            })
            .collect();
        Ok(ZoneCatalog {
            version: container.version,
            zones,
            data: bytes.into(),
            zone_tab: container.zone_tab,
            builtin: false,
        })
    }

    /// Decodes a catalog from the first source that is present and valid.
    ///
    /// The primary source is tried before the secondary one. Sources that
    /// are absent are skipped.
    ///
    /// # Errors
    ///
    /// When no source is present, or the last present source fails to
    /// decode, that error is returned.
    pub fn try_load(
        primary: Option<&[u8]>,
        secondary: Option<&[u8]>,
    ) -> Result<ZoneCatalog, Error> {
        let mut last_err = None;
        for (label, source) in [("primary", primary), ("secondary", secondary)]
        {
            let Some(bytes) = source else { continue };
            match ZoneCatalog::from_bytes(bytes) {
                Ok(catalog) => {
                    debug!(
                        "loaded {label} time zone catalog, version {}",
                        catalog.version(),
                    );
                    return Ok(catalog);
                }
                Err(err) => {
                    warn!("failed to load {label} time zone catalog: {err}");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| E::NoValidSource.into()))
    }

    /// Like [`ZoneCatalog::try_load`], but falls back to the built-in
    /// catalog instead of failing.
    pub fn load(
        primary: Option<&[u8]>,
        secondary: Option<&[u8]>,
    ) -> ZoneCatalog {
        match ZoneCatalog::try_load(primary, secondary) {
            Ok(catalog) => catalog,
            Err(err) => {
                warn!(
                    "falling back to built-in time zone catalog \
                     because no source could be loaded: {err}"
                );
                ZoneCatalog::builtin()
            }
        }
    }

    /// Reads a catalog from the first of the given files that exists and
    /// decodes successfully, falling back to the built-in catalog.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> ZoneCatalog {
        for path in paths {
            let path = path.as_ref();
            match ZoneCatalog::from_path(path) {
                Ok(catalog) => return catalog,
                Err(err) => {
                    warn!("{err}");
                }
            }
        }
        warn!(
            "falling back to built-in time zone catalog because none of \
             {} paths could be loaded",
            paths.len(),
        );
        ZoneCatalog::builtin()
    }

    /// Reads a catalog from the location in the `TZRULES_TZDATA`
    /// environment variable, or else the first default location that
    /// decodes successfully. If none do, the built-in catalog is returned.
    pub fn from_env() -> ZoneCatalog {
        if let Some(path) = std::env::var_os(TZDATA_ENV) {
            let path = PathBuf::from(path);
            debug!(
                "opening time zone catalog at {TZDATA_ENV}={}",
                path.display(),
            );
            match ZoneCatalog::from_path(&path) {
                Ok(catalog) => return catalog,
                Err(err) => {
                    warn!(
                        "failed opening {TZDATA_ENV}={}: {err}",
                        path.display(),
                    );
                    // fall through to attempt default locations
                }
            }
        }
        for path in TZDATA_PATHS {
            let path = Path::new(path);
            debug!("opening time zone catalog at {}", path.display());
            match ZoneCatalog::from_path(path) {
                Ok(catalog) => return catalog,
                Err(err) => {
                    debug!("failed opening {}: {err}", path.display());
                }
            }
        }
        warn!(
            "could not find time zone catalog at any of the following \
             paths: {}",
            TZDATA_PATHS.join(", "),
        );
        ZoneCatalog::builtin()
    }

    fn from_path(path: &Path) -> Result<ZoneCatalog, Error> {
        let bytes = std::fs::read(path).map_err(|err| Error::fs(path, err))?;
        let catalog =
            ZoneCatalog::from_bytes(&bytes).map_err(|err| err.path(path))?;
        debug!(
            "loaded time zone catalog version {} with {} zones from {}",
            catalog.version(),
            catalog.len(),
            path.display(),
        );
        Ok(catalog)
    }

    /// Returns a catalog that contains only `GMT`.
    ///
    /// This is what's used when no real catalog can be loaded. Its version
    /// is `missing`.
    pub fn builtin() -> ZoneCatalog {
        let table = TransitionTable::from_parts(
            "GMT",
            vec![Transition::new(i64::from(i32::MIN), 0)],
            vec![OffsetType::new(0, false)],
        );
        let gmt = CatalogZone {
            id: "GMT".into(),
            range: 0..0,
            table: OnceLock::from(Some(Arc::new(table))),
        };
        ZoneCatalog {
            version: BUILTIN_VERSION.into(),
            zones: vec![gmt],
            data: Box::new([]),
            zone_tab: 0..0,
            builtin: true,
        }
    }

    /// Reads only the version header of the container at `path`.
    ///
    /// # Errors
    ///
    /// This returns an error when the file can't be read or doesn't start
    /// with a valid version header.
    pub fn rules_version<P: AsRef<Path>>(path: P) -> Result<String, Error> {
        use std::io::Read;

        let path = path.as_ref();
        let file =
            std::fs::File::open(path).map_err(|err| Error::fs(path, err))?;
        let mut header = Vec::with_capacity(concatenated::VERSION_HEADER_LEN);
        // Widening a small constant to u64 is lossless.
        file.take(concatenated::VERSION_HEADER_LEN as u64)
            .read_to_end(&mut header)
            .map_err(|err| Error::fs(path, err))?;
        let version = concatenated::parse_version(&header)
            .map_err(|err| err.path(path))?;
        Ok(version.into())
    }

    /// Returns the version of the rules in this catalog, such as `2024a`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns every identifier in this catalog in sorted order.
    pub fn available_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.zones.iter().map(|zone| &*zone.id)
    }

    /// Returns true when the given identifier is in this catalog.
    ///
    /// This only consults the index. The zone's record may still fail to
    /// decode.
    pub fn has_zone(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Returns the number of zones in this catalog.
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Returns true when this catalog has no zones.
    ///
    /// Since an empty index is rejected, this is always false.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Returns true when this is the built-in catalog.
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    /// Returns the decoded transition table for the given identifier.
    ///
    /// Each zone is decoded at most once. If its record is malformed, then
    /// the failure is logged and `None` is returned for it from then on.
    pub fn zone(&self, id: &str) -> Option<Arc<TransitionTable>> {
        let zone = self.find(id)?;
        zone.table
            .get_or_init(|| match self.decode(zone) {
                Ok(table) => {
                    trace!(
                        "decoded time zone {} with {} transitions",
                        zone.id,
                        table.transitions().len(),
                    );
                    Some(Arc::new(table))
                }
                Err(err) => {
                    warn!("{err}");
                    None
                }
            })
            .clone()
    }

    /// Returns a new handle for the given zone, with its snapshot derived
    /// as of `now_millis`.
    ///
    /// Every call returns an independent handle.
    pub fn make_zone(&self, id: &str, now_millis: i64) -> Option<ZoneInfo> {
        Some(ZoneInfo::new(self.zone(id)?, now_millis))
    }

    /// Returns the snapshot of the given zone as of `now_millis`.
    pub fn snapshot(&self, id: &str, now_millis: i64) -> Option<ZoneSnapshot> {
        self.make_zone(id, now_millis).map(|zone| zone.snapshot().clone())
    }

    /// Decodes every zone in this catalog and reports the first failure.
    ///
    /// # Errors
    ///
    /// The error returned names the zone that failed and wraps the reason
    /// its record is malformed.
    pub fn validate(&self) -> Result<(), Error> {
        for zone in self.zones.iter() {
            if let Some(Some(_)) = zone.table.get() {
                continue;
            }
            self.decode(zone)?;
        }
        Ok(())
    }

    /// Returns the `zone.tab` text that trails the zone data, if there is
    /// any and it is valid UTF-8.
    pub fn zone_tab(&self) -> Option<&str> {
        let bytes = &self.data[self.zone_tab.clone()];
        if bytes.is_empty() {
            return None;
        }
        std::str::from_utf8(bytes).ok()
    }

    fn find(&self, id: &str) -> Option<&CatalogZone> {
        let i = self.zones.binary_search_by(|zone| (*zone.id).cmp(id)).ok()?;
        Some(&self.zones[i])
    }

    fn decode(&self, zone: &CatalogZone) -> Result<TransitionTable, Error> {
        TransitionTable::decode(&zone.id, &self.data[zone.range.clone()])
            .context(E::failed_time_zone(&zone.id))
    }
}

impl core::fmt::Debug for ZoneCatalog {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("ZoneCatalog")
            .field("version", &self.version)
            .field("zones", &self.zones.len())
            .field("builtin", &self.builtin)
            .finish()
    }
}
