/*!
Time zone rules: decoding, querying and resolution.

The pieces fit together like this:

* A [`TransitionTable`] is the decoded rule set of one zone. It answers
which [`OffsetType`] is in effect at any instant.
* A [`ZoneCatalog`] maps zone identifiers to transition tables. It's built
from a concatenated container of compiled zone records and decodes each
zone lazily.
* A [`ZoneInfo`] is a handle to one zone, together with a
[`ZoneSnapshot`] of its raw offset and DST behavior computed for a given
instant.
* A [`CountryZoneIndex`] lists the zones in use in each country.
* A [`ZoneFinder`] combines a catalog with a country index to answer
"which zone is this device in?" given a country, an offset and a DST
state.

The catalog and the finder each have a process wide instance, see
[`db::catalog`] and [`finder::finder`].

# Example

This uses the built-in catalog, which knows only about `GMT`:

```
use tzrules::tz::ZoneCatalog;

let catalog = ZoneCatalog::builtin();
assert_eq!(catalog.version(), "missing");

let table = catalog.zone("GMT").unwrap();
let typ = table.offset_at_millis(1_700_000_000_000);
assert_eq!(typ.utc_offset(), 0);
assert!(!typ.is_dst());

assert!(catalog.zone("Europe/London").is_none());
```
*/

pub use self::{
    country::{
        CountryZoneIndex, CountryZones, ParseError, ParseErrorKind, ParseMode,
        TimeZoneMapping,
    },
    db::ZoneCatalog,
    finder::{OffsetResult, ZoneFinder},
    tzif::{
        FormatError, FormatErrorKind, OffsetType, Offsets, Transition,
        TransitionTable,
    },
    zone::{ZoneInfo, ZoneSnapshot},
};

mod country;
pub mod db;
pub mod finder;
#[cfg(test)]
pub(crate) mod testdata;
mod tzif;
mod zone;
