/*!
A time zone rules engine.

This crate decodes the compiled zone records produced by `zic`, answers
offset and DST questions against them, and resolves a country, an offset
and a DST state to an IANA time zone identifier. It's meant for devices
that learn their country and current offset from the network, but not
their time zone.

Everything lives in the [`tz`] module. The main entry points are:

* [`tz::ZoneCatalog`] for looking up the rules of a zone by its identifier.
* [`tz::ZoneInfo`] for a long-lived handle to one zone.
* [`tz::ZoneFinder`] for resolving a country and offset to a zone.

# Example

This builds a finder from a country configuration and the built-in
catalog, which only knows about `GMT`:

```
use std::sync::Arc;

use tzrules::tz::{ZoneCatalog, ZoneFinder};

let config = r#"
<timezones ianaversion="2024a">
  <countryzones>
    <country code="gb" default="GMT" everutc="y">
      <id>GMT</id>
    </country>
  </countryzones>
</timezones>
"#;
let catalog = Arc::new(ZoneCatalog::builtin());
let finder = ZoneFinder::from_text(catalog, Some(config), None)?;
assert_eq!(finder.lookup_default("GB"), Some("GMT"));
assert_eq!(finder.resolve("gb", 0, false, 0, None), Some("GMT"));
assert!(finder.has_utc_zone("gb", 0));

# Ok::<(), Box<dyn std::error::Error>>(())
```

# Crate features

* **logging** (enabled by default) - Emits messages via the `log` crate
about decisions made while loading data, such as which files were tried
and which zones were dropped during validation.
* **serde** - Implements `serde::Serialize` for the value types that come
out of queries.
*/

#![deny(rustdoc::broken_intra_doc_links)]
// No clue why this thing is still unstable because it's pretty amazing. This
// adds Cargo feature annotations to items in the rustdoc output.
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
// We generally want all types to impl Debug.
#![warn(missing_debug_implementations)]

pub use crate::error::Error;

#[macro_use]
mod logging;

mod error;
pub mod tz;
mod util;
