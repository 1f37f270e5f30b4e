use std::sync::Arc;

use tzrules::tz::{
    CountryZoneIndex, ParseErrorKind, ParseMode, ZoneCatalog, ZoneFinder,
};

use crate::util::{self, TempFile, WHEN_DST, WHEN_NO_DST};

const LOOKUP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- A subset of a real configuration, with made up countries. -->
<timezones ianaversion="2024a">
  <countryzones>
    <country code="xx" default="Europe/London" everutc="y">
      <id>Europe/London</id>
      <id>America/New_York</id>
      <id>Mars/Olympus_Mons</id>
    </country>
    <country code="yy" default="Etc/UTC" everutc="y">
      <id picker="n">Etc/UTC</id>
      <id notafter="1509238800000">Europe/London</id>
    </country>
  </countryzones>
  <extra>ignored by older readers</extra>
</timezones>
"#;

fn catalog() -> Arc<ZoneCatalog> {
    Arc::new(ZoneCatalog::from_bytes(&util::small_container("2024a")).unwrap())
}

#[test]
fn london_and_new_york() -> anyhow::Result<()> {
    let _ = crate::Logger::init();

    let finder = ZoneFinder::from_text(catalog(), Some(LOOKUP), None)?;
    assert_eq!(finder.iana_version(), Some("2024a"));
    // The unknown zone was dropped while validating.
    assert_eq!(
        finder.index().lookup_candidates("xx"),
        Some(vec!["Europe/London", "America/New_York"]),
    );

    assert_eq!(
        finder.resolve("xx", 3600, true, WHEN_DST, None),
        Some("Europe/London"),
    );
    assert_eq!(
        finder.resolve("xx", -14400, true, WHEN_DST, None),
        Some("America/New_York"),
    );
    assert_eq!(
        finder.resolve("xx", -18000, false, WHEN_NO_DST, None),
        Some("America/New_York"),
    );
    assert_eq!(finder.resolve("xx", -18000, false, WHEN_DST, None), None);
    assert!(!finder.is_default_okay_at("xx", WHEN_DST));
    assert!(finder.has_utc_zone("xx", WHEN_NO_DST));
    assert!(!finder.has_utc_zone("xx", WHEN_DST));

    Ok(())
}

#[test]
fn overlapping_zones_and_bias() -> anyhow::Result<()> {
    let finder = ZoneFinder::from_text(catalog(), Some(LOOKUP), None)?;

    // Before the London mapping stops being distinct, both zones fit.
    let when = 1500000000000;
    assert!(when < WHEN_NO_DST);
    assert_eq!(
        finder.resolve("yy", 3600, true, when, None),
        Some("Europe/London"),
    );
    let result = finder
        .lookup_by_offset_with_bias(
            "yy",
            0,
            Some(false),
            None,
            WHEN_NO_DST,
            None,
        )
        .unwrap();
    assert_eq!(result.zone_id(), "Etc/UTC");
    assert!(result.is_only_match());

    // resolve considers every candidate, whether or not it's still
    // distinct.
    assert_eq!(
        finder.resolve("yy", 0, false, WHEN_NO_DST, None),
        Some("Etc/UTC"),
    );
    assert_eq!(
        finder.resolve("yy", 0, false, WHEN_NO_DST, Some("Europe/London")),
        Some("Europe/London"),
    );
    assert!(finder.is_default_okay_at("yy", WHEN_NO_DST));

    let yy = finder.lookup_country("YY").unwrap();
    assert_eq!(yy.code(), "yy");
    assert!(!yy.mappings()[0].show_in_picker());
    assert_eq!(yy.mappings()[1].not_used_after(), Some(1509238800000));
    assert_eq!(yy.effective_mappings(WHEN_NO_DST).count(), 1);

    Ok(())
}

#[test]
fn strict_and_lenient_loading() {
    let catalog = catalog();

    let index =
        CountryZoneIndex::load(LOOKUP, ParseMode::Strict, &catalog).unwrap();
    assert_eq!(index.country_codes().collect::<Vec<_>>(), vec!["xx", "yy"]);

    let missing_default = r#"
<timezones>
  <countryzones>
    <country code="zz"><id>Etc/UTC</id></country>
  </countryzones>
</timezones>
"#;
    let err = CountryZoneIndex::parse(missing_default, ParseMode::Strict)
        .unwrap_err();
    assert_eq!(err.kind(), ParseErrorKind::MissingAttribute);
    let index =
        CountryZoneIndex::parse(missing_default, ParseMode::Lenient).unwrap();
    assert_eq!(index.lookup_default("zz"), None);
    assert_eq!(index.lookup_candidates("zz"), Some(vec!["Etc/UTC"]));
}

#[test]
fn from_paths_uses_first_readable_file() {
    let _ = crate::Logger::init();

    let good = TempFile::new("tzlookup-good", LOOKUP.as_bytes());
    let bad = TempFile::new("tzlookup-bad", b"<timezones>");
    let missing = std::env::temp_dir().join("tzrules-test-no-tzlookup");

    let finder =
        ZoneFinder::from_paths(catalog(), &[missing.as_path(), good.path()]);
    assert_eq!(finder.lookup_default("xx"), Some("Europe/London"));

    // A readable file that fails to parse yields an empty finder, even
    // when a later file is fine.
    let finder = ZoneFinder::from_paths(catalog(), &[bad.path(), good.path()]);
    assert_eq!(finder.lookup_country("xx"), None);
    assert_eq!(finder.iana_version(), None);
}

#[test]
fn missing_and_invalid_sources() {
    let err = ZoneFinder::from_text(catalog(), None, None).unwrap_err();
    assert_eq!(err.parse_kind(), None);

    // The primary source is present, so the secondary is never consulted.
    let err =
        ZoneFinder::from_text(catalog(), Some("<timezones>"), Some(LOOKUP))
            .unwrap_err();
    assert!(err.parse_kind().is_some());
}

#[cfg(feature = "serde")]
#[test]
fn serialize_results() -> anyhow::Result<()> {
    let catalog = catalog();
    let finder =
        ZoneFinder::from_text(Arc::clone(&catalog), Some(LOOKUP), None)?;

    let result = finder
        .lookup_by_offset_with_bias("xx", 3600, None, None, WHEN_DST, None)
        .unwrap();
    assert_eq!(
        serde_json::to_string(&result)?,
        r#"{"zone_id":"Europe/London","one_match":true}"#,
    );

    let snapshot = catalog.snapshot("Europe/London", WHEN_NO_DST).unwrap();
    let value = serde_json::to_value(&snapshot)?;
    assert_eq!(value["raw_offset"], 0);
    assert_eq!(value["uses_dst"], true);
    Ok(())
}
