use std::sync::Arc;

use tzrules::tz::{db, FormatErrorKind, ZoneCatalog};

use crate::util::{self, TempFile, WHEN_DST, WHEN_NO_DST};

#[test]
fn load_prefers_first_valid_source() -> anyhow::Result<()> {
    let _ = crate::Logger::init();

    let primary = util::small_container("9999z");
    let secondary =
        util::container("2024a", &[("Europe/London", util::london())], "");
    let direct = ZoneCatalog::from_bytes(&secondary)?;

    let catalog =
        ZoneCatalog::try_load(Some(&primary[..]), Some(&secondary[..]))?;
    assert_eq!(catalog.version(), "9999z");
    assert_eq!(catalog.len(), 3);

    let catalog =
        ZoneCatalog::try_load(Some(&b"garbage"[..]), Some(&secondary[..]))?;
    assert_eq!(catalog.version(), direct.version());
    assert_eq!(catalog.len(), direct.len());

    let catalog = ZoneCatalog::try_load(None, Some(&secondary[..]))?;
    assert_eq!(catalog.version(), direct.version());
    assert_eq!(catalog.len(), direct.len());
    assert_eq!(catalog.len(), 1);
    assert!(!catalog.is_builtin());

    Ok(())
}

#[test]
fn load_falls_back_to_builtin() {
    let _ = crate::Logger::init();

    let err = ZoneCatalog::try_load(None, None).unwrap_err();
    assert!(err.to_string().contains("no tzdata source"), "{err}");

    let err = ZoneCatalog::try_load(Some(&b"tzdata"[..]), None).unwrap_err();
    assert!(err.to_string().contains("header"), "{err}");

    let catalog = ZoneCatalog::load(Some(&b"nope"[..]), None);
    assert!(catalog.is_builtin());
    assert_eq!(catalog.version(), "missing");
    assert_eq!(catalog.available_ids().collect::<Vec<_>>(), vec!["GMT"]);

    let gmt = catalog.make_zone("GMT", WHEN_DST).unwrap();
    assert_eq!(gmt.raw_offset(), 0);
    assert!(!gmt.uses_dst());
    assert_eq!(gmt.dst_savings(), 0);
    assert!(catalog.zone("Europe/London").is_none());
}

#[test]
fn from_paths_uses_first_loadable_file() -> anyhow::Result<()> {
    let _ = crate::Logger::init();

    let bad = TempFile::new("catalog-bad", b"tzdata2024a\0 not much else");
    let good = TempFile::new("catalog-good", &util::small_container("2024b"));
    let missing = std::env::temp_dir().join("tzrules-test-does-not-exist");

    let catalog = ZoneCatalog::from_paths(&[
        missing.as_path(),
        bad.path(),
        good.path(),
    ]);
    assert_eq!(catalog.version(), "2024b");
    assert_eq!(ZoneCatalog::rules_version(good.path())?, "2024b");
    // The version header is fine even though the rest isn't.
    assert_eq!(ZoneCatalog::rules_version(bad.path())?, "2024a");

    let err = ZoneCatalog::rules_version(&missing).unwrap_err();
    assert!(err.is_io());
    assert!(err.to_string().contains("tzrules-test-does-not-exist"));

    let catalog = ZoneCatalog::from_paths(&[missing.as_path(), bad.path()]);
    assert!(catalog.is_builtin());

    Ok(())
}

#[test]
fn queries() {
    let bytes = util::small_container("2024a");
    let catalog = ZoneCatalog::from_bytes(&bytes).unwrap();
    assert_eq!(catalog.len(), 3);
    assert!(catalog.has_zone("Etc/UTC"));
    assert!(!catalog.has_zone("etc/utc"));
    assert_eq!(catalog.zone_tab(), None);

    let london = catalog.zone("Europe/London").unwrap();
    assert_eq!(london.id(), "Europe/London");
    let offsets = london.offsets_at_millis(WHEN_DST);
    assert_eq!(
        (offsets.total(), offsets.raw(), offsets.dst()),
        (3600, 0, 3600),
    );
    assert!(london.in_daylight_time(WHEN_DST));
    assert!(!london.in_daylight_time(WHEN_NO_DST));

    // The same table is returned every time.
    assert!(Arc::ptr_eq(&london, &catalog.zone("Europe/London").unwrap()));

    let new_york = catalog.make_zone("America/New_York", WHEN_NO_DST).unwrap();
    assert_eq!(new_york.raw_offset(), -18000);
    assert!(new_york.uses_dst());
    assert_eq!(new_york.dst_savings(), 3600);
    assert_eq!(new_york.offset_at_millis(WHEN_DST), -14400);
    let offset = new_york.offset_at_civil(2017, 7, 22, 12 * 3_600_000).unwrap();
    assert_eq!(offset, -14400);
    assert!(new_york.offset_at_civil(2017, 13, 1, 0).is_err());

    // After the last DST transition, the zone no longer uses DST.
    let snapshot =
        catalog.snapshot("America/New_York", 1_600_000_000_000).unwrap();
    assert_eq!(snapshot.raw_offset(), -18000);
    assert!(!snapshot.uses_dst());
    assert_eq!(snapshot.dst_savings(), 0);
}

#[test]
fn handles_are_independent() {
    let bytes = util::small_container("2024a");
    let catalog = ZoneCatalog::from_bytes(&bytes).unwrap();

    let a = catalog.make_zone("Europe/London", WHEN_NO_DST).unwrap();
    let b = catalog.make_zone("Europe/London", WHEN_NO_DST).unwrap();
    assert!(a.has_same_rules(&b));

    let shifted = a.with_raw_offset(1800);
    assert_eq!(shifted.raw_offset(), 1800);
    assert_eq!(shifted.offset_at_millis(WHEN_DST), 5400);
    assert_eq!(a.raw_offset(), 0);
    assert_eq!(a.offset_at_millis(WHEN_DST), 3600);
    assert_eq!(b.offset_at_millis(WHEN_DST), 3600);
    assert!(!shifted.has_same_rules(&a));

    let renamed = a.with_id("Europe/Guernsey");
    assert_eq!(renamed.id(), "Europe/Guernsey");
    assert!(renamed.has_same_rules(&a));

    let utc = catalog.make_zone("Etc/UTC", WHEN_NO_DST).unwrap();
    assert!(!utc.has_same_rules(&a));
}

#[test]
fn malformed_zone_record() {
    let _ = crate::Logger::init();

    let mut bad = util::utc();
    bad[..4].copy_from_slice(b"TZjf");
    let bytes = util::container(
        "2024a",
        &[("Bad/Zone", bad), ("Etc/UTC", util::utc())],
        "",
    );
    let catalog = ZoneCatalog::from_bytes(&bytes).unwrap();
    assert!(catalog.has_zone("Bad/Zone"));
    assert!(catalog.zone("Bad/Zone").is_none());
    assert!(catalog.make_zone("Bad/Zone", 0).is_none());
    assert!(catalog.zone("Etc/UTC").is_some());

    let err = catalog.validate().unwrap_err();
    assert!(err.to_string().contains("Bad/Zone"), "{err}");
    assert_eq!(err.format_kind(), Some(FormatErrorKind::BadMagic));
}

#[test]
fn install_swaps_without_disturbing_readers() {
    let _ = crate::Logger::init();

    let first = Arc::new(
        ZoneCatalog::from_bytes(&util::small_container("2024a")).unwrap(),
    );
    db::install(Arc::clone(&first));
    let held = db::catalog();
    assert_eq!(held.version(), "2024a");

    let readers: Vec<_> = (0..4)
        .map(|_| {
            std::thread::spawn(|| {
                for _ in 0..100 {
                    let catalog = db::catalog();
                    let version = catalog.version().to_string();
                    assert!(version == "2024a" || version == "2024b");
                    assert!(catalog.zone("Etc/UTC").is_some());
                }
            })
        })
        .collect();

    let second = Arc::new(
        ZoneCatalog::from_bytes(&util::small_container("2024b")).unwrap(),
    );
    let previous = db::install(second).unwrap();
    assert_eq!(previous.version(), "2024a");
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(db::catalog().version(), "2024b");
    // A handle taken before the swap still works.
    assert_eq!(held.version(), "2024a");
    assert!(held.zone("Europe/London").is_some());
}
