// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use aktien_app::{CompareOp, FilterSet, NumericFilter, ViewKind};
use aktien_store::{Store, validate_db_path};
use anyhow::Result;
use rusqlite::params;

fn sample_filters() -> FilterSet {
    FilterSet {
        search: "sap".to_owned(),
        sector: Some("Technology".to_owned()),
        numeric: vec![NumericFilter {
            column: "ttm_pe".to_owned(),
            operator: CompareOp::Le,
            value: 18.0,
        }],
        ..FilterSet::default()
    }
}

#[test]
fn filters_round_trip_per_view() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    assert_eq!(store.load_filters(ViewKind::Screener)?, None);

    let filters = sample_filters();
    store.save_filters(ViewKind::Screener, &filters)?;
    assert_eq!(store.load_filters(ViewKind::Screener)?, Some(filters));

    // The other view stays untouched.
    assert_eq!(store.load_filters(ViewKind::Watchlist)?, None);
    Ok(())
}

#[test]
fn saving_again_overwrites_the_single_entry() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    store.save_filters(ViewKind::Screener, &sample_filters())?;
    store.save_filters(ViewKind::Screener, &FilterSet::default())?;

    assert_eq!(
        store.load_filters(ViewKind::Screener)?,
        Some(FilterSet::default())
    );
    Ok(())
}

#[test]
fn clear_removes_the_persisted_entry() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    store.save_filters(ViewKind::Screener, &sample_filters())?;
    store.clear_filters(ViewKind::Screener)?;
    assert_eq!(store.load_filters(ViewKind::Screener)?, None);
    Ok(())
}

#[test]
fn malformed_payload_surfaces_a_decode_error() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;

    // Simulate a corrupted entry written by an older build.
    store.raw_connection().execute(
        "INSERT INTO saved_filters (view_name, payload, updated_at)
         VALUES (?1, ?2, ?3)",
        params!["screener", "{not json", "2026-01-01T00:00:00Z"],
    )?;

    let error = store
        .load_filters(ViewKind::Screener)
        .expect_err("corrupted payload should fail to decode");
    assert!(error.to_string().contains("decode saved filters"));
    Ok(())
}

#[test]
fn filters_survive_a_reopen() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let path = temp.path().join("aktien.db");

    {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        store.save_filters(ViewKind::Screener, &sample_filters())?;
    }

    let reopened = Store::open(&path)?;
    reopened.bootstrap()?;
    assert_eq!(
        reopened.load_filters(ViewKind::Screener)?,
        Some(sample_filters())
    );
    Ok(())
}

#[test]
fn db_path_validation_rejects_uri_styles() {
    assert!(validate_db_path(":memory:").is_ok());
    assert!(validate_db_path("/tmp/aktien.db").is_ok());
    assert!(validate_db_path("").is_err());
    assert!(validate_db_path("https://evil.example/aktien.db").is_err());
    assert!(validate_db_path("file:aktien.db").is_err());
    assert!(validate_db_path("/tmp/aktien.db?mode=ro").is_err());
}
