//! Persistence tests: stored line data reloads exactly

mod common;

use common::builders::{manual_persistence, snapshot};
use proptest::prelude::*;
use tempfile::tempdir;
use timeplot_rs::backend::Sample;
use timeplot_rs::config::PersistenceConfig;
use timeplot_rs::session::{DataStore, LineSnapshot, TimePlotData};
use timeplot_rs::types::LineId;

fn finite_f64() -> impl Strategy<Value = f64> {
    prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_store_then_recall_is_exact(
        points in prop::collection::vec((0.0..1e6f64, finite_f64()), 0..200),
        absolute_time in 0.0..4e9f64,
        line in 0u32..16,
    ) {
        let dir = tempdir().unwrap();
        let store = DataStore::new(dir.path().join("data.json"));
        let original = LineSnapshot {
            t: points.iter().map(|p| p.0).collect(),
            y: points.iter().map(|p| p.1).collect(),
            absolute_time,
        };

        store.store_line(LineId(line), &original).unwrap();
        let recalled = store.recall_line(LineId(line)).unwrap().unwrap();

        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        prop_assert_eq!(bits(&recalled.t), bits(&original.t));
        prop_assert_eq!(bits(&recalled.y), bits(&original.y));
        prop_assert_eq!(recalled.absolute_time.to_bits(), original.absolute_time.to_bits());
    }
}

#[test]
fn test_recall_on_startup_restores_buffers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.json");

    let mut first = TimePlotData::new(Some(DataStore::new(&path)), &manual_persistence());
    first.add_line(LineId(0));
    first.add_line(LineId(1));
    let origin = first.buffer(LineId(0)).unwrap().absolute_time();
    for (i, value) in [0.5, -1.25, 3.0].into_iter().enumerate() {
        first.on_sample(Sample::detached(LineId(0), value, origin + i as f64));
    }
    first.store_all().unwrap();
    let stored = first.snapshot(LineId(0)).unwrap();

    let persistence = PersistenceConfig {
        recall_on_startup: true,
        ..manual_persistence()
    };
    let mut second = TimePlotData::new(Some(DataStore::new(&path)), &persistence);
    second.add_line(LineId(0));
    second.add_line(LineId(1));
    second.add_line(LineId(2));

    assert_eq!(second.snapshot(LineId(0)).unwrap(), stored);
    assert!(second.buffer(LineId(1)).unwrap().is_empty());
    assert!(second.buffer(LineId(2)).unwrap().is_empty());
}

#[test]
fn test_clear_on_startup_ignores_stored_data() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.json");
    DataStore::new(&path)
        .store_line(LineId(0), &snapshot(&[1.0, 2.0], 0.5, 100.0))
        .unwrap();

    let persistence = PersistenceConfig {
        recall_on_startup: true,
        clear_on_startup: true,
        ..manual_persistence()
    };
    let mut data = TimePlotData::new(Some(DataStore::new(&path)), &persistence);
    data.add_line(LineId(0));
    assert!(data.buffer(LineId(0)).unwrap().is_empty());

    // Explicit recall still works
    assert!(data.recall_line(LineId(0)).unwrap());
    assert_eq!(data.buffer(LineId(0)).unwrap().y(), &[1.0, 2.0]);
}

#[test]
fn test_autosave_writes_every_n_points() {
    let dir = tempdir().unwrap();
    let store = DataStore::new(dir.path().join("data.json"));
    let persistence = PersistenceConfig {
        autosave: true,
        autosave_every: 10,
        ..manual_persistence()
    };
    let mut data = TimePlotData::new(Some(store.clone()), &persistence);
    data.add_line(LineId(3));

    let origin = data.buffer(LineId(3)).unwrap().absolute_time();
    for i in 0..25 {
        data.on_sample(Sample::detached(LineId(3), i as f64, origin + i as f64 * 0.1));
    }

    let saved = store.recall_line(LineId(3)).unwrap().unwrap();
    assert_eq!(saved.y.len(), 20);
    assert_eq!(saved.y.last(), Some(&19.0));
}

#[test]
fn test_nan_values_survive_as_nan() {
    let dir = tempdir().unwrap();
    let store = DataStore::new(dir.path().join("data.json"));
    store
        .store_line(LineId(0), &snapshot(&[f64::NAN, 4.0, f64::INFINITY], 1.0, 0.0))
        .unwrap();

    let recalled = store.recall_line(LineId(0)).unwrap().unwrap();
    assert!(recalled.y[0].is_nan());
    assert_eq!(recalled.y[1], 4.0);
    assert!(recalled.y[2].is_nan());
}
