//! Persistence Tests
//!
//! Save/load behaviour of the durable catalog file.

use std::fs;

use autodex::config::OutputFormat;
use autodex::{file_check, Catalog, CatalogStore, DuplicatePolicy, RecordDraft, Validator};

fn workshop() -> Catalog {
    Catalog::from_json(include_str!("fixtures/workshop.json")).unwrap()
}

fn store_in(dir: &tempfile::TempDir) -> CatalogStore {
    CatalogStore::new(dir.path().join("autodex_data.json"))
        .with_validator(Validator::without_assets())
}

#[test]
fn test_save_then_load_is_equal() {
    let dir = tempfile::tempdir().unwrap();
    for format in [OutputFormat::Pretty, OutputFormat::Compact] {
        let store = store_in(&dir).with_format(format);
        let mut catalog = workshop();
        store.save(&mut catalog).unwrap();
        assert_ne!(catalog.header.last_saved, workshop().header.last_saved);
        assert_eq!(store.load().unwrap(), catalog);
        file_check(store.path(), &Validator::without_assets()).unwrap();
    }
}

#[test]
fn test_float_values_survive_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let mut catalog = workshop();
    let draft = RecordDraft::new(4, "gauges", "Shelf", "Tray")
        .at([("X", 5), ("Y", 3)])
        .with_numeric("Pressure", "psi", [0.1 + 0.2, 1.0 / 3.0, 6.89476e-7]);
    catalog
        .add(draft, DuplicatePolicy::Reject, store.validator())
        .unwrap();
    store.save(&mut catalog).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(
        loaded.get(4).unwrap().numeric_attributes["Pressure"]["psi"],
        vec![0.1 + 0.2, 1.0 / 3.0, 6.89476e-7]
    );
}

#[test]
fn test_rejected_save_keeps_durable_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let mut catalog = workshop();
    store.save(&mut catalog).unwrap();
    let durable = fs::read(store.path()).unwrap();

    let mut overlapping = Catalog::from_json(include_str!("fixtures/overlapping.json")).unwrap();
    let before = overlapping.clone();
    let err = store.save(&mut overlapping).unwrap_err();
    assert_eq!(err.root().code(), "E043");

    assert_eq!(overlapping, before);
    assert_eq!(fs::read(store.path()).unwrap(), durable);
    assert!(!store.temp_path().exists());
    assert_eq!(store.load().unwrap(), catalog);
}

#[test]
fn test_load_rejects_inconsistent_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    fs::write(store.path(), include_str!("fixtures/overlapping.json")).unwrap();
    let err = store.load().unwrap_err();
    assert_eq!(err.code(), "E090");
    assert_eq!(err.root().code(), "E043");
}

#[test]
fn test_asset_checks_follow_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("valve.png");
    fs::write(&image, b"").unwrap();

    let mut catalog = workshop();
    catalog.records[0].image_paths = vec![image.display().to_string()];
    let strict = CatalogStore::new(dir.path().join("strict.json"));
    strict.save(&mut catalog).unwrap();

    fs::remove_file(&image).unwrap();
    assert_eq!(strict.load().unwrap_err().root().code(), "E027");
    store_in(&dir).save(&mut catalog).unwrap();
}
