//! Integration tests for persistent versioned maps.
//!
//! Each test writes through a SQLite file and reopens it with a fresh
//! instance to check that history survives the round trip.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tsih_core::{ErrorCode, MapConfig, SqliteRowStore, VersionedMap};

fn db_path(dir: &TempDir, file: &str) -> PathBuf {
    dir.path().join(file)
}

/// Writing at 0 and 25 must be readable at 0, 24 and 25, before and after reload.
#[test]
fn test_serialized_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = MapConfig::persistent(db_path(&dir, "basic.sqlite")).with_name("robot");

    let mut map: VersionedMap<String, String> = VersionedMap::open(config.clone()).unwrap();
    map.write("text".into(), "hello".into()).unwrap();
    map.set_version(25);
    map.write("text".into(), "world".into()).unwrap();

    assert_eq!(map.read_at(0, "text").unwrap(), "hello");
    assert_eq!(map.read_at(24, "text").unwrap(), "hello");
    assert_eq!(map.read_at(25, "text").unwrap(), "world");
    map.close().unwrap();

    let recovered: VersionedMap<String, String> = VersionedMap::open(config).unwrap();
    assert_eq!(recovered.read_at(0, "text").unwrap(), "hello");
    assert_eq!(recovered.read_at(24, "text").unwrap(), "hello");
    assert_eq!(recovered.read_at(25, "text").unwrap(), "world");
}

/// A shared config template replaces a map type with a hard-wired database.
#[test]
fn test_config_template_shares_target() {
    let dir = tempfile::tempdir().unwrap();
    let template = MapConfig::persistent(db_path(&dir, "custom.sqlite"));

    {
        let mut map: VersionedMap<String, String> =
            VersionedMap::open(template.clone().with_name("robot")).unwrap();
        map.write("text".into(), "hello".into()).unwrap();
        map.set_version(25);
        map.write("text".into(), "world".into()).unwrap();
    }

    let recovered: VersionedMap<String, String> =
        VersionedMap::open(template.with_name("robot")).unwrap();
    assert_eq!(recovered.read_at(0, "text").unwrap(), "hello");
    assert_eq!(recovered.read_at(24, "text").unwrap(), "hello");
    assert_eq!(recovered.read_at(26, "text").unwrap(), "world");
}

/// Reload restores history but not the cursor.
#[test]
fn test_reload_does_not_resume_version() {
    let dir = tempfile::tempdir().unwrap();
    let config = MapConfig::persistent(db_path(&dir, "cursor.sqlite")).with_name("robot");

    let mut map: VersionedMap<String, i64> = VersionedMap::open(config.clone()).unwrap();
    map.set_version(10);
    map.write("count".into(), 1).unwrap();
    drop(map);

    let recovered: VersionedMap<String, i64> = VersionedMap::open(config.clone()).unwrap();
    assert_eq!(recovered.version(), 0);
    assert_eq!(recovered.latest_version(), Some(10));
    let err = recovered.read("count").unwrap_err();
    assert_eq!(err.code(), ErrorCode::KeyBeforeHistory);

    let resumed: VersionedMap<String, i64> =
        VersionedMap::open(config.with_version(10)).unwrap();
    assert_eq!(*resumed.read("count").unwrap(), 1);
}

/// Auto-versioned writes land at 1, 2, 3... and persist that way.
#[test]
fn test_auto_version_sequencing_persists() {
    let dir = tempfile::tempdir().unwrap();
    let config = MapConfig::persistent(db_path(&dir, "auto.sqlite"))
        .with_name("counter")
        .with_auto_version(true);

    let mut map: VersionedMap<String, u32> = VersionedMap::open(config.clone()).unwrap();
    let keys = ["a", "b", "a", "c", "b"];
    for (i, key) in keys.iter().enumerate() {
        let version = map.write(key.to_string(), i as u32 + 1).unwrap();
        assert_eq!(version, i as u64 + 1);
    }
    drop(map);

    let recovered: VersionedMap<String, u32> = VersionedMap::open(config).unwrap();
    assert_eq!(recovered.versions_of("a"), vec![1, 3]);
    assert_eq!(recovered.versions_of("b"), vec![2, 5]);
    assert_eq!(*recovered.read_at(2, "a").unwrap(), 1);
    assert_eq!(*recovered.read_at(3, "a").unwrap(), 3);
    assert_eq!(*recovered.read_at(4, "b").unwrap(), 2);
    assert!(recovered.read_at(3, "c").unwrap_err().is_not_found());
}

/// Writing the same (key, version) twice keeps only the later value, on disk too.
#[test]
fn test_upsert_overwrites_persisted_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(&dir, "upsert.sqlite");
    let config = MapConfig::persistent(&path).with_name("robot");

    let mut map: VersionedMap<String, String> = VersionedMap::open(config.clone()).unwrap();
    map.write("text".into(), "first".into()).unwrap();
    map.write("text".into(), "second".into()).unwrap();
    assert_eq!(map.read_at(0, "text").unwrap(), "second");
    map.close().unwrap();

    let store = SqliteRowStore::new(&path).unwrap();
    assert_eq!(store.count_rows("robot").unwrap(), 1);
    drop(store);

    let recovered: VersionedMap<String, String> = VersionedMap::open(config).unwrap();
    assert_eq!(recovered.read_at(0, "text").unwrap(), "second");
}

/// Maps sharing one database never see each other's rows.
#[test]
fn test_identifiers_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let template = MapConfig::persistent(db_path(&dir, "shared.sqlite"));

    let mut robot: VersionedMap<String, String> =
        VersionedMap::open(template.clone().with_name("robot")).unwrap();
    let mut human: VersionedMap<String, String> =
        VersionedMap::open(template.clone().with_name("human")).unwrap();
    robot.write("text".into(), "beep".into()).unwrap();
    human.write("greeting".into(), "hi".into()).unwrap();
    drop(robot);
    drop(human);

    let robot: VersionedMap<String, String> =
        VersionedMap::open(template.with_name("robot")).unwrap();
    assert_eq!(robot.len(), 1);
    assert!(robot.contains_key("text"));
    assert!(!robot.contains_key("greeting"));
}

/// Out-of-order writes are placed correctly and survive reload.
#[test]
fn test_out_of_order_writes_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = MapConfig::persistent(db_path(&dir, "order.sqlite")).with_name("robot");

    let mut map: VersionedMap<String, i32> = VersionedMap::open(config.clone()).unwrap();
    for version in [30, 10, 20, 0] {
        map.set_version(version);
        map.write("k".into(), version as i32).unwrap();
    }

    let expected: Vec<(u64, i32)> = (0..=40)
        .map(|v| (v, *map.read_at(v, "k").unwrap()))
        .collect();
    drop(map);

    let recovered: VersionedMap<String, i32> = VersionedMap::open(config).unwrap();
    assert_eq!(recovered.versions_of("k"), vec![0, 10, 20, 30]);
    for (version, value) in expected {
        assert_eq!(*recovered.read_at(version, "k").unwrap(), value);
        // Read-through: the value at v equals the one at the newest entry <= v.
        let floor = (version / 10 * 10).min(30);
        assert_eq!(*recovered.read_at(floor, "k").unwrap(), value);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
struct Attribute {
    agent: u32,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Reading {
    value: f64,
    tags: BTreeMap<String, String>,
}

/// Structured keys and values are stored as JSON and decoded on reload.
#[test]
fn test_structured_keys_and_values() {
    let dir = tempfile::tempdir().unwrap();
    let config = MapConfig::persistent(db_path(&dir, "structured.sqlite")).with_name("sim");

    let key = Attribute {
        agent: 7,
        name: "temperature".into(),
    };
    let mut tags = BTreeMap::new();
    tags.insert("unit".to_string(), "celsius".to_string());
    let reading = Reading { value: 21.5, tags };

    let mut map: VersionedMap<Attribute, Reading> = VersionedMap::open(config.clone()).unwrap();
    map.set_version(3);
    map.write(key.clone(), reading.clone()).unwrap();
    drop(map);

    let recovered: VersionedMap<Attribute, Reading> = VersionedMap::open(config).unwrap();
    assert_eq!(recovered.read_at(3, &key).unwrap(), &reading);
    assert_eq!(recovered.snapshot_at(5), vec![(&key, &reading)]);
}

/// Non-finite floats are rejected up front instead of being stored as `null`,
/// so the map stays reloadable.
#[test]
fn test_non_finite_value_keeps_store_reloadable() {
    let dir = tempfile::tempdir().unwrap();
    let config = MapConfig::persistent(db_path(&dir, "floats.sqlite")).with_name("robot");

    let mut map: VersionedMap<String, f64> = VersionedMap::open(config.clone()).unwrap();
    let err = map.write("x".into(), f64::NAN).unwrap_err();
    assert_eq!(err.code(), ErrorCode::SerEncodeFailed);
    assert!(!map.contains_key("x"));
    assert_eq!(map.version(), 0);

    map.write("y".into(), 1.0).unwrap();
    drop(map);

    let recovered: VersionedMap<String, f64> = VersionedMap::open(config).unwrap();
    assert_eq!(*recovered.read_at(0, "y").unwrap(), 1.0);
    assert!(!recovered.contains_key("x"));
}

/// A database that is not SQLite fails construction.
#[test]
fn test_unreadable_target_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = db_path(&dir, "garbage.sqlite");
    std::fs::write(&path, vec![0xAB; 4096]).unwrap();

    let result: Result<VersionedMap<String, String>, _> =
        VersionedMap::open(MapConfig::persistent(&path).with_name("robot"));
    let err = result.unwrap_err();
    assert!(matches!(
        err.code(),
        ErrorCode::PerConnectionFailed | ErrorCode::PerLoadFailed
    ));
}
