//! Loading configurations from disk: includes, errors and the store

use jcfg::document::LoadError;
use jcfg::store::StoreError;
use jcfg::{ConfigStore, LoadOptions, Value};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

fn load_json(path: &Path) -> Result<serde_json::Value, LoadError> {
    jcfg::load(path, &LoadOptions::default()).map(|config| Value::Object(config.tree().clone()).into())
}

#[test]
fn include_is_spliced_in() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "child.json", r#"{"x": 1}"#);
    let main = write(dir.path(), "main.json", r#"{"a": "@child.json"}"#);

    assert_eq!(load_json(&main).unwrap(), json!({ "a": { "x": 1 } }));
}

#[test]
fn child_only_sees_its_own_variables() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "nested/child.json",
        r#"{"own": "mine", "a": "$own$", "b": "$secret$", "deeper": "@leaf.json"}"#,
    );
    write(dir.path(), "nested/leaf.json", r#"{"c": 3}"#);
    let main = write(
        dir.path(),
        "main.json",
        r#"{"secret": "s3", "child": "@nested/child.json"}"#,
    );

    assert_eq!(
        load_json(&main).unwrap(),
        json!({
            "secret": "s3",
            "child": { "own": "mine", "a": "mine", "b": "$secret$", "deeper": { "c": 3 } }
        })
    );
}

#[test]
fn root_join_derives_full_paths() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(
        dir.path(),
        "main.json",
        r#"{"root": "/data", "model": {"weights_path": "w.bin"}}"#,
    );

    let config = jcfg::load(&main, &LoadOptions::default()).unwrap();
    assert_eq!(
        config.get("model.full_weights_path"),
        Some(&Value::from("/data/w.bin"))
    );

    let mut options = LoadOptions::default();
    options.root_join = false;
    let config = jcfg::load(&main, &options).unwrap();
    assert_eq!(config.get("model.full_weights_path"), None);
}

#[test]
fn env_variables() {
    std::env::set_var("JCFG_TEST_LOAD_HOME", "/usr/alice");
    let dir = tempfile::tempdir().unwrap();
    let main = write(
        dir.path(),
        "main.json",
        r#"{"home": "{JCFG_TEST_LOAD_HOME}", "other": "{JCFG_TEST_LOAD_UNSET}"}"#,
    );

    assert_eq!(
        load_json(&main).unwrap(),
        json!({ "home": "/usr/alice", "other": "{JCFG_TEST_LOAD_UNSET}" })
    );
}

#[test]
fn missing_files() {
    let dir = tempfile::tempdir().unwrap();

    let err = load_json(&dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, LoadError::FileNotFound(_)), "{err:?}");

    let main = write(dir.path(), "main.json", r#"{"a": "@missing.json"}"#);
    let err = load_json(&main).unwrap_err();
    let LoadError::ChildFileNotFound(path) = err else {
        panic!("expected missing child, got {err:?}");
    };
    assert_eq!(path, dir.path().join("missing.json"));
}

#[test]
fn malformed_files() {
    let dir = tempfile::tempdir().unwrap();

    let main = write(dir.path(), "main.json", r#"{"a": "#);
    let err = load_json(&main).unwrap_err();
    assert!(matches!(err, LoadError::MalformedDocument { .. }), "{err:?}");

    write(dir.path(), "child.json", "[1, 2");
    let main = write(dir.path(), "main.json", r#"{"a": "@!child.json"}"#);
    let err = load_json(&main).unwrap_err();
    assert!(matches!(err, LoadError::MalformedChildConfig { .. }), "{err:?}");

    let main = write(dir.path(), "main.json", "[1, 2]");
    let err = load_json(&main).unwrap_err();
    assert!(matches!(err, LoadError::NotAnObject { .. }), "{err:?}");
}

#[test]
fn include_cycles_fail() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "b.json", r#"{"back": "@a.json"}"#);
    let main = write(dir.path(), "a.json", r#"{"b": "@b.json"}"#);

    let err = load_json(&main).unwrap_err();
    let LoadError::IncludeCycle { chain } = err else {
        panic!("expected include cycle, got {err:?}");
    };
    assert_eq!(chain.len(), 3);
    assert_eq!(chain.first(), chain.last());
}

#[test]
fn store_set_persists_raw_document() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(
        dir.path(),
        "main.json",
        r#"{"name": "net", "title": "$name$-v1", "model": 3}"#,
    );

    let store = ConfigStore::open(&main, LoadOptions::default()).unwrap();
    let before = store.snapshot();

    store.set("name", "resnet").unwrap();
    store.set("model.depth", 50_i64).unwrap();

    // the old snapshot is untouched
    assert_eq!(before.get("title"), Some(&Value::from("net-v1")));
    assert_eq!(store.get("title"), Some(Value::from("resnet-v1")));
    assert_eq!(store.get("model.depth"), Some(Value::Integer(50)));

    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&main).unwrap()).unwrap();
    assert_eq!(
        on_disk,
        json!({ "name": "resnet", "title": "$name$-v1", "model": { "depth": 50 } })
    );
    assert!(std::fs::read_to_string(&main)
        .unwrap()
        .contains("\n    \"name\": \"resnet\""));
}

#[test]
fn store_rejects_empty_key_segments() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.json", r#"{"a": 1}"#);
    let store = ConfigStore::open(&main, LoadOptions::default()).unwrap();

    let err = store.set("a..b", true).unwrap_err();
    assert!(matches!(err, StoreError::InvalidKey(_)), "{err:?}");
}

#[test]
fn store_reload_picks_up_edits() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.json", r#"{"a": 1}"#);
    let store = ConfigStore::open(&main, LoadOptions::default()).unwrap();

    write(dir.path(), "main.json", r#"{"a": 2}"#);
    assert_eq!(store.get("a"), Some(Value::Integer(1)));

    let snapshot = store.reload().unwrap();
    assert_eq!(snapshot.get("a"), Some(&Value::Integer(2)));
    assert_eq!(store.raw().get("a"), Some(&Value::Integer(2)));
}

#[test]
fn store_failed_set_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let contents = r#"{"a": 1}"#;
    let main = write(dir.path(), "main.json", contents);
    let store = ConfigStore::open(&main, LoadOptions::default()).unwrap();

    let err = store.set("inc", "@missing.json").unwrap_err();
    assert!(
        matches!(err, StoreError::Load(LoadError::ChildFileNotFound(_))),
        "{err:?}"
    );

    assert_eq!(std::fs::read_to_string(&main).unwrap(), contents);
    assert_eq!(store.raw().get("inc"), None);
    assert_eq!(store.get("inc"), None);
    assert_eq!(store.get("a"), Some(Value::Integer(1)));
    assert!(ConfigStore::open(&main, LoadOptions::default()).is_ok());

    store.set("b", 2_i64).unwrap();
    assert_eq!(store.get("b"), Some(Value::Integer(2)));
}

#[test]
fn store_failed_reload_keeps_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.json", r#"{"a": 1}"#);
    let store = ConfigStore::open(&main, LoadOptions::default()).unwrap();

    write(dir.path(), "main.json", r#"{"a": "#);
    assert!(store.reload().is_err());
    assert_eq!(store.get("a"), Some(Value::Integer(1)));
    assert_eq!(store.raw().get("a"), Some(&Value::Integer(1)));
}

#[test]
fn store_reloads_while_shared_with_readers() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.json", r#"{"a": 1}"#);
    let store = Arc::new(ConfigStore::open(&main, LoadOptions::default()).unwrap());
    let before = store.snapshot();

    write(dir.path(), "main.json", r#"{"a": 2}"#);
    let writer = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || store.reload().map(|snapshot| snapshot.get("a").cloned()))
    };

    let reader = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
            let held = store.snapshot();
            held.get("a").cloned()
        })
    };

    assert_eq!(writer.join().unwrap().unwrap(), Some(Value::Integer(2)));
    assert!(matches!(
        reader.join().unwrap(),
        Some(Value::Integer(1)) | Some(Value::Integer(2))
    ));

    assert_eq!(before.get("a"), Some(&Value::Integer(1)));
    assert_eq!(store.get("a"), Some(Value::Integer(2)));
}

#[test]
fn typed_model() {
    #[derive(serde::Deserialize)]
    struct Model {
        weights_path: String,
        full_weights_path: String,
    }

    #[derive(serde::Deserialize)]
    struct Settings {
        model: Model,
    }

    let dir = tempfile::tempdir().unwrap();
    let main = write(
        dir.path(),
        "main.json",
        r#"{"root": "/data", "file": "w.bin", "model": {"weights_path": "$file$"}}"#,
    );

    let settings: Settings = jcfg::load(&main, &LoadOptions::default())
        .unwrap()
        .deserialize()
        .unwrap();
    assert_eq!(settings.model.weights_path, "w.bin");
    assert_eq!(settings.model.full_weights_path, "/data/w.bin");
}
