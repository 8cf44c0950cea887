use flowbot::storage::{
    FileStore, LocalFileStore, MemoryScope, ShareFileStore, StorageError, UserGuid,
};
use serde_json::json;
use std::fs;

fn store() -> (tempfile::TempDir, LocalFileStore) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = LocalFileStore::new(tmp.path().join("state")).expect("store");
    (tmp, store)
}

#[test]
fn shared_and_user_memories_live_in_separate_documents() {
    let (tmp, store) = store();
    let guid = UserGuid::parse("123e4567-e89b-12d3-a456-426614174000").expect("guid");
    let user_scope = MemoryScope::User(guid.clone());

    store
        .write_json(&MemoryScope::Shared, &json!({"team": "platform"}))
        .expect("write shared");
    store
        .write_json(&user_scope, &json!({"name": "sam"}))
        .expect("write user");

    assert_eq!(
        store.read_json(&MemoryScope::Shared).expect("read")["team"],
        "platform"
    );
    assert_eq!(store.read_json(&user_scope).expect("read")["name"], "sam");

    let root = tmp.path().join("state");
    assert!(root.join("shared_memories").join("memory.json").is_file());
    assert!(root
        .join("memory")
        .join(guid.as_str())
        .join("user_memory.json")
        .is_file());
}

#[test]
fn unwritten_memory_reads_as_an_empty_object() {
    let (_tmp, store) = store();
    let value = store.read_json(&MemoryScope::Shared).expect("read");
    assert_eq!(value, json!({}));
}

#[test]
fn named_files_round_trip_with_listing_and_properties() {
    let (_tmp, store) = store();

    store
        .write_file("reports/2026", "august.txt", b"all fine")
        .expect("write");
    store
        .write_file("reports/2026", "april.txt", b"fine too")
        .expect("write");

    assert!(store.file_exists("reports/2026", "august.txt").expect("exists"));
    assert_eq!(
        store.read_file("reports/2026", "august.txt").expect("read"),
        b"all fine"
    );
    assert_eq!(
        store.list_files("reports/2026").expect("list"),
        vec!["april.txt".to_string(), "august.txt".to_string()]
    );

    let props = store
        .file_properties("reports/2026", "august.txt")
        .expect("props")
        .expect("present");
    assert_eq!(props.name, "august.txt");
    assert_eq!(props.size, 8);
    assert!(props.modified > 0);

    store.delete_file("reports/2026", "august.txt").expect("delete");
    assert!(!store.file_exists("reports/2026", "august.txt").expect("exists"));
}

#[test]
fn missing_files_and_empty_directories_behave_predictably() {
    let (_tmp, store) = store();

    assert!(store.list_files("nowhere").expect("list").is_empty());
    assert!(store
        .file_properties("nowhere", "ghost.txt")
        .expect("props")
        .is_none());
    assert!(matches!(
        store.read_file("nowhere", "ghost.txt").expect_err("read"),
        StorageError::NotFound { .. }
    ));
    assert!(matches!(
        store.delete_file("nowhere", "ghost.txt").expect_err("delete"),
        StorageError::NotFound { .. }
    ));
}

#[test]
fn escaping_paths_are_rejected() {
    let (_tmp, store) = store();

    for directory in ["..", "../outside", "/etc", ""] {
        assert!(
            matches!(
                store.write_file(directory, "x.txt", b"data"),
                Err(StorageError::InvalidPath { .. })
            ),
            "directory `{directory}` should be rejected"
        );
    }
    assert!(matches!(
        store.write_file("ok", "../x.txt", b"data"),
        Err(StorageError::InvalidPath { .. })
    ));
}

#[test]
fn share_backend_requires_an_existing_mount() {
    let tmp = tempfile::tempdir().expect("tempdir");

    let err = ShareFileStore::new(tmp.path().join("missing-mount")).expect_err("no mount");
    assert!(matches!(err, StorageError::BackendUnavailable { .. }));

    let mount = tmp.path().join("mounted");
    fs::create_dir_all(&mount).expect("mkdir");
    let share = ShareFileStore::new(mount.clone()).expect("share");
    share
        .write_json(&MemoryScope::Shared, &json!({"via": "share"}))
        .expect("write");
    assert!(mount.join("shared_memories").join("memory.json").is_file());
}
