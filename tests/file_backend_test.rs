//! Exercises the file backend's atomic rename-based commit protocol end to
//! end: every `put`/`del` leaves either a committed `.kvs` file or nothing,
//! never a stray `.tmp` lock file.

use frid::store::{FileStore, Key, PutFlags, Store};
use frid::Value;

fn kvs_path(dir: &std::path::Path, name: &str) -> std::path::PathBuf {
    dir.join(format!("{name}.kvs"))
}

fn tmp_path(dir: &std::path::Path, name: &str) -> std::path::PathBuf {
    dir.join(format!("{name}.tmp"))
}

#[tokio::test]
async fn put_leaves_a_committed_file_and_no_lock_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let key = Key::text("widget");

    assert!(store.put(&key, Value::text("gear"), PutFlags::UNCHECKED).await.unwrap());
    assert!(kvs_path(dir.path(), "widget").exists());
    assert!(!tmp_path(dir.path(), "widget").exists());
}

#[tokio::test]
async fn concurrent_puts_on_distinct_keys_both_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());

    let a = store.put(&Key::text("a"), Value::Int(1), PutFlags::UNCHECKED);
    let b = store.put(&Key::text("b"), Value::Int(2), PutFlags::UNCHECKED);
    let (a, b) = tokio::join!(a, b);
    assert!(a.unwrap());
    assert!(b.unwrap());
    assert_eq!(store.get(&Key::text("a"), None).await.unwrap(), Some(Value::Int(1)));
    assert_eq!(store.get(&Key::text("b"), None).await.unwrap(), Some(Value::Int(2)));
}

#[tokio::test]
async fn deleting_an_unknown_key_is_a_no_op_with_no_residue() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    assert!(!store.del(&Key::text("ghost"), None).await.unwrap());
    assert!(!kvs_path(dir.path(), "ghost").exists());
    assert!(!tmp_path(dir.path(), "ghost").exists());
}

#[tokio::test]
async fn substore_writes_under_a_nested_directory() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path());
    let sub = store.substore(&["users", "42"]).await.unwrap();
    sub.put(&Key::text("name"), Value::text("Ada"), PutFlags::UNCHECKED).await.unwrap();
    assert!(dir.path().join("users").join("42").join("name.kvs").exists());
}
