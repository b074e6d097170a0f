//! End-to-end checks for the concrete store scenarios called out across the
//! store contract: selector-scoped deletes, bulk atomicity, and conditional
//! put flags exercised against the memory backend (the reference
//! implementation every other backend's behavior is checked against).

use frid::store::{MemoryStore, Sel};
use frid::{Key, PutFlags, Store, Value};

fn unique(name: &str) -> MemoryStore {
    MemoryStore::at(vec![format!("scenario-{name}")])
}

#[tokio::test]
async fn array_range_delete_removes_the_middle_and_keeps_the_ends() {
    let store = unique("array-range-delete");
    let key = Key::text("L");
    store
        .put(&key, Value::Array(vec![Value::Int(10), Value::Int(20), Value::Int(30)]), PutFlags::UNCHECKED)
        .await
        .unwrap();
    store.del(&key, Some(&Sel::Range(1, -1))).await.unwrap();
    assert_eq!(store.get(&key, None).await.unwrap(), Some(Value::Array(vec![Value::Int(10), Value::Int(30)])));
}

#[tokio::test]
async fn bulk_put_with_atomicity_and_no_change_fails_entirely_when_one_key_exists() {
    let store = unique("bulk-no-change");
    let key_a = Key::text("a");
    let key_b = Key::text("b");
    store.put(&key_a, Value::Int(1), PutFlags::UNCHECKED).await.unwrap();

    let pairs = vec![(key_a.clone(), Value::Int(1)), (key_b.clone(), Value::Int(2))];
    let applied = store.put_bulk(&pairs, PutFlags::ATOMICITY | PutFlags::NO_CHANGE).await.unwrap();

    assert_eq!(applied, 0);
    assert_eq!(store.get(&key_b, None).await.unwrap(), None);
}

#[tokio::test]
async fn del_then_get_observes_missing() {
    let store = unique("del-then-get");
    let key = Key::text("k");
    store.put(&key, Value::text("v"), PutFlags::UNCHECKED).await.unwrap();
    assert!(store.del(&key, None).await.unwrap());
    assert_eq!(store.get(&key, None).await.unwrap(), None);
}

#[tokio::test]
async fn put_with_keep_both_merges_old_and_new_on_get() {
    let store = unique("keep-both-get");
    let key = Key::text("m");
    let old = Value::Mapping(frid::value::mapping_from([("a", Value::Int(1))]));
    let new = Value::Mapping(frid::value::mapping_from([("b", Value::Int(2))]));
    store.put(&key, old, PutFlags::UNCHECKED).await.unwrap();
    store.put(&key, new, PutFlags::KEEP_BOTH).await.unwrap();
    assert_eq!(
        store.get(&key, None).await.unwrap(),
        Some(Value::Mapping(frid::value::mapping_from([("a", Value::Int(1)), ("b", Value::Int(2))])))
    );
}

#[tokio::test]
async fn get_meta_reports_kind_and_size_matching_the_stored_variant() {
    let store = unique("get-meta");
    let key = Key::text("arr");
    store.put(&key, Value::Array(vec![Value::Int(1), Value::Int(2)]), PutFlags::UNCHECKED).await.unwrap();
    let meta = store.get_meta(&[key.clone()]).await.unwrap();
    let ts = meta.get(&key).unwrap();
    assert_eq!(ts.kind, frid::value::ValueKind::List);
    assert_eq!(ts.size, 2);
}

#[tokio::test]
async fn map_get_with_key_set_omits_absent_keys_rather_than_filling_null() {
    let store = unique("key-set-get");
    let key = Key::text("person");
    let value = Value::Mapping(frid::value::mapping_from([("name", Value::text("Ada")), ("age", Value::Int(30))]));
    store.put(&key, value, PutFlags::UNCHECKED).await.unwrap();

    let sel = Sel::KeySet(vec!["name".to_string(), "missing".to_string()]);
    let got = store.get(&key, Some(&sel)).await.unwrap().unwrap();
    let Value::Mapping(m) = got else { panic!("expected mapping") };
    assert_eq!(m.len(), 1);
    assert_eq!(m.get("name"), Some(&Value::text("Ada")));
    assert!(m.get("missing").is_none());
}
