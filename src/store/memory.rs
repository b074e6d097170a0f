//! In-process backend: a process-wide registry of namespaced maps, each
//! guarded by its own lock shared by every view into it.
//!
//! Grounded on `frid/kvs/basic.py`'s `MemoryValueStore`. The Python
//! original shares one re-entrant lock per substore so that a
//! read-modify-write method can call the store's own `get`/`put` without
//! deadlocking; this port instead keeps every public method's locked
//! section self-contained, calling private non-locking helpers for the
//! read/write/merge step rather than re-entering a locking method, so no
//! reentrant-lock primitive is needed.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::store::selector::{self, Sel};
use crate::store::traits::{Key, MetaMap, PutFlags, Store, StoreLock};
use crate::value::Value;

type Bucket = Arc<Mutex<HashMap<Key, Value>>>;

fn registry() -> &'static std::sync::Mutex<HashMap<Vec<String>, Bucket>> {
    static REGISTRY: OnceLock<std::sync::Mutex<HashMap<Vec<String>, Bucket>>> = OnceLock::new();
    REGISTRY.get_or_init(|| std::sync::Mutex::new(HashMap::new()))
}

fn bucket_for(path: &[String]) -> Bucket {
    let mut reg = registry().lock().expect("memory store registry lock poisoned");
    reg.entry(path.to_vec()).or_insert_with(|| Arc::new(Mutex::new(HashMap::new()))).clone()
}

/// A namespaced in-process store. Cloning shares the same backing map.
#[derive(Clone)]
pub struct MemoryStore {
    path: Vec<String>,
    bucket: Bucket,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::at(Vec::new())
    }

    pub fn at(path: Vec<String>) -> Self {
        let bucket = bucket_for(&path);
        MemoryStore { path, bucket }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

fn read_value(map: &HashMap<Key, Value>, key: &Key, sel: Option<&Sel>) -> Option<Value> {
    let value = map.get(key)?;
    match sel {
        None => Some(value.clone()),
        Some(sel) => match value {
            Value::Array(items) => selector::get_array(items, sel),
            Value::Mapping(m) => selector::get_map(m, sel),
            _ => None,
        },
    }
}

fn write_value(map: &mut HashMap<Key, Value>, key: &Key, value: Value, flags: PutFlags) -> bool {
    let existed = map.contains_key(key);
    if flags.contains(PutFlags::NO_CREATE) && !existed {
        return false;
    }
    if flags.contains(PutFlags::NO_CHANGE) && existed {
        return false;
    }
    if flags.contains(PutFlags::KEEP_BOTH) {
        if let Some(old) = map.remove(key) {
            map.insert(key.clone(), selector::merge_keep_both(old, value));
            return true;
        }
    }
    map.insert(key.clone(), value);
    true
}

fn remove_value(map: &mut HashMap<Key, Value>, key: &Key, sel: Option<&Sel>) -> bool {
    match sel {
        None => map.remove(key).is_some(),
        Some(sel) => match map.get_mut(key) {
            Some(Value::Array(items)) => selector::del_array(items, sel) > 0,
            Some(Value::Mapping(m)) => selector::del_map(m, sel) > 0,
            _ => false,
        },
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_meta(&self, keys: &[Key]) -> Result<MetaMap> {
        let map = self.bucket.lock().await;
        Ok(keys.iter().filter_map(|k| map.get(k).map(|v| (k.clone(), v.type_size()))).collect())
    }

    async fn get(&self, key: &Key, sel: Option<&Sel>) -> Result<Option<Value>> {
        let map = self.bucket.lock().await;
        Ok(read_value(&map, key, sel))
    }

    async fn put(&self, key: &Key, value: Value, flags: PutFlags) -> Result<bool> {
        let mut map = self.bucket.lock().await;
        Ok(write_value(&mut map, key, value, flags))
    }

    async fn del(&self, key: &Key, sel: Option<&Sel>) -> Result<bool> {
        let mut map = self.bucket.lock().await;
        Ok(remove_value(&mut map, key, sel))
    }

    async fn get_bulk(&self, keys: &[Key], default: Value) -> Result<Vec<Value>> {
        let map = self.bucket.lock().await;
        Ok(keys.iter().map(|k| read_value(&map, k, None).unwrap_or_else(|| default.clone())).collect())
    }

    async fn put_bulk(&self, pairs: &[(Key, Value)], flags: PutFlags) -> Result<usize> {
        if flags.contains(PutFlags::ATOMICITY) {
            let map = self.bucket.lock().await;
            let ok = if flags.contains(PutFlags::NO_CREATE) {
                pairs.iter().all(|(k, _)| map.contains_key(k))
            } else if flags.contains(PutFlags::NO_CHANGE) {
                pairs.iter().all(|(k, _)| !map.contains_key(k))
            } else {
                true
            };
            drop(map);
            if !ok {
                return Ok(0);
            }
        }
        let mut map = self.bucket.lock().await;
        let mut count = 0;
        for (key, value) in pairs {
            if write_value(&mut map, key, value.clone(), flags) {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn del_bulk(&self, keys: &[Key]) -> Result<usize> {
        let mut map = self.bucket.lock().await;
        Ok(keys.iter().filter(|k| map.remove(*k).is_some()).count())
    }

    async fn substore(&self, names: &[&str]) -> Result<Box<dyn Store>> {
        let mut path = self.path.clone();
        path.extend(names.iter().map(|s| s.to_string()));
        Ok(Box::new(MemoryStore::at(path)))
    }

    async fn get_lock(&self, _name: Option<&str>) -> Result<Box<dyn StoreLock>> {
        Ok(Box::new(MemoryLock { bucket: self.bucket.clone() }))
    }
}

/// Holds the store's bucket `Arc` alive for the lock's lifetime; the
/// in-process map itself is already mutex-guarded by every other method,
/// so this lock's only job is to let a caller hold exclusive access across
/// several logical operations via `get_lock`.
struct MemoryLock {
    bucket: Bucket,
}

#[async_trait]
impl StoreLock for MemoryLock {
    async fn unlock(&self) {
        let _ = &self.bucket;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Key {
        Key::text(s)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryStore::at(vec!["test-put-get".to_string()]);
        assert!(store.put(&key("a"), Value::Int(1), PutFlags::UNCHECKED).await.unwrap());
        assert_eq!(store.get(&key("a"), None).await.unwrap(), Some(Value::Int(1)));
    }

    #[tokio::test]
    async fn no_create_fails_on_absent_key() {
        let store = MemoryStore::at(vec!["test-no-create".to_string()]);
        let applied = store.put(&key("missing"), Value::Int(1), PutFlags::NO_CREATE).await.unwrap();
        assert!(!applied);
        assert_eq!(store.get(&key("missing"), None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn no_change_fails_on_present_key() {
        let store = MemoryStore::at(vec!["test-no-change".to_string()]);
        store.put(&key("a"), Value::Int(1), PutFlags::UNCHECKED).await.unwrap();
        let applied = store.put(&key("a"), Value::Int(2), PutFlags::NO_CHANGE).await.unwrap();
        assert!(!applied);
        assert_eq!(store.get(&key("a"), None).await.unwrap(), Some(Value::Int(1)));
    }

    #[tokio::test]
    async fn keep_both_merges_maps() {
        let store = MemoryStore::at(vec!["test-keep-both".to_string()]);
        let old = Value::Mapping(crate::value::mapping_from([("a", Value::Int(1))]));
        let new = Value::Mapping(crate::value::mapping_from([("b", Value::Int(2))]));
        store.put(&key("m"), old, PutFlags::UNCHECKED).await.unwrap();
        store.put(&key("m"), new, PutFlags::KEEP_BOTH).await.unwrap();
        let merged = store.get(&key("m"), None).await.unwrap().unwrap();
        assert_eq!(merged, Value::Mapping(crate::value::mapping_from([("a", Value::Int(1)), ("b", Value::Int(2))])));
    }

    #[tokio::test]
    async fn substore_shares_bucket_with_parent_path() {
        let store = MemoryStore::at(vec!["test-substore".to_string()]);
        let sub = store.substore(&["child"]).await.unwrap();
        sub.put(&key("a"), Value::Int(7), PutFlags::UNCHECKED).await.unwrap();
        let sub2 = store.substore(&["child"]).await.unwrap();
        assert_eq!(sub2.get(&key("a"), None).await.unwrap(), Some(Value::Int(7)));
    }

    #[tokio::test]
    async fn bulk_atomicity_no_create_is_all_or_nothing() {
        let store = MemoryStore::at(vec!["test-bulk-atomic".to_string()]);
        store.put(&key("a"), Value::Int(1), PutFlags::UNCHECKED).await.unwrap();
        let pairs = vec![(key("a"), Value::Int(2)), (key("b"), Value::Int(3))];
        let applied = store.put_bulk(&pairs, PutFlags::ATOMICITY | PutFlags::NO_CREATE).await.unwrap();
        assert_eq!(applied, 0);
        assert_eq!(store.get(&key("a"), None).await.unwrap(), Some(Value::Int(1)));
        assert_eq!(store.get(&key("b"), None).await.unwrap(), None);
    }
}
