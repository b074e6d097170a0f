//! Single-file-per-key backend: each key is a `.kvs` file under a root
//! directory, committed and locked via atomic rename against a sibling
//! `.tmp` file.
//!
//! Grounded on `frid/kvs/files.py`'s `FileIOAgent`/`_move_or_create` commit
//! protocol, with the rename-then-mutate-then-rename-back shape borrowed
//! from the teacher repo's own `atomic_write` helper (temp file plus
//! `uuid`-free sibling name, `tracing` instrumentation at every step).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::codec::{dump_to_string, load_from_str, OutputMode};
use crate::error::{FridError, Result};
use crate::store::selector::{self, Sel};
use crate::store::traits::{Key, MetaMap, PutFlags, Store, StoreLock};
use crate::value::Value;

const MAX_LOCK_RETRIES: u32 = 20;
const RETRY_BACKOFF: Duration = Duration::from_millis(5);

/// A backend rooted at a directory on disk.
#[derive(Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStore { root: root.into() }
    }

    fn path_for(&self, key: &Key) -> PathBuf {
        let mut path = self.root.clone();
        for part in key.parts() {
            path.push(escape_component(part));
        }
        path
    }

    fn kvs_path(&self, key: &Key) -> PathBuf {
        append_suffix(self.path_for(key), "kvs")
    }

    fn tmp_path(&self, key: &Key) -> PathBuf {
        append_suffix(self.path_for(key), "tmp")
    }

    /// Acquires the rename-based lock for `key`, returning the previously
    /// committed content (`None` if the key didn't exist) and whether the
    /// lock was obtained by renaming an existing file (`true`) or creating
    /// a fresh, empty `tmp` (`false`).
    async fn acquire(&self, key: &Key) -> Result<(Option<String>, bool)> {
        let kvs = self.kvs_path(key);
        let tmp = self.tmp_path(key);
        if let Some(parent) = tmp.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FridError::backend("file", format!("creating directory {}", parent.display()), e))?;
        }
        for attempt in 0..MAX_LOCK_RETRIES {
            match tokio::fs::rename(&kvs, &tmp).await {
                Ok(()) => {
                    let content = tokio::fs::read_to_string(&tmp)
                        .await
                        .map_err(|e| FridError::backend("file", format!("reading {}", tmp.display()), e))?;
                    return Ok((Some(content), true));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&tmp).await {
                        Ok(_) => return Ok((None, false)),
                        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                            debug!(key = %key, attempt, "file store lock contended, retrying");
                            tokio::time::sleep(RETRY_BACKOFF).await;
                            continue;
                        }
                        Err(e) => return Err(FridError::backend("file", format!("creating {}", tmp.display()), e)),
                    }
                }
                Err(e) => return Err(FridError::backend("file", format!("locking {}", kvs.display()), e)),
            }
        }
        Err(FridError::backend_msg("file", format!("exceeded lock retries for key {key}")))
    }

    async fn commit(&self, key: &Key, content: &str) -> Result<()> {
        let tmp = self.tmp_path(key);
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| FridError::backend("file", format!("writing {}", tmp.display()), e))?;
        tokio::fs::rename(&tmp, self.kvs_path(key))
            .await
            .map_err(|e| FridError::backend("file", "committing write", e))?;
        Ok(())
    }

    async fn rollback(&self, key: &Key, existed: bool) -> Result<()> {
        let tmp = self.tmp_path(key);
        if existed {
            tokio::fs::rename(&tmp, self.kvs_path(key))
                .await
                .map_err(|e| FridError::backend("file", "rolling back write", e))?;
        } else {
            tokio::fs::remove_file(&tmp)
                .await
                .map_err(|e| FridError::backend("file", "removing unused lock file", e))?;
        }
        Ok(())
    }

    async fn delete_commit(&self, key: &Key) -> Result<()> {
        tokio::fs::remove_file(self.tmp_path(key))
            .await
            .map_err(|e| FridError::backend("file", "committing delete", e))?;
        Ok(())
    }
}

fn escape_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '/' || c == '\\' || c == '%' || c.is_control() {
            out.push_str(&format!("%{:02x}", c as u32));
        } else {
            out.push(c);
        }
    }
    if out.is_empty() {
        out.push_str("%00");
    }
    out
}

fn append_suffix(mut path: PathBuf, suffix: &str) -> PathBuf {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
    path.set_file_name(format!("{name}.{suffix}"));
    path
}

fn decode(content: &str) -> Result<Value> {
    if content.trim().is_empty() {
        return Ok(Value::Null);
    }
    load_from_str(content)
}

fn encode(value: &Value) -> Result<String> {
    dump_to_string(value, OutputMode::Frid)
}

#[async_trait]
impl Store for FileStore {
    async fn get_meta(&self, keys: &[Key]) -> Result<MetaMap> {
        let mut out = MetaMap::new();
        for key in keys {
            let path = self.kvs_path(key);
            if let Ok(content) = tokio::fs::read_to_string(&path).await {
                out.insert(key.clone(), decode(&content)?.type_size());
            }
        }
        Ok(out)
    }

    async fn get(&self, key: &Key, sel: Option<&Sel>) -> Result<Option<Value>> {
        let path = self.kvs_path(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FridError::backend("file", format!("reading {}", path.display()), e)),
        };
        let value = decode(&content)?;
        match sel {
            None => Ok(Some(value)),
            Some(sel) => Ok(match value {
                Value::Array(items) => selector::get_array(&items, sel),
                Value::Mapping(m) => selector::get_map(&m, sel),
                _ => None,
            }),
        }
    }

    async fn put(&self, key: &Key, value: Value, flags: PutFlags) -> Result<bool> {
        let (prior, existed) = self.acquire(key).await?;
        if flags.contains(PutFlags::NO_CREATE) && !existed {
            self.rollback(key, existed).await?;
            return Ok(false);
        }
        if flags.contains(PutFlags::NO_CHANGE) && existed {
            self.rollback(key, existed).await?;
            return Ok(false);
        }
        let final_value = if flags.contains(PutFlags::KEEP_BOTH) {
            match prior {
                Some(content) if !content.trim().is_empty() => selector::merge_keep_both(decode(&content)?, value),
                _ => value,
            }
        } else {
            value
        };
        let encoded = encode(&final_value)?;
        self.commit(key, &encoded).await?;
        Ok(true)
    }

    async fn del(&self, key: &Key, sel: Option<&Sel>) -> Result<bool> {
        let (prior, existed) = self.acquire(key).await?;
        if !existed {
            self.rollback(key, existed).await?;
            return Ok(false);
        }
        let content = prior.unwrap_or_default();
        match sel {
            None => {
                self.delete_commit(key).await?;
                Ok(true)
            }
            Some(sel) => {
                let mut value = decode(&content)?;
                let removed = match &mut value {
                    Value::Array(items) => selector::del_array(items, sel) > 0,
                    Value::Mapping(m) => selector::del_map(m, sel) > 0,
                    _ => false,
                };
                if !removed {
                    self.rollback(key, existed).await?;
                    return Ok(false);
                }
                let encoded = encode(&value)?;
                self.commit(key, &encoded).await?;
                Ok(true)
            }
        }
    }

    async fn get_bulk(&self, keys: &[Key], default: Value) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.get(key, None).await?.unwrap_or_else(|| default.clone()));
        }
        Ok(out)
    }

    async fn put_bulk(&self, pairs: &[(Key, Value)], flags: PutFlags) -> Result<usize> {
        if flags.contains(PutFlags::ATOMICITY) {
            let keys: Vec<Key> = pairs.iter().map(|(k, _)| k.clone()).collect();
            let meta = self.get_meta(&keys).await?;
            let ok = if flags.contains(PutFlags::NO_CREATE) {
                keys.iter().all(|k| meta.contains_key(k))
            } else if flags.contains(PutFlags::NO_CHANGE) {
                keys.iter().all(|k| !meta.contains_key(k))
            } else {
                true
            };
            if !ok {
                warn!("bulk put precondition failed, applying nothing");
                return Ok(0);
            }
        }
        let mut count = 0;
        for (key, value) in pairs {
            if self.put(key, value.clone(), flags).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn del_bulk(&self, keys: &[Key]) -> Result<usize> {
        let mut count = 0;
        for key in keys {
            if self.del(key, None).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn substore(&self, names: &[&str]) -> Result<Box<dyn Store>> {
        let mut root = self.root.clone();
        for name in names {
            root.push(escape_component(name));
        }
        Ok(Box::new(FileStore::new(root)))
    }

    async fn get_lock(&self, name: Option<&str>) -> Result<Box<dyn StoreLock>> {
        let path = match name {
            Some(name) => self.root.join(format!("{}.lock", escape_component(name))),
            None => self.root.join("__store__.lock"),
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FridError::backend("file", "creating lock directory", e))?;
        }
        Ok(Box::new(FileLock { path }))
    }
}

fn path_display(p: &Path) -> String {
    p.display().to_string()
}

struct FileLock {
    path: PathBuf,
}

#[async_trait]
impl StoreLock for FileLock {
    async fn unlock(&self) {
        let _ = tokio::fs::remove_file(&self.path).await;
        debug!(path = %path_display(&self.path), "released file store lock");
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
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.put(&key("a"), Value::Int(42), PutFlags::UNCHECKED).await.unwrap());
        assert_eq!(store.get(&key("a"), None).await.unwrap(), Some(Value::Int(42)));
    }

    #[tokio::test]
    async fn no_create_fails_on_absent_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let applied = store.put(&key("missing"), Value::Int(1), PutFlags::NO_CREATE).await.unwrap();
        assert!(!applied);
        assert!(!dir.path().join("missing.kvs").exists());
        assert!(!dir.path().join("missing.tmp").exists());
    }

    #[tokio::test]
    async fn delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.put(&key("a"), Value::Int(1), PutFlags::UNCHECKED).await.unwrap();
        assert!(store.del(&key("a"), None).await.unwrap());
        assert_eq!(store.get(&key("a"), None).await.unwrap(), None);
        assert!(!dir.path().join("a.tmp").exists());
    }

    #[tokio::test]
    async fn keep_both_merges_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let old = Value::Mapping(crate::value::mapping_from([("a", Value::Int(1))]));
        let new = Value::Mapping(crate::value::mapping_from([("b", Value::Int(2))]));
        store.put(&key("m"), old, PutFlags::UNCHECKED).await.unwrap();
        store.put(&key("m"), new, PutFlags::KEEP_BOTH).await.unwrap();
        let merged = store.get(&key("m"), None).await.unwrap().unwrap();
        assert_eq!(merged, Value::Mapping(crate::value::mapping_from([("a", Value::Int(1)), ("b", Value::Int(2))])));
    }
}
