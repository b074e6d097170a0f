//! Remote key/value backend over a Redis-compatible server, mapping
//! arrays onto Redis lists and maps onto Redis hashes so partial
//! selectors can be served natively instead of read-modify-write.
//!
//! Grounded on `frid/kvs/redis.py`'s `_RedisBaseStore`/`RedisValueStore`:
//! the `#!`/`#=` tag-prefix convention for scalar values (FRID-encoded
//! text vs. raw blob), the namespace-prefix substore scheme, and the
//! native-list/native-hash fast paths for arrays and maps.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::codec::{dump_to_string, load_from_str, OutputMode};
use crate::error::{FridError, Result};
use crate::store::selector::Sel;
use crate::store::traits::{Key, MetaMap, PutFlags, Store, StoreLock};
use crate::value::{Mapping, Value};

const FRID_PREFIX: &str = "#!";
const BLOB_PREFIX: &str = "#=";
const NAMESPACE_SEP: char = '\t';

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    name_prefix: String,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| FridError::backend("redis", "opening client", e))?;
        let conn = ConnectionManager::new(client).await.map_err(|e| FridError::backend("redis", "connecting", e))?;
        Ok(RedisStore { conn, name_prefix: String::new() })
    }

    fn key_name(&self, key: &Key) -> String {
        let parts = key.parts();
        let joined = if parts.len() == 1 { parts[0].to_string() } else { parts.join(&NAMESPACE_SEP.to_string()) };
        format!("{}{}", self.name_prefix, joined)
    }

    fn encode_scalar(value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::Blob(b) => {
                let mut out = BLOB_PREFIX.as_bytes().to_vec();
                out.extend_from_slice(b);
                Ok(out)
            }
            Value::Text(s) if !s.starts_with(BLOB_PREFIX) && !s.starts_with(FRID_PREFIX) => Ok(s.clone().into_bytes()),
            other => Ok(format!("{FRID_PREFIX}{}", dump_to_string(other, OutputMode::Frid)?).into_bytes()),
        }
    }

    fn decode_scalar(data: &[u8]) -> Result<Value> {
        if let Some(rest) = data.strip_prefix(FRID_PREFIX.as_bytes()) {
            let s = std::str::from_utf8(rest).map_err(|e| FridError::backend("redis", "decoding frid payload as utf-8", e))?;
            return load_from_str(s);
        }
        if let Some(rest) = data.strip_prefix(BLOB_PREFIX.as_bytes()) {
            return Ok(Value::Blob(rest.to_vec()));
        }
        let s = String::from_utf8_lossy(data).into_owned();
        Ok(Value::Text(s))
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get_meta(&self, keys: &[Key]) -> Result<MetaMap> {
        let mut conn = self.conn.clone();
        let mut out = MetaMap::new();
        for key in keys {
            let name = self.key_name(key);
            let kind: String = redis::cmd("TYPE").arg(&name).query_async(&mut conn).await.map_err(|e| FridError::backend("redis", "TYPE", e))?;
            let size = match kind.as_str() {
                "list" => {
                    let n: usize = conn.llen(&name).await.map_err(|e| FridError::backend("redis", "LLEN", e))?;
                    Some(crate::value::TypeSize { kind: crate::value::ValueKind::List, size: n })
                }
                "hash" => {
                    let n: usize = conn.hlen(&name).await.map_err(|e| FridError::backend("redis", "HLEN", e))?;
                    Some(crate::value::TypeSize { kind: crate::value::ValueKind::Dict, size: n })
                }
                "string" => {
                    let data: Option<Vec<u8>> = conn.get(&name).await.map_err(|e| FridError::backend("redis", "GET", e))?;
                    data.map(|d| Self::decode_scalar(&d)).transpose()?.map(|v| v.type_size())
                }
                _ => None,
            };
            if let Some(size) = size {
                out.insert(key.clone(), size);
            }
        }
        Ok(out)
    }

    async fn get(&self, key: &Key, sel: Option<&Sel>) -> Result<Option<Value>> {
        let mut conn = self.conn.clone();
        let name = self.key_name(key);
        let kind: String = redis::cmd("TYPE").arg(&name).query_async(&mut conn).await.map_err(|e| FridError::backend("redis", "TYPE", e))?;
        match kind.as_str() {
            "none" => Ok(None),
            "list" => {
                let raw: Vec<Vec<u8>> = conn.lrange(&name, 0, -1).await.map_err(|e| FridError::backend("redis", "LRANGE", e))?;
                let items = raw.iter().map(|d| Self::decode_scalar(d)).collect::<Result<Vec<_>>>()?;
                match sel {
                    None => Ok(Some(Value::Array(items))),
                    Some(sel) => Ok(crate::store::selector::get_array(&items, sel)),
                }
            }
            "hash" => {
                let raw: Vec<(String, Vec<u8>)> = conn.hgetall(&name).await.map_err(|e| FridError::backend("redis", "HGETALL", e))?;
                let mut map = Mapping::new();
                for (k, v) in raw {
                    map.insert(k, Self::decode_scalar(&v)?);
                }
                match sel {
                    None => Ok(Some(Value::Mapping(map))),
                    Some(sel) => Ok(crate::store::selector::get_map(&map, sel)),
                }
            }
            _ => {
                let data: Option<Vec<u8>> = conn.get(&name).await.map_err(|e| FridError::backend("redis", "GET", e))?;
                data.map(|d| Self::decode_scalar(&d)).transpose()
            }
        }
    }

    async fn put(&self, key: &Key, value: Value, flags: PutFlags) -> Result<bool> {
        let mut conn = self.conn.clone();
        let name = self.key_name(key);
        match &value {
            Value::Array(items) => {
                let encoded: Vec<Vec<u8>> = items.iter().map(Self::encode_scalar).collect::<Result<_>>()?;
                if flags.contains(PutFlags::KEEP_BOTH) && !flags.contains(PutFlags::NO_CHANGE) {
                    if flags.contains(PutFlags::NO_CREATE) {
                        let n: i64 = redis::cmd("RPUSHX").arg(&name).arg(&encoded).query_async(&mut conn).await.map_err(|e| FridError::backend("redis", "RPUSHX", e))?;
                        return Ok(n > 0);
                    }
                    let _: i64 = conn.rpush(&name, &encoded).await.map_err(|e| FridError::backend("redis", "RPUSH", e))?;
                    return Ok(true);
                }
                let exists: bool = conn.exists(&name).await.map_err(|e| FridError::backend("redis", "EXISTS", e))?;
                if exists && flags.contains(PutFlags::NO_CHANGE) {
                    return Ok(false);
                }
                if !exists && flags.contains(PutFlags::NO_CREATE) {
                    return Ok(false);
                }
                if exists {
                    let _: () = conn.del(&name).await.map_err(|e| FridError::backend("redis", "DEL", e))?;
                }
                let _: i64 = conn.rpush(&name, &encoded).await.map_err(|e| FridError::backend("redis", "RPUSH", e))?;
                Ok(true)
            }
            Value::Mapping(map) => {
                let pairs: Vec<(String, Vec<u8>)> =
                    map.iter().map(|(k, v)| Self::encode_scalar(v).map(|b| (k.to_string(), b))).collect::<Result<_>>()?;
                if flags.contains(PutFlags::KEEP_BOTH) && !flags.intersects(PutFlags::NO_CHANGE | PutFlags::NO_CREATE) {
                    let _: () = conn.hset_multiple(&name, &pairs).await.map_err(|e| FridError::backend("redis", "HSET", e))?;
                    return Ok(true);
                }
                let exists: bool = conn.exists(&name).await.map_err(|e| FridError::backend("redis", "EXISTS", e))?;
                if exists && flags.contains(PutFlags::NO_CHANGE) {
                    return Ok(false);
                }
                if !exists && flags.contains(PutFlags::NO_CREATE) {
                    return Ok(false);
                }
                if exists && !flags.contains(PutFlags::KEEP_BOTH) {
                    let _: () = conn.del(&name).await.map_err(|e| FridError::backend("redis", "DEL", e))?;
                }
                let _: () = conn.hset_multiple(&name, &pairs).await.map_err(|e| FridError::backend("redis", "HSET", e))?;
                Ok(true)
            }
            scalar => {
                let nx = flags.contains(PutFlags::NO_CHANGE);
                let xx = flags.contains(PutFlags::NO_CREATE);
                if flags.contains(PutFlags::KEEP_BOTH) {
                    let existing: Option<Vec<u8>> = conn.get(&name).await.map_err(|e| FridError::backend("redis", "GET", e))?;
                    let merged = match existing {
                        Some(d) => crate::store::selector::merge_keep_both(Self::decode_scalar(&d)?, scalar.clone()),
                        None => scalar.clone(),
                    };
                    let encoded = Self::encode_scalar(&merged)?;
                    return set_with_flags(&mut conn, &name, &encoded, nx, xx).await;
                }
                let encoded = Self::encode_scalar(scalar)?;
                set_with_flags(&mut conn, &name, &encoded, nx, xx).await
            }
        }
    }

    async fn del(&self, key: &Key, sel: Option<&Sel>) -> Result<bool> {
        let mut conn = self.conn.clone();
        let name = self.key_name(key);
        match sel {
            None => {
                let n: i64 = conn.del(&name).await.map_err(|e| FridError::backend("redis", "DEL", e))?;
                Ok(n > 0)
            }
            Some(Sel::Key(k)) => {
                let n: i64 = conn.hdel(&name, k).await.map_err(|e| FridError::backend("redis", "HDEL", e))?;
                Ok(n > 0)
            }
            Some(Sel::KeySet(keys)) => {
                let n: i64 = conn.hdel(&name, keys).await.map_err(|e| FridError::backend("redis", "HDEL", e))?;
                Ok(n > 0)
            }
            Some(sel) => {
                // Index/range/slice selectors have no native Redis primitive;
                // fall back to read-modify-write for the list case.
                let raw: Vec<Vec<u8>> = conn.lrange(&name, 0, -1).await.map_err(|e| FridError::backend("redis", "LRANGE", e))?;
                if raw.is_empty() {
                    return Ok(false);
                }
                let mut items = raw.iter().map(|d| Self::decode_scalar(d)).collect::<Result<Vec<_>>>()?;
                let removed = crate::store::selector::del_array(&mut items, sel);
                if removed == 0 {
                    return Ok(false);
                }
                let encoded: Vec<Vec<u8>> = items.iter().map(Self::encode_scalar).collect::<Result<_>>()?;
                let _: () = conn.del(&name).await.map_err(|e| FridError::backend("redis", "DEL", e))?;
                if !encoded.is_empty() {
                    let _: i64 = conn.rpush(&name, &encoded).await.map_err(|e| FridError::backend("redis", "RPUSH", e))?;
                }
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
        let mut prefix = if self.name_prefix.is_empty() {
            String::new()
        } else {
            format!("{}{}", self.name_prefix, NAMESPACE_SEP)
        };
        prefix.push_str(&names.join(&NAMESPACE_SEP.to_string()));
        prefix.push(NAMESPACE_SEP);
        Ok(Box::new(RedisStore { conn: self.conn.clone(), name_prefix: prefix }))
    }

    async fn get_lock(&self, name: Option<&str>) -> Result<Box<dyn StoreLock>> {
        let token = uuid::Uuid::new_v4().to_string();
        let lock_name = format!("{}{}\x0b*LOCK*", self.name_prefix, name.unwrap_or("*GLOBAL*"));
        let mut conn = self.conn.clone();
        let acquired: bool = redis::cmd("SET")
            .arg(&lock_name)
            .arg(&token)
            .arg("NX")
            .arg("EX")
            .arg(30)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map(|r| r.is_some())
            .map_err(|e| FridError::backend("redis", "SET NX lock", e))?;
        if !acquired {
            return Err(FridError::conflict(lock_name, "lock already held"));
        }
        Ok(Box::new(RedisLock { conn, name: lock_name, token }))
    }
}

async fn set_with_flags(conn: &mut ConnectionManager, name: &str, encoded: &[u8], nx: bool, xx: bool) -> Result<bool> {
    let mut cmd = redis::cmd("SET");
    cmd.arg(name).arg(encoded);
    if nx {
        cmd.arg("NX");
    }
    if xx {
        cmd.arg("XX");
    }
    let result: Option<String> = cmd.query_async(conn).await.map_err(|e| FridError::backend("redis", "SET", e))?;
    Ok(result.is_some())
}

struct RedisLock {
    conn: ConnectionManager,
    name: String,
    token: String,
}

#[async_trait]
impl StoreLock for RedisLock {
    async fn unlock(&self) {
        let mut conn = self.conn.clone();
        // Only clear the lock if it still holds our token (compare-and-delete
        // via a small Lua script, the usual Redis mutex-release idiom).
        let script = redis::Script::new(
            "if redis.call('GET', KEYS[1]) == ARGV[1] then return redis.call('DEL', KEYS[1]) else return 0 end",
        );
        let _: redis::RedisResult<i64> = script.key(&self.name).arg(&self.token).invoke_async(&mut conn).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::mapping_from;

    #[test]
    fn encode_scalar_tags_blob_with_prefix() {
        let encoded = RedisStore::encode_scalar(&Value::Blob(vec![1, 2, 3])).unwrap();
        assert!(encoded.starts_with(BLOB_PREFIX.as_bytes()));
    }

    #[test]
    fn encode_scalar_leaves_plain_text_untagged() {
        let encoded = RedisStore::encode_scalar(&Value::text("hello")).unwrap();
        assert_eq!(encoded, b"hello");
    }

    #[test]
    fn encode_scalar_tags_non_text_with_frid_prefix() {
        let encoded = RedisStore::encode_scalar(&Value::Int(42)).unwrap();
        assert!(encoded.starts_with(FRID_PREFIX.as_bytes()));
    }

    #[test]
    fn decode_scalar_round_trips_through_encode() {
        let original = Value::Mapping(mapping_from([("a", Value::Int(1))]));
        let encoded = RedisStore::encode_scalar(&original).unwrap();
        let decoded = RedisStore::decode_scalar(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn decode_scalar_treats_text_starting_with_frid_prefix_literally_as_escaped() {
        // A text value that happens to start with "#!" gets re-tagged with
        // the frid prefix at encode time rather than colliding with it.
        let encoded = RedisStore::encode_scalar(&Value::text("#!not-really-frid")).unwrap();
        let decoded = RedisStore::decode_scalar(&encoded).unwrap();
        assert_eq!(decoded, Value::text("#!not-really-frid"));
    }
}
