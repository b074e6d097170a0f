//! The backend-agnostic key/selector/value contract every backend
//! implements, grounded on `frid/kvs/store.py`'s `ValueStore` ABC.

use std::collections::HashMap;

use async_trait::async_trait;
use bitflags::bitflags;

use crate::error::Result;
use crate::store::selector::Sel;
use crate::value::{TypeSize, Value};

/// A store key: a plain text key, or a tuple of path components (used by
/// namespaced substores and multi-part natural keys alike).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Text(String),
    Tuple(Vec<String>),
}

impl Key {
    pub fn text(s: impl Into<String>) -> Self {
        Key::Text(s.into())
    }

    pub fn tuple(parts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Key::Tuple(parts.into_iter().map(Into::into).collect())
    }

    /// The path components this key is made of — a single element for
    /// [`Key::Text`], the full tuple otherwise.
    pub fn parts(&self) -> Vec<&str> {
        match self {
            Key::Text(s) => vec![s.as_str()],
            Key::Tuple(parts) => parts.iter().map(String::as_str).collect(),
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.parts().join("/"))
    }
}

bitflags! {
    /// `put` behavior flags. `UNCHECKED` is the zero value: skip every
    /// precondition check and take the fastest path available.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PutFlags: u8 {
        const UNCHECKED = 0;
        const KEEP_BOTH = 0x10;
        const NO_CHANGE = 0x20;
        const NO_CREATE = 0x40;
        const ATOMICITY = 0x80;
    }
}

/// Metadata every backend can report about a stored value without
/// decoding it in full.
pub type MetaMap = HashMap<Key, TypeSize>;

/// The uniform async contract every backend implements. A sync facade is
/// layered on top via [`crate::store::adapters::AsyncToSyncStore`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Reports `(kind, size)` for each key, without cross-key atomicity.
    async fn get_meta(&self, keys: &[Key]) -> Result<MetaMap>;

    /// Reads a value, optionally narrowed by a selector. `None` means the
    /// key (or the selected sub-value) does not exist — distinct from a
    /// stored `Value::Null`.
    async fn get(&self, key: &Key, sel: Option<&Sel>) -> Result<Option<Value>>;

    /// Writes a value under `key`, honoring `flags`. Returns whether the
    /// store actually changed.
    async fn put(&self, key: &Key, value: Value, flags: PutFlags) -> Result<bool>;

    /// Removes a key, or the part of it `sel` selects. Returns whether
    /// anything was actually removed.
    async fn del(&self, key: &Key, sel: Option<&Sel>) -> Result<bool>;

    /// Reads many keys under a single lock, substituting `default` for any
    /// key that doesn't exist.
    async fn get_bulk(&self, keys: &[Key], default: Value) -> Result<Vec<Value>>;

    /// Writes many key/value pairs, returning how many entries actually
    /// changed. Honors `ATOMICITY` as an all-or-nothing precondition.
    async fn put_bulk(&self, pairs: &[(Key, Value)], flags: PutFlags) -> Result<usize>;

    /// Removes many keys, returning how many existed.
    async fn del_bulk(&self, keys: &[Key]) -> Result<usize>;

    /// Returns a namespaced view sharing this store's backing state.
    async fn substore(&self, names: &[&str]) -> Result<Box<dyn Store>>;

    /// Acquires a scoped mutual-exclusion handle, named or store-global.
    async fn get_lock(&self, name: Option<&str>) -> Result<Box<dyn StoreLock>>;
}

/// A held lock, released on drop or explicit [`StoreLock::unlock`].
#[async_trait]
pub trait StoreLock: Send + Sync {
    async fn unlock(&self);
}

/// Checks whether every key in `keys` is present, per `get_meta` — the
/// precondition `ATOMICITY | NO_CREATE` bulk puts require before proceeding.
pub async fn all_present(store: &dyn Store, keys: &[Key]) -> Result<bool> {
    let meta = store.get_meta(keys).await?;
    Ok(keys.iter().all(|k| meta.contains_key(k)))
}

/// Checks whether every key in `keys` is absent — the precondition
/// `ATOMICITY | NO_CHANGE` bulk puts require before proceeding.
pub async fn all_absent(store: &dyn Store, keys: &[Key]) -> Result<bool> {
    let meta = store.get_meta(keys).await?;
    Ok(keys.iter().all(|k| !meta.contains_key(k)))
}
