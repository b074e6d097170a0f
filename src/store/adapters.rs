//! Sync/async bridging over the uniform `Store` contract.
//!
//! Grounded on `frid/kvs/store.py`'s `AsyncToSyncStoreMixin`/
//! `SyncToAsyncStoreMixin`: one mixin reimplements the async half by
//! forwarding directly to a (blocking-but-fast) sync implementation, the
//! other reimplements the blocking half by driving an async implementation
//! to completion on an event loop. Every backend in this crate is written
//! async-first, so only the async→sync direction (the teacher calls it
//! `SyncToAsyncStoreMixin`, named for the facade it produces) is needed in
//! practice; the sync→async direction is kept as a thin pass-through for
//! any future backend that is genuinely synchronous end-to-end (e.g. a
//! pure in-memory store with no suspension points).

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::store::selector::Sel;
use crate::store::traits::{Key, MetaMap, PutFlags, Store, StoreLock};
use crate::value::Value;

/// Drives an `Arc<dyn Store>`'s async methods to completion, one call at a
/// time, for callers with no async runtime of their own.
///
/// Construct with [`BlockingStore::new`] to spin up a private current-thread
/// runtime (the "owns an event loop" case), or [`BlockingStore::from_handle`]
/// to reuse a runtime that is already running elsewhere on the process (the
/// "borrows one" case) — the latter must be called from outside that
/// runtime's own worker threads, matching `tokio`'s `block_in_place` rule.
pub struct BlockingStore {
    store: Arc<dyn Store>,
    runtime: RuntimeHandle,
}

enum RuntimeHandle {
    Owned(tokio::runtime::Runtime),
    Borrowed(tokio::runtime::Handle),
}

impl BlockingStore {
    pub fn new(store: Arc<dyn Store>) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        Ok(BlockingStore { store, runtime: RuntimeHandle::Owned(runtime) })
    }

    pub fn from_handle(store: Arc<dyn Store>, handle: tokio::runtime::Handle) -> Self {
        BlockingStore { store, runtime: RuntimeHandle::Borrowed(handle) }
    }

    fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        match &self.runtime {
            RuntimeHandle::Owned(rt) => rt.block_on(fut),
            RuntimeHandle::Borrowed(handle) => tokio::task::block_in_place(|| handle.block_on(fut)),
        }
    }

    pub fn get_meta(&self, keys: &[Key]) -> Result<MetaMap> {
        self.block_on(self.store.get_meta(keys))
    }

    pub fn get(&self, key: &Key, sel: Option<&Sel>) -> Result<Option<Value>> {
        self.block_on(self.store.get(key, sel))
    }

    pub fn put(&self, key: &Key, value: Value, flags: PutFlags) -> Result<bool> {
        self.block_on(self.store.put(key, value, flags))
    }

    pub fn del(&self, key: &Key, sel: Option<&Sel>) -> Result<bool> {
        self.block_on(self.store.del(key, sel))
    }

    pub fn get_bulk(&self, keys: &[Key], default: Value) -> Result<Vec<Value>> {
        self.block_on(self.store.get_bulk(keys, default))
    }

    pub fn put_bulk(&self, pairs: &[(Key, Value)], flags: PutFlags) -> Result<usize> {
        self.block_on(self.store.put_bulk(pairs, flags))
    }

    pub fn del_bulk(&self, keys: &[Key]) -> Result<usize> {
        self.block_on(self.store.del_bulk(keys))
    }

    pub fn substore(&self, names: &[&str]) -> Result<BlockingStore> {
        let sub = self.block_on(self.store.substore(names))?;
        let runtime = match &self.runtime {
            RuntimeHandle::Owned(rt) => RuntimeHandle::Borrowed(rt.handle().clone()),
            RuntimeHandle::Borrowed(handle) => RuntimeHandle::Borrowed(handle.clone()),
        };
        Ok(BlockingStore { store: Arc::from(sub), runtime })
    }
}

/// Wraps a store that is cheap enough to treat as synchronous (no real
/// suspension points — an in-memory map, say) so it can satisfy the async
/// `Store` contract by forwarding every call straight through.
///
/// This is the `sync→async` direction from the teacher's mixin pair. It
/// carries no executor of its own: "synchronous" here means the wrapped
/// value's own methods never actually await anything, so forwarding is
/// always a same-poll resolution, never a blocking-pool hop.
pub struct PassthroughStore<S> {
    inner: S,
}

impl<S> PassthroughStore<S> {
    pub fn new(inner: S) -> Self {
        PassthroughStore { inner }
    }
}

#[async_trait]
impl<S: Store> Store for PassthroughStore<S> {
    async fn get_meta(&self, keys: &[Key]) -> Result<MetaMap> {
        self.inner.get_meta(keys).await
    }

    async fn get(&self, key: &Key, sel: Option<&Sel>) -> Result<Option<Value>> {
        self.inner.get(key, sel).await
    }

    async fn put(&self, key: &Key, value: Value, flags: PutFlags) -> Result<bool> {
        self.inner.put(key, value, flags).await
    }

    async fn del(&self, key: &Key, sel: Option<&Sel>) -> Result<bool> {
        self.inner.del(key, sel).await
    }

    async fn get_bulk(&self, keys: &[Key], default: Value) -> Result<Vec<Value>> {
        self.inner.get_bulk(keys, default).await
    }

    async fn put_bulk(&self, pairs: &[(Key, Value)], flags: PutFlags) -> Result<usize> {
        self.inner.put_bulk(pairs, flags).await
    }

    async fn del_bulk(&self, keys: &[Key]) -> Result<usize> {
        self.inner.del_bulk(keys).await
    }

    async fn substore(&self, names: &[&str]) -> Result<Box<dyn Store>> {
        self.inner.substore(names).await
    }

    async fn get_lock(&self, name: Option<&str>) -> Result<Box<dyn StoreLock>> {
        self.inner.get_lock(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[test]
    fn blocking_store_round_trips_outside_any_runtime() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::at(vec!["test-blocking".to_string()]));
        let blocking = BlockingStore::new(store).unwrap();
        let key = Key::text("a");
        assert!(blocking.put(&key, Value::Int(1), PutFlags::UNCHECKED).unwrap());
        assert_eq!(blocking.get(&key, None).unwrap(), Some(Value::Int(1)));
    }

    #[tokio::test]
    async fn passthrough_store_forwards_every_call() {
        let inner = MemoryStore::at(vec!["test-passthrough".to_string()]);
        let wrapped = PassthroughStore::new(inner);
        let key = Key::text("a");
        assert!(wrapped.put(&key, Value::text("x"), PutFlags::UNCHECKED).await.unwrap());
        assert_eq!(wrapped.get(&key, None).await.unwrap(), Some(Value::text("x")));
    }
}
