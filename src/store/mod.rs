//! The uniform key/selector/value store engine: one async `Store` contract
//! with pluggable backends (memory, file, SQL, remote-KV) and the
//! sync/async adapters that bridge them.

pub mod adapters;
pub mod file;
pub mod memory;
pub mod remote;
pub mod selector;
pub mod sql;
pub mod traits;
pub mod url;

pub use adapters::{BlockingStore, PassthroughStore};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use remote::RedisStore;
pub use selector::Sel;
pub use sql::{SqlStore, SqlStoreConfig};
pub use traits::{all_absent, all_present, Key, MetaMap, PutFlags, Store, StoreLock};
pub use url::StoreUrl;
