#![forbid(unsafe_code)]

//! frid — a self-describing value codec and a uniform key/selector/value
//! store engine.
//!
//! The crate is split into two halves that interlock but can be used
//! independently:
//!
//! - [`codec`] turns [`Value`] into FRID/JSON/JSON5/escaped-JSON text and
//!   back.
//! - [`store`] is a backend-agnostic key/selector/value API (memory,
//!   single-file, SQL, and remote-KV backends) that uses the codec to
//!   persist arbitrary [`Value`]s in backends that only store text.
//!
//! [`Value`]: value::Value

pub mod codec;
pub mod error;
pub mod store;
pub mod value;

pub use codec::{dump_to_string, load_from_str, OutputMode};
pub use error::FridError;
pub use store::{Key, PutFlags, Sel, Store, StoreUrl};
pub use value::{Being, TypeSize, Value};
