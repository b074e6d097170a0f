//! Store URL scheme dispatch: `memory://`, `file://<path>`, `redis://…`, or
//! a bare/SQL DSN (an empty scheme defaults to SQL).
//!
//! Grounded on `frid/kvs/__main__.py`'s scheme-to-backend dispatch table
//! (the only place the Python original parses a store URL) and the
//! teacher's `providers::factory` alias dispatch (`src/providers/mod.rs`)
//! for the shape of a `match`-on-scheme constructor table.

use crate::error::{FridError, Result};
use crate::store::file::FileStore;
use crate::store::memory::MemoryStore;
use crate::store::traits::Store;

/// A parsed store URL, not yet connected to a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreUrl {
    Memory { path: Vec<String> },
    File { root: String },
    Redis { url: String },
    Sql { dsn: String },
}

impl StoreUrl {
    /// Parses a store URL per the scheme table: `memory://a/b`, `file:///tmp/x`,
    /// `redis://host:port/db`, or a bare string (treated as a SQL DSN).
    pub fn parse(s: &str) -> Result<Self> {
        if let Some(rest) = s.strip_prefix("memory://") {
            let path = rest.split('/').filter(|p| !p.is_empty()).map(str::to_string).collect();
            return Ok(StoreUrl::Memory { path });
        }
        if let Some(rest) = s.strip_prefix("file://") {
            if rest.is_empty() {
                return Err(FridError::config("file:// URL is missing a path"));
            }
            return Ok(StoreUrl::File { root: rest.to_string() });
        }
        if s.starts_with("redis://") || s.starts_with("rediss://") {
            return Ok(StoreUrl::Redis { url: s.to_string() });
        }
        if s.is_empty() {
            return Err(FridError::config("store URL is empty"));
        }
        // Bare string or any other scheme (postgres://, sqlite://, mysql://,
        // or a driver-less DSN) is passed through to the SQL backend, which
        // hands it straight to `sqlx`'s own URL parsing.
        Ok(StoreUrl::Sql { dsn: s.to_string() })
    }

    /// Constructs the in-process backends directly (memory, file); SQL and
    /// Redis require an async connection step, so callers use
    /// [`StoreUrl::connect`] for those instead.
    pub fn open_local(&self) -> Result<Box<dyn Store>> {
        match self {
            StoreUrl::Memory { path } => Ok(Box::new(MemoryStore::at(path.clone()))),
            StoreUrl::File { root } => Ok(Box::new(FileStore::new(root))),
            StoreUrl::Redis { .. } | StoreUrl::Sql { .. } => {
                Err(FridError::config("this scheme requires an async connection; use StoreUrl::connect"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_memory_scheme_with_path() {
        let url = StoreUrl::parse("memory://a/b").unwrap();
        assert_eq!(url, StoreUrl::Memory { path: vec!["a".to_string(), "b".to_string()] });
    }

    #[test]
    fn parses_file_scheme() {
        let url = StoreUrl::parse("file:///tmp/store").unwrap();
        assert_eq!(url, StoreUrl::File { root: "/tmp/store".to_string() });
    }

    #[test]
    fn parses_redis_scheme() {
        let url = StoreUrl::parse("redis://localhost:6379/0").unwrap();
        assert_eq!(url, StoreUrl::Redis { url: "redis://localhost:6379/0".to_string() });
    }

    #[test]
    fn bare_dsn_defaults_to_sql() {
        let url = StoreUrl::parse("postgres://user@host/db").unwrap();
        assert_eq!(url, StoreUrl::Sql { dsn: "postgres://user@host/db".to_string() });
    }

    #[test]
    fn empty_url_is_a_config_error() {
        assert!(StoreUrl::parse("").is_err());
    }
}
