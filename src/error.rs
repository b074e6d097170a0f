//! Typed errors for the codec and store engine.
//!
//! Each variant carries the context its error kind needs to explain itself.
//! Every variant can render itself as a self-describing [`Value`] via
//! [`FridError::to_value`] — `error`, optional `cause`/`notes`, and `venue`
//! — mirroring how a rich `thiserror` enum renders for a JSON-output mode,
//! just aimed at `Value` instead of `serde_json::Value`.

use crate::value::{mapping_from, Value};

/// Environment-provided origin tag, read once at first use. Mirrors the
/// Python original's `FRID_ERROR_VENUE` env var.
fn error_venue() -> Option<String> {
    std::env::var("FRID_ERROR_VENUE").ok()
}

/// Errors surfaced by the codec and the store engine.
#[derive(Debug, thiserror::Error)]
pub enum FridError {
    /// Codec input is malformed. Carries the offending input, byte offset,
    /// and a path breadcrumb.
    #[error("parse error at offset {offset} (path {path:?}): {message}")]
    Parse { input: String, offset: usize, path: String, message: String },

    /// A value cannot be represented in the selected dump mode (e.g. NaN in
    /// strict JSON; a blob with no escape-prefix configured).
    #[error("cannot encode at {path:?}: {message}")]
    Encode { path: String, message: String },

    /// A selector's shape doesn't match the stored value's shape.
    #[error("selector type mismatch at key {key:?}: {message}")]
    TypeMismatch { key: String, message: String },

    /// A key that the operation required to exist was absent.
    #[error("key {key:?} not found")]
    NotFound { key: String },

    /// A conditional put flag (`NO_CREATE`/`NO_CHANGE`) was violated.
    /// Surfaced at the store API boundary as a `false`/`0` return, not
    /// (usually) propagated as an error — this variant exists for callers
    /// that want to distinguish "no-op" from "genuine failure" explicitly.
    #[error("conflict on key {key:?}: {reason}")]
    Conflict { key: String, reason: String },

    /// The underlying I/O, SQL, or network backend failed.
    #[error("backend error ({backend}): {message}")]
    Backend {
        backend: &'static str,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// Invalid backend configuration at construction time (e.g. an
    /// unreachable table/column combination for the SQL backend).
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl FridError {
    pub fn parse(input: impl Into<String>, offset: usize, path: impl Into<String>, message: impl Into<String>) -> Self {
        FridError::Parse { input: input.into(), offset, path: path.into(), message: message.into() }
    }

    pub fn encode(path: impl Into<String>, message: impl Into<String>) -> Self {
        FridError::Encode { path: path.into(), message: message.into() }
    }

    pub fn type_mismatch(key: impl Into<String>, message: impl Into<String>) -> Self {
        FridError::TypeMismatch { key: key.into(), message: message.into() }
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        FridError::NotFound { key: key.into() }
    }

    pub fn conflict(key: impl Into<String>, reason: impl Into<String>) -> Self {
        FridError::Conflict { key: key.into(), reason: reason.into() }
    }

    pub fn backend(
        backend: &'static str,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        FridError::Backend { backend, message: message.into(), source: Some(Box::new(source)) }
    }

    pub fn backend_msg(backend: &'static str, message: impl Into<String>) -> Self {
        FridError::Backend { backend, message: message.into(), source: None }
    }

    pub fn config(message: impl Into<String>) -> Self {
        FridError::Config { message: message.into() }
    }

    /// Renders this error as a self-describing value: `error`, optional
    /// `cause`/`notes`, and `venue` when the environment provides one.
    pub fn to_value(&self) -> Value {
        let mut fields = vec![("error".to_string(), Value::text(self.to_string()))];
        if let Some(cause) = std::error::Error::source(self) {
            fields.push(("cause".to_string(), Value::text(cause.to_string())));
        }
        if let FridError::Parse { input, offset, path, .. } = self {
            fields.push(("notes".to_string(), Value::array(vec![
                Value::text(format!("offset={offset}")),
                Value::text(format!("path={path}")),
                Value::text(format!("input_len={}", input.len())),
            ])));
        }
        if let Some(venue) = error_venue() {
            fields.push(("venue".to_string(), Value::text(venue)));
        }
        Value::Mapping(mapping_from(fields))
    }
}

pub type Result<T> = std::result::Result<T, FridError>;
