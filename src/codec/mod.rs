//! FRID text codec: [`Value`] in, FRID/JSON/JSON5/escaped-JSON text out,
//! and back.

pub mod chrono;
pub mod dumper;
pub mod loader;
pub mod pretty;
pub mod strops;

pub use dumper::{dump_to_string, Dumper, DumperHooks, OutputMode};
pub use loader::{load_from_json_str, load_from_str, load_naked_dict, load_naked_list};

use crate::error::Result;
use crate::value::Value;

/// Round-trips `value` through FRID-native text and back, primarily for
/// tests and for backends that store everything as FRID text regardless of
/// the caller's preferred wire format.
pub fn round_trip(value: &Value) -> Result<Value> {
    let text = dump_to_string(value, OutputMode::Frid)?;
    load_from_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_nested_structure() {
        let value = Value::Array(vec![
            Value::Int(1),
            Value::text("hello world"),
            Value::Mapping(crate::value::mapping_from([("k", Value::Bool(true))])),
        ]);
        assert_eq!(round_trip(&value).unwrap(), value);
    }
}
